#![allow(
    clippy::collapsible_if,
    clippy::len_without_is_empty,
    clippy::new_without_default,
    clippy::too_many_arguments
)]

pub mod app;
pub mod common;
pub mod config;
pub mod dns;
