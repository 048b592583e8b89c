pub mod addr;
pub mod error;

pub use addr::{is_ipv6, parse_ip_port, IpFamily};
pub use error::{ErrorKind, SetHostsError};
