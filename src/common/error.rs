use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetHostsError {
    #[error("config error: {0}")]
    Config(String),

    #[error("cannot create cache directory {}: {source}", path.display())]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read hosts file {}: {source}", path.display())]
    HostsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write hosts file {}: {source}", path.display())]
    HostsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("DNS query failed: {0}")]
    Dns(String),

    #[error("scrape fallback failed: {0}")]
    Scrape(String),
}

impl SetHostsError {
    /// Whether this error must abort the run instead of degrading to an empty result.
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    /// Try to extract a SetHostsError from an anyhow::Error.
    pub fn classify(err: &anyhow::Error) -> ErrorKind {
        match err.downcast_ref::<SetHostsError>() {
            Some(e) => e.kind(),
            None => ErrorKind::Other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SetHostsError::Config(_) => ErrorKind::Config,
            SetHostsError::CacheDir { .. } => ErrorKind::CacheDir,
            SetHostsError::HostsRead { .. } => ErrorKind::HostsRead,
            SetHostsError::HostsWrite { .. } => ErrorKind::HostsWrite,
            SetHostsError::Dns(_) => ErrorKind::Dns,
            SetHostsError::Scrape(_) => ErrorKind::Scrape,
        }
    }
}

/// Lightweight error category for pattern matching without borrowing the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    CacheDir,
    HostsRead,
    HostsWrite,
    Dns,
    Scrape,
    Other,
}

impl ErrorKind {
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::Config | ErrorKind::CacheDir | ErrorKind::HostsRead | ErrorKind::HostsWrite
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG",
            ErrorKind::CacheDir => "CACHE_DIR",
            ErrorKind::HostsRead => "HOSTS_READ",
            ErrorKind::HostsWrite => "HOSTS_WRITE",
            ErrorKind::Dns => "DNS_FAILED",
            ErrorKind::Scrape => "SCRAPE_FAILED",
            ErrorKind::Other => "OTHER",
        }
    }
}
