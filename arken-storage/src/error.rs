use std::time::Duration;

/// Error taxonomy for the etcd-backed persistence driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("etcd error: {0}")]
    Kv(#[from] etcd_client::Error),

    #[error("unparseable node at {0}: {1}")]
    Parse(String, String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("kv operation timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
