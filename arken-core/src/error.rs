use crate::status::{Status, StatusToken};

/// Error taxonomy for the pure core: entity lookups and cluster routing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no alive instance (observed {observed:?}, status {status:?})")]
    NoAliveInstance {
        observed: StatusToken,
        status: Status,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
