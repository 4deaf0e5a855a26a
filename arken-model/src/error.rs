/// Error taxonomy for the reconciliation engine, composing the pure core's
/// errors with the persistence and driver boundaries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] arken_core::Error),

    /// Back-end driver and persistence-driver errors are both type-erased
    /// via `anyhow`, since each driver implementation defines its own
    /// concrete error type.
    #[error("{0}")]
    Persistence(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
