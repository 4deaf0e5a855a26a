#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unit manager command failed: {0}")]
    UnitManager(String),

    #[error("container orchestrator error: {0}")]
    ContainerOrchestrator(#[from] bollard::errors::Error),

    #[error("unparseable unit name: {0}")]
    UnitName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
