use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Failed to load config: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Client(#[from] populator::ClientBuildError),
    #[error("Claim cache failed: {0}")]
    Cache(#[from] CacheError),
    #[error("Controller task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Shutdown timed out after {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

pub type ControllerResult<T, E = ControllerError> = Result<T, E>;
