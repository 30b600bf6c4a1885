use crate::config::ValidationError;
use threescale::ClientError;

/// Result type alias for apisonator operations
pub type Result<T, E = ApisonatorError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum ApisonatorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("upstream client error: {0}")]
    Client(#[from] ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
