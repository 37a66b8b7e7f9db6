use thiserror::Error;

/// Errors raised while decoding the shared format vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Unknown text format: {0}")]
    UnknownTextFormat(String),

    #[error("Unknown text mode: {0}")]
    UnknownTextMode(String),

    #[error("Unknown element format: {0}")]
    UnknownElementFormat(String),

    #[error("Unknown direction: {0}")]
    UnknownDirection(String),
}
