use thiserror::Error;

use dynaser_dom::DomError;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Application setup failed: {0}")]
    Dom(#[from] DomError),

    #[error("Application markup has no element with id '{0}'")]
    MissingElement(String),
}
