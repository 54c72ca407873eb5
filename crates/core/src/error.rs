use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The wizard lost its place: a session or track id could not be recovered
    /// from a response. Fatal for the current identifier.
    #[error("Session protocol error: {0}")]
    SessionProtocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors that end the walk of a single identifier but leave the batch running.
    pub fn is_identifier_failure(&self) -> bool {
        matches!(self, Error::SessionProtocol(_) | Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
