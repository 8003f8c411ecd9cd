use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The replay is not (yet) readable; the event is skipped.
    #[error("replay not ready: {0}")]
    ParseUnavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    pub fn internal(message: impl Into<String>) -> Self {
        TrackerError::Internal(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        TrackerError::Transport(message.into())
    }
}
