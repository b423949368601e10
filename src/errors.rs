use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("GATEWAY_FAILURE: {0}")]
    Gateway(String),
    #[error("TRANSPORT_FAILURE: {0}")]
    Transport(String),
    #[error("SESSION_BUSY: {0}")]
    Busy(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl SessionError {
    /// The failure text without the error-code prefix, suitable for a
    /// transcript line.
    pub fn message(&self) -> &str {
        match self {
            Self::Gateway(message)
            | Self::Transport(message)
            | Self::Busy(message)
            | Self::Internal(message) => message,
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(value: reqwest::Error) -> Self {
        Self::Gateway(value.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
