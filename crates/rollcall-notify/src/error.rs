use thiserror::Error;

/// Errors raised by notification transports.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Invalid notifier configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NotifyError {
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::SendFailed(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
