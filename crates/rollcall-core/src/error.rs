use thiserror::Error;

/// Core error types for Rollcall domain validation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid wall time '{0}': expected HH:MM")]
    InvalidWallTime(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid capacity model: {message}")]
    InvalidCapacity { message: String },

    #[error("Invalid registration: {message}")]
    InvalidRegistration { message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidWallTime error
    pub fn invalid_wall_time(value: impl Into<String>) -> Self {
        Self::InvalidWallTime(value.into())
    }

    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(message: impl Into<String>) -> Self {
        Self::InvalidTimestamp(message.into())
    }

    /// Create a new InvalidCapacity error
    pub fn invalid_capacity(message: impl Into<String>) -> Self {
        Self::InvalidCapacity {
            message: message.into(),
        }
    }

    /// Create a new InvalidRegistration error
    pub fn invalid_registration(message: impl Into<String>) -> Self {
        Self::InvalidRegistration {
            message: message.into(),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_wall_time("25:99");
        assert_eq!(err.to_string(), "Invalid wall time '25:99': expected HH:MM");
    }

    #[test]
    fn test_invalid_capacity_message() {
        let err = CoreError::invalid_capacity("maxSeats must be > 0");
        assert!(err.to_string().contains("maxSeats must be > 0"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("{ nope }").unwrap_err();
        let core_err: CoreError = json_err.into();
        assert!(matches!(core_err, CoreError::JsonError(_)));
    }
}
