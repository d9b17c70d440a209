//! Error types and handling for chargelink
//!
//! This module defines the error types used throughout the client,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for chargelink operations
pub type Result<T> = std::result::Result<T, ChargelinkError>;

/// Main error type for chargelink
#[derive(Debug, Error)]
pub enum ChargelinkError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Channel establishment and transport errors
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Wire protocol errors (outbound encoding, unexpected frames)
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// An operation did not finish within its deadline
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Schedule editing errors (edit lock, bad row index)
    #[error("Schedule error: {message}")]
    Schedule { message: String },
}

impl ChargelinkError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ChargelinkError::Config {
            message: message.into(),
        }
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        ChargelinkError::Connection {
            message: message.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        ChargelinkError::Protocol {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ChargelinkError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ChargelinkError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        ChargelinkError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new schedule error
    pub fn schedule<S: Into<String>>(message: S) -> Self {
        ChargelinkError::Schedule {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ChargelinkError {
    fn from(err: std::io::Error) -> Self {
        ChargelinkError::io(err.to_string())
    }
}

impl From<std::fmt::Error> for ChargelinkError {
    fn from(err: std::fmt::Error) -> Self {
        ChargelinkError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ChargelinkError {
    fn from(err: serde_yaml::Error) -> Self {
        ChargelinkError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ChargelinkError {
    fn from(err: serde_json::Error) -> Self {
        ChargelinkError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChargelinkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChargelinkError::connection(err.to_string())
    }
}

impl From<chrono::ParseError> for ChargelinkError {
    fn from(err: chrono::ParseError) -> Self {
        ChargelinkError::validation("time", &err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ChargelinkError::config("test config error");
        assert!(matches!(err, ChargelinkError::Config { .. }));

        let err = ChargelinkError::connection("refused");
        assert!(matches!(err, ChargelinkError::Connection { .. }));

        let err = ChargelinkError::validation("field", "test validation error");
        assert!(matches!(err, ChargelinkError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = ChargelinkError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = ChargelinkError::validation("test_field", "invalid value");
        assert_eq!(
            format!("{}", err),
            "Validation error: test_field - invalid value"
        );
    }

    #[test]
    fn chrono_parse_error_maps_to_validation() {
        let err = chrono::NaiveTime::parse_from_str("25:99", "%H:%M:%S").unwrap_err();
        let err: ChargelinkError = err.into();
        assert!(matches!(err, ChargelinkError::Validation { ref field, .. } if field == "time"));
    }
}
