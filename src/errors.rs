use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuizGenError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited by {service}")]
    RateLimited { service: String },

    #[error("{service} API error (status {status}): {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("{0}")]
    Custom(String),
}

impl QuizGenError {
    /// Classify an HTTP status from a service boundary into a typed error.
    /// Status 429 becomes the recoverable `RateLimited` variant; everything
    /// else is a plain API error.
    pub fn from_status(service: &str, status: u16, message: String) -> Self {
        if status == 429 {
            Self::RateLimited {
                service: service.to_string(),
            }
        } else {
            Self::Api {
                service: service.to_string(),
                status,
                message,
            }
        }
    }

    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

pub type Result<T> = std::result::Result<T, QuizGenError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_status_429_is_rate_limited() {
        let err = QuizGenError::from_status("clova", 429, "slow down".to_string());
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_other_statuses_are_api_errors() {
        let err = QuizGenError::from_status("gemini", 500, "boom".to_string());
        assert!(!err.is_rate_limited());
        assert!(matches!(err, QuizGenError::Api { status: 500, .. }));
        let display = format!("{err}");
        assert!(display.contains("gemini"));
        assert!(display.contains("500"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: QuizGenError = io_err.into();
        assert!(matches!(err, QuizGenError::Io(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: QuizGenError = parse_err.into();
        assert!(matches!(err, QuizGenError::Serialization(_)));
    }

    #[test]
    fn test_persistence_error_message() {
        let err = QuizGenError::Persistence("question batch save failed".to_string());
        assert!(format!("{err}").contains("question batch save failed"));
    }
}
