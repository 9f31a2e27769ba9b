/*!
 * Error handling for provider directory operations
 *
 * Provides detailed error types with context and suggestions. Only load-cycle
 * failures surface as errors; geocoding and coordinate problems are absorbed
 * into smaller result sets by the filter and render stages.
 */

use std::fmt;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// Library result type
pub type Result<T> = std::result::Result<T, LocatorError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum LocatorError {
    /// Network, HTTP, or endpoint-reported failure while fetching providers
    #[error("{message}")]
    Fetch {
        message: String,
        status: Option<u16>,
    },

    /// Endpoint answered, but not with a `physicians` array
    #[error("Received invalid data format from the server: {message}")]
    MalformedResponse {
        message: String,
    },

    /// Postal code could not be resolved to coordinates
    #[error("Could not geocode zip code '{zip}': {message}")]
    Geocode {
        zip: String,
        message: String,
    },

    /// Invalid zip code with format guidance
    #[error("Invalid zip code '{value}': {reason}")]
    InvalidZipCode {
        value: String,
        reason: String,
        suggestion: String,
    },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Export errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Export format for result sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl LocatorError {
    /// Create a fetch error for a non-success HTTP status
    pub fn http_status(status: u16) -> Self {
        Self::Fetch {
            message: format!("HTTP error! status: {}", status),
            status: Some(status),
        }
    }

    /// Create a fetch error for an `error` field reported by the endpoint
    pub fn endpoint_reported(error: &str) -> Self {
        Self::Fetch {
            message: format!("Data fetching error: {}", error),
            status: None,
        }
    }

    /// Create an invalid zip code error with validation details
    pub fn invalid_zip(value: &str) -> Self {
        let (reason, suggestion) = if value.is_empty() {
            ("zip code cannot be empty".to_string(),
             "Enter a 5-digit US zip code".to_string())
        } else if value.chars().count() != 5 {
            (format!("zip code must be exactly 5 digits, found {}", value.chars().count()),
             "Use the 5-digit form without the +4 extension".to_string())
        } else {
            ("zip code must contain only digits".to_string(),
             "Remove any letters, spaces, or punctuation".to_string())
        };

        Self::InvalidZipCode {
            value: value.to_string(),
            reason,
            suggestion,
        }
    }

    /// Whether this error ends a load cycle (as opposed to degrading a filter pass)
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::MalformedResponse { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidZipCode { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::Configuration { suggestion: Some(sug), .. }
            | Self::Export { suggestion: Some(sug), .. }
            | Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for LocatorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<csv::Error> for LocatorError {
    fn from(err: csv::Error) -> Self {
        Self::Export {
            message: err.to_string(),
            format: ExportFormat::Csv,
            suggestion: None,
        }
    }
}

impl From<serde_json::Error> for LocatorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Export {
            message: err.to_string(),
            format: ExportFormat::Json,
            suggestion: Some("Check if the data is serializable to JSON.".to_string()),
        }
    }
}

impl From<reqwest::Error> for LocatorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message() {
        let err = LocatorError::http_status(503);
        assert_eq!(err.to_string(), "HTTP error! status: 503");
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_invalid_zip_reasons() {
        let err = LocatorError::invalid_zip("770");
        assert!(err.to_string().contains("exactly 5 digits"));
        assert!(err.user_message().contains("Suggestion"));

        let err = LocatorError::invalid_zip("77a02");
        assert!(err.to_string().contains("only digits"));
        assert!(!err.is_load_failure());
    }
}
