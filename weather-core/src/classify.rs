use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Redirect,
    ClientError,
    NotFound,
    ServerError,
    Network,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Redirect => "redirect",
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::Network => "network",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub raw_status_code: Option<u16>,
    /// Diagnostic text of the underlying failure; not meant for end users.
    pub message: String,
}

/// Maps a fetch failure to its category using only the error kind and status code.
pub fn classify(error: &WeatherError) -> ClassifiedError {
    let category = match error {
        WeatherError::HttpStatus { status, .. } => match *status {
            300..=399 => ErrorCategory::Redirect,
            404 => ErrorCategory::NotFound,
            400..=499 => ErrorCategory::ClientError,
            200..=299 => ErrorCategory::Unknown,
            _ => ErrorCategory::ServerError,
        },
        WeatherError::Network(_) | WeatherError::Decode(_) => ErrorCategory::Network,
        WeatherError::Task(_) => ErrorCategory::Unknown,
    };

    ClassifiedError {
        category,
        raw_status_code: error.status_code(),
        message: error.to_string(),
    }
}
