use thiserror::Error;

/// Failures produced while fetching current weather.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// No HTTP response was obtained (DNS, refused connection, timeout, broken body stream).
    #[error("Network request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("Weather service responded with status {status}: {}", truncate_body(.body))]
    HttpStatus { status: u16, body: String },

    /// The service answered 2xx but the body did not decode into a snapshot.
    #[error("Failed to decode weather response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The background fetch task panicked or was cancelled by the runtime.
    #[error("Background fetch task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl WeatherError {
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// HTTP status code, when a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            WeatherError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
