//! Error types for structured analysis.

use thiserror::Error;

/// Why one analysis attempt produced no record.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The LLM endpoint could not be reached or answered outside the protocol.
    #[error("LLM transport failure: {reason}")]
    Transport {
        reason: String,
        /// HTTP status, when the endpoint answered.
        status: Option<u16>,
    },

    /// The model answered, but not with the requested JSON shape.
    #[error("LLM response failed schema validation: {reason}")]
    Schema { reason: String },
}

impl AnalyzeError {
    /// Creates a transport error without an HTTP status.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
            status: None,
        }
    }

    /// Creates a transport error for a non-2xx answer.
    pub fn http_status(status: u16, body_excerpt: &str) -> Self {
        let reason = if body_excerpt.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body_excerpt}")
        };
        Self::Transport {
            reason,
            status: Some(status),
        }
    }

    /// Classifies a reqwest error, naming timeouts explicitly.
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::transport("request timed out")
        } else if error.is_decode() {
            Self::transport(format!("malformed response envelope: {error}"))
        } else {
            Self::transport(error.to_string())
        }
    }

    /// Creates a schema validation error.
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::Schema {
            reason: reason.into(),
        }
    }

    /// Short label for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport_failure",
            Self::Schema { .. } => "schema_failure",
        }
    }
}
