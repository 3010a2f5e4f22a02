//! DCS client error types.

/// Errors from the DCS HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum DcsError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream rejected the request as too frequent. The map API
    /// signals this with 403 rather than the conventional 429, so both are
    /// treated as throttling.
    #[error("throttled by upstream (status {status})")]
    Throttled { status: u16 },

    /// API returned a non-success status that is not a throttling signal
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("decode error: {message}")]
    Decode {
        message: String,
        /// Truncated body sample for diagnostics.
        body: Option<String>,
    },
}

impl DcsError {
    /// Whether the error is a rate-limit signal worth retrying after a
    /// backoff delay.
    pub fn is_throttle(&self) -> bool {
        matches!(self, DcsError::Throttled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_classification() {
        assert!(DcsError::Throttled { status: 403 }.is_throttle());
        assert!(!DcsError::Api {
            status: 500,
            message: "boom".into()
        }
        .is_throttle());
        assert!(!DcsError::Decode {
            message: "bad json".into(),
            body: None
        }
        .is_throttle());
    }

    #[test]
    fn error_display() {
        let err = DcsError::Api {
            status: 502,
            message: "Bad Gateway".into(),
        };
        assert_eq!(err.to_string(), "API error 502: Bad Gateway");

        let err = DcsError::Throttled { status: 403 };
        assert_eq!(err.to_string(), "throttled by upstream (status 403)");
    }
}
