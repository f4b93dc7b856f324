/// Error kinds returned by the platform API wrappers
///
/// Every call into the X API resolves to either a value or one of these
/// variants. Callers branch on the variant instead of inspecting messages.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Rate limited{}", reset_suffix(.reset_at))]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("Already done: {0}")]
    AlreadyDone(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(" until {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => String::new(),
    }
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    /// Errors that make continuing the run pointless: the credentials
    /// were refused.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Malformed(err.to_string())
        } else {
            ApiError::Transient(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rate_limited_message_with_reset() {
        let reset_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).single();
        let error = ApiError::RateLimited { reset_at };
        assert_eq!(error.to_string(), "Rate limited until 2024-05-01 12:30:00 UTC");
    }

    #[test]
    fn test_rate_limited_message_without_reset() {
        let error = ApiError::RateLimited { reset_at: None };
        assert_eq!(error.to_string(), "Rate limited");
    }

    #[test]
    fn test_rejected_message() {
        let error = ApiError::Rejected {
            status: 400,
            body: "bad query".to_string(),
        };
        assert_eq!(error.to_string(), "Request rejected (400): bad query");
    }

    #[test]
    fn test_only_unauthorized_is_fatal() {
        assert!(ApiError::Unauthorized("bad token".to_string()).is_fatal());
        assert!(!ApiError::Forbidden("protected".to_string()).is_fatal());
        assert!(!ApiError::RateLimited { reset_at: None }.is_fatal());
        assert!(!ApiError::Transient("timeout".to_string()).is_fatal());
    }

    #[test]
    fn test_is_rate_limited() {
        assert!(ApiError::RateLimited { reset_at: None }.is_rate_limited());
        assert!(!ApiError::AlreadyDone("liked".to_string()).is_rate_limited());
    }
}
