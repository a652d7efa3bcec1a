//! Crewgen error types
//!
//! Re-exports crewgen-error and maps provider failures onto it.

pub use crewgen_error::{Error, ErrorKind, ErrorStatus, Result};

use crate::provider::ProviderError;

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        let kind = match &err {
            ProviderError::Network(_) => ErrorKind::NetworkFailed,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            ProviderError::ModelNotFound(_) | ProviderError::InvalidRequest(_) => {
                ErrorKind::ConfigInvalid
            }
            ProviderError::Parse(_) => ErrorKind::ParseFailed,
            ProviderError::Api { .. } | ProviderError::Other(_) => ErrorKind::InferenceFailed,
        };
        let status = if err.is_retryable() {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        };

        Error::new(kind, err.to_string())
            .with_status(status)
            .with_operation("provider::complete")
            .set_source(err)
    }
}

/// Create an InvalidResponse error carrying the offending reply
pub fn invalid_response(reason: impl Into<String>, reply: &str) -> Error {
    Error::invalid_response(reason).with_context("reply", truncate(reply, 200))
}

/// Create a QueryFailed error carrying the statement
pub fn query_failed(query: &str, reason: impl Into<String>) -> Error {
    Error::query_failed(reason).with_context("query", truncate(query, 200))
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…", &s[..idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_mapping() {
        let err: Error = ProviderError::RateLimited { retry_after: None }.into();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.is_retryable());

        let err: Error = ProviderError::Api { status: 400, message: "bad".into() }.into();
        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("short", 10), "short");
    }
}
