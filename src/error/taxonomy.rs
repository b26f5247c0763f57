//! Provider-agnostic error classification
//!
//! Pure functions mapping HTTP statuses and foreign errors onto the canonical
//! [`ErrorKind`] taxonomy, plus the default retryability and severity tables.

use super::types::{BoxError, ErrorKind, ProviderError, Severity};
use std::collections::HashMap;

/// Classify an HTTP status code into an error kind
///
/// 400 responses are refined by message-content heuristics, since providers
/// report context overflows and unknown models as generic bad requests.
pub fn classify_http_status(status: u16, message: &str) -> ErrorKind {
    match status {
        400 => refine_bad_request(message),
        401 | 403 => ErrorKind::Authentication,
        402 => ErrorKind::Billing,
        404 => ErrorKind::ModelNotFound,
        413 => ErrorKind::ContextLengthExceeded,
        429 => ErrorKind::RateLimit,
        503 => ErrorKind::Overloaded,
        504 => ErrorKind::Timeout,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Unknown,
    }
}

/// Refine a 400 response by inspecting the error message
fn refine_bad_request(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("context length")
        || lower.contains("context_length")
        || lower.contains("maximum context")
        || lower.contains("too many tokens")
    {
        ErrorKind::ContextLengthExceeded
    } else if lower.contains("model not found")
        || lower.contains("unknown model")
        || lower.contains("does not exist")
    {
        ErrorKind::ModelNotFound
    } else {
        ErrorKind::InvalidRequest
    }
}

/// Whether errors of this kind are worth a local retry
///
/// `Unknown` is deliberately not retryable: unclassified failures must not be
/// hammered against a provider we do not understand.
pub fn default_retryable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::RateLimit
            | ErrorKind::Overloaded
            | ErrorKind::Timeout
            | ErrorKind::Network
            | ErrorKind::StreamInterrupted
            | ErrorKind::Internal
    )
}

/// Default severity per error kind
pub fn default_severity(kind: ErrorKind) -> Severity {
    match kind {
        ErrorKind::Authentication | ErrorKind::Billing | ErrorKind::QuotaExceeded => {
            Severity::Critical
        }
        ErrorKind::InvalidRequest
        | ErrorKind::Validation
        | ErrorKind::ModelNotFound
        | ErrorKind::ContentFilter
        | ErrorKind::ContextLengthExceeded
        | ErrorKind::Internal
        | ErrorKind::Unknown => Severity::High,
        ErrorKind::RateLimit | ErrorKind::Overloaded | ErrorKind::Timeout => Severity::Medium,
        ErrorKind::Network | ErrorKind::StreamInterrupted => Severity::Low,
    }
}

/// Wrap any error into a [`ProviderError`], merging context
///
/// Idempotent: an error that already is a `ProviderError` keeps its kind,
/// retryability, and severity; only the context map is merged (existing keys
/// win). Anything else becomes an `Unknown` error with the original as cause.
pub fn wrap(err: BoxError, context: &HashMap<String, String>) -> ProviderError {
    match err.downcast::<ProviderError>() {
        Ok(typed) => (*typed).merge_context(context),
        Err(other) => ProviderError::new(ErrorKind::Unknown, other.to_string())
            .with_cause(other)
            .merge_context(context),
    }
}
