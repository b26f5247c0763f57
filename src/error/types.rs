//! Error types for the switchboard

use super::taxonomy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Boxed error type accepted by [`taxonomy::wrap`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Canonical provider-agnostic error kinds
///
/// Every failure surfaced by this crate carries exactly one of these kinds,
/// regardless of which vendor produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid or missing credentials (401/403)
    Authentication,
    /// Malformed or unacceptable request (400)
    InvalidRequest,
    /// Provider rate limit hit (429)
    RateLimit,
    /// Billing problem on the account (402)
    Billing,
    /// Provider is overloaded or circuit is open (503)
    Overloaded,
    /// Request or stream timed out (504, inactivity)
    Timeout,
    /// Transport-level failure before a response arrived
    Network,
    /// Provider-side internal error (5xx)
    Internal,
    /// Stream ended without a terminal signal
    StreamInterrupted,
    /// Local validation rejected the request
    Validation,
    /// Account quota exhausted
    QuotaExceeded,
    /// Requested model does not exist (404)
    ModelNotFound,
    /// Content was rejected by the provider's safety filter
    ContentFilter,
    /// Input exceeds the model's context window (413)
    ContextLengthExceeded,
    /// Anything that could not be classified
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Billing => "billing",
            ErrorKind::Overloaded => "overloaded",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::Internal => "internal",
            ErrorKind::StreamInterrupted => "stream_interrupted",
            ErrorKind::Validation => "validation",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::ModelNotFound => "model_not_found",
            ErrorKind::ContentFilter => "content_filter",
            ErrorKind::ContextLengthExceeded => "context_length_exceeded",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Error severity, used for logging and alert routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected transient noise (network blips, interrupted streams)
    Low,
    /// Transient but worth watching (rate limits, overload)
    Medium,
    /// Request-level defects that need a code or prompt change
    High,
    /// Account-level problems that block all traffic
    Critical,
}

/// Rate limit metadata parsed from provider response headers
///
/// Purely descriptive; only `retry_after_seconds` influences control flow
/// (as the backoff hint in the retrier).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Whether the response indicated an active rate limit
    pub is_rate_limited: bool,
    /// Seconds the provider asked us to wait before retrying
    pub retry_after_seconds: Option<u64>,
    /// Request limit for the current window
    pub limit: Option<u64>,
    /// Requests remaining in the current window
    pub remaining: Option<u64>,
    /// When the current window resets
    pub reset_at: Option<DateTime<Utc>>,
    /// Requests-per-minute quota, if advertised
    pub requests_per_minute: Option<u64>,
    /// Tokens-per-minute quota, if advertised
    pub tokens_per_minute: Option<u64>,
    /// Tokens-per-day quota, if advertised
    pub tokens_per_day: Option<u64>,
}

impl RateLimitInfo {
    /// Parse rate limit metadata from response headers
    ///
    /// Header names are matched case-insensitively. Understands the
    /// OpenAI-style `x-ratelimit-*` family and the `retry-after` header
    /// (seconds form only; HTTP-date values are ignored).
    pub fn from_headers(headers: &HashMap<String, String>) -> Self {
        let get = |name: &str| -> Option<&str> {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };
        let get_u64 = |name: &str| get(name).and_then(|v| v.trim().parse::<u64>().ok());

        let retry_after_seconds = get_u64("retry-after");
        let limit = get_u64("x-ratelimit-limit-requests");
        let remaining = get_u64("x-ratelimit-remaining-requests");
        let reset_at = get_u64("x-ratelimit-reset-requests")
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64));

        Self {
            is_rate_limited: retry_after_seconds.is_some() || remaining == Some(0),
            retry_after_seconds,
            limit,
            remaining,
            reset_at,
            requests_per_minute: get_u64("x-ratelimit-limit-rpm"),
            tokens_per_minute: get_u64("x-ratelimit-limit-tpm"),
            tokens_per_day: get_u64("x-ratelimit-limit-tpd"),
        }
    }
}

/// Structured provider-agnostic error
///
/// Immutable once constructed: the builder methods consume `self` and are
/// meant to be chained at the construction site. `retryable` and `severity`
/// default from the kind but may be overridden there.
#[derive(Debug, Error)]
#[error("{kind}: {message}{}", .http_status.map(|s| format!(" (http {s})")).unwrap_or_default())]
pub struct ProviderError {
    /// Canonical error kind
    pub kind: ErrorKind,
    /// Human-oriented message
    pub message: String,
    /// HTTP status of the failing response, when there was one
    pub http_status: Option<u16>,
    /// Whether a local retry may succeed
    pub retryable: bool,
    /// Severity for logging and alerting
    pub severity: Severity,
    /// Provider-supplied backoff hint in seconds
    pub retry_after_seconds: Option<u64>,
    /// Parsed rate limit headers, when available
    pub rate_limit_info: Option<RateLimitInfo>,
    /// Free-form context (provider, operation, attempt count, ...)
    pub context: HashMap<String, String>,
    /// Underlying cause, when wrapping a foreign error
    #[source]
    pub cause: Option<BoxError>,
}

impl ProviderError {
    /// Create an error with `retryable` and `severity` defaulted from the kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: None,
            retryable: taxonomy::default_retryable(kind),
            severity: taxonomy::default_severity(kind),
            retry_after_seconds: None,
            rate_limit_info: None,
            context: HashMap::new(),
            cause: None,
        }
    }

    /// Classify an HTTP failure response into a typed error
    pub fn from_http(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = taxonomy::classify_http_status(status, &message);
        Self::new(kind, message).with_status(status)
    }

    /// Attach the HTTP status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Override the retryable flag
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Override the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach a provider-supplied backoff hint
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }

    /// Attach parsed rate limit headers
    ///
    /// Also adopts the `retry_after_seconds` hint if none is set yet.
    pub fn with_rate_limit_info(mut self, info: RateLimitInfo) -> Self {
        if self.retry_after_seconds.is_none() {
            self.retry_after_seconds = info.retry_after_seconds;
        }
        self.rate_limit_info = Some(info);
        self
    }

    /// Add one context entry
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attach the underlying cause
    pub fn with_cause(mut self, cause: BoxError) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Merge additional context without touching classification
    ///
    /// Existing keys win; wrapping an already-typed error must never change
    /// its kind, retryability, or severity.
    pub fn merge_context(mut self, extra: &HashMap<String, String>) -> Self {
        for (k, v) in extra {
            self.context.entry(k.clone()).or_insert_with(|| v.clone());
        }
        self
    }

    /// A short user-facing description derived from the kind
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Authentication => "The provider rejected the configured credentials.",
            ErrorKind::InvalidRequest => "The request was rejected as invalid.",
            ErrorKind::RateLimit => "The provider is rate limiting requests. Please retry shortly.",
            ErrorKind::Billing => "There is a billing problem with the provider account.",
            ErrorKind::Overloaded => "The provider is overloaded. Please retry shortly.",
            ErrorKind::Timeout => "The provider took too long to respond.",
            ErrorKind::Network => "A network error occurred while contacting the provider.",
            ErrorKind::Internal => "The provider reported an internal error.",
            ErrorKind::StreamInterrupted => "The response stream was interrupted.",
            ErrorKind::Validation => "The request failed validation.",
            ErrorKind::QuotaExceeded => "The provider account quota is exhausted.",
            ErrorKind::ModelNotFound => "The requested model is not available.",
            ErrorKind::ContentFilter => "The content was rejected by the provider's safety filter.",
            ErrorKind::ContextLengthExceeded => "The conversation is too long for this model.",
            ErrorKind::Unknown => "An unexpected error occurred.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults_from_kind() {
        let err = ProviderError::new(ErrorKind::RateLimit, "slow down");
        assert!(err.retryable);
        assert_eq!(err.severity, Severity::Medium);

        let err = ProviderError::new(ErrorKind::Authentication, "bad key");
        assert!(!err.retryable);
        assert_eq!(err.severity, Severity::Critical);
    }

    #[test]
    fn test_builder_overrides() {
        let err = ProviderError::new(ErrorKind::Internal, "boom")
            .with_retryable(false)
            .with_severity(Severity::Critical)
            .with_retry_after(7);
        assert!(!err.retryable);
        assert_eq!(err.severity, Severity::Critical);
        assert_eq!(err.retry_after_seconds, Some(7));
    }

    #[test]
    fn test_merge_context_keeps_existing_keys() {
        let err = ProviderError::new(ErrorKind::Network, "reset").with_context("provider", "openai");
        let mut extra = HashMap::new();
        extra.insert("provider".to_string(), "anthropic".to_string());
        extra.insert("operation".to_string(), "stream".to_string());

        let err = err.merge_context(&extra);
        assert_eq!(err.context.get("provider").unwrap(), "openai");
        assert_eq!(err.context.get("operation").unwrap(), "stream");
    }

    #[test]
    fn test_display_includes_status() {
        let err = ProviderError::from_http(429, "too many requests");
        let text = err.to_string();
        assert!(text.contains("rate_limit"));
        assert!(text.contains("429"));
    }

    #[test]
    fn test_rate_limit_info_adopts_retry_after() {
        let info = RateLimitInfo {
            is_rate_limited: true,
            retry_after_seconds: Some(12),
            ..Default::default()
        };
        let err = ProviderError::new(ErrorKind::RateLimit, "limited").with_rate_limit_info(info);
        assert_eq!(err.retry_after_seconds, Some(12));
    }

    #[test]
    fn test_from_headers_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Retry-After".to_string(), "30".to_string());
        headers.insert("X-RateLimit-Limit-Requests".to_string(), "500".to_string());
        headers.insert("x-ratelimit-remaining-requests".to_string(), "0".to_string());

        let info = RateLimitInfo::from_headers(&headers);
        assert!(info.is_rate_limited);
        assert_eq!(info.retry_after_seconds, Some(30));
        assert_eq!(info.limit, Some(500));
        assert_eq!(info.remaining, Some(0));
    }

    #[test]
    fn test_from_headers_empty() {
        let info = RateLimitInfo::from_headers(&HashMap::new());
        assert!(!info.is_rate_limited);
        assert_eq!(info.retry_after_seconds, None);
    }
}
