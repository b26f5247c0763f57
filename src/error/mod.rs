//! Provider-agnostic error taxonomy, classification, and history
//!
//! Everything that can fail in this crate surfaces as a [`ProviderError`]
//! carrying a canonical [`ErrorKind`], a severity, and a retryability flag.
//! The [`taxonomy`] module holds the pure classification tables; the
//! [`ErrorLogger`] keeps a bounded history for diagnostics.

pub mod logger;
pub mod taxonomy;
pub mod types;

pub use logger::{ErrorContext, ErrorLogEntry, ErrorLogger, ErrorStats, DEFAULT_MAX_ENTRIES};
pub use taxonomy::{classify_http_status, default_retryable, default_severity, wrap};
pub use types::{BoxError, ErrorKind, ProviderError, RateLimitInfo, Result, Severity};
