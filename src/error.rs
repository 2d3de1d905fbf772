//! Error taxonomy.
//!
//! `thiserror` gives each failure mode a closed, matchable shape so
//! retry/propagation policy can dispatch on the variant instead of on
//! a string. Call boundaries (the CLI, the orchestrator's public API)
//! still return `anyhow::Result`, the way `scrapers::dome_rest`
//! wraps its HTTP client's errors with `.context(...)`.

use thiserror::Error;

/// Failure modes of the stealth fetcher (C6).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("navigation to {url} timed out after {elapsed_ms}ms")]
    Timeout { url: String, elapsed_ms: u64 },

    #[error("browser process or protocol error fetching {url}: {source}")]
    IoError {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("bot-wall detected fetching {url}")]
    Blocked { url: String },

    #[error("unknown fetch failure for {url}: {source}")]
    Unknown {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout { .. } | FetchError::IoError { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url, .. } => url,
            FetchError::IoError { url, .. } => url,
            FetchError::Blocked { url } => url,
            FetchError::Unknown { url, .. } => url,
        }
    }
}

/// Outcome categories the fetch orchestrator recognizes for one cycle.
/// These are distinct from `FetchError` because some of
/// them (PatternMissing, ExtractionEmpty, ValidationFailed) arise
/// after a successful HTTP fetch.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no active pattern for domain {domain}")]
    PatternMissing { domain: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("extraction produced no usable fields for {url}")]
    ExtractionEmpty { url: String },

    #[error("validation failed: {0:?}")]
    ValidationFailed(Vec<String>),

    #[error("persistence failed for listing {listing_id}: {source}")]
    Persistence {
        listing_id: uuid::Uuid,
        #[source]
        source: anyhow::Error,
    },
}

impl OrchestratorError {
    /// Whether this attempt should count toward `Pattern::total_attempts`
    /// as a failed attempt (i.e. everything except persistence errors,
    /// which must leave `last_checked` untouched for retry).
    pub fn counts_as_attempt(&self) -> bool {
        !matches!(self, OrchestratorError::Persistence { .. })
    }

    /// Whether `last_checked` should be advanced despite this failure.
    pub fn should_advance_last_checked(&self) -> bool {
        !matches!(self, OrchestratorError::Persistence { .. })
    }
}
