use thiserror::Error;

/// Coarse failure classes surfaced in adapter results and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UpstreamUnavailable,
    UpstreamMalformed,
    ExtractionExhausted,
    RenderTimeout,
    ValidationRejected,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UpstreamUnavailable => write!(f, "upstream_unavailable"),
            ErrorKind::UpstreamMalformed => write!(f, "upstream_malformed"),
            ErrorKind::ExtractionExhausted => write!(f, "extraction_exhausted"),
            ErrorKind::RenderTimeout => write!(f, "render_timeout"),
            ErrorKind::ValidationRejected => write!(f, "validation_rejected"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("bot challenge served by {url}")]
    BotChallenge { url: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unrecognized response shape: {context}")]
    UpstreamMalformed { context: String },

    #[error("all {tiers} extraction tiers for {source_id} produced no valid listings")]
    ExtractionExhausted { source_id: String, tiers: usize },

    #[error("rendering {url} exceeded {timeout_ms}ms")]
    RenderTimeout { url: String, timeout_ms: u64 },

    #[error("renderer unavailable: {0}")]
    RenderUnavailable(String),

    #[error("rendering {url} failed: {reason}")]
    RenderFailed { url: String, reason: String },

    #[error("listing rejected: {reason}")]
    ValidationRejected { reason: String },
}

impl ScraperError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScraperError::Http(_)
            | ScraperError::RateLimited { .. }
            | ScraperError::NotFound { .. }
            | ScraperError::UnexpectedStatus { .. }
            | ScraperError::BotChallenge { .. }
            | ScraperError::RenderUnavailable(_)
            | ScraperError::RenderFailed { .. } => ErrorKind::UpstreamUnavailable,
            ScraperError::Deserialize { .. }
            | ScraperError::InvalidUrl { .. }
            | ScraperError::UpstreamMalformed { .. } => ErrorKind::UpstreamMalformed,
            ScraperError::ExtractionExhausted { .. } => ErrorKind::ExtractionExhausted,
            ScraperError::RenderTimeout { .. } => ErrorKind::RenderTimeout,
            ScraperError::ValidationRejected { .. } => ErrorKind::ValidationRejected,
        }
    }

    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        ScraperError::ValidationRejected {
            reason: reason.into(),
        }
    }
}
