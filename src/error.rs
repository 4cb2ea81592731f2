use thiserror::Error;

/// Failures talking to the download resolver. Every variant ends up as the
/// same user-facing "couldn't fetch that" reply.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("resolver request timed out")]
    Timeout,
    #[error("resolver request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("resolver returned HTTP {0}")]
    Status(u16),
    #[error("resolver returned malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("resolver returned no media items")]
    Empty,
    #[error("resolver returned an unusable download url: {0}")]
    InvalidDownloadUrl(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Transport(e)
        }
    }
}

/// Failure mirroring a request into the audit chat. Only ever logged.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to send audit entry to {target}: {source}")]
    Send {
        target: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A button payload that could not be encoded or decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),
    #[error("unknown action tag: {0:?}")]
    UnknownAction(String),
    #[error("unknown media format: {0:?}")]
    UnknownFormat(String),
    #[error("empty url")]
    EmptyUrl,
    #[error("url contains the payload separator")]
    SeparatorInUrl,
    #[error("payload is {0} bytes, limit is {1}")]
    TooLong(usize, usize),
}
