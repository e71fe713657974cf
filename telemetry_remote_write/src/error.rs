use std::time::Duration;
use thiserror::Error;

/// A malformed observation; rejected before any network activity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("observation has an empty metric name")]
    EmptyName,
    #[error("metric '{metric}' has a label with an empty name")]
    EmptyLabelName { metric: String },
    #[error("metric '{metric}' sets reserved label '{label}'")]
    ReservedLabel { metric: String, label: String },
    #[error("metric '{metric}' is reported more than once with labels {labels}")]
    DuplicateSeries { metric: String, labels: String },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid remote write url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("remote write rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("remote write failed: {0}")]
    Failed(surf::Error),
    #[error("remote write timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum PushError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to encode write request: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("failed to compress write request body: {0}")]
    Compress(#[from] snap::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl PushError {
    /// A short name for the kind of failure, for reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            PushError::Validation(_) => "validation",
            PushError::Encode(_) | PushError::Compress(_) => "encoding",
            PushError::Transport(_) => "transport",
        }
    }
}
