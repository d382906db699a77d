use thiserror::Error;

use crate::http::FetchError;
use crate::model::SourceId;

/// Failure of one connector operation
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Network failure or timeout, already retried by the HTTP layer
    #[error("transport error: {0}")]
    Transport(#[from] FetchError),

    /// The page or payload no longer has the expected structure
    #[error("parse error: {0}")]
    Parse(String),

    /// The source gates this content behind a login or purchase
    #[error("content is locked: {0}")]
    Paywall(String),

    /// The content exists but is not made of page images (e.g. a novel chapter)
    #[error("unsupported content: {0}")]
    UnsupportedContent(String),

    #[error("{found} key handed to the {expected} connector")]
    KeyMismatch { expected: SourceId, found: SourceId },
}

impl ConnectorError {
    pub fn parse(message: impl Into<String>) -> Self {
        ConnectorError::Parse(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectorError::Transport(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Errors that degrade to an empty result at the operation boundary
    ///
    /// Paywalled and unsupported content is reported to the caller instead.
    pub fn degrades_to_empty(&self) -> bool {
        !matches!(
            self,
            ConnectorError::Paywall(_) | ConnectorError::UnsupportedContent(_)
        )
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Parse(err.to_string())
    }
}
