use fractalview_core::TransportError;
use thiserror::Error;

/// Errors originating from HTTP transport setup.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("invalid service URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<NetError> for TransportError {
    fn from(e: NetError) -> Self {
        TransportError::new(e.to_string())
    }
}
