use std::path::PathBuf;

use thiserror::Error;

/// Client-side validation failures. The display text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a question.")]
    EmptyQuery,
    #[error("Please choose an image.")]
    NoImageSelected,
}

/// A request that never produced an HTTP reply.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid backend url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to encode {endpoint} request: {source}")]
    Encode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{endpoint} request failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
#[error("failed to read image '{}': {source}", path.display())]
pub struct ImageReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
