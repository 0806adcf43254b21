use reqwest::StatusCode;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recovery store error: {0}")]
    Recovery(String),

    /// Phase 2 of an upload failed; the object is stored and a recovery
    /// record was written under `key`.
    #[error("Upload stored but not registered (recovery key {key}): {source}")]
    Orphaned {
        key: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
            ClientError::Orphaned { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Machine code from the API error envelope, if the body carried one.
    pub fn code(&self) -> Option<String> {
        match self {
            ClientError::Http { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()?
                .get("code")?
                .as_str()
                .map(str::to_string),
            ClientError::Orphaned { source, .. } => source.code(),
            _ => None,
        }
    }
}
