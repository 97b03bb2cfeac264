use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Handshake rejected")]
    Rejected,
    #[error("Gave up after {0} attempts")]
    RetriesExhausted(u32),
}
