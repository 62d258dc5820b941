#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Upstream returned {status} for {context}")]
    Status { status: u16, context: String },
    #[error("Failed to decode upstream response: {0}")]
    Decode(String),
}
