#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Stored JSON did not match the expected shape: {0}")]
    Json(#[from] serde_json::Error),
}
