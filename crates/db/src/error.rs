use navwarn_core::error::CoreError;

/// Error type for the repository layer. Validation and not-found conditions
/// surface as [`CoreError`]; everything else is a database or JSON
/// (de)serialization failure.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("JSON payload error: {0}")]
    Json(#[from] serde_json::Error),
}
