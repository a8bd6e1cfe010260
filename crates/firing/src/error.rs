use navwarn_core::error::CoreError;
use navwarn_db::error::DbError;

/// Error type for the firing-exercise subsystem.
#[derive(Debug, thiserror::Error)]
pub enum FiringError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Message store error: {0}")]
    Store(String),
}
