use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl StoreError {
    /// Transient errors are worth retrying at the activity layer; everything
    /// else is permanent (constraint violations, decode failures).
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => {
                // SQLITE_BUSY / SQLITE_LOCKED surface as database errors with
                // these codes; contention resolves on retry.
                matches!(db.code().as_deref(), Some("5") | Some("6"))
            }
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            StoreError::Database(sqlx::Error::Io(_)) => true,
            _ => false,
        }
    }
}
