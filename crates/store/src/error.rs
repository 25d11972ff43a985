use thiserror::Error;

/// SQLSTATE raised when an integer result overflows its column.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write violated a named integrity constraint (unique key, foreign
    /// key or check). The constraint name identifies which rule fired.
    #[error("Constraint violation: {constraint}")]
    Conflict { constraint: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be decoded into a record.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// An arithmetic update left the range of its column type.
    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

impl StoreError {
    /// Returns true if this error is a violation of the given constraint.
    pub fn is_conflict_on(&self, name: &str) -> bool {
        matches!(self, StoreError::Conflict { constraint } if constraint == name)
    }

    /// Translates a sqlx error, lifting integrity violations into
    /// [`StoreError::Conflict`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && (db_err.is_unique_violation()
                || db_err.is_foreign_key_violation()
                || db_err.is_check_violation())
        {
            return StoreError::Conflict {
                constraint: db_err.constraint().unwrap_or_default().to_string(),
            };
        }
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE)
        {
            return StoreError::OutOfRange(db_err.message().to_string());
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
