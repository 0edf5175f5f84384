use crate::{Error, error::StorageError};

/// Maps driver errors into [`StorageError::Database`], logging them at the
/// repository boundary.
///
/// ```rust,ignore
/// use skillshare_core::error::utilities::DatabaseResultExt;
///
/// query.execute(&pool).await.map_db_err_with_context("Failed to unlock account")?;
/// ```
pub trait DatabaseResultExt<T> {
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> DatabaseResultExt<T> for Result<T, E> {
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| {
            tracing::error!(error = %e, "{context}");
            Error::Storage(StorageError::Database(format!("{context}: {e}")))
        })
    }
}
