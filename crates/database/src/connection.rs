use crate::error::DbError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Opens a read-only connection pool onto one bot instance's SQLite file.
///
/// The engine never writes to a bot's store, so the file is opened read-only
/// and is required to exist already.
pub async fn connect(path: impl AsRef<Path>) -> Result<SqlitePool, DbError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DbError::ConnectionConfigError(
            path.display().to_string(),
            "file does not exist".to_string(),
        ));
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(3)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    Ok(pool)
}
