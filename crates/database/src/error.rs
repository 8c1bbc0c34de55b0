use crate::source::TableKind;
use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to open the bot database at '{0}': {1}")]
    ConnectionConfigError(String, String),

    #[error("Database error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Failed to decode a {table} record: {source}")]
    Decode {
        table: TableKind,
        #[source]
        source: CoreError,
    },

    #[error("Source '{source_id}' is unhealthy: unreadable tables {tables:?}")]
    SourceUnhealthy {
        source_id: String,
        tables: Vec<TableKind>,
    },

    #[error("Reading the {0} table timed out")]
    ProbeTimedOut(TableKind),
}

impl DbError {
    pub(crate) fn decode(table: TableKind) -> impl FnOnce(CoreError) -> DbError {
        move |source| DbError::Decode { table, source }
    }
}
