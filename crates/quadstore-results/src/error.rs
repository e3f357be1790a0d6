use thiserror::Error;

/// Errors raised while resolving a solution's terms or serializing them (spec.md §4.8, §6).
#[derive(Debug, Error)]
pub enum ResultsError {
    #[error(transparent)]
    Store(#[from] quadstore_store::StoreError),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("storid {0} has no registered IRI (dangling resource reference)")]
    DanglingResource(i64),

    #[error("literal has datatype-id {0} with no matching resource row")]
    DanglingDatatype(i64),
}

pub type ResultsResult<T> = Result<T, ResultsError>;
