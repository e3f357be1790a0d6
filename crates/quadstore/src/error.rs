use thiserror::Error;

/// Aggregated facade error, composing every layer's own error enum (SPEC_FULL.md §4.10,
/// mirroring the teacher's per-crate errors re-exported and combined at the top level).
#[derive(Debug, Error)]
pub enum QuadstoreError {
    #[error(transparent)]
    Store(#[from] quadstore_store::StoreError),

    #[error(transparent)]
    Parse(#[from] quadstore_sparql::ParseError),

    #[error(transparent)]
    Compile(#[from] quadstore_compiler::CompileError),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Results(#[from] quadstore_results::ResultsError),

    #[error("no ontology registered under IRI {0:?}")]
    UnknownOntologyIri(String),
}

pub type QuadstoreResult<T> = Result<T, QuadstoreError>;
