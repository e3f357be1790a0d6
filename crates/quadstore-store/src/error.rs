use thiserror::Error;

/// Errors surfaced by the storage layer (spec.md §6 "Errors surface", §7 error taxonomy).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid IRI {iri:?}: {source}")]
    InvalidIri {
        iri: String,
        #[source]
        source: oxiri::IriParseError,
    },
    #[error("malformed RDF collection rooted at blank node {0}: {1}")]
    MalformedList(i64, &'static str),
    #[error("predicate {storid} is used both as an object property and a data property")]
    TypeMismatch { storid: i64 },
    #[error("ontology {0:?} is already being written to")]
    AlreadyWriting(String),
    #[error("cannot run a parallel batch while the store has uncommitted writes")]
    DirtyState,
    #[error("unknown graph storid {0}")]
    UnknownGraph(i64),
    #[error("error while parsing ontology stream: {0}")]
    OntologyParsing(String),
    #[error("store is in an inconsistent state: {0}")]
    Inconsistent(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
