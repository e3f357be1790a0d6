use thiserror::Error;

/// Errors raised while translating an algebra tree to SQL or executing the result (spec.md §4.6).
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("variable-predicate paths are not supported; bind the predicate of a path step")]
    VariablePredicatePath,

    #[error("UNION arms must agree on their set of bound variables")]
    IncompatibleUnionArms,

    #[error(transparent)]
    Parse(#[from] quadstore_sparql::ParseError),

    #[error(transparent)]
    Store(#[from] quadstore_store::StoreError),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type CompileResult<T> = Result<T, CompileError>;
