use thiserror::Error;

/// Errors raised while lexing, parsing, or normalizing a SPARQL query (spec.md §4.4, §4.6).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("lex error at byte {0}: {1}")]
    Lex(usize, String),

    #[error("unexpected token {found:?} at byte {at}, expected {expected}")]
    UnexpectedToken {
        at: usize,
        found: String,
        expected: String,
    },

    #[error("unexpected end of query, expected {0}")]
    UnexpectedEof(String),

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("unknown prefix {0:?}")]
    UnknownPrefix(String),

    #[error("unresolvable IRI {0:?}")]
    UnknownIri(String),

    #[error("positional parameter index {0} used out of order")]
    ParamOutOfOrder(u32),

    #[error(transparent)]
    Store(#[from] quadstore_store::StoreError),
}

pub type ParseResult<T> = Result<T, ParseError>;
