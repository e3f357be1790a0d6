use thiserror::Error;

/// Errors raised by the model crate itself (term construction, not store or SPARQL errors).
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid IRI: {0}")]
    InvalidIri(String),
    #[error("storid {0} is not in the reserved universal-vocabulary range")]
    NotUniversal(i64),
}
