//! Core value types shared by the quadstore, the SPARQL algebra, and the SQL compiler: the
//! storid identifier space, term/literal representations, quad shapes, and the reserved
//! universal-vocabulary range.

mod error;
mod storid;
mod term;
pub mod vocab;

pub use error::ModelError;
pub use storid::{DatatypeId, Storid, LANG_SENTINEL_BASE};
pub use term::{DataQuad, Literal, LiteralValue, ObjQuad, PredicateKind, Term};
