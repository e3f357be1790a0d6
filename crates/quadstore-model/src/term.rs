use crate::storid::{DatatypeId, Storid};
use std::fmt;

/// A literal value stored natively where possible (spec.md §3: "Numeric literals are stored
/// natively ... to enable SQL range comparisons; all others are stored as text").
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A literal: a lexical value plus its datatype-id (possibly a language-tag sentinel).
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    pub datatype: DatatypeId,
}

impl Literal {
    #[must_use]
    pub const fn new(value: LiteralValue, datatype: DatatypeId) -> Self {
        Self { value, datatype }
    }
}

/// An RDF term as it flows through the algebra and executor: either a resource/blank-node
/// storid, or a decoded literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Resource(Storid),
    BlankNode(Storid),
    Literal(Literal),
}

impl Term {
    #[must_use]
    pub const fn is_blank_node(&self) -> bool {
        matches!(self, Self::BlankNode(_))
    }

    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    #[must_use]
    pub const fn is_iri(&self) -> bool {
        matches!(self, Self::Resource(_))
    }
}

/// An object-valued quad: `(graph, s, p, o)` with s/p/o storids, stored in table `objs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjQuad {
    pub graph: Storid,
    pub s: Storid,
    pub p: Storid,
    pub o: Storid,
}

/// A data-valued quad: `(graph, s, p, value, dtype)`, stored in table `datas`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataQuad {
    pub graph: Storid,
    pub s: Storid,
    pub p: Storid,
    pub value: LiteralValue,
    pub datatype: DatatypeId,
}

/// The kind of a predicate, tracked once per predicate storid across the whole store (spec.md
/// §3 invariant: "A predicate is either object-valued or data-valued across the entire store").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PredicateKind {
    pub is_object: bool,
    pub is_data: bool,
    pub is_annotation: bool,
    pub is_functional: bool,
}

impl PredicateKind {
    /// An annotation property may coexist with either object or data use; everything else is a
    /// hard conflict the normalizer must reject.
    #[must_use]
    pub const fn conflicts_with(self, other: Self) -> bool {
        (self.is_object && other.is_data) || (self.is_data && other.is_object)
    }

    #[must_use]
    pub const fn is_ambiguous(self) -> bool {
        self.is_annotation || (self.is_object && self.is_data) || (!self.is_object && !self.is_data)
    }
}
