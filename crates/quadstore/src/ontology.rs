use quadstore_model::Storid;

/// A handle to one ontology (named graph) registered in a [`crate::Store`] (spec.md §3). Plain
/// value type with no back-reference to the store it came from; every operation on an ontology
/// is a `Store` method taking `&Ontology`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ontology {
    pub(crate) graph: Storid,
    pub(crate) iri: String,
}

impl Ontology {
    #[must_use]
    pub fn graph(&self) -> Storid {
        self.graph
    }

    #[must_use]
    pub fn iri(&self) -> &str {
        &self.iri
    }
}
