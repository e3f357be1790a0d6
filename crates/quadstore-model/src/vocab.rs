//! Universal vocabulary: a fixed, compile-time-known range of low storids for the RDF/RDFS/OWL/
//! XSD terms the compiler and normalizer need to reference as integer constants (spec.md §3,
//! §4.1). Bootstrapped into a fresh store before anything else is abbreviated.

use crate::storid::Storid;

macro_rules! universal_vocab {
    ($($konst:ident = $id:literal => $iri:literal),+ $(,)?) => {
        $(pub const $konst: Storid = Storid($id);)+

        /// `(storid, iri)` pairs to pre-register in a fresh store, in ascending storid order.
        #[must_use]
        pub fn bootstrap_pairs() -> Vec<(Storid, &'static str)> {
            vec![$(($konst, $iri)),+]
        }
    };
}

universal_vocab! {
    RDF_TYPE = 1 => "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
    RDF_FIRST = 2 => "http://www.w3.org/1999/02/22-rdf-syntax-ns#first",
    RDF_REST = 3 => "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest",
    RDF_NIL = 4 => "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil",
    RDF_LANG_STRING = 5 => "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString",
    RDFS_SUBCLASS_OF = 10 => "http://www.w3.org/2000/01/rdf-schema#subClassOf",
    RDFS_SUBPROPERTY_OF = 11 => "http://www.w3.org/2000/01/rdf-schema#subPropertyOf",
    RDFS_DOMAIN = 12 => "http://www.w3.org/2000/01/rdf-schema#domain",
    RDFS_RANGE = 13 => "http://www.w3.org/2000/01/rdf-schema#range",
    RDFS_LABEL = 14 => "http://www.w3.org/2000/01/rdf-schema#label",
    RDFS_COMMENT = 15 => "http://www.w3.org/2000/01/rdf-schema#comment",
    OWL_CLASS = 20 => "http://www.w3.org/2002/07/owl#Class",
    OWL_OBJECT_PROPERTY = 21 => "http://www.w3.org/2002/07/owl#ObjectProperty",
    OWL_DATATYPE_PROPERTY = 22 => "http://www.w3.org/2002/07/owl#DatatypeProperty",
    OWL_ANNOTATION_PROPERTY = 23 => "http://www.w3.org/2002/07/owl#AnnotationProperty",
    OWL_FUNCTIONAL_PROPERTY = 24 => "http://www.w3.org/2002/07/owl#FunctionalProperty",
    OWL_NAMED_INDIVIDUAL = 25 => "http://www.w3.org/2002/07/owl#NamedIndividual",
    OWL_THING = 26 => "http://www.w3.org/2002/07/owl#Thing",
    OWL_RESTRICTION = 27 => "http://www.w3.org/2002/07/owl#Restriction",
    OWL_ON_PROPERTY = 28 => "http://www.w3.org/2002/07/owl#onProperty",
    OWL_EQUIVALENT_CLASS = 29 => "http://www.w3.org/2002/07/owl#equivalentClass",
    OWL_INTERSECTION_OF = 30 => "http://www.w3.org/2002/07/owl#intersectionOf",
    OWL_UNION_OF = 31 => "http://www.w3.org/2002/07/owl#unionOf",
    XSD_STRING = 40 => "http://www.w3.org/2001/XMLSchema#string",
    XSD_INTEGER = 41 => "http://www.w3.org/2001/XMLSchema#integer",
    XSD_DECIMAL = 42 => "http://www.w3.org/2001/XMLSchema#decimal",
    XSD_DOUBLE = 43 => "http://www.w3.org/2001/XMLSchema#double",
    XSD_FLOAT = 44 => "http://www.w3.org/2001/XMLSchema#float",
    XSD_BOOLEAN = 45 => "http://www.w3.org/2001/XMLSchema#boolean",
    XSD_DATE = 46 => "http://www.w3.org/2001/XMLSchema#date",
    XSD_DATETIME = 47 => "http://www.w3.org/2001/XMLSchema#dateTime",
    XSD_ANY_URI = 48 => "http://www.w3.org/2001/XMLSchema#anyURI",
}

/// Upper bound (inclusive) of the reserved universal-vocabulary storid range. Abbreviation of any
/// other IRI must allocate strictly above this.
pub const MAX_RESERVED_STORID: i64 = 255;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_pairs_are_within_reserved_range_and_unique() {
        let pairs = bootstrap_pairs();
        let mut seen = std::collections::HashSet::new();
        for (storid, iri) in &pairs {
            assert!(storid.get() > 0 && storid.get() <= MAX_RESERVED_STORID);
            assert!(seen.insert(*iri), "duplicate universal IRI {iri}");
        }
    }
}
