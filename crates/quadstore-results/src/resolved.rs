//! Resolves the compiler's [`quadstore_model::Term`] (storid-based) bindings into the strings a
//! SPARQL-Results encoding actually writes: an IRI, a blank-node label, or a literal's lexical
//! form plus its datatype IRI / language tag.

use crate::error::{ResultsError, ResultsResult};
use quadstore_model::{LiteralValue, Term};
use quadstore_store::Abbreviator;
use rusqlite::Connection;

/// One resolved term binding, already in the shape every encoder needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTerm {
    Iri(String),
    BlankNode(String),
    Literal {
        lexical: String,
        datatype_iri: Option<String>,
        lang: Option<String>,
    },
}

/// Resolves terms against a connection's `resources`/`lang_tags` tables. Cheap to construct per
/// result set; does not cache (result sets are typically small compared to the store).
pub struct TermResolver<'a> {
    conn: &'a Connection,
    abbrev: &'a Abbreviator,
}

impl<'a> TermResolver<'a> {
    #[must_use]
    pub const fn new(conn: &'a Connection, abbrev: &'a Abbreviator) -> Self {
        Self { conn, abbrev }
    }

    pub fn resolve(&self, term: &Term) -> ResultsResult<ResolvedTerm> {
        match term {
            Term::Resource(storid) => {
                let iri = self
                    .abbrev
                    .unabbreviate(self.conn, *storid)?
                    .ok_or(ResultsError::DanglingResource(storid.get()))?;
                Ok(ResolvedTerm::Iri(iri))
            }
            Term::BlankNode(storid) => Ok(ResolvedTerm::BlankNode(format!("b{}", storid.get().unsigned_abs()))),
            Term::Literal(lit) => {
                let lexical = lexical_form(&lit.value);
                if let Some(tag_id) = lit.datatype.lang_tag_id() {
                    let lang = self.abbrev.lang_tag(self.conn, tag_id)?.ok_or(ResultsError::DanglingDatatype(lit.datatype.0))?;
                    return Ok(ResolvedTerm::Literal {
                        lexical,
                        datatype_iri: None,
                        lang: Some(lang),
                    });
                }
                if lit.datatype.is_plain() {
                    return Ok(ResolvedTerm::Literal {
                        lexical,
                        datatype_iri: None,
                        lang: None,
                    });
                }
                let dt_storid = lit.datatype.xsd_storid().expect("neither plain nor lang-tagged");
                let datatype_iri = self
                    .abbrev
                    .unabbreviate(self.conn, dt_storid)?
                    .ok_or(ResultsError::DanglingDatatype(lit.datatype.0))?;
                Ok(ResolvedTerm::Literal {
                    lexical,
                    datatype_iri: Some(datatype_iri),
                    lang: None,
                })
            }
        }
    }
}

fn lexical_form(value: &LiteralValue) -> String {
    value.to_string()
}
