//! Turns parser output into a query ready for the SQL compiler: expands `PREFIX` declarations,
//! rewrites blank-node syntax into non-distinguished variables (SPARQL treats `_:x` in a query
//! body as scoped to the query, never as a reference to a stored blank node), and validates
//! predicate-kind usage against the store's `predicate_kinds` table (spec.md §3: "mixing raises
//! an error at query-compile time").

use crate::algebra::{Expression, GraphPattern, GroundTerm, PatternTerm, PropertyPath, Query, TriplePattern, UpdateOperation};
use crate::error::{ParseError, ParseResult};
use crate::parser::ParsedQuery;
use quadstore_store::{predicate, Abbreviator, StoreError};
use rusqlite::Connection;
use std::collections::HashMap;

const BUILTIN_PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

pub struct Normalizer<'a> {
    prefixes: HashMap<String, String>,
    conn: &'a Connection,
    abbrev: &'a Abbreviator,
}

impl<'a> Normalizer<'a> {
    #[must_use]
    pub fn new(parsed: &ParsedQuery, conn: &'a Connection, abbrev: &'a Abbreviator) -> Self {
        let mut prefixes: HashMap<String, String> =
            BUILTIN_PREFIXES.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        for (k, v) in &parsed.prefixes {
            prefixes.insert(k.clone(), v.clone());
        }
        Self { prefixes, conn, abbrev }
    }

    pub fn normalize(&self, query: Query) -> ParseResult<Query> {
        match query {
            Query::Select(mut sel) => {
                sel.pattern = self.normalize_pattern(sel.pattern)?;
                sel.group_by.keys = sel
                    .group_by
                    .keys
                    .into_iter()
                    .map(|e| self.normalize_expr(e))
                    .collect::<ParseResult<_>>()?;
                sel.having = sel.having.into_iter().map(|e| self.normalize_expr(e)).collect::<ParseResult<_>>()?;
                sel.order_by = sel
                    .order_by
                    .into_iter()
                    .map(|mut k| {
                        k.expr = self.normalize_expr(k.expr)?;
                        Ok(k)
                    })
                    .collect::<ParseResult<_>>()?;
                sel.projection = match sel.projection {
                    crate::algebra::Projection::Star => crate::algebra::Projection::Star,
                    crate::algebra::Projection::Vars(vars) => crate::algebra::Projection::Vars(
                        vars.into_iter()
                            .map(|(e, alias)| Ok((self.normalize_expr(e)?, alias)))
                            .collect::<ParseResult<_>>()?,
                    ),
                };
                Ok(Query::Select(sel))
            }
            Query::Update(upd) => {
                let operations = upd
                    .operations
                    .into_iter()
                    .map(|op| self.normalize_update_op(op))
                    .collect::<ParseResult<_>>()?;
                Ok(Query::Update(crate::algebra::UpdateQuery { operations }))
            }
        }
    }

    fn normalize_update_op(&self, op: UpdateOperation) -> ParseResult<UpdateOperation> {
        Ok(match op {
            UpdateOperation::InsertData(triples) => {
                UpdateOperation::InsertData(self.normalize_ground_triples(triples)?)
            }
            UpdateOperation::DeleteData(triples) => {
                UpdateOperation::DeleteData(self.normalize_ground_triples(triples)?)
            }
            UpdateOperation::DeleteInsert {
                delete,
                insert,
                using,
                pattern,
            } => UpdateOperation::DeleteInsert {
                delete: self.normalize_triples(delete, false)?,
                insert: self.normalize_triples(insert, false)?,
                using: using.map(|t| self.normalize_term(t)).transpose()?,
                pattern: pattern.map(|p| self.normalize_pattern(p)).transpose()?,
            },
        })
    }

    /// `INSERT DATA`/`DELETE DATA` bodies must be fully ground (no variables, no property
    /// paths other than a single predicate); validated here rather than in the parser so a
    /// malformed update still produces a single, specific error.
    fn normalize_ground_triples(&self, triples: Vec<TriplePattern>) -> ParseResult<Vec<TriplePattern>> {
        let triples = self.normalize_triples(triples, true)?;
        for t in &triples {
            if matches!(t.subject, PatternTerm::Var(_)) || matches!(t.object, PatternTerm::Var(_)) {
                return Err(ParseError::MalformedQuery(
                    "INSERT DATA / DELETE DATA blocks may not contain variables".into(),
                ));
            }
        }
        Ok(triples)
    }

    fn normalize_pattern(&self, pattern: GraphPattern) -> ParseResult<GraphPattern> {
        Ok(match pattern {
            GraphPattern::Bgp(triples) => GraphPattern::Bgp(self.normalize_triples(triples, false)?),
            GraphPattern::Join(l, r) => {
                GraphPattern::Join(Box::new(self.normalize_pattern(*l)?), Box::new(self.normalize_pattern(*r)?))
            }
            GraphPattern::Optional(l, r) => {
                GraphPattern::Optional(Box::new(self.normalize_pattern(*l)?), Box::new(self.normalize_pattern(*r)?))
            }
            GraphPattern::Union(l, r) => {
                GraphPattern::Union(Box::new(self.normalize_pattern(*l)?), Box::new(self.normalize_pattern(*r)?))
            }
            GraphPattern::Filter(expr, inner) => {
                GraphPattern::Filter(self.normalize_expr(expr)?, Box::new(self.normalize_pattern(*inner)?))
            }
            GraphPattern::Extend(inner, var, expr) => {
                GraphPattern::Extend(Box::new(self.normalize_pattern(*inner)?), var, self.normalize_expr(expr)?)
            }
            GraphPattern::Graph(term, inner) => {
                GraphPattern::Graph(self.normalize_term(term)?, Box::new(self.normalize_pattern(*inner)?))
            }
            GraphPattern::Values { vars, rows } => {
                let rows = rows
                    .into_iter()
                    .map(|row| row.into_iter().map(|cell| cell.map(|t| self.resolve_ground(t)).transpose()).collect())
                    .collect::<ParseResult<_>>()?;
                GraphPattern::Values { vars, rows }
            }
            GraphPattern::SubSelect(sel) => {
                let Query::Select(normalized) = self.normalize(Query::Select(*sel))? else {
                    unreachable!("normalizing a Select always returns a Select")
                };
                GraphPattern::SubSelect(Box::new(normalized))
            }
        })
    }

    fn normalize_triples(&self, triples: Vec<TriplePattern>, is_data_block: bool) -> ParseResult<Vec<TriplePattern>> {
        triples
            .into_iter()
            .map(|t| self.normalize_triple(t, is_data_block))
            .collect()
    }

    fn normalize_triple(&self, t: TriplePattern, is_data_block: bool) -> ParseResult<TriplePattern> {
        let subject = self.normalize_term(t.subject)?;
        let path = self.normalize_path(t.path)?;
        let object = self.normalize_term(t.object)?;

        if !is_data_block {
            if let PropertyPath::Predicate(PatternTerm::Term(GroundTerm::Iri(iri))) = &path {
                self.check_predicate_kind(iri, &object)?;
            }
        }

        Ok(TriplePattern { subject, path, object })
    }

    /// Checks that this pattern's implied predicate kind (object-valued if `object` can only be a
    /// resource/blank node, data-valued if `object` is a ground literal) does not conflict with
    /// the kind already recorded for the predicate elsewhere in the store.
    fn check_predicate_kind(&self, predicate_iri: &str, object: &PatternTerm) -> ParseResult<()> {
        let as_object = match object {
            PatternTerm::Term(GroundTerm::Literal { .. }) => false,
            PatternTerm::Term(GroundTerm::Iri(_) | GroundTerm::BlankNode(_)) => true,
            PatternTerm::Var(_) => return Ok(()),
        };
        let storid = self
            .abbrev
            .abbreviate(self.conn, predicate_iri)
            .map_err(ParseError::Store)?;
        let kind = predicate::get_kind(self.conn, storid).map_err(ParseError::Store)?;
        if kind.is_annotation {
            return Ok(());
        }
        let conflict = if as_object { kind.is_data } else { kind.is_object };
        if conflict {
            return Err(ParseError::Store(StoreError::TypeMismatch { storid: storid.get() }));
        }
        Ok(())
    }

    fn normalize_path(&self, path: PropertyPath) -> ParseResult<PropertyPath> {
        Ok(match path {
            PropertyPath::Predicate(term) => PropertyPath::Predicate(self.normalize_term(term)?),
            PropertyPath::Inverse(p) => PropertyPath::Inverse(Box::new(self.normalize_path(*p)?)),
            PropertyPath::Sequence(a, b) => {
                PropertyPath::Sequence(Box::new(self.normalize_path(*a)?), Box::new(self.normalize_path(*b)?))
            }
            PropertyPath::Alternative(a, b) => {
                PropertyPath::Alternative(Box::new(self.normalize_path(*a)?), Box::new(self.normalize_path(*b)?))
            }
            PropertyPath::ZeroOrMore(p) => PropertyPath::ZeroOrMore(Box::new(self.normalize_path(*p)?)),
            PropertyPath::OneOrMore(p) => PropertyPath::OneOrMore(Box::new(self.normalize_path(*p)?)),
            PropertyPath::ZeroOrOne(p) => PropertyPath::ZeroOrOne(Box::new(self.normalize_path(*p)?)),
            PropertyPath::StaticClosure(p) => PropertyPath::StaticClosure(Box::new(self.normalize_path(*p)?)),
        })
    }

    fn normalize_term(&self, term: PatternTerm) -> ParseResult<PatternTerm> {
        Ok(match term {
            PatternTerm::Var(v) => PatternTerm::Var(v),
            PatternTerm::Term(GroundTerm::BlankNode(label)) => {
                // A blank-node label in query syntax names a non-distinguished variable scoped to
                // this query, not a reference to a stored blank node (SPARQL 1.1 §4.1.7).
                PatternTerm::Var(format!("__bnode_label_{label}"))
            }
            PatternTerm::Term(g) => PatternTerm::Term(self.resolve_ground(g)?),
        })
    }

    fn resolve_ground(&self, term: GroundTerm) -> ParseResult<GroundTerm> {
        Ok(match term {
            GroundTerm::Iri(iri) => GroundTerm::Iri(self.expand(&iri)?),
            GroundTerm::BlankNode(label) => GroundTerm::BlankNode(label),
            GroundTerm::Literal { value, lang, datatype } => GroundTerm::Literal {
                value,
                lang,
                datatype: datatype.map(|d| self.expand(&d)).transpose()?,
            },
        })
    }

    /// Expands a possibly-prefixed IRI (`prefix:local`) using the query's declared prefixes;
    /// passes full IRIs (no unescaped `:` followed by a registered prefix) through unchanged.
    fn expand(&self, iri_or_prefixed: &str) -> ParseResult<String> {
        // Full IRIs are tokenized as `Token::Iri` and never reach here with a bare `prefix:local`
        // shape that also happens to contain `://`, so a registered-prefix lookup is unambiguous.
        if let Some((prefix, local)) = iri_or_prefixed.split_once(':') {
            if let Some(ns) = self.prefixes.get(prefix) {
                return Ok(format!("{ns}{local}"));
            }
            if iri_or_prefixed.contains("://") {
                return Ok(iri_or_prefixed.to_string());
            }
            return Err(ParseError::UnknownPrefix(prefix.to_string()));
        }
        Ok(iri_or_prefixed.to_string())
    }

    fn normalize_expr(&self, expr: Expression) -> ParseResult<Expression> {
        Ok(match expr {
            Expression::Term(t) => Expression::Term(self.normalize_term(t)?),
            Expression::And(a, b) => Expression::And(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?)),
            Expression::Or(a, b) => Expression::Or(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?)),
            Expression::Not(a) => Expression::Not(Box::new(self.normalize_expr(*a)?)),
            Expression::Eq(a, b) => Expression::Eq(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?)),
            Expression::NotEq(a, b) => {
                Expression::NotEq(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?))
            }
            Expression::Lt(a, b) => Expression::Lt(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?)),
            Expression::Gt(a, b) => Expression::Gt(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?)),
            Expression::LtEq(a, b) => {
                Expression::LtEq(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?))
            }
            Expression::GtEq(a, b) => {
                Expression::GtEq(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?))
            }
            Expression::Add(a, b) => Expression::Add(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?)),
            Expression::Sub(a, b) => Expression::Sub(Box::new(self.normalize_expr(*a)?), Box::new(self.normalize_expr(*b)?)),
            Expression::Bound(v) => Expression::Bound(v),
            Expression::FunctionCall(name, args) => {
                Expression::FunctionCall(name, args.into_iter().map(|a| self.normalize_expr(a)).collect::<ParseResult<_>>()?)
            }
            Expression::Exists(p) => Expression::Exists(Box::new(self.normalize_pattern(*p)?)),
            Expression::NotExists(p) => Expression::NotExists(Box::new(self.normalize_pattern(*p)?)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use quadstore_store::schema::CREATE_SCHEMA;

    fn fresh() -> (Connection, Abbreviator) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
        let ab = Abbreviator::new();
        ab.bootstrap(&conn).unwrap();
        (conn, ab)
    }

    #[test]
    fn expands_prefixed_names() {
        let (conn, ab) = fresh();
        let parsed = Parser::parse("PREFIX ex: <http://ex/> SELECT ?x WHERE { ?x a ex:Thing . }").unwrap();
        let norm = Normalizer::new(&parsed, &conn, &ab);
        let q = norm.normalize(parsed.query.clone()).unwrap();
        match q {
            Query::Select(s) => match s.pattern {
                GraphPattern::Bgp(v) => match &v[0].object {
                    PatternTerm::Term(GroundTerm::Iri(iri)) => assert_eq!(iri, "http://ex/Thing"),
                    other => panic!("unexpected object {other:?}"),
                },
                other => panic!("unexpected pattern {other:?}"),
            },
            Query::Update(_) => panic!("expected select"),
        }
    }

    #[test]
    fn rejects_mixed_predicate_kind() {
        let (conn, ab) = fresh();
        let parsed = Parser::parse(
            "PREFIX ex: <http://ex/> SELECT ?x WHERE { ?x ex:p ?y . ?x ex:p \"literal\" . }",
        )
        .unwrap();
        let norm = Normalizer::new(&parsed, &conn, &ab);
        // First use establishes object-kind for ex:p via the variable-object pattern (ambiguous,
        // no kind recorded yet); the second ground literal use then conflicts once a kind has
        // actually been written by a prior query. Here we simulate that prior recording directly.
        let p = ab.abbreviate(&conn, "http://ex/p").unwrap();
        quadstore_store::predicate::record_object_use(&conn, p).unwrap();
        let err = norm.normalize(parsed.query).unwrap_err();
        assert!(matches!(err, ParseError::Store(StoreError::TypeMismatch { .. })));
    }

    #[test]
    fn blank_node_label_becomes_variable() {
        let (conn, ab) = fresh();
        let parsed = Parser::parse("SELECT ?x WHERE { _:b <http://ex/p> ?x . }").unwrap();
        let norm = Normalizer::new(&parsed, &conn, &ab);
        let q = norm.normalize(parsed.query).unwrap();
        match q {
            Query::Select(s) => match s.pattern {
                GraphPattern::Bgp(v) => assert!(matches!(v[0].subject, PatternTerm::Var(_))),
                other => panic!("unexpected pattern {other:?}"),
            },
            Query::Update(_) => panic!("expected select"),
        }
    }
}
