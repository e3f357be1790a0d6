//! Query algebra produced by the parser and consumed by the normalizer and, downstream, the SQL
//! compiler. Shaped after spargebra's `Query`/`GraphPattern`/`Expression` split: a thin AST for
//! syntax, kept separate from the SQL-facing types the compiler crate owns.

use std::fmt;

/// A term as it appears in parsed query syntax, before storid resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum GroundTerm {
    Iri(String),
    BlankNode(String),
    Literal {
        value: String,
        lang: Option<String>,
        datatype: Option<String>,
    },
}

impl GroundTerm {
    #[must_use]
    pub fn plain(value: impl Into<String>) -> Self {
        GroundTerm::Literal {
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }
}

/// One slot of a triple pattern: a bound term, a query variable, or an anonymous blank node
/// introduced by `[...]` syntax (resolved to a fresh variable by the parser).
#[derive(Debug, Clone, PartialEq)]
pub enum PatternTerm {
    Term(GroundTerm),
    Var(String),
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTerm::Term(GroundTerm::Iri(iri)) => write!(f, "<{iri}>"),
            PatternTerm::Term(GroundTerm::BlankNode(id)) => write!(f, "_:{id}"),
            PatternTerm::Term(GroundTerm::Literal { value, .. }) => write!(f, "{value:?}"),
            PatternTerm::Var(name) => write!(f, "?{name}"),
        }
    }
}

/// A property path expression (spec.md §4.5): sequences/alternatives/inverses/Kleene closures,
/// including the closed-world `*STATIC` extension.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyPath {
    Predicate(PatternTerm),
    Inverse(Box<PropertyPath>),
    Sequence(Box<PropertyPath>, Box<PropertyPath>),
    Alternative(Box<PropertyPath>, Box<PropertyPath>),
    ZeroOrMore(Box<PropertyPath>),
    OneOrMore(Box<PropertyPath>),
    ZeroOrOne(Box<PropertyPath>),
    /// `pred*STATIC` — the transitive closure is recomputed and cached at query-compile time
    /// rather than inlined as a recursive CTE; invalidated by the ontology's dirty journal.
    StaticClosure(Box<PropertyPath>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub path: PropertyPath,
    pub object: PatternTerm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Term(PatternTerm),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Eq(Box<Expression>, Box<Expression>),
    NotEq(Box<Expression>, Box<Expression>),
    Lt(Box<Expression>, Box<Expression>),
    Gt(Box<Expression>, Box<Expression>),
    LtEq(Box<Expression>, Box<Expression>),
    GtEq(Box<Expression>, Box<Expression>),
    Add(Box<Expression>, Box<Expression>),
    Sub(Box<Expression>, Box<Expression>),
    Bound(String),
    /// A SPARQL builtin function call, e.g. `REGEX`, `STRLEN`, `LANG`, `DATATYPE`, `SHA1`, `MD5`.
    FunctionCall(String, Vec<Expression>),
    Exists(Box<GraphPattern>),
    NotExists(Box<GraphPattern>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    GroupConcat,
    Sample,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub arg: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub expr: Expression,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphPattern {
    Bgp(Vec<TriplePattern>),
    Join(Box<GraphPattern>, Box<GraphPattern>),
    Optional(Box<GraphPattern>, Box<GraphPattern>),
    Union(Box<GraphPattern>, Box<GraphPattern>),
    Filter(Expression, Box<GraphPattern>),
    Extend(Box<GraphPattern>, String, Expression),
    Graph(PatternTerm, Box<GraphPattern>),
    Values {
        vars: Vec<String>,
        rows: Vec<Vec<Option<GroundTerm>>>,
    },
    SubSelect(Box<SelectQuery>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`
    Star,
    Vars(Vec<(Expression, Option<String>)>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupBy {
    pub keys: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub distinct: bool,
    pub projection: Projection,
    pub pattern: GraphPattern,
    pub group_by: GroupBy,
    pub having: Vec<Expression>,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    InsertData(Vec<TriplePattern>),
    DeleteData(Vec<TriplePattern>),
    DeleteInsert {
        delete: Vec<TriplePattern>,
        insert: Vec<TriplePattern>,
        using: Option<PatternTerm>,
        pattern: Option<GraphPattern>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub operations: Vec<UpdateOperation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(SelectQuery),
    Update(UpdateQuery),
}
