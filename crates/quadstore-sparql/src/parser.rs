//! Recursive-descent parser over the token stream from [`crate::lexer`], producing the
//! syntax-level algebra in [`crate::algebra`]. Prefixed names are carried through unresolved;
//! [`crate::normalizer`] is responsible for expanding them against the query's `PREFIX`
//! declarations and validating predicate-kind usage.

use crate::algebra::{
    Aggregate, AggregateKind, Expression, GraphPattern, GroundTerm, GroupBy, OrderKey, PatternTerm,
    Projection, PropertyPath, Query, SelectQuery, TriplePattern, UpdateOperation, UpdateQuery,
};
use crate::error::{ParseError, ParseResult};
use crate::lexer::Lexer;
use crate::token::{Spanned, Token};

/// A `PREFIX` declaration collected while parsing; prefix resolution proper happens in the
/// normalizer, but the parser needs to know the declared prefix names to format errors and to
/// resolve `BASE`-relative references is explicitly out of scope (spec.md Non-goals).
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    pub prefixes: Vec<(String, String)>,
    pub query: Query,
}

pub struct Parser {
    toks: Vec<Spanned<Token>>,
    pos: usize,
    next_bnode_id: u32,
    next_param_index: u32,
}

impl Parser {
    pub fn parse(src: &str) -> ParseResult<ParsedQuery> {
        let toks = Lexer::new(src).tokenize()?;
        let mut parser = Self {
            toks,
            pos: 0,
            next_bnode_id: 0,
            next_param_index: 0,
        };
        let prefixes = parser.parse_prologue()?;
        let query = if parser.peek_is_ident("SELECT") {
            Query::Select(parser.parse_select()?)
        } else {
            Query::Update(parser.parse_update()?)
        };
        parser.expect(&Token::Eof)?;
        Ok(ParsedQuery { prefixes, query })
    }

    // --- token-stream primitives -------------------------------------------------

    fn peek(&self) -> &Token {
        &self.toks[self.pos].node
    }

    fn peek_span(&self) -> &Spanned<Token> {
        &self.toks[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.toks[self.pos].node.clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn peek_is_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(w) if w.eq_ignore_ascii_case(word))
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if self.peek_is_ident(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self, word: &str) -> ParseResult<()> {
        if self.eat_ident(word) {
            Ok(())
        } else {
            Err(self.unexpected(word))
        }
    }

    fn expect(&mut self, tok: &Token) -> ParseResult<()> {
        if self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{tok:?}")))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let span = self.peek_span();
        if span.node == Token::Eof {
            ParseError::UnexpectedEof(expected.to_string())
        } else {
            ParseError::UnexpectedToken {
                at: span.start,
                found: format!("{:?}", span.node),
                expected: expected.to_string(),
            }
        }
    }

    fn fresh_bnode_var(&mut self) -> String {
        let n = self.next_bnode_id;
        self.next_bnode_id += 1;
        format!("__bnode_{n}")
    }

    /// Synthesizes a variable name carrying a `NEWINSTANCEIRI(class)` call's class IRI, resolved
    /// at update-execution time by `quadstore_compiler::update::resolve_template_term` (spec.md
    /// §4.6.6). Mirrors `fresh_bnode_var`'s desugaring-to-a-synthetic-variable trick, since
    /// `PatternTerm` has no function-call variant of its own.
    fn fresh_newinstanceiri_var(&mut self, class_iri: &str) -> String {
        let n = self.next_bnode_id;
        self.next_bnode_id += 1;
        format!("__newinstanceiri_{n}__{class_iri}")
    }

    // --- prologue ------------------------------------------------------------------

    fn parse_prologue(&mut self) -> ParseResult<Vec<(String, String)>> {
        let mut prefixes = Vec::new();
        loop {
            if self.eat_ident("BASE") {
                self.parse_iri_ref()?;
            } else if self.eat_ident("PREFIX") {
                let name = match self.advance() {
                    Token::PrefixedName(p, l) if l.is_empty() => p,
                    Token::Ident(w) => w,
                    other => return Err(ParseError::MalformedQuery(format!("expected prefix name, found {other:?}"))),
                };
                let iri = self.parse_iri_ref()?;
                prefixes.push((name, iri));
            } else {
                break;
            }
        }
        Ok(prefixes)
    }

    fn parse_iri_ref(&mut self) -> ParseResult<String> {
        match self.advance() {
            Token::Iri(s) => Ok(s),
            other => Err(ParseError::MalformedQuery(format!("expected IRI, found {other:?}"))),
        }
    }

    // --- SELECT ----------------------------------------------------------------------

    fn parse_select(&mut self) -> ParseResult<SelectQuery> {
        self.expect_ident("SELECT")?;
        let distinct = self.eat_ident("DISTINCT");
        if self.eat_ident("REDUCED") {
            // REDUCED carries the same semantics as plain SELECT for this engine; recognized and
            // discarded, mirroring DISTINCT==false.
        }

        let projection = if self.peek() == &Token::Star {
            self.advance();
            Projection::Star
        } else {
            let mut vars = Vec::new();
            loop {
                match self.peek().clone() {
                    Token::Var(name) => {
                        self.advance();
                        vars.push((Expression::Term(PatternTerm::Var(name)), None));
                    }
                    Token::LParen => {
                        self.advance();
                        let expr = self.parse_expression()?;
                        self.expect_ident("AS")?;
                        let alias = self.expect_var()?;
                        self.expect(&Token::RParen)?;
                        vars.push((expr, Some(alias)));
                    }
                    _ => break,
                }
            }
            Projection::Vars(vars)
        };

        self.expect_ident("WHERE")?;
        self.expect(&Token::LBrace)?;
        let pattern = self.parse_group_graph_pattern()?;
        self.expect(&Token::RBrace)?;

        let group_by = self.parse_group_by()?;
        let having = self.parse_having()?;
        let order_by = self.parse_order_by()?;
        let (limit, offset) = self.parse_limit_offset()?;

        Ok(SelectQuery {
            distinct,
            projection,
            pattern,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn expect_var(&mut self) -> ParseResult<String> {
        match self.advance() {
            Token::Var(name) => Ok(name),
            other => Err(ParseError::MalformedQuery(format!("expected variable, found {other:?}"))),
        }
    }

    fn parse_group_by(&mut self) -> ParseResult<GroupBy> {
        if !self.eat_ident("GROUP") {
            return Ok(GroupBy::default());
        }
        self.expect_ident("BY")?;
        let mut keys = Vec::new();
        loop {
            if matches!(self.peek(), Token::Var(_)) {
                let v = self.expect_var()?;
                keys.push(Expression::Term(PatternTerm::Var(v)));
            } else if self.peek() == &Token::LParen {
                self.advance();
                let e = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                keys.push(e);
            } else {
                break;
            }
        }
        Ok(GroupBy { keys })
    }

    fn parse_having(&mut self) -> ParseResult<Vec<Expression>> {
        let mut out = Vec::new();
        while self.eat_ident("HAVING") {
            self.expect(&Token::LParen)?;
            out.push(self.parse_expression()?);
            self.expect(&Token::RParen)?;
        }
        Ok(out)
    }

    fn parse_order_by(&mut self) -> ParseResult<Vec<OrderKey>> {
        if !self.eat_ident("ORDER") {
            return Ok(Vec::new());
        }
        self.expect_ident("BY")?;
        let mut keys = Vec::new();
        loop {
            let descending = if self.eat_ident("DESC") {
                true
            } else {
                self.eat_ident("ASC");
                false
            };
            match self.peek().clone() {
                Token::Var(name) => {
                    self.advance();
                    keys.push(OrderKey {
                        expr: Expression::Term(PatternTerm::Var(name)),
                        descending,
                    });
                }
                Token::LParen => {
                    self.advance();
                    let e = self.parse_expression()?;
                    self.expect(&Token::RParen)?;
                    keys.push(OrderKey { expr: e, descending });
                }
                _ => break,
            }
        }
        Ok(keys)
    }

    fn parse_limit_offset(&mut self) -> ParseResult<(Option<u64>, Option<u64>)> {
        let mut limit = None;
        let mut offset = None;
        loop {
            if self.eat_ident("LIMIT") {
                limit = Some(self.expect_integer()?);
            } else if self.eat_ident("OFFSET") {
                offset = Some(self.expect_integer()?);
            } else {
                break;
            }
        }
        Ok((limit, offset))
    }

    fn expect_integer(&mut self) -> ParseResult<u64> {
        match self.advance() {
            Token::Number(n) => n
                .parse()
                .map_err(|_| ParseError::MalformedQuery(format!("expected non-negative integer, found {n:?}"))),
            other => Err(ParseError::MalformedQuery(format!("expected integer, found {other:?}"))),
        }
    }

    // --- UPDATE ----------------------------------------------------------------------

    fn parse_update(&mut self) -> ParseResult<UpdateQuery> {
        let mut operations = Vec::new();
        loop {
            if self.eat_ident("INSERT") {
                self.expect_ident("DATA")?;
                self.expect(&Token::LBrace)?;
                let quads = self.parse_triples_block()?;
                self.expect(&Token::RBrace)?;
                operations.push(UpdateOperation::InsertData(quads));
            } else if self.eat_ident("DELETE") {
                if self.eat_ident("DATA") {
                    self.expect(&Token::LBrace)?;
                    let quads = self.parse_triples_block()?;
                    self.expect(&Token::RBrace)?;
                    operations.push(UpdateOperation::DeleteData(quads));
                } else {
                    self.expect(&Token::LBrace)?;
                    let delete = self.parse_triples_block()?;
                    self.expect(&Token::RBrace)?;
                    let insert = if self.eat_ident("INSERT") {
                        self.expect(&Token::LBrace)?;
                        let q = self.parse_triples_block()?;
                        self.expect(&Token::RBrace)?;
                        q
                    } else {
                        Vec::new()
                    };
                    let using = if self.eat_ident("USING") {
                        Some(self.parse_var_or_term()?)
                    } else {
                        None
                    };
                    let pattern = if self.eat_ident("WHERE") {
                        self.expect(&Token::LBrace)?;
                        let p = self.parse_group_graph_pattern()?;
                        self.expect(&Token::RBrace)?;
                        Some(p)
                    } else {
                        None
                    };
                    operations.push(UpdateOperation::DeleteInsert {
                        delete,
                        insert,
                        using,
                        pattern,
                    });
                }
            } else {
                return Err(self.unexpected("INSERT or DELETE"));
            }

            if self.peek() == &Token::Semicolon {
                self.advance();
                continue;
            }
            break;
        }
        Ok(UpdateQuery { operations })
    }

    // --- graph patterns ----------------------------------------------------------------

    fn parse_group_graph_pattern(&mut self) -> ParseResult<GraphPattern> {
        let mut acc: Option<GraphPattern> = None;
        loop {
            match self.peek().clone() {
                Token::RBrace | Token::Eof => break,
                Token::LBrace => {
                    self.advance();
                    let inner = self.parse_group_graph_pattern()?;
                    self.expect(&Token::RBrace)?;
                    acc = Some(join(acc, inner));
                    self.eat_dot();
                }
                Token::Ident(w) if w.eq_ignore_ascii_case("OPTIONAL") => {
                    self.advance();
                    self.expect(&Token::LBrace)?;
                    let inner = self.parse_group_graph_pattern()?;
                    self.expect(&Token::RBrace)?;
                    acc = Some(match acc {
                        Some(base) => GraphPattern::Optional(Box::new(base), Box::new(inner)),
                        None => GraphPattern::Optional(Box::new(GraphPattern::Bgp(Vec::new())), Box::new(inner)),
                    });
                }
                Token::Ident(w) if w.eq_ignore_ascii_case("UNION") => {
                    return Err(ParseError::MalformedQuery("UNION must follow a { } block".into()));
                }
                Token::Ident(w) if w.eq_ignore_ascii_case("FILTER") => {
                    self.advance();
                    let expr = self.parse_filter_constraint()?;
                    acc = Some(match acc {
                        Some(base) => GraphPattern::Filter(expr, Box::new(base)),
                        None => GraphPattern::Filter(expr, Box::new(GraphPattern::Bgp(Vec::new()))),
                    });
                }
                Token::Ident(w) if w.eq_ignore_ascii_case("BIND") => {
                    self.advance();
                    self.expect(&Token::LParen)?;
                    let expr = self.parse_expression()?;
                    self.expect_ident("AS")?;
                    let var = self.expect_var()?;
                    self.expect(&Token::RParen)?;
                    acc = Some(GraphPattern::Extend(
                        Box::new(acc.unwrap_or(GraphPattern::Bgp(Vec::new()))),
                        var,
                        expr,
                    ));
                }
                Token::Ident(w) if w.eq_ignore_ascii_case("VALUES") => {
                    self.advance();
                    let values = self.parse_values_clause()?;
                    acc = Some(join(acc, values));
                }
                Token::Ident(w) if w.eq_ignore_ascii_case("GRAPH") => {
                    self.advance();
                    let term = self.parse_var_or_term()?;
                    self.expect(&Token::LBrace)?;
                    let inner = self.parse_group_graph_pattern()?;
                    self.expect(&Token::RBrace)?;
                    acc = Some(join(acc, GraphPattern::Graph(term, Box::new(inner))));
                }
                Token::Ident(w) if w.eq_ignore_ascii_case("SELECT") => {
                    let sub = self.parse_select()?;
                    acc = Some(join(acc, GraphPattern::SubSelect(Box::new(sub))));
                }
                _ => {
                    let triples = self.parse_triples_block()?;
                    acc = Some(join(acc, GraphPattern::Bgp(triples)));
                }
            }

            // A `{ }` block (or GRAPH/OPTIONAL block) may be followed by UNION.
            if self.peek_is_ident("UNION") {
                self.advance();
                self.expect(&Token::LBrace)?;
                let rhs = self.parse_group_graph_pattern()?;
                self.expect(&Token::RBrace)?;
                let lhs = acc.unwrap_or(GraphPattern::Bgp(Vec::new()));
                acc = Some(GraphPattern::Union(Box::new(lhs), Box::new(rhs)));
            }
        }
        Ok(acc.unwrap_or(GraphPattern::Bgp(Vec::new())))
    }

    fn eat_dot(&mut self) {
        if self.peek() == &Token::Dot {
            self.advance();
        }
    }

    fn parse_filter_constraint(&mut self) -> ParseResult<Expression> {
        if self.peek_is_ident("EXISTS") {
            self.advance();
            self.expect(&Token::LBrace)?;
            let p = self.parse_group_graph_pattern()?;
            self.expect(&Token::RBrace)?;
            return Ok(Expression::Exists(Box::new(p)));
        }
        if self.peek_is_ident("NOT") {
            self.advance();
            self.expect_ident("EXISTS")?;
            self.expect(&Token::LBrace)?;
            let p = self.parse_group_graph_pattern()?;
            self.expect(&Token::RBrace)?;
            return Ok(Expression::NotExists(Box::new(p)));
        }
        if self.peek() == &Token::LParen {
            self.advance();
            let e = self.parse_expression()?;
            self.expect(&Token::RParen)?;
            return Ok(e);
        }
        self.parse_builtin_call()
    }

    fn parse_values_clause(&mut self) -> ParseResult<GraphPattern> {
        let vars = if self.peek() == &Token::LParen {
            self.advance();
            let mut vs = Vec::new();
            while let Token::Var(_) = self.peek() {
                vs.push(self.expect_var()?);
            }
            self.expect(&Token::RParen)?;
            vs
        } else {
            vec![self.expect_var()?]
        };

        self.expect(&Token::LBrace)?;
        let mut rows = Vec::new();
        while self.peek() != &Token::RBrace {
            let row = if vars.len() == 1 && self.peek() != &Token::LParen {
                vec![self.parse_values_cell()?]
            } else {
                self.expect(&Token::LParen)?;
                let mut r = Vec::new();
                for _ in 0..vars.len() {
                    r.push(self.parse_values_cell()?);
                }
                self.expect(&Token::RParen)?;
                r
            };
            rows.push(row);
        }
        self.expect(&Token::RBrace)?;
        Ok(GraphPattern::Values { vars, rows })
    }

    fn parse_values_cell(&mut self) -> ParseResult<Option<GroundTerm>> {
        if self.eat_ident("UNDEF") {
            return Ok(None);
        }
        match self.parse_var_or_term()? {
            PatternTerm::Term(t) => Ok(Some(t)),
            PatternTerm::Var(_) => Err(ParseError::MalformedQuery("VALUES row may not bind a variable".into())),
        }
    }

    // --- triples -----------------------------------------------------------------------

    fn parse_triples_block(&mut self) -> ParseResult<Vec<TriplePattern>> {
        let mut out = Vec::new();
        loop {
            if !self.starts_triples_subject() {
                break;
            }
            self.parse_triples_same_subject(&mut out)?;
            if self.peek() == &Token::Dot {
                self.advance();
                continue;
            }
            break;
        }
        Ok(out)
    }

    fn starts_triples_subject(&self) -> bool {
        matches!(
            self.peek(),
            Token::Var(_)
                | Token::Iri(_)
                | Token::PrefixedName(_, _)
                | Token::BlankNodeLabel(_)
                | Token::LBracket
                | Token::LParen
                | Token::A
        )
    }

    fn parse_triples_same_subject(&mut self, out: &mut Vec<TriplePattern>) -> ParseResult<()> {
        let subject = self.parse_triples_node(out)?;
        self.parse_predicate_object_list(subject, out)
    }

    /// Parses a subject/object node: a plain term/var, a blank-node property list `[ ... ]`
    /// (desugared into fresh-variable triples pushed onto `out`), or an RDF collection `( ... )`.
    fn parse_triples_node(&mut self, out: &mut Vec<TriplePattern>) -> ParseResult<PatternTerm> {
        match self.peek().clone() {
            Token::LBracket => {
                self.advance();
                let var = PatternTerm::Var(self.fresh_bnode_var());
                if self.peek() != &Token::RBracket {
                    self.parse_predicate_object_list(var.clone(), out)?;
                }
                self.expect(&Token::RBracket)?;
                Ok(var)
            }
            Token::LParen => {
                self.advance();
                let mut items = Vec::new();
                while self.peek() != &Token::RParen {
                    items.push(self.parse_var_or_term()?);
                }
                self.expect(&Token::RParen)?;
                Ok(self.desugar_collection(items, out))
            }
            _ => self.parse_var_or_term(),
        }
    }

    fn desugar_collection(&mut self, items: Vec<PatternTerm>, out: &mut Vec<TriplePattern>) -> PatternTerm {
        if items.is_empty() {
            return PatternTerm::Term(GroundTerm::Iri(
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil".to_string(),
            ));
        }
        let head = PatternTerm::Var(self.fresh_bnode_var());
        let mut cur = head.clone();
        let rdf_first = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first".to_string();
        let rdf_rest = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest".to_string();
        let rdf_nil = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil".to_string();
        for (i, item) in items.iter().enumerate() {
            out.push(TriplePattern {
                subject: cur.clone(),
                path: PropertyPath::Predicate(PatternTerm::Term(GroundTerm::Iri(rdf_first.clone()))),
                object: item.clone(),
            });
            let next = if i + 1 == items.len() {
                PatternTerm::Term(GroundTerm::Iri(rdf_nil.clone()))
            } else {
                PatternTerm::Var(self.fresh_bnode_var())
            };
            out.push(TriplePattern {
                subject: cur.clone(),
                path: PropertyPath::Predicate(PatternTerm::Term(GroundTerm::Iri(rdf_rest.clone()))),
                object: next.clone(),
            });
            cur = next;
        }
        head
    }

    fn parse_predicate_object_list(&mut self, subject: PatternTerm, out: &mut Vec<TriplePattern>) -> ParseResult<()> {
        loop {
            let path = self.parse_property_path()?;
            self.parse_object_list(&subject, &path, out)?;
            if self.peek() == &Token::Semicolon {
                self.advance();
                if matches!(self.peek(), Token::Dot | Token::RBrace | Token::RBracket | Token::Eof) {
                    break;
                }
                continue;
            }
            break;
        }
        Ok(())
    }

    fn parse_object_list(&mut self, subject: &PatternTerm, path: &PropertyPath, out: &mut Vec<TriplePattern>) -> ParseResult<()> {
        loop {
            let object = self.parse_triples_node(out)?;
            out.push(TriplePattern {
                subject: subject.clone(),
                path: path.clone(),
                object,
            });
            if self.peek() == &Token::Comma {
                self.advance();
                continue;
            }
            break;
        }
        Ok(())
    }

    fn parse_var_or_term(&mut self) -> ParseResult<PatternTerm> {
        match self.peek().clone() {
            Token::Var(name) => {
                self.advance();
                Ok(PatternTerm::Var(name))
            }
            Token::A => {
                self.advance();
                Ok(PatternTerm::Term(GroundTerm::Iri(
                    "http://www.w3.org/1999/02/22-rdf-syntax-ns#type".to_string(),
                )))
            }
            Token::Iri(iri) => {
                self.advance();
                Ok(PatternTerm::Term(GroundTerm::Iri(iri)))
            }
            Token::PrefixedName(prefix, local) => {
                self.advance();
                Ok(PatternTerm::Term(GroundTerm::Iri(format!("{prefix}:{local}"))))
            }
            Token::BlankNodeLabel(label) => {
                self.advance();
                Ok(PatternTerm::Term(GroundTerm::BlankNode(label)))
            }
            Token::String(_) | Token::Number(_) | Token::True | Token::False => self.parse_literal_term(),
            Token::Ident(name) if name.eq_ignore_ascii_case("NEWINSTANCEIRI") => {
                self.advance();
                self.expect(&Token::LParen)?;
                let class_term = self.parse_var_or_term()?;
                self.expect(&Token::RParen)?;
                let PatternTerm::Term(GroundTerm::Iri(class_iri)) = class_term else {
                    return Err(ParseError::MalformedQuery("NEWINSTANCEIRI(...) requires a ground class IRI".into()));
                };
                Ok(PatternTerm::Var(self.fresh_newinstanceiri_var(&class_iri)))
            }
            other => Err(ParseError::MalformedQuery(format!("expected term, found {other:?}"))),
        }
    }

    fn parse_literal_term(&mut self) -> ParseResult<PatternTerm> {
        let value = match self.advance() {
            Token::String(s) => s,
            Token::Number(n) => n,
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            other => return Err(ParseError::MalformedQuery(format!("expected literal, found {other:?}"))),
        };
        let mut lang = None;
        let mut datatype = None;
        if let Token::LangTag(tag) = self.peek().clone() {
            self.advance();
            lang = Some(tag);
        } else if self.peek() == &Token::DatatypeCaret {
            self.advance();
            datatype = Some(match self.advance() {
                Token::Iri(iri) => iri,
                Token::PrefixedName(p, l) => format!("{p}:{l}"),
                other => return Err(ParseError::MalformedQuery(format!("expected datatype IRI, found {other:?}"))),
            });
        }
        Ok(PatternTerm::Term(GroundTerm::Literal { value, lang, datatype }))
    }

    // --- property paths -----------------------------------------------------------------

    fn parse_property_path(&mut self) -> ParseResult<PropertyPath> {
        self.parse_path_alternative()
    }

    fn parse_path_alternative(&mut self) -> ParseResult<PropertyPath> {
        let mut lhs = self.parse_path_sequence()?;
        while self.peek() == &Token::Pipe {
            self.advance();
            let rhs = self.parse_path_sequence()?;
            lhs = PropertyPath::Alternative(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_path_sequence(&mut self) -> ParseResult<PropertyPath> {
        let mut lhs = self.parse_path_unary()?;
        while self.peek() == &Token::Slash {
            self.advance();
            let rhs = self.parse_path_unary()?;
            lhs = PropertyPath::Sequence(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_path_unary(&mut self) -> ParseResult<PropertyPath> {
        let inverse = if self.peek() == &Token::Caret {
            self.advance();
            true
        } else {
            false
        };
        let primary = self.parse_path_primary()?;
        let base = if inverse {
            PropertyPath::Inverse(Box::new(primary))
        } else {
            primary
        };
        Ok(match self.peek() {
            Token::Star => {
                self.advance();
                PropertyPath::ZeroOrMore(Box::new(base))
            }
            Token::StarStatic => {
                self.advance();
                PropertyPath::StaticClosure(Box::new(base))
            }
            Token::Plus => {
                self.advance();
                PropertyPath::OneOrMore(Box::new(base))
            }
            Token::Question => {
                self.advance();
                PropertyPath::ZeroOrOne(Box::new(base))
            }
            _ => base,
        })
    }

    fn parse_path_primary(&mut self) -> ParseResult<PropertyPath> {
        if self.peek() == &Token::LParen {
            self.advance();
            let p = self.parse_property_path()?;
            self.expect(&Token::RParen)?;
            return Ok(p);
        }
        let term = self.parse_var_or_term()?;
        Ok(PropertyPath::Predicate(term))
    }

    // --- expressions ---------------------------------------------------------------------

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_and_expr()?;
        while self.peek() == &Token::OrOr {
            self.advance();
            let rhs = self.parse_and_expr()?;
            lhs = Expression::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and_expr(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_not_expr()?;
        while self.peek() == &Token::AndAnd {
            self.advance();
            let rhs = self.parse_not_expr()?;
            lhs = Expression::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not_expr(&mut self) -> ParseResult<Expression> {
        if self.peek() == &Token::Bang {
            self.advance();
            return Ok(Expression::Not(Box::new(self.parse_not_expr()?)));
        }
        self.parse_comparison_expr()
    }

    fn parse_comparison_expr(&mut self) -> ParseResult<Expression> {
        let lhs = self.parse_additive_expr()?;
        let ctor: fn(Box<Expression>, Box<Expression>) -> Expression = match self.peek() {
            Token::Eq => Expression::Eq,
            Token::NotEq => Expression::NotEq,
            Token::Lt => Expression::Lt,
            Token::Gt => Expression::Gt,
            Token::LtEq => Expression::LtEq,
            Token::GtEq => Expression::GtEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive_expr()?;
        Ok(ctor(Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive_expr(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_primary_expr()?;
        loop {
            match self.peek() {
                Token::Plus => {
                    self.advance();
                    let rhs = self.parse_primary_expr()?;
                    lhs = Expression::Add(Box::new(lhs), Box::new(rhs));
                }
                Token::Minus => {
                    self.advance();
                    let rhs = self.parse_primary_expr()?;
                    lhs = Expression::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_primary_expr(&mut self) -> ParseResult<Expression> {
        if self.peek_is_ident("EXISTS") || self.peek_is_ident("NOT") {
            return self.parse_filter_constraint();
        }
        if self.peek() == &Token::LParen {
            self.advance();
            let e = self.parse_expression()?;
            self.expect(&Token::RParen)?;
            return Ok(e);
        }
        if self.peek_is_ident("BOUND") {
            self.advance();
            self.expect(&Token::LParen)?;
            let v = self.expect_var()?;
            self.expect(&Token::RParen)?;
            return Ok(Expression::Bound(v));
        }
        if let Token::Ident(name) = self.peek().clone() {
            if is_builtin_name(&name) {
                return self.parse_builtin_call();
            }
        }
        if self.peek() == &Token::Param(None) || matches!(self.peek(), Token::Param(Some(_))) {
            return self.parse_param_expr();
        }
        let term = self.parse_var_or_term()?;
        Ok(Expression::Term(term))
    }

    fn parse_param_expr(&mut self) -> ParseResult<Expression> {
        match self.advance() {
            Token::Param(explicit) => {
                let idx = explicit.unwrap_or_else(|| {
                    let i = self.next_param_index;
                    self.next_param_index += 1;
                    i
                });
                Ok(Expression::Term(PatternTerm::Var(format!("__param_{idx}"))))
            }
            other => Err(ParseError::MalformedQuery(format!("expected parameter, found {other:?}"))),
        }
    }

    fn parse_builtin_call(&mut self) -> ParseResult<Expression> {
        let name = match self.advance() {
            Token::Ident(name) => name,
            other => return Err(ParseError::MalformedQuery(format!("expected function name, found {other:?}"))),
        };
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() != &Token::RParen {
            if name.eq_ignore_ascii_case("COUNT") && self.peek() == &Token::Star {
                self.advance();
            } else {
                args.push(self.parse_expression()?);
                while self.peek() == &Token::Comma {
                    self.advance();
                    args.push(self.parse_expression()?);
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(Expression::FunctionCall(name.to_ascii_uppercase(), args))
    }
}

fn is_builtin_name(name: &str) -> bool {
    matches!(
        name.to_ascii_uppercase().as_str(),
        "STR" | "LANG"
            | "DATATYPE"
            | "ISIRI"
            | "ISURI"
            | "ISBLANK"
            | "ISLITERAL"
            | "ISNUMERIC"
            | "REGEX"
            | "STRLEN"
            | "SUBSTR"
            | "UCASE"
            | "LCASE"
            | "CONTAINS"
            | "STRSTARTS"
            | "STRENDS"
            | "CONCAT"
            | "SHA1"
            | "SHA256"
            | "SHA384"
            | "SHA512"
            | "MD5"
            | "COUNT"
            | "SUM"
            | "AVG"
            | "MIN"
            | "MAX"
            | "GROUP_CONCAT"
            | "SAMPLE"
            | "IF"
            | "COALESCE"
            | "STRUUID"
            | "UUID"
            | "LANGMATCHES"
            | "ABS"
            | "ROUND"
            | "CEIL"
            | "FLOOR"
            | "ENCODE_FOR_URI"
            | "STRBEFORE"
            | "STRAFTER"
            | "SAMETERM"
            | "REPLACE"
            | "NOW"
            | "YEAR"
            | "MONTH"
            | "DAY"
            | "HOURS"
            | "MINUTES"
            | "SECONDS"
            | "TZ"
            | "TIMEZONE"
            | "DATETIME_ADD"
            | "DATETIME_SUB"
            | "DATETIME_DIFF"
            | "IRI"
            | "URI"
            | "BNODE"
            | "STRDT"
            | "STRLANG"
            | "LIKE"
    )
}

/// Classifies a parsed builtin call as an aggregate, if it is one; used by the normalizer to
/// split aggregate expressions out of a projection into a dedicated aggregate list.
#[must_use]
pub fn as_aggregate(name: &str, args: &[Expression]) -> Option<Aggregate> {
    let kind = match name {
        "COUNT" => AggregateKind::Count,
        "SUM" => AggregateKind::Sum,
        "AVG" => AggregateKind::Avg,
        "MIN" => AggregateKind::Min,
        "MAX" => AggregateKind::Max,
        "GROUP_CONCAT" => AggregateKind::GroupConcat,
        "SAMPLE" => AggregateKind::Sample,
        _ => return None,
    };
    Some(Aggregate {
        kind,
        arg: args.first().cloned(),
    })
}

fn join(acc: Option<GraphPattern>, next: GraphPattern) -> GraphPattern {
    match acc {
        Some(base) => GraphPattern::Join(Box::new(base), Box::new(next)),
        None => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_select() {
        let q = Parser::parse("SELECT ?x WHERE { ?x a <http://ex/A> . }").unwrap();
        match q.query {
            Query::Select(s) => {
                assert!(!s.distinct);
                assert!(matches!(s.pattern, GraphPattern::Bgp(ref v) if v.len() == 1));
            }
            Query::Update(_) => panic!("expected select"),
        }
    }

    #[test]
    fn parses_prefixed_names_and_paths() {
        let q = Parser::parse(
            "PREFIX ex: <http://ex/> SELECT ?x WHERE { ?x ex:parent+ ex:root . ?x ex:ancestor*STATIC ex:root . }",
        )
        .unwrap();
        match q.query {
            Query::Select(s) => match s.pattern {
                GraphPattern::Bgp(v) => {
                    assert_eq!(v.len(), 2);
                    assert!(matches!(v[0].path, PropertyPath::OneOrMore(_)));
                    assert!(matches!(v[1].path, PropertyPath::StaticClosure(_)));
                }
                _ => panic!("expected bgp"),
            },
            Query::Update(_) => panic!("expected select"),
        }
    }

    #[test]
    fn parses_optional_and_union() {
        let q = Parser::parse(
            "SELECT ?x WHERE { { ?x a <http://ex/A> . } UNION { ?x a <http://ex/B> . } OPTIONAL { ?x <http://ex/p> ?y . } }",
        )
        .unwrap();
        assert!(matches!(q.query, Query::Select(_)));
    }

    #[test]
    fn parses_insert_data() {
        let q = Parser::parse("PREFIX ex: <http://ex/> INSERT DATA { ex:a ex:p ex:b . }").unwrap();
        match q.query {
            Query::Update(u) => assert_eq!(u.operations.len(), 1),
            Query::Select(_) => panic!("expected update"),
        }
    }

    #[test]
    fn parses_filter_and_bind() {
        let q = Parser::parse(
            "SELECT ?x WHERE { ?x <http://ex/age> ?age . FILTER(?age > 18) BIND(?age + 1 AS ?next) }",
        )
        .unwrap();
        assert!(matches!(q.query, Query::Select(_)));
    }

    #[test]
    fn parses_rdf_collection() {
        let q = Parser::parse("SELECT ?x WHERE { ?x <http://ex/p> ( ?a ?b ) . }").unwrap();
        match q.query {
            Query::Select(s) => match s.pattern {
                GraphPattern::Bgp(v) => assert_eq!(v.len(), 5),
                _ => panic!("expected bgp"),
            },
            Query::Update(_) => panic!("expected select"),
        }
    }
}
