//! Ontology I/O is an external collaborator (spec.md §1), delivered to the store as a stream of
//! triples through [`OntologyLoader`]. This module keeps one minimal, concrete N-Triples-subset
//! loader good enough for tests and the CLI's `load` subcommand (SPEC_FULL.md §4.9) — full
//! RDF/XML/OWL-XML parsing stays out of tree.

use crate::error::{StoreError, StoreResult};
use crate::quadstore::Quadstore;
use quadstore_model::{DatatypeId, LiteralValue, Storid};
use rusqlite::Connection;

/// Callbacks an external format parser would drive to stream triples into a graph. The store
/// itself only needs these two entry points; everything about *how* a format is read (RDF/XML
/// events, Turtle tokens, ...) lives entirely outside this crate.
pub trait OntologyLoader {
    fn on_triple(&mut self, graph: Storid, s: &str, p: &str, o: &str) -> StoreResult<()>;
    fn on_data(
        &mut self,
        graph: Storid,
        s: &str,
        p: &str,
        value: LiteralValue,
        datatype_iri: Option<&str>,
    ) -> StoreResult<()>;
}

/// A loader that abbreviates IRIs as they stream in and inserts directly into the quadstore.
pub struct DirectLoader<'a> {
    pub conn: &'a Connection,
    pub store: &'a Quadstore,
}

impl OntologyLoader for DirectLoader<'_> {
    fn on_triple(&mut self, graph: Storid, s: &str, p: &str, o: &str) -> StoreResult<()> {
        let s = self.store.abbrev.abbreviate(self.conn, s)?;
        let p = self.store.abbrev.abbreviate(self.conn, p)?;
        let o = self.store.abbrev.abbreviate(self.conn, o)?;
        self.store.add_obj(self.conn, graph, s, p, o)?;
        Ok(())
    }

    fn on_data(
        &mut self,
        graph: Storid,
        s: &str,
        p: &str,
        value: LiteralValue,
        datatype_iri: Option<&str>,
    ) -> StoreResult<()> {
        let s = self.store.abbrev.abbreviate(self.conn, s)?;
        let p = self.store.abbrev.abbreviate(self.conn, p)?;
        let dtype = match datatype_iri {
            Some(iri) => DatatypeId::xsd(self.store.abbrev.abbreviate(self.conn, iri)?),
            None => DatatypeId::PLAIN,
        };
        self.store.add_data(self.conn, graph, s, p, &value, dtype)?;
        Ok(())
    }
}

/// Parses the restricted N-Triples subset `<s> <p> <o> .` / `<s> <p> "lit" .` /
/// `<s> <p> "lit"@lang .` / `<s> <p> "lit"^^<dt> .` (one statement per line, `#`-comments and
/// blank lines skipped) and drives `loader` with each statement.
pub fn load_ntriples(loader: &mut dyn OntologyLoader, graph: Storid, text: &str) -> StoreResult<usize> {
    let mut count = 0;
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_suffix('.').unwrap_or(line).trim();
        let mut parts = tokenize_ntriples_line(line).ok_or_else(|| {
            StoreError::OntologyParsing(format!("line {}: malformed N-Triples statement", lineno + 1))
        })?;
        if parts.len() != 3 {
            return Err(StoreError::OntologyParsing(format!(
                "line {}: expected subject, predicate, object",
                lineno + 1
            )));
        }
        let o = parts.pop().unwrap();
        let p = parts.pop().unwrap();
        let s = parts.pop().unwrap();
        let s = strip_iri(&s).ok_or_else(|| {
            StoreError::OntologyParsing(format!("line {}: subject must be an IRI", lineno + 1))
        })?;
        let p = strip_iri(&p).ok_or_else(|| {
            StoreError::OntologyParsing(format!("line {}: predicate must be an IRI", lineno + 1))
        })?;
        if let Some(o_iri) = strip_iri(&o) {
            loader.on_triple(graph, s, p, o_iri)?;
        } else if let Some((lexical, lang, dt)) = strip_literal(&o) {
            let value = LiteralValue::Text(lexical);
            if let Some(lang) = lang {
                loader.on_data(graph, s, p, value, Some(&format!("@{lang}")))?;
            } else {
                loader.on_data(graph, s, p, value, dt.as_deref())?;
            }
        } else {
            return Err(StoreError::OntologyParsing(format!(
                "line {}: object must be an IRI or a literal",
                lineno + 1
            )));
        }
        count += 1;
    }
    Ok(count)
}

fn tokenize_ntriples_line(line: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();
    while let Some(&(i, c)) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '<' => {
                let start = i;
                chars.next();
                for (_, c2) in chars.by_ref() {
                    if c2 == '>' {
                        break;
                    }
                }
                let end = chars.peek().map_or(line.len(), |&(j, _)| j);
                tokens.push(line[start..end].to_string());
            }
            '"' => {
                let start = i;
                chars.next();
                let mut escaped = false;
                for (_, c2) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                        continue;
                    }
                    if c2 == '\\' {
                        escaped = true;
                        continue;
                    }
                    if c2 == '"' {
                        break;
                    }
                }
                // consume any trailing @lang or ^^<dt>
                let mut end = chars.peek().map_or(line.len(), |&(j, _)| j);
                if let Some(&(_, '@')) = chars.peek() {
                    while let Some(&(j, c2)) = chars.peek() {
                        if c2.is_whitespace() {
                            end = j;
                            break;
                        }
                        end = j + c2.len_utf8();
                        chars.next();
                    }
                } else if let Some(&(_, '^')) = chars.peek() {
                    while let Some(&(j, c2)) = chars.peek() {
                        if c2.is_whitespace() {
                            end = j;
                            break;
                        }
                        end = j + c2.len_utf8();
                        chars.next();
                    }
                }
                tokens.push(line[start..end].to_string());
            }
            _ => {
                let start = i;
                let mut end = line.len();
                while let Some(&(j, c2)) = chars.peek() {
                    if c2.is_whitespace() {
                        end = j;
                        break;
                    }
                    chars.next();
                }
                tokens.push(line[start..end].to_string());
            }
        }
    }
    Some(tokens)
}

fn strip_iri(token: &str) -> Option<&str> {
    token.strip_prefix('<').and_then(|t| t.strip_suffix('>'))
}

/// Returns `(lexical, language, datatype_iri)` for a literal token.
fn strip_literal(token: &str) -> Option<(String, Option<String>, Option<String>)> {
    if !token.starts_with('"') {
        return None;
    }
    let rest = &token[1..];
    let close = find_unescaped_quote(rest)?;
    let lexical = unescape(&rest[..close]);
    let suffix = &rest[close + 1..];
    if let Some(lang) = suffix.strip_prefix('@') {
        Some((lexical, Some(lang.to_string()), None))
    } else if let Some(dt) = suffix.strip_prefix("^^") {
        Some((lexical, None, strip_iri(dt).map(str::to_string)))
    } else {
        Some((lexical, None, None))
    }
}

fn find_unescaped_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Symmetric writer-side collaborator: emits the store's quads as N-Triples lines.
pub trait OntologyWriter {
    fn write_triple(&mut self, s: &str, p: &str, o: &str) -> std::io::Result<()>;
    fn write_data(&mut self, s: &str, p: &str, lexical: &str, lang: Option<&str>, datatype_iri: Option<&str>) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        triples: Vec<(String, String, String)>,
        data: Vec<(String, String, String, Option<String>)>,
    }

    impl OntologyLoader for Recording {
        fn on_triple(&mut self, _graph: Storid, s: &str, p: &str, o: &str) -> StoreResult<()> {
            self.triples.push((s.to_string(), p.to_string(), o.to_string()));
            Ok(())
        }

        fn on_data(
            &mut self,
            _graph: Storid,
            s: &str,
            p: &str,
            value: LiteralValue,
            datatype_iri: Option<&str>,
        ) -> StoreResult<()> {
            self.data
                .push((s.to_string(), p.to_string(), value.to_string(), datatype_iri.map(str::to_string)));
            Ok(())
        }
    }

    #[test]
    fn parses_object_and_literal_statements() {
        let text = r#"
# a comment
<http://ex/a> <http://ex/p> <http://ex/b> .
<http://ex/a> <http://www.w3.org/2000/01/rdf-schema#label> "hello"@en .
<http://ex/a> <http://ex/age> "42"^^<http://www.w3.org/2001/XMLSchema#integer> .
"#;
        let mut rec = Recording::default();
        let n = load_ntriples(&mut rec, Storid(1), text).unwrap();
        assert_eq!(n, 3);
        assert_eq!(rec.triples.len(), 1);
        assert_eq!(rec.data.len(), 2);
        assert_eq!(rec.data[0].3.as_deref(), Some("@en"));
    }

    #[test]
    fn rejects_malformed_line() {
        let mut rec = Recording::default();
        assert!(load_ntriples(&mut rec, Storid(1), "<http://ex/a> <http://ex/p> .\n").is_err());
    }
}
