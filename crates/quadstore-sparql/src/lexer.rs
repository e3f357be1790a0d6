use crate::error::ParseError;
use crate::token::{Spanned, Token};
use std::iter::Peekable;
use std::str::CharIndices;

pub struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned<Token>>, ParseError> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.node == Token::Eof;
            out.push(tok);
            if is_eof {
                return Ok(out);
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('#') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Spanned<Token>, ParseError> {
        self.skip_trivia();
        let Some(&(start, c)) = self.chars.peek() else {
            let end = self.src.len();
            return Ok(Spanned {
                node: Token::Eof,
                start: end,
                end,
            });
        };

        let node = match c {
            '{' => self.single(Token::LBrace),
            '}' => self.single(Token::RBrace),
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '[' => self.single(Token::LBracket),
            ']' => self.single(Token::RBracket),
            '.' => self.single(Token::Dot),
            ',' => self.single(Token::Comma),
            ';' => self.single(Token::Semicolon),
            '|' => {
                self.chars.next();
                if self.peek_char() == Some('|') {
                    self.chars.next();
                    Token::OrOr
                } else {
                    Token::Pipe
                }
            }
            '&' => {
                self.chars.next();
                if self.peek_char() == Some('&') {
                    self.chars.next();
                    Token::AndAnd
                } else {
                    return Err(ParseError::Lex(start, "unexpected lone '&'".into()));
                }
            }
            '/' => self.single(Token::Slash),
            '^' => {
                self.chars.next();
                if self.peek_char() == Some('^') {
                    self.chars.next();
                    Token::DatatypeCaret
                } else {
                    Token::Caret
                }
            }
            '*' => {
                self.chars.next();
                if self.matches_word("STATIC") {
                    Token::StarStatic
                } else {
                    Token::Star
                }
            }
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '!' => {
                self.chars.next();
                if self.peek_char() == Some('=') {
                    self.chars.next();
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            '=' => self.single(Token::Eq),
            '<' => {
                // Could be an IRIREF `<...>` or a comparison operator.
                if self.looks_like_iri_ref() {
                    self.lex_iri_ref(start)?
                } else {
                    self.chars.next();
                    if self.peek_char() == Some('=') {
                        self.chars.next();
                        Token::LtEq
                    } else {
                        Token::Lt
                    }
                }
            }
            '>' => {
                self.chars.next();
                if self.peek_char() == Some('=') {
                    self.chars.next();
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '?' => {
                self.chars.next();
                if self.peek_char() == Some('?') {
                    self.chars.next();
                    let idx = self.lex_opt_digits();
                    Token::Param(idx)
                } else {
                    Token::Var(self.lex_name())
                }
            }
            '$' => {
                self.chars.next();
                Token::Var(self.lex_name())
            }
            '_' if self.peek_is(':', 1) => {
                self.chars.next();
                self.chars.next();
                Token::BlankNodeLabel(self.lex_name())
            }
            '"' | '\'' => self.lex_string(c)?,
            '@' => {
                self.chars.next();
                Token::LangTag(self.lex_name())
            }
            c if c.is_ascii_digit() => self.lex_number(),
            c if is_name_start(c) => self.lex_ident_like(),
            other => return Err(ParseError::Lex(start, format!("unexpected character {other:?}"))),
        };
        let end = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        Ok(Spanned { node, start, end })
    }

    fn single(&mut self, tok: Token) -> Token {
        self.chars.next();
        tok
    }

    fn peek_is(&self, c: char, ahead: usize) -> bool {
        self.src[self.chars.peek().map_or(self.src.len(), |&(i, _)| i)..]
            .chars()
            .nth(ahead)
            == Some(c)
    }

    fn matches_word(&mut self, word: &str) -> bool {
        let rest_start = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        let rest = &self.src[rest_start..];
        if rest.len() >= word.len() && rest[..word.len()].eq_ignore_ascii_case(word) {
            for _ in 0..word.len() {
                self.chars.next();
            }
            true
        } else {
            false
        }
    }

    fn looks_like_iri_ref(&self) -> bool {
        // `<` followed eventually by `>` before whitespace/`<` that would indicate a comparison;
        // SPARQL IRIREFs never contain `<`, `>`, or whitespace, so a simple scan is sufficient
        // for this restricted grammar.
        let rest_start = self.chars.clone().peek().map_or(self.src.len(), |&(i, _)| i);
        let rest = &self.src[rest_start + 1..];
        matches!(rest.find(['<', '>', ' ', '\t', '\n']), Some(i) if rest.as_bytes()[i] == b'>')
    }

    fn lex_iri_ref(&mut self, start: usize) -> Result<Token, ParseError> {
        self.chars.next(); // consume '<'
        let content_start = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        loop {
            match self.chars.next() {
                Some((i, '>')) => {
                    return Ok(Token::Iri(self.src[content_start..i].to_string()));
                }
                Some(_) => {}
                None => return Err(ParseError::Lex(start, "unterminated IRI reference".into())),
            }
        }
    }

    fn lex_name(&mut self) -> String {
        let start = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        self.src[start..end].to_string()
    }

    fn lex_opt_digits(&mut self) -> Option<u32> {
        let start = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        self.src[start..end].parse().ok()
    }

    fn lex_number(&mut self) -> Token {
        let start = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-' {
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        Token::Number(self.src[start..end].to_string())
    }

    fn lex_ident_like(&mut self) -> Token {
        let start = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        let word = &self.src[start..end];

        // A prefixed name: `prefix:local` (local part optional, allows the `:local` and
        // `prefix:` forms too).
        if self.peek_char() == Some(':') && !word.eq_ignore_ascii_case("a") {
            self.chars.next();
            let local = self.lex_name();
            return Token::PrefixedName(word.to_string(), local);
        }

        if word == "a" {
            return Token::A;
        }
        if word.eq_ignore_ascii_case("true") {
            return Token::True;
        }
        if word.eq_ignore_ascii_case("false") {
            return Token::False;
        }
        Token::Ident(word.to_string())
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start_pos = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
        self.chars.next();
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, c2)) => out.push(c2),
                    None => return Err(ParseError::Lex(start_pos, "unterminated string literal".into())),
                },
                Some((_, c)) => out.push(c),
                None => return Err(ParseError::Lex(start_pos, "unterminated string literal".into())),
            }
        }
        Ok(Token::String(out))
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|s| s.node).collect()
    }

    #[test]
    fn lexes_triple_pattern() {
        let t = toks("?x a <http://ex/A> .");
        assert_eq!(
            t,
            vec![
                Token::Var("x".into()),
                Token::A,
                Token::Iri("http://ex/A".into()),
                Token::Dot,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lexes_property_path_operators() {
        let t = toks("rdfs:subClassOf*STATIC");
        assert_eq!(
            t,
            vec![
                Token::PrefixedName("rdfs".into(), "subClassOf".into()),
                Token::StarStatic,
                Token::Eof
            ]
        );
    }

    #[test]
    fn lexes_positional_params() {
        assert_eq!(toks("??"), vec![Token::Param(None), Token::Eof]);
        assert_eq!(toks("??3"), vec![Token::Param(Some(3)), Token::Eof]);
    }

    #[test]
    fn lexes_lang_tagged_literal() {
        let t = toks("\"hello\"@en");
        assert_eq!(
            t,
            vec![Token::String("hello".into()), Token::LangTag("en".into()), Token::Eof]
        );
    }

    #[test]
    fn distinguishes_iri_from_less_than() {
        let t = toks("?x < 5");
        assert_eq!(t, vec![Token::Var("x".into()), Token::Lt, Token::Number("5".into()), Token::Eof]);
    }
}
