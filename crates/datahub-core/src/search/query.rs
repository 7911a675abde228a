//! Filter language shared by the search and match backends.
//!
//! ```text
//! expr    := and ("OR" and)*
//! and     := unary (["AND"] unary)*
//! unary   := "NOT" unary | primary
//! primary := "(" expr ")" | "\"phrase\"" | word
//!          | field (":" | "=") (word | "\"phrase\"")
//!          | field ("<" | "<=" | ">" | ">=") number
//! ```
//!
//! The empty query matches every record.

use std::collections::BTreeMap;

use crate::error::{DataHubError, Result};

use super::record::{FieldType, FieldValue, INTERNAL_PATH_FIELD, IndexRecord, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    All,
    Term(String),
    Phrase(String),
    Field { name: String, value: String },
    Compare { name: String, op: CompareOp, value: f64 },
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
}

impl Query {
    pub fn parse(raw: &str) -> Result<Self> {
        let tokens = lex(raw)?;
        if tokens.is_empty() {
            return Ok(Self::All);
        }
        let mut parser = Parser {
            raw,
            tokens,
            pos: 0,
        };
        let query = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(query)
    }

    #[must_use]
    pub fn matches(&self, record: &IndexRecord) -> bool {
        match self {
            Self::All => true,
            Self::Term(value) | Self::Phrase(value) => record
                .fields
                .iter()
                .filter(|(name, _)| name.as_str() != INTERNAL_PATH_FIELD)
                .any(|(_, field)| field_matches(field, value)),
            Self::Field { name, value } => record
                .fields
                .get(name)
                .is_some_and(|field| field_matches(field, value)),
            Self::Compare { name, op, value } => match record.fields.get(name) {
                Some(FieldValue::Number(number)) => op.holds(*number, *value),
                _ => false,
            },
            Self::And(items) => items.iter().all(|item| item.matches(record)),
            Self::Or(items) => items.iter().any(|item| item.matches(record)),
            Self::Not(inner) => !inner.matches(record),
        }
    }

    /// Lowercased words of every non-negated term, used for ranking.
    #[must_use]
    pub fn positive_terms(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms(&self, out: &mut Vec<String>) {
        match self {
            Self::Term(value) | Self::Phrase(value) => out.extend(tokenize(value)),
            Self::Field { name, value } if name != INTERNAL_PATH_FIELD => {
                out.extend(tokenize(value));
            }
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_terms(out);
                }
            }
            _ => {}
        }
    }

    /// Field filters must name known fields; range comparisons need numbers.
    pub fn check_fields(&self, schema: &BTreeMap<String, FieldType>) -> Result<()> {
        match self {
            Self::Field { name, value } => match schema.get(name) {
                None => Err(unknown_field(name)),
                Some(FieldType::Number) if value.parse::<f64>().is_err() => {
                    Err(DataHubError::InvalidQuery(format!(
                        "field({name}) is a number, got({value})"
                    )))
                }
                Some(_) => Ok(()),
            },
            Self::Compare { name, .. } => match schema.get(name) {
                None => Err(unknown_field(name)),
                Some(FieldType::Number) => Ok(()),
                Some(_) => Err(DataHubError::InvalidQuery(format!(
                    "field({name}) does not support range comparison"
                ))),
            },
            Self::And(items) | Self::Or(items) => {
                items.iter().try_for_each(|item| item.check_fields(schema))
            }
            Self::Not(inner) => inner.check_fields(schema),
            Self::All | Self::Term(_) | Self::Phrase(_) => Ok(()),
        }
    }
}

fn unknown_field(name: &str) -> DataHubError {
    DataHubError::InvalidQuery(format!("unknown field({name})"))
}

fn field_matches(field: &FieldValue, value: &str) -> bool {
    match field {
        FieldValue::Text(text) => {
            let wanted = tokenize(value);
            if wanted.is_empty() {
                return false;
            }
            let tokens = tokenize(text);
            tokens
                .windows(wanted.len())
                .any(|window| window == wanted.as_slice())
        }
        FieldValue::Atom(atom) => atom == value || atom.split_whitespace().any(|t| t == value),
        FieldValue::Number(number) => value.parse::<f64>().is_ok_and(|parsed| parsed == *number),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Word(String),
    Quoted(String),
    Equals,
    Compare(CompareOp),
}

const RESERVED: [char; 6] = ['(', ')', '"', ':', '<', '>'];

fn lex(raw: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        match ch {
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ':' | '=' => {
                chars.next();
                tokens.push(Token::Equals);
            }
            '<' | '>' => {
                chars.next();
                let inclusive = chars.next_if_eq(&'=').is_some();
                tokens.push(Token::Compare(match (ch, inclusive) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::Le,
                    ('>', false) => CompareOp::Gt,
                    _ => CompareOp::Ge,
                }));
            }
            '"' => {
                chars.next();
                let mut phrase = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => phrase.push(c),
                        None => {
                            return Err(DataHubError::InvalidQuery(format!(
                                "unterminated quote in({raw})"
                            )));
                        }
                    }
                }
                tokens.push(Token::Quoted(phrase));
            }
            _ => {
                let mut word = String::new();
                while let Some(c) =
                    chars.next_if(|c| !c.is_whitespace() && !RESERVED.contains(c) && *c != '=')
                {
                    word.push(c);
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    raw: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word == keyword)
    }

    fn error(&self, reason: &str) -> DataHubError {
        DataHubError::InvalidQuery(format!("{reason} at token {} in({})", self.pos, self.raw))
    }

    fn parse_or(&mut self) -> Result<Query> {
        let mut items = vec![self.parse_and()?];
        while self.peek_keyword("OR") {
            self.pos += 1;
            items.push(self.parse_and()?);
        }
        Ok(collapse(items, Query::Or))
    }

    fn parse_and(&mut self) -> Result<Query> {
        let mut items = vec![self.parse_unary()?];
        loop {
            if self.peek_keyword("AND") {
                self.pos += 1;
                items.push(self.parse_unary()?);
                continue;
            }
            let starts_operand = match self.peek() {
                Some(Token::Word(word)) => word != "OR",
                Some(Token::LParen | Token::Quoted(_)) => true,
                _ => false,
            };
            if !starts_operand {
                break;
            }
            items.push(self.parse_unary()?);
        }
        Ok(collapse(items, Query::And))
    }

    fn parse_unary(&mut self) -> Result<Query> {
        if self.peek_keyword("NOT") {
            self.pos += 1;
            return Ok(Query::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Query> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("expected )")),
                }
            }
            Some(Token::Quoted(phrase)) => Ok(Query::Phrase(phrase)),
            Some(Token::Word(word)) if word == "AND" || word == "OR" => {
                Err(self.error("operator without operand"))
            }
            Some(Token::Word(word)) => match self.peek() {
                Some(Token::Equals) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Word(value) | Token::Quoted(value)) => Ok(Query::Field {
                            name: word,
                            value,
                        }),
                        _ => Err(self.error("expected value")),
                    }
                }
                Some(Token::Compare(op)) => {
                    let op = *op;
                    self.pos += 1;
                    let value = match self.next() {
                        Some(Token::Word(value)) => value
                            .parse::<f64>()
                            .map_err(|_| self.error("expected number"))?,
                        _ => return Err(self.error("expected number")),
                    };
                    Ok(Query::Compare {
                        name: word,
                        op,
                        value,
                    })
                }
                _ => Ok(Query::Term(word)),
            },
            _ => Err(self.error("expected term")),
        }
    }
}

fn collapse(mut items: Vec<Query>, wrap: fn(Vec<Query>) -> Query) -> Query {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}
