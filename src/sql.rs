//! Read-only SQL over stream metadata.
//!
//! ```text
//! SELECT <columns | *> FROM streams
//!     [WHERE <field> (= | != | LIKE) <'literal' | $n> [AND ...]]
//!     [LIMIT n]
//! ```
//!
//! Fields are `uuid`, `collection`, `tags->'key'` and `annotations->'key'`. Selectable columns are
//! `uuid`, `collection`, `tags`, `annotations` and `property_version`. A comparison against an
//! absent or null metadata value is false.

use serde_json::{Map, Value};

use crate::error::{CodedError, ErrorCode};
use crate::store::StreamMeta;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlError {
    #[error("unexpected end of query")]
    UnexpectedEnd,

    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error("unknown table {0:?}, only \"streams\" is queryable")]
    UnknownTable(String),

    #[error("parameter ${index} was not supplied ({supplied} given)")]
    MissingParameter { index: usize, supplied: usize },

    #[error("invalid LIMIT {0:?}")]
    InvalidLimit(String),
}

impl From<SqlError> for CodedError {
    fn from(err: SqlError) -> Self {
        CodedError::new(ErrorCode::BadSqlValue, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Literal(String),
    Param(usize),
    Star,
    Comma,
    Arrow,
    Eq,
    NotEq,
}

fn tokenize(query: &str) -> Result<Vec<Token>, SqlError> {
    let mut tokens = Vec::new();
    let mut chars = query.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            ';' => {
                chars.next();
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '!' | '<' => {
                chars.next();
                match (c, chars.next()) {
                    ('!', Some('=')) | ('<', Some('>')) => tokens.push(Token::NotEq),
                    (_, other) => {
                        return Err(SqlError::UnexpectedToken(
                            other.map_or(c.to_string(), |o| format!("{c}{o}")),
                        ));
                    }
                }
            }
            '-' => {
                chars.next();
                match chars.next() {
                    Some('>') => tokens.push(Token::Arrow),
                    _ => return Err(SqlError::UnexpectedToken("-".to_string())),
                }
            }
            '\'' => {
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            literal.push('\'');
                        }
                        Some('\'') => break,
                        Some(ch) => literal.push(ch),
                        None => return Err(SqlError::UnterminatedString),
                    }
                }
                tokens.push(Token::Literal(literal));
            }
            '$' => {
                chars.next();
                let mut digits = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(d);
                    chars.next();
                }
                let index = digits
                    .parse()
                    .map_err(|_| SqlError::UnexpectedToken(format!("${digits}")))?;
                tokens.push(Token::Param(index));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::new();
                while let Some(&w) = chars.peek().filter(|w| w.is_alphanumeric() || **w == '_') {
                    word.push(w);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(SqlError::UnexpectedToken(other.to_string())),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Uuid,
    Collection,
    Tags,
    Annotations,
    PropertyVersion,
}

impl Column {
    const ALL: [Column; 5] = [
        Column::Uuid,
        Column::Collection,
        Column::Tags,
        Column::Annotations,
        Column::PropertyVersion,
    ];

    fn parse(name: &str) -> Result<Self, SqlError> {
        match name.to_ascii_lowercase().as_str() {
            "uuid" => Ok(Column::Uuid),
            "collection" => Ok(Column::Collection),
            "tags" => Ok(Column::Tags),
            "annotations" => Ok(Column::Annotations),
            "property_version" => Ok(Column::PropertyVersion),
            _ => Err(SqlError::UnknownColumn(name.to_string())),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Column::Uuid => "uuid",
            Column::Collection => "collection",
            Column::Tags => "tags",
            Column::Annotations => "annotations",
            Column::PropertyVersion => "property_version",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Uuid,
    Collection,
    Tag(String),
    Annotation(String),
}

impl Field {
    fn value<'a>(&self, meta: &'a StreamMeta) -> Option<std::borrow::Cow<'a, str>> {
        match self {
            Field::Uuid => Some(meta.uuid.to_string().into()),
            Field::Collection => Some(meta.collection.as_str().into()),
            Field::Tag(key) => meta.tags.get(key)?.as_deref().map(Into::into),
            Field::Annotation(key) => meta.annotations.get(key)?.as_deref().map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    NotEq,
    Like,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition {
    field: Field,
    op: Op,
    operand: String,
}

impl Condition {
    fn matches(&self, meta: &StreamMeta) -> bool {
        let Some(value) = self.field.value(meta) else {
            return false;
        };
        match self.op {
            Op::Eq => value == self.operand,
            Op::NotEq => value != self.operand,
            Op::Like => like(&self.operand, &value),
        }
    }
}

/// A parsed metadata query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    columns: Vec<Column>,
    conditions: Vec<Condition>,
    limit: Option<usize>,
}

struct Parser<'a> {
    tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
    params: &'a [String],
}

impl Parser<'_> {
    fn next(&mut self) -> Result<Token, SqlError> {
        self.tokens.next().ok_or(SqlError::UnexpectedEnd)
    }

    fn word(&mut self) -> Result<String, SqlError> {
        match self.next()? {
            Token::Word(word) => Ok(word),
            other => Err(unexpected(other)),
        }
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), SqlError> {
        let word = self.word()?;
        if word.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(SqlError::UnexpectedToken(word))
        }
    }

    fn peek_keyword(&mut self, keyword: &str) -> bool {
        matches!(self.tokens.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn columns(&mut self) -> Result<Vec<Column>, SqlError> {
        if self.tokens.peek() == Some(&Token::Star) {
            self.tokens.next();
            return Ok(Column::ALL.to_vec());
        }
        let mut columns = vec![Column::parse(&self.word()?)?];
        while self.tokens.peek() == Some(&Token::Comma) {
            self.tokens.next();
            columns.push(Column::parse(&self.word()?)?);
        }
        Ok(columns)
    }

    fn value(&mut self) -> Result<String, SqlError> {
        match self.next()? {
            Token::Literal(literal) => Ok(literal),
            Token::Param(index) => index
                .checked_sub(1)
                .and_then(|i| self.params.get(i))
                .cloned()
                .ok_or(SqlError::MissingParameter {
                    index,
                    supplied: self.params.len(),
                }),
            other => Err(unexpected(other)),
        }
    }

    fn field(&mut self) -> Result<Field, SqlError> {
        let name = self.word()?;
        match name.to_ascii_lowercase().as_str() {
            "uuid" => Ok(Field::Uuid),
            "collection" => Ok(Field::Collection),
            map @ ("tags" | "annotations") => {
                match self.next()? {
                    Token::Arrow => {}
                    other => return Err(unexpected(other)),
                }
                let key = self.value()?;
                Ok(if map == "tags" {
                    Field::Tag(key)
                } else {
                    Field::Annotation(key)
                })
            }
            _ => Err(SqlError::UnknownColumn(name)),
        }
    }

    fn condition(&mut self) -> Result<Condition, SqlError> {
        let field = self.field()?;
        let op = match self.next()? {
            Token::Eq => Op::Eq,
            Token::NotEq => Op::NotEq,
            Token::Word(w) if w.eq_ignore_ascii_case("like") => Op::Like,
            other => return Err(unexpected(other)),
        };
        let operand = self.value()?;
        Ok(Condition { field, op, operand })
    }
}

fn unexpected(token: Token) -> SqlError {
    SqlError::UnexpectedToken(match token {
        Token::Word(w) => w,
        Token::Literal(l) => format!("'{l}'"),
        Token::Param(i) => format!("${i}"),
        Token::Star => "*".to_string(),
        Token::Comma => ",".to_string(),
        Token::Arrow => "->".to_string(),
        Token::Eq => "=".to_string(),
        Token::NotEq => "!=".to_string(),
    })
}

impl Query {
    /// Parse `query`, binding `$1..$n` to `params`.
    pub fn parse(query: &str, params: &[String]) -> Result<Query, SqlError> {
        let mut parser = Parser {
            tokens: tokenize(query)?.into_iter().peekable(),
            params,
        };

        parser.keyword("select")?;
        let columns = parser.columns()?;
        parser.keyword("from")?;
        let table = parser.word()?;
        if !table.eq_ignore_ascii_case("streams") {
            return Err(SqlError::UnknownTable(table));
        }

        let mut conditions = Vec::new();
        if parser.peek_keyword("where") {
            parser.tokens.next();
            conditions.push(parser.condition()?);
            while parser.peek_keyword("and") {
                parser.tokens.next();
                conditions.push(parser.condition()?);
            }
        }

        let mut limit = None;
        if parser.peek_keyword("limit") {
            parser.tokens.next();
            let raw = match parser.next()? {
                Token::Word(w) => w,
                Token::Param(i) => i
                    .checked_sub(1)
                    .and_then(|at| parser.params.get(at))
                    .cloned()
                    .ok_or(SqlError::MissingParameter {
                        index: i,
                        supplied: parser.params.len(),
                    })?,
                other => return Err(unexpected(other)),
            };
            limit = Some(raw.parse().map_err(|_| SqlError::InvalidLimit(raw))?);
        }

        if let Some(token) = parser.tokens.next() {
            return Err(unexpected(token));
        }

        Ok(Query {
            columns,
            conditions,
            limit,
        })
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn matches(&self, meta: &StreamMeta) -> bool {
        self.conditions.iter().all(|c| c.matches(meta))
    }

    /// The selected columns of `meta` as a JSON object.
    pub fn row(&self, meta: &StreamMeta) -> Value {
        let mut row = Map::new();
        for column in &self.columns {
            let value = match column {
                Column::Uuid => Value::String(meta.uuid.to_string()),
                Column::Collection => Value::String(meta.collection.clone()),
                Column::Tags => json_map(&meta.tags),
                Column::Annotations => json_map(&meta.annotations),
                Column::PropertyVersion => Value::from(meta.property_version),
            };
            row.insert(column.name().to_string(), value);
        }
        Value::Object(row)
    }
}

fn json_map(map: &crate::types::OptMap) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), v.clone().map_or(Value::Null, Value::String)))
            .collect(),
    )
}

/// SQL `LIKE`: `%` matches any run, `_` one character.
fn like(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    // Greedy wildcard matching with single backtrack point.
    let (mut p, mut v) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while v < value.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == value[v]) {
            p += 1;
            v += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, v));
            p += 1;
        } else if let Some((sp, sv)) = star {
            p = sp + 1;
            v = sv + 1;
            star = Some((sp, sv + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}
