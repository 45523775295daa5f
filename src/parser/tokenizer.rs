//! INSERT statement tokenizer
//!
//! Splits normalized SQL into `INSERT INTO <table> (<cols>) VALUES (...), (...)`
//! statements and each parenthesized group into scalar values. Groups are
//! matched by counting parenthesis depth with quote awareness, so sub-selects
//! and string literals containing `(`, `)` or `,` are handled.
//!
//! A group that never closes ends the statement: the groups that closed
//! before it are kept and the remainder is dropped without an error.

use std::sync::LazyLock;

use regex::Regex;

use super::normalize::{normalize_source, normalize_value, NormalizedSource, QuoteState};
use crate::util::keyword_at;

/// Quoted UUID literal, as written in value lists
static QUOTED_UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)'[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}'")
        .expect("valid quoted UUID regex")
});

/// One parenthesized value group of an INSERT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRow {
    /// Normalized scalar values, in column order
    pub values: Vec<String>,
    /// Byte offset in the original source of the row's first quoted UUID,
    /// or of its opening parenthesis when the row has none
    pub offset: usize,
}

/// A single `INSERT INTO ... VALUES ...` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub table_name: String,
    /// Column names, unquoted and lowercased
    pub columns: Vec<String>,
    pub value_rows: Vec<ValueRow>,
    /// Original-source byte offsets of every quoted UUID in the value list
    pub uuid_positions: Vec<usize>,
}

/// Normalize raw SQL and extract its INSERT statements.
pub fn extract_inserts_from_sql(sql: &str) -> Vec<InsertStatement> {
    extract_inserts(&normalize_source(sql))
}

/// Extract every INSERT statement from normalized SQL.
pub fn extract_inserts(source: &NormalizedSource) -> Vec<InsertStatement> {
    let text = source.text.as_str();
    let mut inserts = Vec::new();
    let mut pos = 0;

    while let Some(start) = find_insert_keyword(text, pos) {
        match parse_insert_at(text, start) {
            Some((raw, end)) => {
                inserts.push(raw.resolve(text, source));
                pos = end;
            }
            None => pos = start + "INSERT".len(),
        }
    }

    inserts
}

/// Statement pieces before values are normalized and offsets mapped
struct RawInsert {
    table_name: String,
    columns: Vec<String>,
    /// (open paren, close paren) byte offsets in the normalized text
    groups: Vec<(usize, usize)>,
}

impl RawInsert {
    fn resolve(self, text: &str, source: &NormalizedSource) -> InsertStatement {
        let (values_start, values_end) = match (self.groups.first(), self.groups.last()) {
            (Some(first), Some(last)) => (first.0, last.1 + 1),
            _ => (0, 0),
        };

        // Scanned over the raw value list, independent of how values are split
        let uuid_matches: Vec<usize> = QUOTED_UUID_RE
            .find_iter(&text[values_start..values_end])
            .map(|m| values_start + m.start())
            .collect();

        let value_rows = self
            .groups
            .iter()
            .map(|&(open, close)| {
                let anchor = uuid_matches
                    .iter()
                    .copied()
                    .find(|p| *p > open && *p < close)
                    .unwrap_or(open);
                ValueRow {
                    values: split_row(&text[open + 1..close])
                        .into_iter()
                        .map(normalize_value)
                        .collect(),
                    offset: source.original_offset(anchor),
                }
            })
            .collect();

        InsertStatement {
            table_name: self.table_name,
            columns: self.columns,
            value_rows,
            uuid_positions: uuid_matches
                .into_iter()
                .map(|p| source.original_offset(p))
                .collect(),
        }
    }
}

/// Find the next `INSERT` keyword outside string literals.
fn find_insert_keyword(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut state = QuoteState::Normal;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        match state.quote_byte() {
            Some(quote) => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == quote {
                    if bytes.get(i + 1) == Some(&quote) {
                        i += 2;
                        continue;
                    }
                    state = QuoteState::Normal;
                }
            }
            None => {
                if b == b'\'' {
                    state = QuoteState::InSingleQuote;
                } else if b == b'"' {
                    state = QuoteState::InDoubleQuote;
                } else if (b == b'I' || b == b'i') && keyword_at(text, i, "INSERT") {
                    return Some(i);
                }
            }
        }
        i += 1;
    }

    None
}

/// Parse the statement whose `INSERT` keyword starts at `start`.
///
/// Returns the statement pieces and the offset just past the last value group.
fn parse_insert_at(text: &str, start: usize) -> Option<(RawInsert, usize)> {
    let mut cursor = Cursor::new(text, start);
    cursor.expect_keyword("INSERT")?;
    cursor.skip_whitespace();
    cursor.expect_keyword("INTO")?;
    cursor.skip_whitespace();

    let table_name = cursor.read_table_name()?;
    cursor.skip_whitespace();

    cursor.expect_byte(b'(')?;
    let columns_start = cursor.pos;
    let columns_end = columns_start + text[columns_start..].find(')')?;
    let columns = text[columns_start..columns_end]
        .split(',')
        .map(clean_column_name)
        .collect();
    cursor.pos = columns_end + 1;
    cursor.skip_whitespace();
    cursor.expect_keyword("VALUES")?;

    let mut groups = Vec::new();
    loop {
        cursor.skip_whitespace();
        if cursor.peek() != Some(b'(') {
            break;
        }
        let open = cursor.pos;
        let Some(close) = find_group_end(text, open) else {
            break;
        };
        groups.push((open, close));
        cursor.pos = close + 1;
        cursor.skip_whitespace();
        if cursor.peek() == Some(b',') {
            cursor.pos += 1;
        } else {
            break;
        }
    }

    if groups.is_empty() {
        return None;
    }

    let end = groups.last().map_or(cursor.pos, |g| g.1 + 1);
    Some((
        RawInsert {
            table_name,
            columns,
            groups,
        },
        end,
    ))
}

/// Offset of the `)` that closes the group opened at `open`, if it closes.
pub(crate) fn find_group_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut state = QuoteState::Normal;
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        match state.quote_byte() {
            Some(quote) => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == quote {
                    if bytes.get(i + 1) == Some(&quote) {
                        i += 2;
                        continue;
                    }
                    state = QuoteState::Normal;
                }
            }
            None => match b {
                b'\'' => state = QuoteState::InSingleQuote,
                b'"' => state = QuoteState::InDoubleQuote,
                b'(' => depth += 1,
                b')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }

    None
}

/// Split the inside of a value group on top-level commas.
///
/// Commas inside string literals or nested parentheses are not separators.
/// Tokens are returned raw, without trimming or unquoting.
pub fn split_row(inner: &str) -> Vec<&str> {
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let bytes = inner.as_bytes();
    let mut state = QuoteState::Normal;
    let mut depth = 0usize;
    let mut tokens = Vec::new();
    let mut token_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match state.quote_byte() {
            Some(quote) => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == quote {
                    if bytes.get(i + 1) == Some(&quote) {
                        i += 2;
                        continue;
                    }
                    state = QuoteState::Normal;
                }
            }
            None => match b {
                b'\'' => state = QuoteState::InSingleQuote,
                b'"' => state = QuoteState::InDoubleQuote,
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    tokens.push(&inner[token_start..i]);
                    token_start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }

    tokens.push(&inner[token_start..]);
    tokens
}

fn clean_column_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '[' | ']'))
        .to_lowercase()
}

/// Byte cursor over the normalized text
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, pos: usize) -> Self {
        Self { text, pos }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Option<()> {
        if keyword_at(self.text, self.pos, keyword) {
            self.pos += keyword.len();
            Some(())
        } else {
            None
        }
    }

    fn expect_byte(&mut self, expected: u8) -> Option<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    /// Read a possibly schema-qualified, possibly quoted table name.
    fn read_table_name(&mut self) -> Option<String> {
        let bytes = self.text.as_bytes();
        let start = self.pos;
        let mut in_quotes = false;

        while let Some(&b) = bytes.get(self.pos) {
            if b == b'"' {
                in_quotes = !in_quotes;
            } else if !in_quotes && (b.is_ascii_whitespace() || b == b'(') {
                break;
            }
            self.pos += 1;
        }

        let name = self.text[start..self.pos].trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}
