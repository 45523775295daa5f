//! Source and value normalization
//!
//! Source normalization runs once per file before statement discovery:
//!
//! 1. `-- ...` line comments and `/* ... */` block comments are removed
//! 2. Placeholder tokens are rewritten, most specific first:
//!    - `:my_utc_now` becomes `NULL::timestamp`
//!    - `:my_admin_id` becomes `NULL::uuid`
//!    - `gen_random_uuid()` becomes `NULL::uuid`
//!    - any other `:name` bind variable becomes `NULL`
//!
//! String literals are copied through untouched, so comment markers, colons
//! and parentheses inside quotes never trigger a rewrite. `::type` casts are
//! not bind variables and are left alone.
//!
//! Because the rewrite changes lengths, the result keeps a sparse list of
//! anchors that maps offsets in the normalized text back to the original file.

use crate::util::{is_ident_byte, starts_with_ci};

const UTC_NOW_PLACEHOLDER: &str = ":my_utc_now";
const ADMIN_ID_PLACEHOLDER: &str = ":my_admin_id";
const UUID_GENERATOR_CALL: &str = "gen_random_uuid()";

/// Scanner state while walking SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuoteState {
    Normal,
    InSingleQuote,
    InDoubleQuote,
}

impl QuoteState {
    pub(crate) fn quote_byte(self) -> Option<u8> {
        match self {
            QuoteState::Normal => None,
            QuoteState::InSingleQuote => Some(b'\''),
            QuoteState::InDoubleQuote => Some(b'"'),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Anchor {
    normalized: usize,
    original: usize,
}

/// Normalized SQL text plus the offset map back to the original source
#[derive(Debug, Clone)]
pub struct NormalizedSource {
    pub text: String,
    anchors: Vec<Anchor>,
}

impl NormalizedSource {
    /// Map a byte offset in [`Self::text`] to the corresponding offset in the original source.
    pub fn original_offset(&self, normalized: usize) -> usize {
        let idx = self
            .anchors
            .partition_point(|a| a.normalized <= normalized)
            .saturating_sub(1);
        let anchor = self.anchors[idx];
        anchor.original + (normalized - anchor.normalized)
    }
}

struct SourceWriter<'a> {
    input: &'a str,
    out: String,
    anchors: Vec<Anchor>,
}

impl<'a> SourceWriter<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            out: String::with_capacity(input.len()),
            anchors: vec![Anchor {
                normalized: 0,
                original: 0,
            }],
        }
    }

    fn copy(&mut self, from: usize, to: usize) {
        self.out.push_str(&self.input[from..to]);
    }

    /// Replace `input[from..to]` with `replacement`, recording where offsets resume.
    fn replace(&mut self, from: usize, to: usize, replacement: &str) {
        self.mark(from);
        self.out.push_str(replacement);
        self.mark(to);
    }

    fn mark(&mut self, original: usize) {
        let anchor = Anchor {
            normalized: self.out.len(),
            original,
        };
        match self.anchors.last_mut() {
            Some(last) if last.normalized == anchor.normalized => *last = anchor,
            _ => self.anchors.push(anchor),
        }
    }

    fn finish(self) -> NormalizedSource {
        NormalizedSource {
            text: self.out,
            anchors: self.anchors,
        }
    }
}

/// Strip comments and rewrite placeholder tokens ahead of statement discovery.
pub fn normalize_source(content: &str) -> NormalizedSource {
    let bytes = content.as_bytes();
    let mut writer = SourceWriter::new(content);
    let mut state = QuoteState::Normal;
    let mut i = 0;
    // Start of the pending run of bytes to copy verbatim
    let mut run = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            QuoteState::InSingleQuote | QuoteState::InDoubleQuote => {
                let quote = state.quote_byte().unwrap_or(b'\'');
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
                i += 1;
            }
            QuoteState::Normal => {
                if b == b'\'' {
                    state = QuoteState::InSingleQuote;
                    i += 1;
                } else if b == b'"' {
                    state = QuoteState::InDoubleQuote;
                    i += 1;
                } else if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
                    let end = content[i..].find('\n').map_or(bytes.len(), |n| i + n);
                    writer.copy(run, i);
                    writer.replace(i, end, "");
                    i = end;
                    run = i;
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    match content[i + 2..].find("*/") {
                        Some(n) => {
                            let end = i + 2 + n + 2;
                            writer.copy(run, i);
                            writer.replace(i, end, "");
                            i = end;
                            run = i;
                        }
                        // Unterminated block comments are left as text
                        None => i += 2,
                    }
                } else if let Some((len, replacement)) = (b == b':' || b.eq_ignore_ascii_case(&b'g'))
                    .then(|| placeholder_at(content, i))
                    .flatten()
                {
                    writer.copy(run, i);
                    writer.replace(i, i + len, replacement);
                    i += len;
                    run = i;
                } else {
                    i += 1;
                }
            }
        }
    }

    writer.copy(run, bytes.len());
    writer.finish()
}

/// Placeholder starting at `pos`, as (matched length, replacement).
fn placeholder_at(content: &str, pos: usize) -> Option<(usize, &'static str)> {
    let bytes = content.as_bytes();
    let rest = &content[pos..];

    if bytes[pos] == b':' {
        // `::type` casts are not bind variables
        if pos > 0 && bytes[pos - 1] == b':' {
            return None;
        }
        let ident_len = rest[1..]
            .bytes()
            .take_while(|b| is_ident_byte(*b))
            .count();
        if ident_len == 0 || rest.as_bytes()[1].is_ascii_digit() {
            return None;
        }
        let token = &rest[..1 + ident_len];
        if token == UTC_NOW_PLACEHOLDER {
            return Some((token.len(), "NULL::timestamp"));
        }
        if token == ADMIN_ID_PLACEHOLDER {
            return Some((token.len(), "NULL::uuid"));
        }
        return Some((token.len(), "NULL"));
    }

    if starts_with_ci(rest, UUID_GENERATOR_CALL) && (pos == 0 || !is_ident_byte(bytes[pos - 1]))
    {
        return Some((UUID_GENERATOR_CALL.len(), "NULL::uuid"));
    }

    None
}

/// Reduce one raw value token to its scalar text.
///
/// Placeholder tokens that survived source normalization become `NULL`, one
/// layer of matching outer quotes is removed and escaped quotes inside the
/// literal are unescaped. A trailing `::type` cast on a quoted literal is
/// dropped. Anything else is only trimmed.
pub fn normalize_value(raw: &str) -> String {
    let replaced = raw
        .replace(UTC_NOW_PLACEHOLDER, "NULL")
        .replace(ADMIN_ID_PLACEHOLDER, "NULL")
        .replace(UUID_GENERATOR_CALL, "NULL");
    let trimmed = replaced.trim();

    match split_quoted_literal(trimmed) {
        Some((quote, inner)) => unescape_quoted(inner, quote),
        None => trimmed.to_string(),
    }
}

/// For a token that is a single quoted literal (optionally followed by a
/// `::type` cast), return the quote character and the raw inner text.
fn split_quoted_literal(token: &str) -> Option<(char, &str)> {
    let bytes = token.as_bytes();
    let quote = match bytes.first() {
        Some(b'\'') => b'\'',
        Some(b'"') => b'"',
        _ => return None,
    };

    let mut i = 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && bytes.get(i + 1) == Some(&quote) {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            let rest = token[i + 1..].trim_start();
            if rest.is_empty() || rest.starts_with("::") {
                return Some((quote as char, &token[1..i]));
            }
            return None;
        }
        i += 1;
    }
    None
}

fn unescape_quoted(inner: &str, quote: char) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if (c == '\\' || c == quote) && chars.peek() == Some(&quote) {
            chars.next();
            out.push(quote);
        } else {
            out.push(c);
        }
    }
    out
}

/// True for `NULL`, `null` and casts such as `NULL::uuid`.
pub fn is_null_literal(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("null") || starts_with_ci(value, "null::")
}
