//! Shared utility helpers.

use std::cmp::Ordering;

use icu_collator::{Collator, CollatorOptions};

/// Case-insensitive starts_with check without allocating.
#[inline]
pub fn starts_with_ci(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes())
}

/// Case-insensitive keyword check at a byte offset.
///
/// Matches only when the keyword is not glued to a preceding or following
/// identifier character, so `INSERTED` or `reINSERT` never match `INSERT`.
#[inline]
pub fn keyword_at(text: &str, pos: usize, keyword: &str) -> bool {
    let bytes = text.as_bytes();
    if pos > bytes.len() || !starts_with_ci(&text[pos..], keyword) {
        return false;
    }
    let before_ok = pos == 0 || !is_ident_byte(bytes[pos - 1]);
    let end = pos + keyword.len();
    let after_ok = end >= bytes.len() || !is_ident_byte(bytes[end]);
    before_ok && after_ok
}

#[inline]
pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Byte offsets of line starts, used to turn source offsets into 1-based line numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// 1-based line number containing `offset`.
    pub fn line_number(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(next) => next,
        }
    }
}

thread_local! {
    /// Root-locale collator; `None` only if the compiled collation data fails to load
    static NAME_COLLATOR: Option<Collator> =
        Collator::try_new(&Default::default(), CollatorOptions::new()).ok();
}

/// Name ordering used for every sorted view of the model.
///
/// Unicode collation (CLDR root): accents and case are secondary to the base
/// letters, lowercase sorts before uppercase, and Cyrillic follows its own
/// alphabet. Names that collate equal fall back to the raw text so the
/// order is total.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    NAME_COLLATOR
        .with(|collator| match collator {
            Some(collator) => collator.compare(a, b),
            None => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase)),
        })
        .then_with(|| a.cmp(b))
}
