//! SQL INSERT parsing

mod normalize;
mod records;
mod tokenizer;

pub use normalize::{is_null_literal, normalize_source, normalize_value, NormalizedSource};
pub use records::{
    is_valid_uuid, parse_class, parse_link, parse_object, parse_property, parse_row, parse_sql,
    ParsedRecord, TableKind,
};
pub use tokenizer::{extract_inserts, extract_inserts_from_sql, split_row, InsertStatement, ValueRow};
