//! Typed record extraction from INSERT rows
//!
//! Each parser maps a column list and one value row to a typed record. Rows
//! that fail validation produce `None` and a warning; they never abort the
//! surrounding file.

use std::path::Path;

use tracing::{debug, warn};
use uuid::Uuid;

use super::normalize::{is_null_literal, normalize_source, normalize_value};
use super::tokenizer::{extract_inserts, InsertStatement};
use crate::model::{
    ClassPropertyLink, ClassRecord, ClassType, DataType, ObjectRecord, ParsedFile,
    PropertyRecord, SourceLocation,
};
use crate::util::LineIndex;

/// Tables the model is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Classes,
    PropertyDefinitions,
    ClassPropertyLinks,
    Objects,
}

impl TableKind {
    /// Resolve a table name as written in SQL.
    ///
    /// Schema qualifiers and identifier quoting are ignored, and matching is
    /// case-insensitive: `public."Classes"` resolves to [`TableKind::Classes`].
    pub fn from_table_name(name: &str) -> Option<Self> {
        let bare = name
            .rsplit('.')
            .next()
            .unwrap_or(name)
            .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'));
        match bare.to_ascii_lowercase().as_str() {
            "classes" => Some(TableKind::Classes),
            "property_definitions" => Some(TableKind::PropertyDefinitions),
            "classes_property_definitions" => Some(TableKind::ClassPropertyLinks),
            "objects" => Some(TableKind::Objects),
            _ => None,
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            TableKind::Classes => "classes",
            TableKind::PropertyDefinitions => "property_definitions",
            TableKind::ClassPropertyLinks => "classes_property_definitions",
            TableKind::Objects => "objects",
        }
    }
}

/// One record extracted from a value row
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecord {
    Class(ClassRecord),
    Property(PropertyRecord),
    Link(ClassPropertyLink),
    Object(ObjectRecord),
}

impl ParsedFile {
    pub fn push(&mut self, record: ParsedRecord) {
        match record {
            ParsedRecord::Class(c) => self.classes.push(c),
            ParsedRecord::Property(p) => self.properties.push(p),
            ParsedRecord::Link(l) => self.links.push(l),
            ParsedRecord::Object(o) => self.objects.push(o),
        }
    }
}

/// Check the canonical hyphenated UUID form, case-insensitively.
pub fn is_valid_uuid(value: &str) -> bool {
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

/// Value of `column` in `row`, or `None` when the column is absent, empty or SQL `NULL`.
fn field<'a>(columns: &[String], row: &'a [String], column: &str) -> Option<&'a str> {
    let idx = columns.iter().position(|c| c == column)?;
    let value = row.get(idx)?.as_str();
    if value.is_empty() || is_null_literal(value) {
        None
    } else {
        Some(value)
    }
}

fn parse_code(columns: &[String], row: &[String], column: &str) -> Option<i64> {
    field(columns, row, column).and_then(|v| v.trim().parse::<i64>().ok())
}

/// Parse a row of `classes`.
pub fn parse_class(columns: &[String], row: &[String], location: &SourceLocation) -> Option<ClassRecord> {
    let id = field(columns, row, "id");
    let name = field(columns, row, "name");
    let (Some(id), Some(name)) = (id, name) else {
        warn!(
            path = %location.file_path.display(),
            line = location.line_number,
            ?id,
            ?name,
            "Invalid class - missing id or name"
        );
        return None;
    };

    let class_type = match parse_code(columns, row, "type") {
        None => ClassType::default(),
        Some(code) => ClassType::from_code(code).unwrap_or_else(|| {
            warn!(id, code, "Unknown class type, using System");
            ClassType::default()
        }),
    };

    Some(ClassRecord {
        id: id.to_string(),
        name: name.to_string(),
        description: field(columns, row, "description").unwrap_or_default().to_string(),
        class_type,
        properties: Vec::new(),
        objects: Vec::new(),
        location: location.clone(),
    })
}

/// Parse a row of `property_definitions`.
pub fn parse_property(
    columns: &[String],
    row: &[String],
    location: &SourceLocation,
) -> Option<PropertyRecord> {
    let id = field(columns, row, "id");
    let name = field(columns, row, "name");
    let (Some(id), Some(name)) = (id, name) else {
        warn!(
            path = %location.file_path.display(),
            line = location.line_number,
            ?id,
            ?name,
            "Invalid property - missing id or name"
        );
        return None;
    };

    let data_type = match parse_code(columns, row, "data_type") {
        None => DataType::default(),
        Some(code) => DataType::from_code(code).unwrap_or_else(|| {
            warn!(id, code, "Unknown property data type, using String");
            DataType::default()
        }),
    };

    Some(PropertyRecord {
        id: id.to_string(),
        name: name.to_string(),
        description: field(columns, row, "description").unwrap_or_default().to_string(),
        data_type,
        source_class_id: field(columns, row, "source_class_id").map(str::to_string),
        location: location.clone(),
    })
}

/// Parse a row of `objects`.
///
/// Stricter than classes and properties: `class_id` is required too.
pub fn parse_object(columns: &[String], row: &[String], location: &SourceLocation) -> Option<ObjectRecord> {
    let id = field(columns, row, "id");
    let name = field(columns, row, "name");
    let class_id = field(columns, row, "class_id");
    let (Some(id), Some(name), Some(class_id)) = (id, name, class_id) else {
        warn!(
            path = %location.file_path.display(),
            line = location.line_number,
            ?id,
            ?name,
            ?class_id,
            "Invalid object - missing id, name or class_id"
        );
        return None;
    };

    Some(ObjectRecord {
        id: id.to_string(),
        name: name.to_string(),
        description: field(columns, row, "description").unwrap_or_default().to_string(),
        class_id: class_id.to_string(),
        parent_id: field(columns, row, "parent_id").map(str::to_string),
        location: location.clone(),
    })
}

/// Parse a row of `classes_property_definitions`.
///
/// Both sides must be literal UUIDs; rows whose ids came from unresolved
/// function calls or bind variables are dropped.
pub fn parse_link(columns: &[String], row: &[String]) -> Option<ClassPropertyLink> {
    let class_id = field(columns, row, "class_id").map(normalize_value);
    let property_id = field(columns, row, "property_definition_id").map(normalize_value);

    match (class_id, property_id) {
        (Some(class_id), Some(property_id))
            if is_valid_uuid(&class_id) && is_valid_uuid(&property_id) =>
        {
            Some(ClassPropertyLink {
                class_id,
                property_id,
            })
        }
        (class_id, property_id) => {
            warn!(?class_id, ?property_id, "Skipping link row without valid UUIDs");
            None
        }
    }
}

/// Dispatch a row to the parser for its table.
pub fn parse_row(
    kind: TableKind,
    columns: &[String],
    row: &[String],
    location: &SourceLocation,
) -> Option<ParsedRecord> {
    match kind {
        TableKind::Classes => parse_class(columns, row, location).map(ParsedRecord::Class),
        TableKind::PropertyDefinitions => {
            parse_property(columns, row, location).map(ParsedRecord::Property)
        }
        TableKind::ClassPropertyLinks => parse_link(columns, row).map(ParsedRecord::Link),
        TableKind::Objects => parse_object(columns, row, location).map(ParsedRecord::Object),
    }
}

/// Extract every record from one file's SQL text.
pub fn parse_sql(content: &str, file_path: &Path) -> ParsedFile {
    let normalized = normalize_source(content);
    let lines = LineIndex::new(content);
    let mut parsed = ParsedFile::default();

    for insert in extract_inserts(&normalized) {
        collect_insert(&insert, file_path, &lines, &mut parsed);
    }

    debug!(
        path = %file_path.display(),
        classes = parsed.classes.len(),
        properties = parsed.properties.len(),
        links = parsed.links.len(),
        objects = parsed.objects.len(),
        records = parsed.record_count(),
        "Parsed SQL file"
    );
    parsed
}

fn collect_insert(insert: &InsertStatement, file_path: &Path, lines: &LineIndex, parsed: &mut ParsedFile) {
    let Some(kind) = TableKind::from_table_name(&insert.table_name) else {
        return;
    };
    debug!(
        table = kind.table_name(),
        rows = insert.value_rows.len(),
        "Reading INSERT rows"
    );

    for row in &insert.value_rows {
        let location = SourceLocation::new(file_path, lines.line_number(row.offset), row.offset);
        if let Some(record) = parse_row(kind, &insert.columns, &row.values, &location) {
            parsed.push(record);
        }
    }
}
