//! Object model element types

use std::path::{Path, PathBuf};

/// Where a record was defined in its source file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub file_path: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    /// Byte offset into the unmodified file contents
    pub byte_offset: usize,
}

impl SourceLocation {
    pub fn new(file_path: &Path, line_number: usize, byte_offset: usize) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            line_number,
            byte_offset,
        }
    }
}

/// Class category from the `type` column of `classes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClassType {
    #[default]
    System,
    Reference,
    /// Classes that receive auto-linked properties
    Processable,
}

impl ClassType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ClassType::System),
            1 => Some(ClassType::Reference),
            2 => Some(ClassType::Processable),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ClassType::System => 0,
            ClassType::Reference => 1,
            ClassType::Processable => 2,
        }
    }
}

/// Property value kind from the `data_type` column of `property_definitions`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    String,
    Int,
    Double,
    Boolean,
    Reference,
    DateTime,
    StringArray,
    IntArray,
    DoubleArray,
    ReferenceArray,
    Attachment,
    MultipleAttachment,
    Signature,
    MultipleSignature,
    Date,
    Time,
}

impl DataType {
    const ALL: [DataType; 16] = [
        DataType::String,
        DataType::Int,
        DataType::Double,
        DataType::Boolean,
        DataType::Reference,
        DataType::DateTime,
        DataType::StringArray,
        DataType::IntArray,
        DataType::DoubleArray,
        DataType::ReferenceArray,
        DataType::Attachment,
        DataType::MultipleAttachment,
        DataType::Signature,
        DataType::MultipleSignature,
        DataType::Date,
        DataType::Time,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            DataType::StringArray
                | DataType::IntArray
                | DataType::DoubleArray
                | DataType::ReferenceArray
                | DataType::MultipleAttachment
                | DataType::MultipleSignature
        )
    }
}

/// A row of the `classes` table
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub class_type: ClassType,
    /// Filled by linking; never contains duplicate ids
    pub properties: Vec<PropertyRecord>,
    /// Filled by linking; never contains duplicate ids
    pub objects: Vec<ObjectRecord>,
    pub location: SourceLocation,
}

impl ClassRecord {
    pub fn has_property(&self, property_id: &str) -> bool {
        self.properties
            .iter()
            .any(|p| p.id.eq_ignore_ascii_case(property_id))
    }

    pub fn has_object(&self, object_id: &str) -> bool {
        self.objects
            .iter()
            .any(|o| o.id.eq_ignore_ascii_case(object_id))
    }
}

/// A row of the `property_definitions` table
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub data_type: DataType,
    /// Lookup key of the class a reference property points at
    pub source_class_id: Option<String>,
    pub location: SourceLocation,
}

/// A row of the `objects` table
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub class_id: String,
    pub parent_id: Option<String>,
    pub location: SourceLocation,
}

/// A row of the `classes_property_definitions` table; only lives through linking
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassPropertyLink {
    pub class_id: String,
    pub property_id: String,
}

/// Everything extracted from a single SQL file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFile {
    pub classes: Vec<ClassRecord>,
    pub properties: Vec<PropertyRecord>,
    pub links: Vec<ClassPropertyLink>,
    pub objects: Vec<ObjectRecord>,
}

impl ParsedFile {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.properties.is_empty()
            && self.links.is_empty()
            && self.objects.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.classes.len() + self.properties.len() + self.links.len() + self.objects.len()
    }
}

/// The linked, sorted cross-file model handed to consumers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectModel {
    pub classes: Vec<ClassRecord>,
    pub properties: Vec<PropertyRecord>,
    pub objects: Vec<ObjectRecord>,
}

impl ObjectModel {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.properties.is_empty() && self.objects.is_empty()
    }

    pub fn find_class(&self, id: &str) -> Option<&ClassRecord> {
        self.classes.iter().find(|c| c.id.eq_ignore_ascii_case(id))
    }
}
