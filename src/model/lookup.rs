//! UUID lookup over a built model
//!
//! Maps every class, property and object id to a summary of the entity,
//! including the owning class for properties and objects.

use std::collections::HashMap;
use std::fmt;

use super::elements::{ClassType, DataType, ObjectModel, SourceLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Class,
    Property,
    Object,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Class => "class",
            EntityKind::Property => "property",
            EntityKind::Object => "object",
        };
        f.write_str(label)
    }
}

/// What a UUID refers to
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub uuid: String,
    pub kind: EntityKind,
    pub name: String,
    pub description: String,
    /// Owning class; for a property, the first class it is linked to, else its source class
    pub class_name: Option<String>,
    pub class_uuid: Option<String>,
    /// Set for classes only
    pub class_type: Option<ClassType>,
    /// Set for properties only
    pub data_type: Option<DataType>,
    pub location: SourceLocation,
}

/// Case-insensitive id index over an [`ObjectModel`]
#[derive(Debug, Default)]
pub struct ModelIndex {
    entries: HashMap<String, EntityInfo>,
}

impl ModelIndex {
    pub fn new(model: &ObjectModel) -> Self {
        let mut entries = HashMap::new();

        for class in &model.classes {
            entries.entry(class.id.to_ascii_lowercase()).or_insert_with(|| EntityInfo {
                uuid: class.id.clone(),
                kind: EntityKind::Class,
                name: class.name.clone(),
                description: class.description.clone(),
                class_name: None,
                class_uuid: None,
                class_type: Some(class.class_type),
                data_type: None,
                location: class.location.clone(),
            });
        }

        for property in &model.properties {
            let owner = model
                .classes
                .iter()
                .find(|c| c.has_property(&property.id))
                .or_else(|| {
                    property
                        .source_class_id
                        .as_deref()
                        .and_then(|id| model.find_class(id))
                });
            entries
                .entry(property.id.to_ascii_lowercase())
                .or_insert_with(|| EntityInfo {
                    uuid: property.id.clone(),
                    kind: EntityKind::Property,
                    name: property.name.clone(),
                    description: property.description.clone(),
                    class_name: owner.map(|c| c.name.clone()),
                    class_uuid: owner.map(|c| c.id.clone()),
                    class_type: None,
                    data_type: Some(property.data_type),
                    location: property.location.clone(),
                });
        }

        for object in &model.objects {
            let owner = model
                .classes
                .iter()
                .find(|c| c.has_object(&object.id))
                .or_else(|| model.find_class(&object.class_id));
            entries.entry(object.id.to_ascii_lowercase()).or_insert_with(|| EntityInfo {
                uuid: object.id.clone(),
                kind: EntityKind::Object,
                name: object.name.clone(),
                description: object.description.clone(),
                class_name: owner.map(|c| c.name.clone()),
                class_uuid: owner.map(|c| c.id.clone()),
                class_type: None,
                data_type: None,
                location: object.location.clone(),
            });
        }

        Self { entries }
    }

    pub fn lookup(&self, uuid: &str) -> Option<&EntityInfo> {
        self.entries.get(&uuid.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
