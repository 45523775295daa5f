//! Entity linking
//!
//! Resolves which properties and objects belong to which class and produces
//! the sorted model snapshot.
//!
//! ## Property linking
//!
//! 1. Explicit link rows attach a property to a class when both ids resolve.
//! 2. Auto-link rules attach a property to every processable class, or to the
//!    rule's own target class when it names one.
//!
//! ## Object linking
//!
//! 1. Direct match on `class_id`, skipping the ignored status class.
//! 2. Fallback on the parent directory name of the object's file, looked up
//!    case-insensitively against class names and aliases.
//! 3. Duplicate object ids are dropped per class, first occurrence wins.
//! 4. Anything still unattached goes to the catch-all class when it exists.
//!
//! Ids are compared case-insensitively throughout.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::elements::{
    ClassPropertyLink, ClassRecord, ClassType, ObjectModel, ObjectRecord, ParsedFile,
    PropertyRecord,
};
use crate::alias::AliasLookup;
use crate::settings::{AutoLinkedProperty, LinkerSettings};
use crate::util::compare_names;

fn id_key(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

fn class_index(classes: &[ClassRecord]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(classes.len());
    for (idx, class) in classes.iter().enumerate() {
        index.entry(id_key(&class.id)).or_insert(idx);
    }
    index
}

/// Attach properties to classes from link rows, then from auto-link rules.
pub fn link_classes_and_properties(
    classes: &mut [ClassRecord],
    properties: &[PropertyRecord],
    links: &[ClassPropertyLink],
    auto_linked: &[AutoLinkedProperty],
) {
    let class_by_id = class_index(classes);
    let mut property_by_id: HashMap<String, &PropertyRecord> = HashMap::with_capacity(properties.len());
    for property in properties {
        property_by_id.entry(id_key(&property.id)).or_insert(property);
    }

    for link in links {
        let class_idx = class_by_id.get(&id_key(&link.class_id)).copied();
        let property = property_by_id.get(&id_key(&link.property_id)).copied();

        match (class_idx, property) {
            (Some(idx), Some(property)) => {
                let class = &mut classes[idx];
                if !class.has_property(&property.id) {
                    class.properties.push(property.clone());
                }
            }
            (class_idx, property) => {
                if class_idx.is_none() {
                    warn!(class_id = %link.class_id, "Class not found for link");
                }
                if property.is_none() {
                    warn!(property_id = %link.property_id, "Property not found for link");
                }
            }
        }
    }

    for rule in auto_linked {
        let Some(property) = property_by_id.get(&id_key(&rule.uuid)).copied() else {
            debug!(rule = %rule.name, uuid = %rule.uuid, "Auto-linked property not defined");
            continue;
        };

        match rule.class_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(target) => match class_by_id.get(&id_key(target)) {
                Some(&idx) => {
                    let class = &mut classes[idx];
                    if !class.has_property(&property.id) {
                        class.properties.push(property.clone());
                    }
                }
                None => {
                    debug!(rule = %rule.name, class_id = target, "Auto-link target class not defined")
                }
            },
            None => {
                for class in classes.iter_mut() {
                    if class.class_type == ClassType::Processable && !class.has_property(&property.id) {
                        class.properties.push(property.clone());
                    }
                }
            }
        }
    }
}

/// Class name expected from an object's file location: its parent directory.
fn class_name_from_path(object: &ObjectRecord) -> Option<String> {
    let path = object.location.file_path.to_string_lossy();
    let mut parts = path.rsplit(['/', '\\']);
    let _file_name = parts.next()?;
    let directory = parts.next()?;
    (!directory.is_empty()).then(|| directory.to_lowercase())
}

/// Attach objects to classes: direct id match, path fallback, dedupe, catch-all.
///
/// Existing `objects` collections are replaced, so repeated calls on the same
/// inputs give the same result.
pub fn link_classes_and_objects<A: AliasLookup + ?Sized>(
    classes: &mut [ClassRecord],
    objects: &[ObjectRecord],
    aliases: &A,
    settings: &LinkerSettings,
) {
    for class in classes.iter_mut() {
        class.objects.clear();
    }

    let class_by_id = class_index(classes);

    // Canonical names first; an alias overrides a clashing name
    let mut class_by_name: HashMap<String, usize> = HashMap::with_capacity(classes.len());
    for (idx, class) in classes.iter().enumerate() {
        class_by_name.entry(class.name.trim().to_lowercase()).or_insert(idx);
    }
    for (idx, class) in classes.iter().enumerate() {
        if let Some(alias) = aliases.alias(&class.id) {
            let alias = alias.trim().to_lowercase();
            if !alias.is_empty() {
                class_by_name.insert(alias, idx);
            }
        }
    }

    let ignored_class = settings
        .ignored_status_class()
        .and_then(|id| class_by_id.get(&id_key(id)).copied());
    let mut linked = vec![false; objects.len()];

    for (obj_idx, object) in objects.iter().enumerate() {
        if let Some(&idx) = class_by_id.get(&id_key(&object.class_id)) {
            if Some(idx) == ignored_class {
                continue;
            }
            classes[idx].objects.push(object.clone());
            linked[obj_idx] = true;
        }
    }

    for (obj_idx, object) in objects.iter().enumerate() {
        if linked[obj_idx] {
            continue;
        }
        let Some(idx) = class_name_from_path(object).and_then(|name| class_by_name.get(&name).copied())
        else {
            continue;
        };
        let class = &mut classes[idx];
        if !class.has_object(&object.id) {
            class.objects.push(object.clone());
        }
        linked[obj_idx] = true;
    }

    for class in classes.iter_mut() {
        dedupe_objects(&mut class.objects);
    }

    let Some(catch_all) = settings
        .catch_all_class()
        .and_then(|id| class_by_id.get(&id_key(id)).copied())
    else {
        return;
    };

    let attached: HashSet<String> = classes
        .iter()
        .flat_map(|c| c.objects.iter().map(|o| id_key(&o.id)))
        .collect();
    let unlinked: Vec<&ObjectRecord> = objects
        .iter()
        .filter(|o| !attached.contains(&id_key(&o.id)))
        .collect();

    if !unlinked.is_empty() {
        debug!(count = unlinked.len(), class_id = %classes[catch_all].id, "Attaching unlinked objects to catch-all class");
    }
    let bucket = &mut classes[catch_all];
    for object in unlinked {
        if !bucket.has_object(&object.id) {
            bucket.objects.push(object.clone());
        }
    }
}

fn dedupe_objects(objects: &mut Vec<ObjectRecord>) {
    let mut seen = HashSet::with_capacity(objects.len());
    objects.retain(|o| seen.insert(id_key(&o.id)));
}

/// Sorted copies of the model; nested collections are sorted too.
pub fn sort_model(
    classes: &[ClassRecord],
    properties: &[PropertyRecord],
    objects: &[ObjectRecord],
) -> ObjectModel {
    let mut classes: Vec<ClassRecord> = classes.to_vec();
    classes.sort_by(|a, b| compare_names(&a.name, &b.name));
    for class in &mut classes {
        class.properties.sort_by(|a, b| compare_names(&a.name, &b.name));
        class.objects.sort_by(|a, b| compare_names(&a.name, &b.name));
    }

    let mut properties = properties.to_vec();
    properties.sort_by(|a, b| compare_names(&a.name, &b.name));

    let mut objects = objects.to_vec();
    objects.sort_by(|a, b| compare_names(&a.name, &b.name));

    ObjectModel {
        classes,
        properties,
        objects,
    }
}

/// Link and sort the records merged from every file.
pub fn build_model<A: AliasLookup + ?Sized>(
    merged: ParsedFile,
    settings: &LinkerSettings,
    aliases: &A,
) -> ObjectModel {
    let ParsedFile {
        mut classes,
        properties,
        links,
        objects,
    } = merged;

    link_classes_and_properties(&mut classes, &properties, &links, &settings.auto_linked_properties);
    link_classes_and_objects(&mut classes, &objects, aliases, settings);
    sort_model(&classes, &properties, &objects)
}
