//! Linker configuration
//!
//! Settings are pulled through [`SettingsProvider`] at the start of every
//! linking pass, so a change is picked up by the next recompute without
//! touching the caches.

use std::str::FromStr;
use std::sync::RwLock;

/// A property attached to classes by rule instead of by link rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoLinkedProperty {
    /// Display name of the rule
    pub name: String,
    /// Id of the property to attach
    pub uuid: String,
    /// Attach only to this class instead of every processable class
    pub class_id: Option<String>,
}

impl AutoLinkedProperty {
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
            class_id: None,
        }
    }

    pub fn for_class(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = Some(class_id.into());
        self
    }
}

/// Parses `<property-uuid>[=<class-uuid>]`; the rule is named after the property.
impl FromStr for AutoLinkedProperty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uuid, class_id) = match s.split_once('=') {
            Some((uuid, class_id)) => (uuid.trim(), Some(class_id.trim())),
            None => (s.trim(), None),
        };
        if uuid.is_empty() {
            return Err(format!("missing property uuid in '{}'", s));
        }

        let rule = AutoLinkedProperty::new(uuid, uuid);
        match class_id {
            Some("") => Err(format!("missing class uuid after '=' in '{}'", s)),
            Some(class_id) => Ok(rule.for_class(class_id)),
            None => Ok(rule),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkerSettings {
    /// Keep objects out of the catch-all class during direct class_id matching
    pub ignore_status: bool,
    /// Id of the catch-all class that absorbs unlinked objects
    pub ignore_uuid: String,
    pub auto_linked_properties: Vec<AutoLinkedProperty>,
}

impl LinkerSettings {
    /// The catch-all class id, if one is configured.
    pub fn catch_all_class(&self) -> Option<&str> {
        let id = self.ignore_uuid.trim();
        (!id.is_empty()).then_some(id)
    }

    /// The class id to skip during direct matching, if that behavior is on.
    pub fn ignored_status_class(&self) -> Option<&str> {
        if self.ignore_status {
            self.catch_all_class()
        } else {
            None
        }
    }
}

/// Source of linker settings, read fresh on every linking pass
pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> LinkerSettings;
}

impl SettingsProvider for LinkerSettings {
    fn settings(&self) -> LinkerSettings {
        self.clone()
    }
}

impl SettingsProvider for RwLock<LinkerSettings> {
    fn settings(&self) -> LinkerSettings {
        match self.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
