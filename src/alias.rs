//! Class alias overlay
//!
//! Aliases are extra names for classes, used when an object can only be
//! matched to its class through the name of the directory it lives in.
//! Every mutation bumps a generation counter on a `watch` channel; the
//! processor treats a bump as a signal to drop its caches.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::watch;
use tracing::debug;

/// Read side of the alias overlay used during linking
pub trait AliasLookup: Send + Sync {
    fn alias(&self, class_id: &str) -> Option<String>;
}

/// Alias overlay that can also report changes
pub trait AliasSource: AliasLookup {
    /// Receiver whose value changes after every alias mutation
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Keys match class ids the way [`AliasStore`] does: trimmed, ASCII case-insensitive.
impl AliasLookup for HashMap<String, String> {
    fn alias(&self, class_id: &str) -> Option<String> {
        let wanted = key(class_id);
        self.get(&wanted)
            .or_else(|| {
                self.iter()
                    .find(|(id, _)| key(id) == wanted)
                    .map(|(_, alias)| alias)
            })
            .cloned()
    }
}

/// In-memory alias store, one alias per class
#[derive(Debug)]
pub struct AliasStore {
    aliases: RwLock<HashMap<String, String>>,
    changes: watch::Sender<u64>,
}

impl Default for AliasStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            aliases: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Seed the store without emitting a change notification.
    pub fn with_aliases<I, K, V>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let store = Self::new();
        if let Ok(mut map) = store.aliases.write() {
            for (class_id, alias) in aliases {
                let alias = alias.as_ref().trim();
                if !alias.is_empty() {
                    map.insert(key(class_id.as_ref()), alias.to_string());
                }
            }
        }
        store
    }

    pub fn get_alias(&self, class_id: &str) -> Option<String> {
        self.read_map(|map| map.get(&key(class_id)).cloned())
    }

    /// Set the alias for a class; a blank alias removes it.
    pub fn set_alias(&self, class_id: &str, alias: &str) {
        let alias = alias.trim();
        self.write_map(|map| {
            if alias.is_empty() {
                map.remove(&key(class_id));
            } else {
                map.insert(key(class_id), alias.to_string());
            }
        });
    }

    pub fn remove_alias(&self, class_id: &str) {
        self.write_map(|map| {
            map.remove(&key(class_id));
        });
    }

    pub fn clear(&self) {
        self.write_map(HashMap::clear);
    }

    pub fn len(&self) -> usize {
        self.read_map(HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_map<T>(&self, f: impl FnOnce(&HashMap<String, String>) -> T) -> T {
        match self.aliases.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write_map(&self, f: impl FnOnce(&mut HashMap<String, String>)) {
        match self.aliases.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
        self.changes.send_modify(|generation| *generation += 1);
        debug!(generation = *self.changes.borrow(), "Class aliases changed");
    }
}

impl AliasLookup for AliasStore {
    fn alias(&self, class_id: &str) -> Option<String> {
        self.get_alias(class_id)
    }
}

impl AliasSource for AliasStore {
    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

fn key(class_id: &str) -> String {
    class_id.trim().to_ascii_lowercase()
}
