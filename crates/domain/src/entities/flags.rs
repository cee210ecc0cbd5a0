//! Flag store - per-entity metadata keyed by module namespace
//!
//! Flags are free-form on disk. They are validated here, at the load
//! boundary: anything that is not an object of objects is dropped rather
//! than trusted.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::document::FieldPath;

/// Namespace owned by this system.
pub const SYSTEM_NAMESPACE: &str = "grimoire";

/// Namespace used before the module was renamed.
pub const LEGACY_NAMESPACE: &str = "grimoire-psionics";

/// Address of one flag: `flags.<namespace>.<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagKey {
    namespace: String,
    key: String,
}

impl FlagKey {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Same key under a different namespace.
    pub fn in_namespace(&self, namespace: &str) -> Self {
        Self::new(namespace, self.key.clone())
    }

    /// Update path of this flag on the stored document.
    pub fn path(&self) -> FieldPath {
        FieldPath::from_segments(["flags", self.namespace.as_str(), self.key.as_str()])
    }
}

impl fmt::Display for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.key)
    }
}

/// All flags of one entity, namespace -> key -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Flags(BTreeMap<String, Map<String, Value>>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a stored `flags` value. Never fails.
    pub fn from_value(value: &Value) -> Self {
        let Some(namespaces) = value.as_object() else {
            return Self::default();
        };

        let store = namespaces
            .iter()
            .filter_map(|(namespace, entries)| {
                entries
                    .as_object()
                    .map(|entries| (namespace.clone(), entries.clone()))
            })
            .collect();
        Self(store)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn namespace(&self, namespace: &str) -> Option<&Map<String, Value>> {
        self.0.get(namespace)
    }

    /// Keys of a namespace, in key order.
    pub fn keys_in(&self, namespace: &str) -> Vec<FlagKey> {
        self.namespace(namespace)
            .map(|entries| {
                entries
                    .keys()
                    .map(|key| FlagKey::new(namespace, key.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get(&self, key: &FlagKey) -> Option<&Value> {
        self.0.get(key.namespace()).and_then(|ns| ns.get(key.key()))
    }

    pub fn contains(&self, key: &FlagKey) -> bool {
        self.get(key).is_some()
    }

    /// Unconditional write. Migrations should prefer [`Flags::set_if_absent`].
    pub fn set(&mut self, key: &FlagKey, value: Value) {
        self.0
            .entry(key.namespace().to_string())
            .or_default()
            .insert(key.key().to_string(), value);
    }

    /// Write only when the key is not already present. Returns whether a
    /// write happened.
    pub fn set_if_absent(&mut self, key: &FlagKey, value: Value) -> bool {
        if self.contains(key) {
            return false;
        }
        self.set(key, value);
        true
    }

    /// Remove a key; an emptied namespace is dropped as well.
    pub fn remove(&mut self, key: &FlagKey) -> Option<Value> {
        let entries = self.0.get_mut(key.namespace())?;
        let removed = entries.remove(key.key());
        if entries.is_empty() {
            self.0.remove(key.namespace());
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Typed view of the system's own flag namespace.
///
/// Wrongly typed values are not discarded; they land in `extra` with
/// every unknown key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrimoireFlags {
    pub power_points: Option<i64>,
    pub manifester_level: Option<i64>,
    pub psionic_focus: Option<bool>,
    pub extra: Map<String, Value>,
}

impl GrimoireFlags {
    pub fn from_flags(flags: &Flags) -> Self {
        let mut view = Self::default();
        let Some(entries) = flags.namespace(SYSTEM_NAMESPACE) else {
            return view;
        };

        for (key, value) in entries {
            let consumed = match key.as_str() {
                "powerPoints" => {
                    view.power_points = value.as_i64();
                    view.power_points.is_some()
                }
                "manifesterLevel" => {
                    view.manifester_level = value.as_i64();
                    view.manifester_level.is_some()
                }
                "psionicFocus" => {
                    view.psionic_focus = value.as_bool();
                    view.psionic_focus.is_some()
                }
                _ => false,
            };
            if !consumed {
                view.extra.insert(key.clone(), value.clone());
            }
        }
        view
    }
}
