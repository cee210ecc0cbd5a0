//! Power item data model
//!
//! A power's configurable modifiers ("augments") used to live on the power
//! itself. They now live on each action of the power. [`PowerModel::migrate_data`]
//! performs that relocation every time a power is loaded, before anything
//! else reads the data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{json_type_name, SchemaError};

/// Item `type` of powers.
pub const POWER_TYPE: &str = "power";

/// Default for `system.discipline` when none is stored.
pub const DEFAULT_DISCIPLINE: &str = "general";

/// Load-time normalization of power data.
pub struct PowerModel;

impl PowerModel {
    /// Bring a stored power `system` object up to the current shape.
    ///
    /// Total for any shape except corrupt `actions` entries (null or not an
    /// object) found while relocating; those are reported so the caller can
    /// surface the broken document.
    pub fn migrate_data(source: Value) -> Result<Value, SchemaError> {
        let Value::Object(mut source) = source else {
            return Ok(Value::Object(Map::new()));
        };

        // The top-level field never survives, whether or not it is relocated.
        let augments = match source.remove("augments") {
            Some(Value::Array(augments)) if !augments.is_empty() => Some(augments),
            _ => None,
        };

        // A non-array `actions` is user data in an unexpected shape; it is
        // kept as is and receives nothing.
        if let Some(Value::Array(actions)) = source.get_mut("actions") {
            match augments {
                Some(augments) => relocate_augments(actions, &augments)?,
                None => strip_empty_augments(actions),
            }
        }

        Ok(Value::Object(source))
    }
}

/// Give every action without augments its own copy of the power's augments.
/// Actions that already carry augments keep them.
fn relocate_augments(actions: &mut [Value], augments: &[Value]) -> Result<(), SchemaError> {
    for (index, action) in actions.iter_mut().enumerate() {
        let found = json_type_name(action);
        let Some(action) = action.as_object_mut() else {
            return Err(SchemaError::CorruptAction { index, found });
        };

        if has_augments(action) {
            continue;
        }
        // Value::clone is a deep copy; no two actions share an augment.
        action.insert("augments".to_string(), Value::Array(augments.to_vec()));
    }
    Ok(())
}

fn strip_empty_augments(actions: &mut [Value]) {
    for action in actions.iter_mut().filter_map(Value::as_object_mut) {
        if action.contains_key("augments") && !has_augments(action) {
            action.remove("augments");
        }
    }
}

fn has_augments(action: &Map<String, Value>) -> bool {
    matches!(action.get("augments"), Some(Value::Array(items)) if !items.is_empty())
}

/// One configurable modifier of a power action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Augment {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub effects: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerAction {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub augments: Vec<Augment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Read-only typed view over normalized power data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerData {
    #[serde(default)]
    pub actions: Vec<PowerAction>,
    #[serde(default = "default_discipline")]
    pub discipline: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_discipline() -> String {
    DEFAULT_DISCIPLINE.to_string()
}

impl PowerData {
    /// `None` when the data does not fit the typed view.
    pub fn from_system(system: &Value) -> Option<Self> {
        serde_json::from_value(system.clone()).ok()
    }
}
