//! Document entity - a persisted actor or item
//!
//! A [`Document`] is what the persistence layer hands out after loading a
//! stored row. Loading always goes through [`Document::materialize`], which
//! runs the per-type schema normalizer first and then fills computed
//! defaults. The untouched stored JSON is kept alongside so migrations can
//! tell stored values apart from computed ones.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{json_type_name, DomainError, SchemaError};
use crate::ids::{ArchiveId, DocumentId};

use super::flags::{Flags, GrimoireFlags};
use super::power::{PowerData, PowerModel, DEFAULT_DISCIPLINE, POWER_TYPE};

/// Top-level document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Actor,
    Item,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Actor => "Actor",
            Self::Item => "Item",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Actor" => Ok(Self::Actor),
            "Item" => Ok(Self::Item),
            _ => Err(DomainError::parse(format!("Unknown document kind: {}", s))),
        }
    }
}

/// Where a document is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentLocation {
    /// World-level collection
    World,
    /// Embedded in an owning actor, which itself lives in the world
    /// (`archive: None`) or in an archive
    Owned {
        parent: DocumentId,
        archive: Option<ArchiveId>,
    },
    /// Inside a distributable archive
    Archive { archive: ArchiveId },
}

impl DocumentLocation {
    /// Location of the items embedded in `parent`, stored at `parent_location`.
    pub fn owned_by(parent: DocumentId, parent_location: &DocumentLocation) -> Self {
        Self::Owned {
            parent,
            archive: parent_location.archive().cloned(),
        }
    }

    /// The archive whose lock governs writes here, if any.
    pub fn archive(&self) -> Option<&ArchiveId> {
        match self {
            Self::World => None,
            Self::Owned { archive, .. } => archive.as_ref(),
            Self::Archive { archive } => Some(archive),
        }
    }
}

impl fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::World => write!(f, "world"),
            Self::Owned {
                parent,
                archive: None,
            } => write!(f, "owned by {}", parent),
            Self::Owned {
                parent,
                archive: Some(archive),
            } => write!(f, "owned by {} in archive {}", parent, archive),
            Self::Archive { archive } => write!(f, "archive {}", archive),
        }
    }
}

/// Path to a field of the stored document, e.g. `system.discipline`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Split a dotted path. Use [`FieldPath::from_segments`] when a segment
    /// may itself contain dots.
    pub fn parse(dotted: &str) -> Self {
        Self(dotted.split('.').map(str::to_string).collect())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(root, |node, segment| node.as_object()?.get(segment))
    }

    /// Write `value`, creating intermediate objects. A non-object
    /// intermediate is replaced by an object.
    pub fn set(&self, root: &mut Value, value: Value) {
        let Some((last, parents)) = self.0.split_last() else {
            *root = value;
            return;
        };

        let mut node = root;
        for segment in parents {
            let Some(map) = ensure_object(node) else {
                return;
            };
            node = map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if let Some(map) = ensure_object(node) {
            map.insert(last.clone(), value);
        }
    }

    pub fn unset(&self, root: &mut Value) -> Option<Value> {
        let (last, parents) = self.0.split_last()?;
        let mut node = root;
        for segment in parents {
            node = node.as_object_mut()?.get_mut(segment)?;
        }
        node.as_object_mut()?.remove(last)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Replace a non-object node by an empty object. Always `Some` afterwards.
fn ensure_object(node: &mut Value) -> Option<&mut Map<String, Value>> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
}

/// One write against a stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set { path: FieldPath, value: Value },
    Unset { path: FieldPath },
}

/// Ordered set of writes against a stored document's raw source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    ops: Vec<UpdateOp>,
}

impl DocumentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: FieldPath, value: Value) -> Self {
        self.push_set(path, value);
        self
    }

    pub fn unset(mut self, path: FieldPath) -> Self {
        self.push_unset(path);
        self
    }

    pub fn push_set(&mut self, path: FieldPath, value: Value) {
        self.ops.push(UpdateOp::Set { path, value });
    }

    pub fn push_unset(&mut self, path: FieldPath) {
        self.ops.push(UpdateOp::Unset { path });
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// `None` when nothing would be written.
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    pub fn apply_to(&self, source: &mut Value) {
        for op in &self.ops {
            match op {
                UpdateOp::Set { path, value } => path.set(source, value.clone()),
                UpdateOp::Unset { path } => {
                    path.unset(source);
                }
            }
        }
    }
}

/// Run the schema normalizer registered for a document type.
///
/// Called by the persistence layer on every load, independent of the
/// versioned migrations.
pub fn normalize_system(
    kind: DocumentKind,
    doc_type: &str,
    system: Value,
) -> Result<Value, SchemaError> {
    match (kind, doc_type) {
        (DocumentKind::Item, POWER_TYPE) => PowerModel::migrate_data(system),
        _ if system.is_object() => Ok(system),
        _ => Ok(Value::Object(Map::new())),
    }
}

/// A materialized actor or item.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    kind: DocumentKind,
    location: DocumentLocation,
    doc_type: String,
    name: String,
    system: Value,
    flags: Flags,
    source: Value,
}

impl Document {
    /// Build a document from its stored JSON.
    pub fn materialize(
        kind: DocumentKind,
        location: DocumentLocation,
        source: Value,
    ) -> Result<Self, SchemaError> {
        let Some(fields) = source.as_object() else {
            return Err(SchemaError::NotAnObject(json_type_name(&source)));
        };

        let id = fields
            .get("_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(DocumentId::new)
            .ok_or(SchemaError::MissingId)?;
        let doc_type = string_field(fields, "type");
        let name = string_field(fields, "name");

        let raw_system = fields.get("system").cloned().unwrap_or(Value::Null);
        let mut system = normalize_system(kind, &doc_type, raw_system)?;
        prepare_defaults(kind, &doc_type, &mut system);

        let flags = fields.get("flags").map(Flags::from_value).unwrap_or_default();

        Ok(Self {
            id,
            kind,
            location,
            doc_type,
            name,
            system,
            flags,
            source,
        })
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn location(&self) -> &DocumentLocation {
        &self.location
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prepared type data: normalized and with computed defaults.
    pub fn system(&self) -> &Value {
        &self.system
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// Stored JSON exactly as loaded.
    pub fn source(&self) -> &Value {
        &self.source
    }

    pub fn source_value(&self, path: &FieldPath) -> Option<&Value> {
        path.get(&self.source)
    }

    pub fn is_power(&self) -> bool {
        self.kind == DocumentKind::Item && self.doc_type == POWER_TYPE
    }

    pub fn power_data(&self) -> Option<PowerData> {
        if !self.is_power() {
            return None;
        }
        PowerData::from_system(&self.system)
    }

    pub fn grimoire_flags(&self) -> GrimoireFlags {
        GrimoireFlags::from_flags(&self.flags)
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn prepare_defaults(kind: DocumentKind, doc_type: &str, system: &mut Value) {
    if kind == DocumentKind::Item && doc_type == POWER_TYPE {
        if let Some(fields) = system.as_object_mut() {
            fields
                .entry("discipline")
                .or_insert_with(|| Value::String(DEFAULT_DISCIPLINE.to_string()));
        }
    }
}
