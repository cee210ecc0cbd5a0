//! Persisted entities and the data they carry.

mod document;
mod flags;
mod power;

pub use document::{
    normalize_system, Document, DocumentKind, DocumentLocation, DocumentUpdate, FieldPath,
    UpdateOp,
};
pub use flags::{FlagKey, Flags, GrimoireFlags, LEGACY_NAMESPACE, SYSTEM_NAMESPACE};
pub use power::{
    Augment, PowerAction, PowerData, PowerModel, DEFAULT_DISCIPLINE, POWER_TYPE,
};
