//! Grimoire domain.
//!
//! Pure, synchronous types for persisted actors and items: the document
//! model, the flag store, schema versions and the load-time normalizer.
//! Nothing in this crate performs I/O.

pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

pub use entities::{
    normalize_system, Augment, Document, DocumentKind, DocumentLocation, DocumentUpdate,
    FieldPath, FlagKey, Flags, GrimoireFlags, PowerAction, PowerData, PowerModel, UpdateOp,
    DEFAULT_DISCIPLINE, LEGACY_NAMESPACE, POWER_TYPE, SYSTEM_NAMESPACE,
};
pub use error::{DomainError, SchemaError};
pub use ids::{ArchiveId, DocumentId};
pub use value_objects::{SemVer, SemVerParseError};
