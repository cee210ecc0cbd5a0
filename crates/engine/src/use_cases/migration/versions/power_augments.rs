//! 0.6.0: persist the power augment relocation and finish the discipline
//! rename.

use grimoire_domain::{Document, DocumentKind, DocumentUpdate, DomainError, FieldPath, PowerModel};

use crate::use_cases::migration::traversal::DocumentMigration;

/// Write the normalized `system` back when the stored power still has a
/// top-level `augments` field.
///
/// The normalizer already relocates augments on every load; this makes the
/// stored data match so the load-time work becomes a no-op.
pub struct PersistAugmentRelocation;

impl DocumentMigration for PersistAugmentRelocation {
    fn name(&self) -> &'static str {
        "persist-augment-relocation"
    }

    fn kind(&self) -> DocumentKind {
        DocumentKind::Item
    }

    fn applies_to(&self, document: &Document) -> bool {
        document.is_power()
    }

    fn plan(&self, document: &Document) -> Result<Option<DocumentUpdate>, DomainError> {
        let system = FieldPath::parse("system");
        let Some(stored) = document.source_value(&system) else {
            return Ok(None);
        };
        if stored.get("augments").is_none() {
            return Ok(None);
        }

        // Normalize the raw data, not the loaded view: computed defaults are
        // not persisted.
        let normalized = PowerModel::migrate_data(stored.clone())?;
        Ok(Some(DocumentUpdate::new().set(system, normalized)))
    }
}

/// Remove `system.school` from powers that already store a discipline.
pub struct DropStaleSchool;

impl DocumentMigration for DropStaleSchool {
    fn name(&self) -> &'static str {
        "drop-stale-school"
    }

    fn kind(&self) -> DocumentKind {
        DocumentKind::Item
    }

    fn applies_to(&self, document: &Document) -> bool {
        document.is_power()
    }

    fn plan(&self, document: &Document) -> Result<Option<DocumentUpdate>, DomainError> {
        let school = FieldPath::parse("system.school");
        let has_discipline = document
            .source_value(&FieldPath::parse("system.discipline"))
            .is_some_and(|value| !value.is_null());

        if has_discipline && document.source_value(&school).is_some() {
            return Ok(Some(DocumentUpdate::new().unset(school)));
        }
        Ok(None)
    }
}
