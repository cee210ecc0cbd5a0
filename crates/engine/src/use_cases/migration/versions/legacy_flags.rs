//! Flag namespace rename: `grimoire-psionics` -> `grimoire`.
//!
//! 0.3.1 copies and leaves the legacy keys in place so older clients keep
//! reading them; 0.5.0 removes them.

use grimoire_domain::{
    Document, DocumentKind, DocumentUpdate, DomainError, FieldPath, LEGACY_NAMESPACE,
    SYSTEM_NAMESPACE,
};

use crate::use_cases::migration::traversal::DocumentMigration;

/// 0.3.1: copy every legacy key whose new counterpart is missing.
///
/// An existing new key is never overwritten.
pub struct CopyLegacyFlags;

impl DocumentMigration for CopyLegacyFlags {
    fn name(&self) -> &'static str {
        "copy-legacy-flags"
    }

    fn kind(&self) -> DocumentKind {
        DocumentKind::Actor
    }

    fn plan(&self, document: &Document) -> Result<Option<DocumentUpdate>, DomainError> {
        let flags = document.flags();
        let mut update = DocumentUpdate::new();

        for legacy in flags.keys_in(LEGACY_NAMESPACE) {
            let current = legacy.in_namespace(SYSTEM_NAMESPACE);
            if flags.contains(&current) {
                continue;
            }
            if let Some(value) = flags.get(&legacy) {
                update.push_set(current.path(), value.clone());
            }
        }

        Ok(update.into_option())
    }
}

/// 0.5.0: remove legacy keys that have been copied.
///
/// When nothing in the legacy namespace is left uncopied the whole
/// namespace is removed.
pub struct DropLegacyFlags;

impl DocumentMigration for DropLegacyFlags {
    fn name(&self) -> &'static str {
        "drop-legacy-flags"
    }

    fn kind(&self) -> DocumentKind {
        DocumentKind::Actor
    }

    fn plan(&self, document: &Document) -> Result<Option<DocumentUpdate>, DomainError> {
        let namespace = FieldPath::from_segments(["flags", LEGACY_NAMESPACE]);
        if document.source_value(&namespace).is_none() {
            return Ok(None);
        }

        let flags = document.flags();
        let (copied, uncopied): (Vec<_>, Vec<_>) = flags
            .keys_in(LEGACY_NAMESPACE)
            .into_iter()
            .partition(|legacy| flags.contains(&legacy.in_namespace(SYSTEM_NAMESPACE)));

        if uncopied.is_empty() {
            return Ok(Some(DocumentUpdate::new().unset(namespace)));
        }

        let mut update = DocumentUpdate::new();
        for legacy in copied {
            update.push_unset(legacy.path());
        }
        Ok(update.into_option())
    }
}
