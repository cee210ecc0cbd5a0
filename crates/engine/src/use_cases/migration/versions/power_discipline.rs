//! 0.4.1: power `system.school` is renamed to `system.discipline`.

use grimoire_domain::{
    Document, DocumentKind, DocumentUpdate, DomainError, FieldPath, DEFAULT_DISCIPLINE,
};
use serde_json::Value;

use crate::use_cases::migration::traversal::DocumentMigration;

/// Copy a stored school into discipline, or default it.
///
/// Raw stored fields are inspected: the loaded view always carries a
/// computed discipline. The school itself is removed in 0.6.0.
pub struct RenameSchoolToDiscipline;

impl DocumentMigration for RenameSchoolToDiscipline {
    fn name(&self) -> &'static str {
        "rename-school-to-discipline"
    }

    fn kind(&self) -> DocumentKind {
        DocumentKind::Item
    }

    fn applies_to(&self, document: &Document) -> bool {
        document.is_power()
    }

    fn plan(&self, document: &Document) -> Result<Option<DocumentUpdate>, DomainError> {
        let Some(school) = document.source_value(&FieldPath::parse("system.school")) else {
            return Ok(None);
        };
        let discipline = FieldPath::parse("system.discipline");
        if document.source_value(&discipline).is_some() {
            return Ok(None);
        }

        let value = if is_truthy(school) {
            school.clone()
        } else {
            Value::String(DEFAULT_DISCIPLINE.to_string())
        };
        Ok(Some(DocumentUpdate::new().set(discipline, value)))
    }
}

/// Truthiness as stored documents were written with it in mind.
pub(super) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
