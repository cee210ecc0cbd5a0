//! SQLite-backed document and archive storage.
//!
//! Documents are stored as raw JSON, one row per document, keyed by the
//! collection they live in. Loading goes through `Document::materialize`, so
//! the schema normalizer runs on every read, including archive snapshots.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use grimoire_domain::{
    ArchiveId, Document, DocumentId, DocumentKind, DocumentLocation, DocumentUpdate, SchemaError,
};

use crate::infrastructure::ports::{
    ArchiveInfo, ArchiveRepo, ClockPort, DocumentRepo, InvalidDocument, Materialized, RepoError,
};

/// SQLite implementation of the document and archive ports.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

/// Collection key of a location: `world`, `owned:<parent>`, `archive:<id>`
/// or `archive:<id>/owned:<parent>` for items of an archived actor.
fn scope_of(location: &DocumentLocation) -> String {
    match location {
        DocumentLocation::World => "world".to_string(),
        DocumentLocation::Owned {
            parent,
            archive: None,
        } => format!("owned:{}", parent),
        DocumentLocation::Owned {
            parent,
            archive: Some(archive),
        } => format!("archive:{}/owned:{}", archive, parent),
        DocumentLocation::Archive { archive } => format!("archive:{}", archive),
    }
}

impl SqliteDocumentStore {
    pub async fn new(db_path: &str, clock: Arc<dyn ClockPort>) -> Result<Self, RepoError> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .map_err(|e| RepoError::database("documents", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                scope TEXT NOT NULL,
                id TEXT NOT NULL,
                kind TEXT NOT NULL,
                source_json TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (scope, id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("documents", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS archives (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                kind TEXT NOT NULL,
                locked INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("archives", e))?;

        Ok(Self { pool, clock })
    }

    /// Store a new document at a location. The id is taken from `_id`.
    pub async fn insert(
        &self,
        location: &DocumentLocation,
        kind: DocumentKind,
        source: &Value,
    ) -> Result<DocumentId, RepoError> {
        let id = source
            .get("_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(DocumentId::new)
            .ok_or_else(|| RepoError::constraint("document source has no _id"))?;
        let json = serde_json::to_string(source).map_err(RepoError::serialization)?;

        sqlx::query(
            "INSERT INTO documents (scope, id, kind, source_json, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(scope_of(location))
        .bind(id.as_str())
        .bind(kind.as_str())
        .bind(json)
        .bind(self.clock.now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("documents.insert", e))?;

        Ok(id)
    }

    /// Store a row verbatim, bypassing JSON validation.
    #[cfg(test)]
    pub async fn insert_raw(
        &self,
        location: &DocumentLocation,
        kind: DocumentKind,
        id: &str,
        source_json: &str,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO documents (scope, id, kind, source_json, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(scope_of(location))
        .bind(id)
        .bind(kind.as_str())
        .bind(source_json)
        .bind(self.clock.now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("documents.insert_raw", e))?;
        Ok(())
    }

    pub async fn create_archive(&self, archive: &ArchiveInfo) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO archives (id, label, kind, locked) VALUES (?, ?, ?, ?)")
            .bind(archive.id.as_str())
            .bind(&archive.label)
            .bind(archive.kind.as_str())
            .bind(archive.locked)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("archives.create", e))?;
        Ok(())
    }

    /// Raw stored JSON of a document, without normalization.
    pub async fn load_source(
        &self,
        location: &DocumentLocation,
        id: &DocumentId,
    ) -> Result<Option<Value>, RepoError> {
        let row = sqlx::query("SELECT source_json FROM documents WHERE scope = ? AND id = ?")
            .bind(scope_of(location))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("documents.load_source", e))?;

        row.map(|row| {
            let json: String = row.get("source_json");
            serde_json::from_str(&json).map_err(RepoError::serialization)
        })
        .transpose()
    }

    async fn list_scope(
        &self,
        location: DocumentLocation,
        kind: Option<DocumentKind>,
    ) -> Result<Vec<Materialized>, RepoError> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    "SELECT id, kind, source_json FROM documents WHERE scope = ? AND kind = ? ORDER BY rowid",
                )
                .bind(scope_of(&location))
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, kind, source_json FROM documents WHERE scope = ? ORDER BY rowid",
                )
                .bind(scope_of(&location))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| RepoError::database("documents.list", e))?;

        rows.iter()
            .map(|row| materialize_row(row, &location))
            .collect()
    }

    async fn is_locked(&self, archive: &ArchiveId) -> Result<bool, RepoError> {
        let row = sqlx::query("SELECT locked FROM archives WHERE id = ?")
            .bind(archive.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("archives.is_locked", e))?
            .ok_or_else(|| RepoError::not_found("Archive", archive))?;
        Ok(row.get::<bool, _>("locked"))
    }
}

/// Load one row. Repository failures are errors; corrupt documents are
/// reported as `InvalidDocument` values.
fn materialize_row(row: &SqliteRow, location: &DocumentLocation) -> Result<Materialized, RepoError> {
    let id = DocumentId::new(row.get::<String, _>("id"));
    let kind: DocumentKind = row
        .get::<String, _>("kind")
        .parse()
        .map_err(RepoError::serialization)?;
    let json: String = row.get("source_json");

    let invalid = |error: SchemaError| InvalidDocument {
        id: id.clone(),
        location: location.clone(),
        error,
    };

    let source: Value = match serde_json::from_str(&json) {
        Ok(source) => source,
        Err(e) => return Ok(Err(invalid(SchemaError::InvalidJson(e.to_string())))),
    };

    Ok(Document::materialize(kind, location.clone(), source).map_err(invalid))
}

#[async_trait]
impl DocumentRepo for SqliteDocumentStore {
    async fn list_world(&self, kind: DocumentKind) -> Result<Vec<Materialized>, RepoError> {
        self.list_scope(DocumentLocation::World, Some(kind)).await
    }

    async fn list_owned(&self, owner: &DocumentLocation) -> Result<Vec<Materialized>, RepoError> {
        if !matches!(owner, DocumentLocation::Owned { .. }) {
            return Err(RepoError::constraint(format!(
                "{} is not an owned location",
                owner
            )));
        }
        self.list_scope(owner.clone(), Some(DocumentKind::Item)).await
    }

    async fn update(&self, document: &Document, update: &DocumentUpdate) -> Result<(), RepoError> {
        if let Some(archive) = document.location().archive() {
            if self.is_locked(archive).await? {
                return Err(RepoError::ArchiveLocked(archive.clone()));
            }
        }

        let scope = scope_of(document.location());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("documents.update", e))?;

        let row = sqlx::query("SELECT source_json FROM documents WHERE scope = ? AND id = ?")
            .bind(&scope)
            .bind(document.id().as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepoError::database("documents.update", e))?
            .ok_or_else(|| RepoError::not_found("Document", document.id()))?;

        let json: String = row.get("source_json");
        let mut source: Value = serde_json::from_str(&json).map_err(RepoError::serialization)?;
        update.apply_to(&mut source);
        let json = serde_json::to_string(&source).map_err(RepoError::serialization)?;

        sqlx::query(
            "UPDATE documents SET source_json = ?, updated_at = ? WHERE scope = ? AND id = ?",
        )
        .bind(json)
        .bind(self.clock.now().to_rfc3339())
        .bind(&scope)
        .bind(document.id().as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepoError::database("documents.update", e))?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("documents.update", e))?;
        Ok(())
    }
}

#[async_trait]
impl ArchiveRepo for SqliteDocumentStore {
    async fn list_archives(&self) -> Result<Vec<ArchiveInfo>, RepoError> {
        let rows = sqlx::query("SELECT id, label, kind, locked FROM archives ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("archives.list", e))?;

        rows.iter()
            .map(|row| {
                Ok(ArchiveInfo {
                    id: ArchiveId::new(row.get::<String, _>("id")),
                    label: row.get("label"),
                    kind: row
                        .get::<String, _>("kind")
                        .parse()
                        .map_err(RepoError::serialization)?,
                    locked: row.get("locked"),
                })
            })
            .collect()
    }

    async fn list_entries(&self, archive: &ArchiveId) -> Result<Vec<Materialized>, RepoError> {
        // Fails with NotFound for unknown archives.
        self.is_locked(archive).await?;
        self.list_scope(
            DocumentLocation::Archive {
                archive: archive.clone(),
            },
            None,
        )
        .await
    }

    async fn set_locked(&self, archive: &ArchiveId, locked: bool) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE archives SET locked = ? WHERE id = ?")
            .bind(locked)
            .bind(archive.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("archives.set_locked", e))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("Archive", archive));
        }
        Ok(())
    }
}
