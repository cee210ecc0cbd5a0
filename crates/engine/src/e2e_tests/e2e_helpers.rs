//! Shared setup for E2E tests.

use std::sync::Arc;

use grimoire_domain::{DocumentId, DocumentKind, DocumentLocation, SemVer};
use serde_json::Value;
use tempfile::TempDir;

use crate::app::{App, Repositories};
use crate::infrastructure::clock::FixedClock;
use crate::infrastructure::documents::SqliteDocumentStore;
use crate::infrastructure::leadership::StaticLeadership;
use crate::infrastructure::notifier::TracingNotifier;
use crate::infrastructure::ports::{ClockPort, SettingsRepo};
use crate::infrastructure::settings::SqliteSettingsRepo;
use crate::use_cases::migration::{MARKER_KEY, MARKER_NAMESPACE};

/// App wired to a throwaway SQLite database.
pub struct E2ETestContext {
    pub app: App,
    pub store: Arc<SqliteDocumentStore>,
    pub settings: Arc<SqliteSettingsRepo>,
    // Keeps the database directory alive for the duration of the test.
    _dir: TempDir,
}

impl E2ETestContext {
    pub async fn setup(target: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("world.db");
        let db_path = db_path.to_string_lossy();

        let clock: Arc<dyn ClockPort> = Arc::new(FixedClock::at_unix(1_714_564_800));
        let store = Arc::new(SqliteDocumentStore::new(&db_path, clock.clone()).await?);
        let settings = Arc::new(SqliteSettingsRepo::new(&db_path, clock).await?);

        let repositories = Repositories {
            documents: store.clone(),
            archives: store.clone(),
            settings: settings.clone(),
        };
        let app = App::new(
            repositories,
            Arc::new(StaticLeadership::new(true)),
            Arc::new(TracingNotifier),
            SemVer::parse(target)?,
        )?;

        Ok(Self {
            app,
            store,
            settings,
            _dir: dir,
        })
    }

    pub async fn insert(&self, location: DocumentLocation, kind: DocumentKind, source: Value) -> DocumentId {
        self.store
            .insert(&location, kind, &source)
            .await
            .expect("Inserting a document should succeed")
    }

    /// Raw stored JSON, bypassing normalization.
    pub async fn raw(&self, location: DocumentLocation, id: &str) -> Value {
        self.store
            .load_source(&location, &DocumentId::new(id))
            .await
            .expect("Loading a document should succeed")
            .expect("Document should exist")
    }

    pub async fn marker(&self) -> Option<String> {
        self.settings
            .get(MARKER_NAMESPACE, MARKER_KEY)
            .await
            .expect("Reading the marker should succeed")
    }

    pub async fn set_marker(&self, value: &str) {
        self.settings
            .set(MARKER_NAMESPACE, MARKER_KEY, value)
            .await
            .expect("Writing the marker should succeed");
    }
}
