//! Grimoire Engine - Main entry point.
//!
//! Opens the world database and brings stored documents up to this build's
//! schema version.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grimoire_domain::SemVer;
use grimoire_engine::app::{App, Repositories};
use grimoire_engine::infrastructure::{
    clock::SystemClock, documents::SqliteDocumentStore, leadership::StaticLeadership,
    notifier::TracingNotifier, ports::ClockPort, settings::SqliteSettingsRepo,
};
use grimoire_engine::use_cases::migration::MigrationRun;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the binary may be started from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grimoire_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let db_path = std::env::var("GRIMOIRE_DB").unwrap_or_else(|_| "grimoire.db".into());
    let is_leader = std::env::var("GRIMOIRE_LEADER")
        .map(|value| !matches!(value.trim(), "0" | "false" | "no"))
        .unwrap_or(true);
    let target = match std::env::var("GRIMOIRE_TARGET_VERSION") {
        Ok(value) => SemVer::parse(&value)
            .with_context(|| format!("GRIMOIRE_TARGET_VERSION '{}' is not a version", value))?,
        Err(_) => SemVer::parse(env!("CARGO_PKG_VERSION"))?,
    };

    tracing::info!(db = %db_path, target = %target, leader = is_leader, "Starting Grimoire Engine");

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
    let store = Arc::new(SqliteDocumentStore::new(&db_path, clock.clone()).await?);
    let settings = Arc::new(SqliteSettingsRepo::new(&db_path, clock).await?);

    let app = App::new(
        Repositories {
            documents: store.clone(),
            archives: store,
            settings,
        },
        Arc::new(StaticLeadership::new(is_leader)),
        Arc::new(TracingNotifier),
        target,
    )?;

    match app.use_cases.migration.runner.run_migrations().await? {
        MigrationRun::Halted { failed, error, .. } => {
            anyhow::bail!("migration {} failed: {}", failed, error)
        }
        run => {
            tracing::info!(applied = run.applied().len(), "Migrations finished");
        }
    }

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
