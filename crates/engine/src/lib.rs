//! Grimoire engine library.
//!
//! Runs versioned schema migrations over stored actors and items.
//!
//! ## Structure
//!
//! - `use_cases/` - Migration runner, registry, traversal and the shipped versions
//! - `infrastructure/` - External dependency implementations (ports + adapters)
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod use_cases;

/// E2E tests against a real SQLite store.
#[cfg(test)]
mod e2e_tests;

pub use app::App;
