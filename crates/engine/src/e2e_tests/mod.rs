//! Engine E2E tests.
//!
//! These tests run the full migration flow using:
//! - A real SQLite store in a temporary directory
//! - Complete App construction with the shipped migrations
//!
//! # Running E2E Tests
//!
//! ```bash
//! cargo test -p grimoire-engine --lib e2e_tests
//! ```

mod e2e_helpers;

pub use e2e_helpers::*;
