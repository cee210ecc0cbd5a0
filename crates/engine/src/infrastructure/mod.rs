//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod clock;
pub mod documents;
pub mod leadership;
pub mod notifier;
pub mod ports;
pub mod settings;
