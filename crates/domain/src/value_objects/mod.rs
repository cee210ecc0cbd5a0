//! Value objects shared across the domain.

mod semver;

pub use semver::{SemVer, SemVerParseError};
