//! Semantic version value object
//!
//! Schema versions are compared component by component as numbers, so
//! `0.10.0` is newer than `0.9.9` even though it sorts lower as text.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error when parsing a version string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemVerParseError {
    /// The version string is empty
    #[error("Empty version string")]
    Empty,
    /// More than three dot-separated components
    #[error("Too many version components in '{0}'")]
    TooManyComponents(String),
    /// A component is not a non-negative integer
    #[error("Invalid version component '{component}' in '{input}'")]
    InvalidComponent { input: String, component: String },
}

/// A `major.minor.patch` version.
///
/// Ordering is derived field by field, which gives numeric (not lexical)
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    /// `0.0.0`, the marker value of a world that never migrated.
    pub const ZERO: SemVer = SemVer::new(0, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string like "1.2.3", "v0.4" or "2".
    ///
    /// Missing components are treated as zero.
    pub fn parse(input: &str) -> Result<Self, SemVerParseError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(SemVerParseError::Empty);
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() > 3 {
            return Err(SemVerParseError::TooManyComponents(input.to_string()));
        }

        let mut components = [0u64; 3];
        for (slot, part) in components.iter_mut().zip(parts.iter()) {
            *slot = part
                .parse::<u64>()
                .map_err(|_| SemVerParseError::InvalidComponent {
                    input: input.to_string(),
                    component: (*part).to_string(),
                })?;
        }

        Ok(Self::new(components[0], components[1], components[2]))
    }

    pub fn is_newer_than(&self, other: &SemVer) -> bool {
        self > other
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = SemVerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SemVer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
