//! Optimistic concurrency versions.

use serde::{Deserialize, Serialize};

/// A monotonically increasing version for optimistically locked rows.
///
/// Rows are created at version 1. Writers submit the version they read and
/// the store only applies the update if the stored version still matches;
/// a mismatch means another writer committed first and the caller must
/// re-read and retry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a freshly created row.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the version as an i64.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_is_one() {
        assert_eq!(Version::first().as_i64(), 1);
    }

    #[test]
    fn next_increments() {
        let v = Version::first();
        assert_eq!(v.next().as_i64(), 2);
        assert_eq!(v.next().next().as_i64(), 3);
    }

    #[test]
    fn versions_are_ordered() {
        assert!(Version::first() < Version::first().next());
        assert!(Version::new(10) > Version::new(9));
    }

    #[test]
    fn version_display() {
        assert_eq!(Version::new(7).to_string(), "7");
    }
}
