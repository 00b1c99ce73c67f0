//! Semantic migration versions.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use docmigrate_core::MigrateError;
use serde::{Deserialize, Serialize};

/// A `major.minor.patch` migration version.
///
/// `Ord` is the full lexicographic order over all three components. The order
/// in which migrations actually run is [`Version::run_order_cmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The identifier under which this version is stored in the ledger.
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// Compares two versions for run ordering.
    ///
    /// Only `major` and `minor` take part; versions differing only in `patch`
    /// compare equal, so a stable sort keeps them in discovery order.
    pub fn run_order_cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MigrateError::Discovery(format!("Invalid version: {s}"));
        let mut parts = s.split('.');
        let mut next = || -> Result<u64, MigrateError> {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}
