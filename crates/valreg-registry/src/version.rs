//! Version keys: the `(major, minor, patch)` triple that orders releases.
//!
//! Ordering is lexicographic over the three components compared as
//! integers, so `1.10.0 > 1.9.0` and `2.0.0 > 1.99.99`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// A release version. Field order gives the derived `Ord` its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionKey {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionKey {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        VersionKey {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionKey {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        parse_version(s)
    }
}

/// Parse a version string like "1.2.3".
///
/// Each segment must be a non-empty run of ASCII digits that fits in a
/// `u32`. Leading zeros are accepted; signs and whitespace are not.
pub fn parse_version(s: &str) -> Result<VersionKey> {
    let segments: Vec<&str> = s.split('.').collect();
    if segments.len() != 3 {
        return Err(malformed(
            s,
            format!("expected MAJOR.MINOR.PATCH, found {} segment(s)", segments.len()),
        ));
    }

    let major = parse_segment(s, "major", segments[0])?;
    let minor = parse_segment(s, "minor", segments[1])?;
    let patch = parse_segment(s, "patch", segments[2])?;
    Ok(VersionKey::new(major, minor, patch))
}

fn parse_segment(input: &str, label: &str, segment: &str) -> Result<u32> {
    if segment.is_empty() {
        return Err(malformed(input, format!("{label} component is empty")));
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(
            input,
            format!("{label} component '{segment}' is not a non-negative integer"),
        ));
    }
    segment
        .parse::<u32>()
        .map_err(|_| malformed(input, format!("{label} component '{segment}' is out of range")))
}

fn malformed(input: &str, reason: String) -> RegistryError {
    RegistryError::MalformedVersion {
        input: input.to_string(),
        reason,
    }
}
