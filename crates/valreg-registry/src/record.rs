//! Package records: the unit the registry stores.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::integrity::ContentHash;
use crate::version::VersionKey;

/// Longest accepted package name, in bytes. The store hex-encodes names
/// into a single path component, which most filesystems cap at 255 bytes.
pub const MAX_NAME_LEN: usize = 127;

/// A published validation package.
///
/// `name` plus the three version components form the primary key.
/// Everything else is opaque metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub name: String,
    pub major_version: u32,
    pub minor_version: u32,
    pub patch_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl PackageRecord {
    /// Create a record with no metadata.
    pub fn new(name: impl Into<String>, version: VersionKey) -> Self {
        PackageRecord {
            name: name.into(),
            major_version: version.major,
            minor_version: version.minor,
            patch_version: version.patch,
            description: None,
            content_hash: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_content_hash(mut self, hash: ContentHash) -> Self {
        self.content_hash = Some(hash);
        self
    }

    pub fn version(&self) -> VersionKey {
        VersionKey::new(self.major_version, self.minor_version, self.patch_version)
    }

    pub fn key(&self) -> PackageKey {
        PackageKey {
            name: self.name.clone(),
            version: self.version(),
        }
    }

    /// Check the fields the store depends on.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }
}

/// The primary key of a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageKey {
    pub name: String,
    pub version: VersionKey,
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Validate a package name.
///
/// Any non-empty text up to [`MAX_NAME_LEN`] UTF-8 bytes is a name. Names
/// are compared byte for byte, so `Foo` and `foo` are different packages.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RegistryError::InvalidRecord {
            detail: "package name is empty".to_string(),
        });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(RegistryError::InvalidRecord {
            detail: format!(
                "package name is {} bytes, limit is {MAX_NAME_LEN}",
                name.len()
            ),
        });
    }
    Ok(())
}
