//! Storage and resolution engine for the validation package registry.
//!
//! Packages are immutable records keyed by a name plus a
//! `major.minor.patch` version. The engine supports four operations:
//! list everything, resolve the latest version of a name, resolve an exact
//! version, and publish a new version. Publishing is append-only and
//! atomic: a key can be published exactly once, even under concurrent
//! publishers.
//!
//! Authorization and transport are the caller's concern.

pub mod error;
pub mod integrity;
pub mod record;
pub mod store;
pub mod verify;
pub mod version;

// Re-exports for convenience.
pub use error::{RegistryError, Result};
pub use integrity::ContentHash;
pub use record::{validate_name, PackageKey, PackageRecord};
pub use store::{LocalStore, PackageStore};
pub use verify::verify;
pub use version::{parse_version, VersionKey};
