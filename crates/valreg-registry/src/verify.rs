//! Package verification.
//!
//! Checking a submitted hash against a published package is not supported
//! yet: every request is answered with [`RegistryError::Unprocessable`]
//! without consulting storage.

use tracing::debug;

use crate::error::{RegistryError, Result};

/// Verify `hash` against the package `name@version`.
pub fn verify(name: &str, version: &str, hash: &str) -> Result<()> {
    debug!(package = name, version, hash, "verification requested");
    Err(RegistryError::Unprocessable {
        name: name.to_string(),
        version: version.to_string(),
    })
}
