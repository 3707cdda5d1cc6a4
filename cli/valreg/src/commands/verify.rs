//! `valreg verify` — hash verification (not yet supported).

use anyhow::Result;

/// Run `valreg verify <name> <version> <hash>`. Always fails with the
/// registry's `Unprocessable` error.
pub fn run(name: &str, version: &str, hash: &str) -> Result<()> {
    Ok(valreg_registry::verify(name, version, hash)?)
}
