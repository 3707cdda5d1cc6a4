//! `valreg publish` — the only write path, gated by an API key.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use valreg_registry::{ContentHash, PackageRecord, PackageStore};

use crate::config::AuthConfig;

/// Run `valreg publish <record.json> [--file <path>] [--api-key <key>]`.
///
/// The key is checked before anything is read or written. When `attachment`
/// is given its SHA-256 becomes the record's content hash.
pub fn run(
    store: &dyn PackageStore,
    auth: &AuthConfig,
    record_path: &Path,
    attachment: Option<&Path>,
    api_key: Option<&str>,
) -> Result<PackageRecord> {
    authorize(auth, auth.resolve_key().as_deref(), api_key)?;

    let content = fs::read_to_string(record_path)
        .with_context(|| format!("reading {}", record_path.display()))?;
    let mut record: PackageRecord = serde_json::from_str(&content)
        .with_context(|| format!("parsing package record {}", record_path.display()))?;

    if let Some(path) = attachment {
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let hash = ContentHash::compute(&data);
        if let Some(declared) = &record.content_hash {
            if *declared != hash {
                bail!(
                    "content hash mismatch for {}: record declares {declared}, \
                     file hashes to {hash}",
                    path.display()
                );
            }
        }
        record.content_hash = Some(hash);
    }

    store.publish(&record)?;
    println!("Published {}", record.key());
    Ok(record)
}

/// Check the presented key against the configured one.
pub(crate) fn authorize(
    auth: &AuthConfig,
    expected: Option<&str>,
    presented: Option<&str>,
) -> Result<()> {
    let Some(expected) = expected else {
        bail!(
            "unauthorized: no publish key configured (set {} or [auth] api-key)",
            auth.api_key_env
        );
    };
    match presented {
        None => bail!("unauthorized: publishing requires --api-key"),
        Some(key) if keys_match(expected, key) => Ok(()),
        Some(_) => bail!("unauthorized: invalid API key"),
    }
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(expected: &str, presented: &str) -> bool {
    expected.len() == presented.len()
        && expected
            .bytes()
            .zip(presented.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
