//! Read commands: `list`, `latest`, `get`.

use anyhow::{bail, Result};
use valreg_registry::{PackageRecord, PackageStore};

/// Run `valreg list`.
pub fn list(store: &dyn PackageStore, json: bool) -> Result<()> {
    let records = store.list_all()?;
    print!("{}", render_list(&records, json)?);
    Ok(())
}

/// Run `valreg latest <name>`.
pub fn latest(store: &dyn PackageStore, name: &str, json: bool) -> Result<()> {
    match store.get_latest(name)? {
        Some(record) => {
            print!("{}", render_record(&record, json)?);
            Ok(())
        }
        None => bail!("no such package: '{name}'"),
    }
}

/// Run `valreg get <name> <version>`.
pub fn get(store: &dyn PackageStore, name: &str, version: &str, json: bool) -> Result<()> {
    match store.get_exact_str(name, version)? {
        Some(record) => {
            print!("{}", render_record(&record, json)?);
            Ok(())
        }
        None => bail!("no such version: '{name}@{version}'"),
    }
}

pub(crate) fn render_list(records: &[PackageRecord], json: bool) -> Result<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(records)?));
    }
    if records.is_empty() {
        return Ok("No packages published.\n".to_string());
    }
    let width = records.iter().map(|r| r.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for record in records {
        let line = format!("{:<width$}  {}", record.name, record.version());
        match &record.description {
            Some(desc) => out.push_str(&format!("{line}  {desc}\n")),
            None => out.push_str(&format!("{line}\n")),
        }
    }
    Ok(out)
}

pub(crate) fn render_record(record: &PackageRecord, json: bool) -> Result<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(record)?));
    }
    let mut out = format!("{} v{}\n", record.name, record.version());
    if let Some(desc) = &record.description {
        out.push_str(&format!("  description: {desc}\n"));
    }
    if let Some(hash) = &record.content_hash {
        out.push_str(&format!("  sha256: {hash}\n"));
    }
    for (key, value) in &record.metadata {
        out.push_str(&format!("  {key}: {value}\n"));
    }
    Ok(out)
}
