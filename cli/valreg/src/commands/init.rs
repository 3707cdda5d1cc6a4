//! `valreg init` — write a default configuration and storage root.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::{ValregConfig, CONFIG_FILE};

/// Initialise a registry in `dir`.
pub fn run(dir: &Path) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let template = ValregConfig::template();
    fs::write(&config_path, &template).with_context(|| format!("writing {CONFIG_FILE}"))?;

    let config = ValregConfig::parse(&template)?;
    let root = config.storage_root(dir);
    fs::create_dir_all(&root).with_context(|| format!("creating {}", root.display()))?;

    println!("Initialised registry in {}", dir.display());
    println!("  {}", config_path.display());
    println!("  {}/", root.display());
    Ok(())
}
