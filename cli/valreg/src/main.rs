//! valreg CLI — command-line front end for the validation package registry.

mod commands;
mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use valreg_registry::LocalStore;

use config::ValregConfig;

#[derive(Parser)]
#[command(name = "valreg", version, about = "Validation package registry")]
struct Cli {
    /// Configuration file (default: nearest valreg.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Storage root, overriding the configured one
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default valreg.toml and storage root in the current directory
    Init,
    /// List every published package version
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the highest published version of a package
    Latest {
        /// Package name
        name: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Show an exact package version
    Get {
        /// Package name
        name: String,
        /// Version (MAJOR.MINOR.PATCH)
        version: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Publish a package record (requires an API key)
    Publish {
        /// JSON package record
        record: PathBuf,
        /// Package artifact; its SHA-256 is stored as the content hash
        #[arg(long)]
        file: Option<PathBuf>,
        /// Publish API key
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Verify a hash against a published package
    Verify {
        /// Package name
        name: String,
        /// Version (MAJOR.MINOR.PATCH)
        version: String,
        /// SHA-256 hex digest
        hash: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    let (config, base_dir) = load_config(cli.config.as_deref(), &cwd)?;
    logging::init(&config.log.filter)?;

    let root = match cli.root {
        Some(root) => cwd.join(root),
        None => config.storage_root(&base_dir),
    };
    tracing::debug!(root = %root.display(), "opening store");
    let store = LocalStore::new(root);

    match cli.command {
        Commands::Init => commands::init::run(&cwd),
        Commands::List { json } => commands::query::list(&store, json),
        Commands::Latest { name, json } => commands::query::latest(&store, &name, json),
        Commands::Get {
            name,
            version,
            json,
        } => commands::query::get(&store, &name, &version, json),
        Commands::Publish {
            record,
            file,
            api_key,
        } => commands::publish::run(
            &store,
            &config.auth,
            &record,
            file.as_deref(),
            api_key.as_deref(),
        )
        .map(|_| ()),
        Commands::Verify {
            name,
            version,
            hash,
        } => commands::verify::run(&name, &version, &hash),
    }
}

/// Load the explicit config, or the nearest `valreg.toml`, or defaults.
/// Returns the config and the directory relative paths resolve against.
fn load_config(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<(ValregConfig, PathBuf)> {
    if let Some(path) = explicit {
        let path = cwd.join(path);
        let config = ValregConfig::load(&path)?;
        let base = path.parent().map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);
        return Ok((config, base));
    }
    match ValregConfig::find_and_load(cwd)? {
        Some((config, dir)) => Ok((config, dir)),
        None => Ok((ValregConfig::default(), cwd.to_path_buf())),
    }
}
