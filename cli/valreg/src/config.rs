//! `valreg.toml` parsing and registry configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the configuration file searched for from the working directory upward.
pub const CONFIG_FILE: &str = "valreg.toml";

/// The top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValregConfig {
    /// Storage settings.
    #[serde(default)]
    pub registry: StorageConfig,
    /// Publish authorization settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// `[registry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root. Relative paths resolve against the config file's directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            root: default_root(),
        }
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the publish key.
    #[serde(default = "default_api_key_env", rename = "api-key-env")]
    pub api_key_env: String,
    /// Inline publish key, used when the environment variable is unset.
    #[serde(default, rename = "api-key")]
    pub api_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            api_key_env: default_api_key_env(),
            api_key: None,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: default_filter(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".valreg")
}

fn default_api_key_env() -> String {
    "VALREG_API_KEY".to_string()
}

fn default_filter() -> String {
    "info".to_string()
}

impl ValregConfig {
    /// Parse a configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).with_context(|| format!("parsing {CONFIG_FILE}"))
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Search upward from `start_dir` for a `valreg.toml` file, parse and return it
    /// along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Ok(Some((Self::load(&candidate)?, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// The storage root, resolved against `base_dir` when relative.
    pub fn storage_root(&self, base_dir: &Path) -> PathBuf {
        if self.registry.root.is_absolute() {
            self.registry.root.clone()
        } else {
            base_dir.join(&self.registry.root)
        }
    }

    /// Generate the default template for `valreg init`.
    pub fn template() -> String {
        r#"[registry]
root = ".valreg"

[auth]
api-key-env = "VALREG_API_KEY"

[log]
filter = "info"
"#
        .to_string()
    }
}

impl AuthConfig {
    /// The configured publish key. A non-empty environment variable wins
    /// over the inline key.
    pub fn resolve_key(&self) -> Option<String> {
        self.resolve_key_with(|var| std::env::var(var).ok())
    }

    pub(crate) fn resolve_key_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        lookup(&self.api_key_env)
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone().filter(|key| !key.is_empty()))
    }
}
