//! `adaptest.toml` configuration and the store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::session::SessionOptions;
use adaptest_core::store::{MemorySessionStore, SessionStore};

use crate::json_dir::JsonDirSessionStore;

/// Which session store to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local; sessions vanish on exit.
    Memory,
    /// One JSON file per session under `path`.
    JsonDir {
        #[serde(default = "default_store_dir")]
        path: PathBuf,
    },
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./adaptest-sessions")
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::JsonDir {
            path: default_store_dir(),
        }
    }
}

/// Top-level adaptest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptestConfig {
    /// Question catalog (JSON or TOML).
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub store: StoreConfig,
    /// Defaults for new sessions.
    #[serde(default)]
    pub session: SessionOptions,
    /// Max concurrently simulated examinees.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

fn default_parallelism() -> usize {
    4
}

impl Default for AdaptestConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            store: StoreConfig::default(),
            session: SessionOptions::default(),
            parallelism: default_parallelism(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables resolve to the empty string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(offset) = result[from..].find("${") {
        let start = from + offset;
        let Some(len) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + len];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + len + 1..]);
        from = start + value.len();
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment variable overrides: `ADAPTEST_CATALOG`, `ADAPTEST_STORE_DIR`.
pub fn load_config() -> Result<AdaptestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("adaptest.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AdaptestConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AdaptestConfig::default(),
    };

    if let Ok(catalog) = std::env::var("ADAPTEST_CATALOG") {
        config.catalog = Some(PathBuf::from(catalog));
    }
    if let Ok(dir) = std::env::var("ADAPTEST_STORE_DIR") {
        config.store = StoreConfig::JsonDir {
            path: PathBuf::from(dir),
        };
    }

    config.catalog = config.catalog.as_deref().map(resolve_path);
    if let StoreConfig::JsonDir { path } = &mut config.store {
        *path = resolve_path(path);
    }

    tracing::debug!(
        source = ?config_path,
        store = ?config.store,
        "configuration loaded"
    );
    Ok(config)
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}

/// Create a session store from its configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn SessionStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemorySessionStore::new())),
        StoreConfig::JsonDir { path } => Ok(Arc::new(JsonDirSessionStore::new(path)?)),
    }
}
