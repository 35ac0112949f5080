//! Subcommand implementations and the plumbing they share.

pub mod init;
pub mod list_domains;
pub mod results;
pub mod session;
pub mod simulate;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use adaptest_core::parser::{parse_catalog, validate_catalog};
use adaptest_core::{QuestionBank, SessionManager, SessionOptions};
use adaptest_store::{create_store, load_config_from, AdaptestConfig, StoreConfig};

/// Per-session stopping limits; unset flags fall back to the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionLimits {
    /// Maximum questions per session
    #[arg(long)]
    pub max_questions: Option<u32>,

    /// Minimum questions before any stopping rule applies
    #[arg(long)]
    pub min_questions: Option<u32>,

    /// Stop once the standard error is at or below this
    #[arg(long)]
    pub threshold: Option<f64>,
}

impl SessionLimits {
    pub fn apply(&self, mut options: SessionOptions) -> SessionOptions {
        if let Some(max) = self.max_questions {
            options.max_questions = max;
        }
        if let Some(min) = self.min_questions {
            options.min_questions = min;
        }
        if let Some(threshold) = self.threshold {
            options.confidence_threshold = threshold;
        }
        options
    }
}

/// Load a catalog into a bank, logging validation warnings.
pub fn load_bank(path: &Path) -> Result<QuestionBank> {
    let catalog = parse_catalog(path)?;
    for warning in validate_catalog(&catalog) {
        tracing::warn!("{}: {warning}", path.display());
    }
    QuestionBank::new(catalog).with_context(|| format!("invalid catalog: {}", path.display()))
}

/// The catalog from the flag, else from config.
pub fn catalog_path(flag: Option<PathBuf>, config: &AdaptestConfig) -> Result<PathBuf> {
    flag.or_else(|| config.catalog.clone()).context(
        "no catalog given: pass --catalog, set `catalog` in adaptest.toml, or set ADAPTEST_CATALOG",
    )
}

/// Config, bank and a session manager over the configured store.
pub fn open_manager(
    catalog: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<(AdaptestConfig, SessionManager)> {
    let config = load_config_from(config_path.as_deref())?;
    let bank = load_bank(&catalog_path(catalog, &config)?)?;

    if config.store == StoreConfig::Memory {
        tracing::warn!("memory store configured; sessions will not outlive this command");
    }
    let store = create_store(&config.store)?;
    tracing::debug!(store = store.name(), "session store ready");

    Ok((config, SessionManager::new(Arc::new(bank), store)))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}
