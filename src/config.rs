use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs::home_dir;
use serde::Deserialize;
use tokio::fs;

use crate::query::{SortKey, SortOrder};

/// Default number of files parsed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Optional defaults for the list command, read from `config.toml` / `config.json`.
///
/// Every field is optional; command-line flags always take precedence.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ListConfig {
    pub dir: Option<String>,
    pub limit: Option<i64>,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
    pub concurrency: Option<usize>,
    /// Set to `false` to never emit ANSI styling.
    pub color: Option<bool>,
    pub full: Option<bool>,
}

impl ListConfig {
    pub fn concurrency(&self) -> usize {
        self.concurrency
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CONCURRENCY)
    }
}

/// codex-history's own home (config lives here): `$CODEX_HISTORY_HOME` or `~/.codex-history`.
pub fn history_home_dir() -> PathBuf {
    if let Ok(dir) = env::var("CODEX_HISTORY_HOME")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codex-history")
}

fn config_toml_path() -> PathBuf {
    history_home_dir().join("config.toml")
}

fn config_json_path() -> PathBuf {
    history_home_dir().join("config.json")
}

fn codex_home() -> PathBuf {
    if let Ok(dir) = env::var("CODEX_HOME")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codex")
}

/// Directory where Codex stores conversation sessions: `~/.codex/sessions` (or `$CODEX_HOME/sessions`).
pub fn codex_sessions_dir() -> PathBuf {
    codex_home().join("sessions")
}

/// Resolve a user supplied session directory.
///
/// `None` falls back to [`codex_sessions_dir`]. A leading `~` is replaced by the home
/// directory; other relative paths are anchored at the current directory.
pub fn resolve_sessions_dir(dir: Option<&str>) -> Result<PathBuf> {
    let Some(dir) = dir else {
        return Ok(codex_sessions_dir());
    };
    if let Some(rest) = dir.strip_prefix('~') {
        let home = home_dir().context("failed to resolve home directory for `~`")?;
        let rest = rest.trim_start_matches(['/', '\\']);
        return Ok(if rest.is_empty() {
            home
        } else {
            home.join(rest)
        });
    }
    std::path::absolute(Path::new(dir))
        .with_context(|| format!("failed to resolve session directory {:?}", dir))
}

/// Load list defaults. `config.toml` wins over `config.json`; neither present means defaults.
pub async fn load_config() -> Result<ListConfig> {
    load_config_from(&config_toml_path(), &config_json_path()).await
}

async fn load_config_from(toml_path: &Path, json_path: &Path) -> Result<ListConfig> {
    if toml_path.exists() {
        let text = fs::read_to_string(toml_path)
            .await
            .with_context(|| format!("failed to read {:?}", toml_path))?;
        let cfg = toml::from_str::<ListConfig>(&text)
            .with_context(|| format!("failed to parse {:?}", toml_path))?;
        return Ok(cfg);
    }

    if json_path.exists() {
        let bytes = fs::read(json_path)
            .await
            .with_context(|| format!("failed to read {:?}", json_path))?;
        let cfg = serde_json::from_slice::<ListConfig>(&bytes)
            .with_context(|| format!("failed to parse {:?}", json_path))?;
        return Ok(cfg);
    }

    Ok(ListConfig::default())
}
