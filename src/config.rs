//! TOML configuration for the `rdigest` binary.
//!
//! ```toml
//! [db]
//! path = "./data/rdigest.sqlite"
//!
//! [digest]
//! chunk_size = 1000
//! components_file = "components.json"
//! issues_file = "issues.json"
//! work_dir = "./data/reports"
//! delete_after_digest = true
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::components::COMPONENTS_FILE;
use crate::decoder::ISSUES_FILE;
use crate::digest::DigestOptions;
use crate::persist::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub digest: DigestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DigestConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_components_file")]
    pub components_file: String,
    #[serde(default = "default_issues_file")]
    pub issues_file: String,
    /// Where `submit` unpacks report archives.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_delete_after_digest")]
    pub delete_after_digest: bool,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            components_file: default_components_file(),
            issues_file: default_issues_file(),
            work_dir: default_work_dir(),
            delete_after_digest: default_delete_after_digest(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_components_file() -> String {
    COMPONENTS_FILE.to_string()
}
fn default_issues_file() -> String {
    ISSUES_FILE.to_string()
}
fn default_work_dir() -> PathBuf {
    PathBuf::from("./data/reports")
}
fn default_delete_after_digest() -> bool {
    true
}

impl DigestConfig {
    pub fn options(&self) -> DigestOptions {
        DigestOptions {
            chunk_size: self.chunk_size,
            components_file: self.components_file.clone(),
            issues_file: self.issues_file.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.digest.chunk_size == 0 {
        anyhow::bail!("digest.chunk_size must be > 0");
    }

    if config.digest.components_file.trim().is_empty() {
        anyhow::bail!("digest.components_file must not be empty");
    }

    if config.digest.issues_file.trim().is_empty() {
        anyhow::bail!("digest.issues_file must not be empty");
    }

    if config.digest.components_file == config.digest.issues_file {
        anyhow::bail!(
            "digest.components_file and digest.issues_file must differ (both '{}')",
            config.digest.issues_file
        );
    }

    Ok(config)
}
