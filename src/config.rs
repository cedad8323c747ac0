use crate::errors::{AppError, AppResult};
use crate::sort::SortPreset;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PAGE_SIZE: u32 = 9;
const MIN_PAGE_SIZE: u32 = 1;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedConfig {
    pub page_size: u32,
    pub default_sort: SortPreset,
    pub database_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            default_sort: SortPreset::Newest,
            database_path: None,
            log_dir: None,
            log_filter: "info".to_string(),
        }
    }
}

impl FeedConfig {
    /// Reads a YAML config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "feed config not found, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading feed config {}", path.display()))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> AppResult<Self> {
        let config: FeedConfig = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(AppError::Config(format!(
                "pageSize must be between {} and {}, got {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.log_filter.trim().is_empty() {
            return Err(AppError::Config("logFilter must not be empty".to_string()));
        }
        Ok(())
    }
}
