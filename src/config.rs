use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::layout::FilterLayout;
use crate::data::loader::LoadOptions;

pub const APP_NAME: &str = "rusty-lens";
const CONFIG_FILE: &str = "config.toml";

/// User configuration, read from TOML. Every field has a default, so an
/// empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Column whose distribution is compared before and after filtering.
    pub target_column: String,
    /// CSV field separator; sniffed from the header when unset.
    pub delimiter: Option<char>,
    /// Rows shown in the before/after previews.
    pub preview_rows: usize,
    pub filters: FilterLayout,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_column: "y".to_string(),
            delimiter: None,
            preview_rows: 5,
            filters: FilterLayout::default(),
        }
    }
}

impl AppConfig {
    /// `<config_dir>/rusty-lens/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Load from `explicit` if given (it must exist), else from the default
    /// path if present, else the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                log::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_column.is_empty() {
            bail!("target_column must not be empty");
        }
        if let Some(d) = self.delimiter {
            if !d.is_ascii() {
                bail!("delimiter {d:?} is not an ASCII character");
            }
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            delimiter: self.delimiter.filter(char::is_ascii).map(|c| c as u8),
        }
    }

    /// The defaults rendered as TOML, for `--print-config`.
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }
}
