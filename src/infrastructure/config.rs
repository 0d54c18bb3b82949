// Loading trace options from a `constable.toml` file.
//
//     [trace]
//     watch = ["a", "b"]
//     verbose = false
//     max_len = 40

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::options::{OptionValue, TraceOptions};

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub trace: toml::Table,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid constable config")
    }

    /// Defaults overridden by every key of the `[trace]` table.
    pub fn options(&self) -> crate::error::Result<TraceOptions> {
        let mut options = TraceOptions::default();
        for (key, value) in &self.trace {
            options.apply(key, OptionValue::from_toml(value))?;
        }
        Ok(options)
    }
}

pub fn load_options(path: &Path) -> Result<TraceOptions> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config {}", path.display()))?;
    let config = ConfigFile::parse(&text)?;
    config
        .options()
        .with_context(|| format!("Invalid option in {}", path.display()))
}
