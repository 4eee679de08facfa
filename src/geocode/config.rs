use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use ipe::providers::Strategy;

/// Optional TOML settings file. CLI flags override anything set here.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub strategy: Option<Strategy>,
    pub cache_file: Option<PathBuf>,
    pub flush_every: Option<usize>,
    pub viacep_url: Option<String>,
    pub nominatim_url: Option<String>,
    pub geocoder_url: Option<String>,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}
