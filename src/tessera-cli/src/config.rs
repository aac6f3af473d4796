//! Configuration management
//!
//! Optional TOML file:
//!
//! ```toml
//! language = "fra"
//!
//! [engine]
//! program = "/usr/local/bin/tesseract"
//! timeout_secs = 60
//! temp_dir = "/var/tmp"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tessera_ocr::EngineConfig;

/// CLI configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Default recognition language (e.g. "eng", "fra")
    pub language: Option<String>,

    #[serde(default)]
    pub engine: EngineSection,
}

/// `[engine]` table
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Engine binary, looked up on PATH when not absolute
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Kill the engine after this many seconds
    pub timeout_secs: Option<u64>,

    /// Directory for scratch files (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
}

fn default_program() -> PathBuf {
    EngineConfig::default().program
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            timeout_secs: None,
            temp_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load from an explicit path, else the per-user file if present, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config dir>/tessera/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tessera").join("config.toml"))
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.engine.program.clone());
        if let Some(secs) = self.engine.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(ref dir) = self.engine.temp_dir {
            config = config.with_temp_dir(dir.clone());
        }
        config
    }
}
