//! `pgm.toml` configuration.
//!
//! ```toml
//! [meta]
//! registry = "meta_data.json"
//!
//! [calculation]
//! calculation_type = "power_flow"
//! threading = 0
//!
//! [native]
//! extra = "keep"
//! sparse_policy = "drop_defaults"
//!
//! [logging]
//! level = "debug"
//! ```

use anyhow::{Context, Result};
use pgm_core::PowerGridMetaData;
use pgm_dataset::{ExtraPolicy, SparsePolicy};
use pgm_model::CalculationOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "pgm.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PgmConfig {
    #[serde(default)]
    pub meta: MetaConfig,
    /// Defaults for calculations; every field is optional
    #[serde(default)]
    pub calculation: CalculationOptions,
    #[serde(default)]
    pub native: NativeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetaConfig {
    /// Registry document; the bundled registry when unset
    #[serde(default)]
    pub registry: Option<PathBuf>,
}

/// Native JSON handling
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NativeConfig {
    /// Record fields the registry does not know
    #[serde(default)]
    pub extra: ExtraPolicy,
    /// Records dropped when converting to sparse batches
    #[serde(default)]
    pub sparse_policy: SparsePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PgmConfig {
    /// Load `path`, or `./pgm.toml` when it exists, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config '{}'", path.display()))
    }

    /// Registry named on the command line, then in the config, then bundled.
    pub fn meta_data(&self, override_path: Option<&Path>) -> Result<PowerGridMetaData> {
        match override_path.or(self.meta.registry.as_deref()) {
            Some(path) => Ok(PowerGridMetaData::from_path(path)?),
            None => Ok(PowerGridMetaData::bundled()?.clone()),
        }
    }
}
