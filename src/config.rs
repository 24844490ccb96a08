//! Runtime configuration (C8, `[ADD]`): writer defaults layered from a
//! TOML file, `PLTX_*` environment variables, and finally CLI flags (the
//! CLI applies its own overrides last, after [`PltxConfig::load`]).

use std::path::Path;

use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;

use crate::error::{PltxError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PltxConfig {
    pub compression: String,
    pub level: i32,
    pub chunk_records: usize,
    pub flush_interval_sec: f64,
    pub fsync_every_n_chunks: u32,
    pub log_level: String,
}

impl Default for PltxConfig {
    fn default() -> Self {
        Self {
            compression: "zstd".to_string(),
            level: 3,
            chunk_records: 2048,
            flush_interval_sec: 0.5,
            fsync_every_n_chunks: 8,
            log_level: "info".to_string(),
        }
    }
}

fn cfg_err(e: config::ConfigError) -> PltxError {
    PltxError::Corrupt(format!("config: {e}"))
}

impl PltxConfig {
    /// Load defaults, then an optional TOML file (if it exists), then
    /// `PLTX_*` environment overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("compression", defaults.compression)
            .map_err(cfg_err)?
            .set_default("level", defaults.level)
            .map_err(cfg_err)?
            .set_default("chunk_records", defaults.chunk_records as i64)
            .map_err(cfg_err)?
            .set_default("flush_interval_sec", defaults.flush_interval_sec)
            .map_err(cfg_err)?
            .set_default("fsync_every_n_chunks", defaults.fsync_every_n_chunks as i64)
            .map_err(cfg_err)?
            .set_default("log_level", defaults.log_level)
            .map_err(cfg_err)?;

        if let Some(path) = config_file {
            builder = builder.add_source(ConfigFile::from(path).required(false));
        }
        builder = builder.add_source(Environment::with_prefix("PLTX"));

        let built = builder.build().map_err(cfg_err)?;
        built.try_deserialize().map_err(cfg_err)
    }
}
