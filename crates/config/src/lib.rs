//! # Config - engine settings
//!
//! [`EngineConfig`] collects every tunable of the lsmkv engine in one place.
//! It can be built in code with the `with_*` setters or read from the
//! environment with [`EngineConfig::from_env`]:
//!
//! ```text
//! LSMKV_DB_DIR     database directory           (default: "lsm_db")
//! LSMKV_CAPACITY   memtable entries per flush   (default: 100)
//! LSMKV_SPARSITY   records per index entry      (default: 10)
//! LSMKV_WAL_SYNC   fsync every WAL append       (default: true)
//! LSMKV_BLOOM_FPR  bloom false positive rate    (default: 0.01)
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DB_DIR: &str = "lsm_db";
pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_SPARSITY: usize = 10;
pub const DEFAULT_WAL_SYNC: bool = true;
pub const DEFAULT_BLOOM_FPR: f64 = 0.01;

pub const ENV_DB_DIR: &str = "LSMKV_DB_DIR";
pub const ENV_CAPACITY: &str = "LSMKV_CAPACITY";
pub const ENV_SPARSITY: &str = "LSMKV_SPARSITY";
pub const ENV_WAL_SYNC: &str = "LSMKV_WAL_SYNC";
pub const ENV_BLOOM_FPR: &str = "LSMKV_BLOOM_FPR";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Settings for opening an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Directory holding the WAL and all segment files.
    pub db_dir: PathBuf,
    /// Number of memtable entries that triggers a flush.
    pub capacity: usize,
    /// Every `sparsity`-th record of a segment gets a sparse index entry.
    pub sparsity: usize,
    /// If `true`, every WAL append is followed by `fsync`.
    pub wal_sync: bool,
    /// Target false positive rate of each segment's bloom filter.
    pub bloom_fpr: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from(DEFAULT_DB_DIR),
            capacity: DEFAULT_CAPACITY,
            sparsity: DEFAULT_SPARSITY,
            wal_sync: DEFAULT_WAL_SYNC,
            bloom_fpr: DEFAULT_BLOOM_FPR,
        }
    }
}

impl EngineConfig {
    /// Default settings rooted at `db_dir`.
    pub fn new<P: AsRef<Path>>(db_dir: P) -> Self {
        Self {
            db_dir: db_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_sparsity(mut self, sparsity: usize) -> Self {
        self.sparsity = sparsity;
        self
    }

    pub fn with_wal_sync(mut self, wal_sync: bool) -> Self {
        self.wal_sync = wal_sync;
        self
    }

    pub fn with_bloom_fpr(mut self, bloom_fpr: f64) -> Self {
        self.bloom_fpr = bloom_fpr;
        self
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] if `capacity` or `sparsity` is 0,
    /// `bloom_fpr` is outside `(0, 1)`, or `db_dir` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidParameter(
                "db_dir must not be empty".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(ConfigError::InvalidParameter(
                "capacity must be > 0".to_string(),
            ));
        }
        if self.sparsity == 0 {
            return Err(ConfigError::InvalidParameter(
                "sparsity must be > 0".to_string(),
            ));
        }
        if !(self.bloom_fpr > 0.0 && self.bloom_fpr < 1.0) {
            return Err(ConfigError::InvalidParameter(format!(
                "bloom_fpr must be in (0, 1), got {}",
                self.bloom_fpr
            )));
        }
        Ok(())
    }

    /// Reads settings from the `LSMKV_*` environment variables, using the
    /// default for any variable that is not set.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] if a variable is set but does not
    /// parse, or the resulting config fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(dir) = lookup(ENV_DB_DIR) {
            cfg.db_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_CAPACITY) {
            cfg.capacity = parse_var(ENV_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SPARSITY) {
            cfg.sparsity = parse_var(ENV_SPARSITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_WAL_SYNC) {
            cfg.wal_sync = parse_bool(ENV_WAL_SYNC, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BLOOM_FPR) {
            cfg.bloom_fpr = parse_var(ENV_BLOOM_FPR, &raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidParameter(format!("{}: cannot parse {:?}", name, raw)))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidParameter(format!(
            "{}: expected a boolean, got {:?}",
            name, raw
        ))),
    }
}
