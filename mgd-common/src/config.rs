//! Configuration loading and root folder resolution
//!
//! Configuration file lookup order:
//! 1. Explicit path (command-line argument)
//! 2. `MGD_CONFIG` environment variable
//! 3. `<config_dir>/mgd/config.toml`
//! 4. Compiled defaults
//!
//! Feature-extraction parameters are intentionally absent: they are constants of
//! the deployed system so that every catalog vector stays comparable.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MGD_CONFIG";

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "MGD_ROOT";

/// Catalog database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "mgd.db";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding the catalog database
    pub root_folder: Option<String>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Recommendation tunables
    pub recommend: RecommendSettings,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. "info", "mgd_rec=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Recommendation tunables
///
/// These affect throughput and memory only; none of them change the numeric
/// value of a stored feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendSettings {
    /// Number of results when the caller does not ask for a specific K
    pub default_k: usize,
    /// Catalog entries scored per ranking chunk
    pub chunk_size: usize,
    /// Timeout applied to every catalog call
    pub catalog_timeout_ms: u64,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        Self {
            default_k: 10,
            chunk_size: 256,
            catalog_timeout_ms: 5000,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.recommend.chunk_size == 0 {
            return Err(Error::Config("recommend.chunk_size must be at least 1".to_string()));
        }
        if self.recommend.catalog_timeout_ms == 0 {
            return Err(Error::Config(
                "recommend.catalog_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration, falling back to defaults when no file exists
///
/// An explicitly named file (argument or environment) that cannot be read is an
/// error; a missing default-location file is not.
pub fn load_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let explicit = explicit_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

    if let Some(path) = explicit {
        info!("Loading configuration from {}", path.display());
        return load_config_file(&path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_config_file(&path)
        }
        _ => {
            debug!("No configuration file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Read and parse one TOML configuration file
pub fn load_config_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    TomlConfig::from_toml_str(&content)
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `MGD_ROOT` environment variable
/// 3. `root_folder` from the TOML config
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&str>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.root_folder {
        return PathBuf::from(path);
    }

    default_root_folder()
}

/// Catalog database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mgd").join("config.toml"))
}

fn default_root_folder() -> PathBuf {
    let fallback = if cfg!(target_os = "linux") {
        "/var/lib/mgd"
    } else {
        "./mgd_data"
    };
    dirs::data_local_dir()
        .map(|d| d.join("mgd"))
        .unwrap_or_else(|| PathBuf::from(fallback))
}
