//! Configuration loading and resolution
//!
//! Settings resolve in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line flags and their environment variables are parsed by the
//! binary and handed over as [`ConfigOverrides`]. Settings without a flag
//! (admin credentials, session secret) are read from the environment here.

use crate::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Application directory name under the platform config/data directories
pub const APP_DIR_NAME: &str = "cutoff-predictor";

/// Environment variable prefix for settings without a command-line flag
pub const ENV_PREFIX: &str = "CUTOFF_";

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_EXTRACTOR_PROGRAM: &str = "python3";
const DEFAULT_EXTRACTOR_SCRIPT: &str = "scripts/pdf_processor.py";
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_MAX_CONCURRENT_EXTRACTIONS: usize = 2;
const DEFAULT_JOB_RETENTION_SECS: u64 = 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 24 * 60 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Values supplied on the command line (or their environment variables)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// `[extractor]` section of the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractorSection {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub max_concurrent: Option<usize>,
}

/// `[jobs]` section of the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobsSection {
    pub retention_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

/// `[admin]` section of the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminSection {
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_secret: Option<String>,
    pub session_max_age_secs: Option<u64>,
    pub secure_cookies: Option<bool>,
}

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub max_upload_bytes: Option<usize>,
    pub extractor: ExtractorSection,
    pub jobs: JobsSection,
    pub admin: AdminSection,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub log_level: String,
    /// Program launched for each extraction (e.g. `python3`)
    pub extractor_program: String,
    /// Arguments placed before the input and output paths
    pub extractor_args: Vec<String>,
    pub extraction_timeout: Duration,
    pub max_concurrent_extractions: usize,
    pub job_retention: Duration,
    pub sweep_interval: Duration,
    pub admin_username: String,
    pub admin_password: String,
    pub session_secret: String,
    pub session_max_age: Duration,
    pub secure_cookies: bool,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Resolve the configuration from all sources
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let bind = overrides
            .bind
            .or(toml.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr: SocketAddr = bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind, e)))?;

        let data_dir = overrides
            .data_dir
            .or(toml.data_dir)
            .unwrap_or_else(default_data_dir);

        let log_level = overrides
            .log_level
            .or(toml.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let max_concurrent_extractions = env_parsed("MAX_CONCURRENT_EXTRACTIONS")?
            .or(toml.extractor.max_concurrent)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_EXTRACTIONS);
        if max_concurrent_extractions == 0 {
            return Err(Error::Config(
                "max_concurrent_extractions must be at least 1".to_string(),
            ));
        }

        let session_secret = match env_string("SESSION_SECRET").or(toml.admin.session_secret) {
            Some(secret) if !secret.trim().is_empty() => secret,
            _ => {
                warn!("No session secret configured; generating one (sessions end on restart)");
                crate::session::generate_secret()
            }
        };

        Ok(Self {
            bind_addr,
            data_dir,
            log_level,
            extractor_program: env_string("EXTRACTOR_PROGRAM")
                .or(toml.extractor.program)
                .unwrap_or_else(|| DEFAULT_EXTRACTOR_PROGRAM.to_string()),
            extractor_args: toml
                .extractor
                .args
                .unwrap_or_else(|| vec![DEFAULT_EXTRACTOR_SCRIPT.to_string()]),
            extraction_timeout: Duration::from_secs(
                env_parsed("EXTRACTION_TIMEOUT_SECS")?
                    .or(toml.extractor.timeout_secs)
                    .unwrap_or(DEFAULT_EXTRACTION_TIMEOUT_SECS),
            ),
            max_concurrent_extractions,
            job_retention: Duration::from_secs(
                toml.jobs.retention_secs.unwrap_or(DEFAULT_JOB_RETENTION_SECS),
            ),
            sweep_interval: Duration::from_secs(
                toml.jobs
                    .sweep_interval_secs
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
            admin_username: env_string("ADMIN_USERNAME")
                .or(toml.admin.username)
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
            admin_password: env_string("ADMIN_PASSWORD")
                .or(toml.admin.password)
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
            session_secret,
            session_max_age: Duration::from_secs(
                toml.admin
                    .session_max_age_secs
                    .unwrap_or(DEFAULT_SESSION_MAX_AGE_SECS),
            ),
            secure_cookies: env_parsed("SECURE_COOKIES")?
                .or(toml.admin.secure_cookies)
                .unwrap_or(false),
            max_upload_bytes: toml.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        })
    }

    /// Configuration rooted at `data_dir` with defaults everywhere else
    ///
    /// Used by tests and tools that do not read a config file.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::resolve(
            ConfigOverrides {
                data_dir: Some(data_dir.into()),
                ..Default::default()
            },
            TomlConfig::default(),
        )
    }

    /// Directory holding uploaded PDFs
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Directory for per-job extraction output files
    pub fn extraction_tmp_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }

    /// On-disk JSON mirror of the cutoff table
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("data").join("output.json")
    }

    /// SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("cutoff.db")
    }

    /// Create the data directory tree if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.upload_dir(),
            self.extraction_tmp_dir(),
            self.data_dir.join("data"),
        ] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }
}

/// Load the TOML config file
///
/// An explicit path takes precedence over the platform default location.
/// A missing file is not an error: a warning is logged and defaults apply.
/// A file that exists but does not parse is a configuration error.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                info!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Platform config file location (`<config_dir>/cutoff-predictor/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"))
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./cutoff_data"))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            Error::Config(format!("Invalid value for {}{}: {}", ENV_PREFIX, name, e))
        }),
        None => Ok(None),
    }
}
