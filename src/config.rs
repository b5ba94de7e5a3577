//! User configuration management
//!
//! Machine-level settings that do not belong in a project descriptor: where
//! downloads are cached, how long a fetch may take, how the external remapper
//! is invoked, and where build outputs go. Stored in TOML at
//! `~/.modbuild/config.toml` (or `$MODBUILD_CONFIG_DIR/config.toml`).
//!
//! # Examples
//!
//! ```no_run
//! use modbuild::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::load()?;
//! println!("Fetch timeout: {}s", config.resolver.fetch_timeout_seconds);
//!
//! config.set("resolver.jobs", "4")?;
//! config.save()?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// User configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// External bytecode remapper
    #[serde(default)]
    pub transform: TransformConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Dependency resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Per-request fetch timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,

    /// Parallel fetch workers
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Download cache; `~` and `$VARS` are expanded
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

fn default_fetch_timeout() -> u64 {
    60
}

fn default_jobs() -> usize {
    1
}

fn default_cache_dir() -> String {
    "~/.modbuild/cache".to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_seconds: default_fetch_timeout(),
            jobs: default_jobs(),
            cache_dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Program and arguments; `{input}` and `{output}` are replaced per artifact.
    /// Empty disables remapping.
    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default = "default_transform_timeout")]
    pub timeout_seconds: u64,
}

fn default_transform_timeout() -> u64 {
    300
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_seconds: default_transform_timeout(),
        }
    }
}

/// Build output locations, relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: String,
}

fn default_staging_dir() -> String {
    "build/staging".to_string()
}

fn default_manifest_dir() -> String {
    "build/publish".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            manifest_dir: default_manifest_dir(),
        }
    }
}

/// Keys accepted by [`Config::set`]
pub const CONFIG_KEYS: &[&str] = &[
    "resolver.fetch_timeout_seconds",
    "resolver.jobs",
    "resolver.cache_dir",
    "transform.command",
    "transform.timeout_seconds",
    "output.staging_dir",
    "output.manifest_dir",
];

impl Config {
    /// Get the default config file path
    ///
    /// Uses MODBUILD_CONFIG_DIR if set, otherwise ~/.modbuild/config.toml
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(config_dir) = std::env::var("MODBUILD_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("Could not find home directory".to_string()))?;

        Ok(home.join(".modbuild").join("config.toml"))
    }

    /// Load config from file, or the defaults if it doesn't exist
    ///
    /// `MODBUILD_CACHE_DIR` overrides `resolver.cache_dir`.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;

        let mut config = if !path.exists() {
            Self::default()
        } else {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        };

        if let Ok(cache_dir) = std::env::var("MODBUILD_CACHE_DIR") {
            if !cache_dir.is_empty() {
                config.resolver.cache_dir = cache_dir;
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Set one value by dotted key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parse_number = |value: &str| -> Result<u64> {
            value
                .parse::<u64>()
                .map_err(|_| Error::config(format!("'{}' expects a number, got '{}'", key, value)))
        };

        match key {
            "resolver.fetch_timeout_seconds" => {
                self.resolver.fetch_timeout_seconds = parse_number(value)?
            }
            "resolver.jobs" => self.resolver.jobs = parse_number(value)?.max(1) as usize,
            "resolver.cache_dir" => self.resolver.cache_dir = value.to_string(),
            "transform.command" => {
                self.transform.command = value.split_whitespace().map(String::from).collect()
            }
            "transform.timeout_seconds" => self.transform.timeout_seconds = parse_number(value)?,
            "output.staging_dir" => self.output.staging_dir = value.to_string(),
            "output.manifest_dir" => self.output.manifest_dir = value.to_string(),
            _ => {
                return Err(Error::config(format!(
                    "Unknown configuration key '{}' (available: {})",
                    key,
                    CONFIG_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// Download cache directory with `~` and environment variables expanded
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.resolver.cache_dir)
            .map_err(|e| Error::config(format!("Invalid resolver.cache_dir: {}", e)))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver.fetch_timeout_seconds.max(1))
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_secs(self.transform.timeout_seconds.max(1))
    }
}
