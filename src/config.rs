use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::logger::DEFAULT_CAPACITY;

pub const DEFAULT_BASE_URL: &str = "https://uat-api.ftlgym.com/api/v1/test";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  /// Login email; the password always comes from the environment
  pub email: Option<String>,
  #[serde(default)]
  pub query: QuerySettings,
  #[serde(default)]
  pub logger: LoggerConfig,
  /// Write tracing output to this file instead of stderr
  pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-request timeout; no deadline when unset
  pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_secs: None,
    }
  }
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

/// Cache and retry tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
  pub stale_time_secs: u64,
  pub gc_time_secs: u64,
  pub retry: u32,
  pub retry_base_ms: u64,
  pub retry_max_ms: u64,
  pub mutation_retry: u32,
  pub mutation_retry_delay_ms: u64,
}

impl Default for QuerySettings {
  fn default() -> Self {
    Self {
      stale_time_secs: 5 * 60,
      gc_time_secs: 10 * 60,
      retry: 3,
      retry_base_ms: 1000,
      retry_max_ms: 30_000,
      mutation_retry: 1,
      mutation_retry_delay_ms: 1000,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
  /// Emit API traffic traces (defaults to on in debug builds)
  pub enabled: bool,
  pub capacity: usize,
}

impl Default for LoggerConfig {
  fn default() -> Self {
    Self {
      enabled: cfg!(debug_assertions),
      capacity: DEFAULT_CAPACITY,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./roombook.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/roombook/config.yaml
  ///
  /// Without an explicit path and with no file found, defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("roombook.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("roombook").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.api.base_url.trim().is_empty() {
      return Err(eyre!("api.base_url must not be empty"));
    }
    Ok(config)
  }

  /// Get the login password from the environment (ROOMBOOK_PASSWORD).
  pub fn get_password() -> Result<String> {
    std::env::var("ROOMBOOK_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set the ROOMBOOK_PASSWORD environment variable."))
  }

  /// A previously issued bearer token (ROOMBOOK_TOKEN), if any.
  pub fn get_token() -> Option<String> {
    std::env::var("ROOMBOOK_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}
