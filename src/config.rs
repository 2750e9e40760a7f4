use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cache::CacheSettings;
use crate::sync::ObserverOptions;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Offline database location (defaults to the user data directory)
  pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the HMIS REST API
  #[serde(default = "default_api_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Path requested to detect connectivity
  #[serde(default = "default_health_path")]
  pub health_path: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
      health_path: default_health_path(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Set to false to bypass response caching entirely
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Application origin for static assets (defaults to the API URL)
  pub origin: Option<String>,
  /// Cache version key; caches with any other name are evicted on activate
  #[serde(default = "default_cache_version")]
  pub version: String,
  #[serde(default = "default_static_assets")]
  pub static_assets: Vec<String>,
  #[serde(default = "default_offline_page")]
  pub offline_page: String,
  #[serde(default = "default_image_placeholder")]
  pub image_placeholder: String,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      origin: None,
      version: default_cache_version(),
      static_assets: default_static_assets(),
      offline_page: default_offline_page(),
      image_placeholder: default_image_placeholder(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Sync pending changes on this interval while online (0 disables)
  #[serde(default = "default_auto_sync_secs")]
  pub auto_sync_interval_secs: u64,
  /// Check the API for connectivity on this interval (0 disables)
  #[serde(default = "default_health_check_secs")]
  pub health_check_interval_secs: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      auto_sync_interval_secs: default_auto_sync_secs(),
      health_check_interval_secs: default_health_check_secs(),
    }
  }
}

fn default_api_url() -> String {
  "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_health_path() -> String {
  "/api/".to_string()
}

fn default_true() -> bool {
  true
}

fn default_cache_version() -> String {
  "hms-cache-v1".to_string()
}

fn default_static_assets() -> Vec<String> {
  [
    "/",
    "/offline",
    "/manifest.json",
    "/favicon.ico",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

fn default_offline_page() -> String {
  "/offline".to_string()
}

fn default_image_placeholder() -> String {
  "/icons/placeholder.png".to_string()
}

fn default_auto_sync_secs() -> u64 {
  60
}

fn default_health_check_secs() -> u64 {
  15
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./hmis-sync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/hmis-sync/config.yaml
  ///
  /// Without a config file the defaults are used.
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
    // Check current directory
    let local = PathBuf::from("hmis-sync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("hmis-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  pub fn api_url(&self) -> Result<Url> {
    Url::parse(&self.api.url).map_err(|e| eyre!("Invalid api.url '{}': {}", self.api.url, e))
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  pub fn cache_settings(&self) -> Result<CacheSettings> {
    let origin = match &self.cache.origin {
      Some(origin) => {
        Url::parse(origin).map_err(|e| eyre!("Invalid cache.origin '{}': {}", origin, e))?
      }
      None => self.api_url()?,
    };

    Ok(CacheSettings {
      origin,
      cache_name: self.cache.version.clone(),
      offline_page: self.cache.offline_page.clone(),
      image_placeholder: self.cache.image_placeholder.clone(),
    })
  }

  pub fn observer_options(&self) -> ObserverOptions {
    let secs = |n: u64| (n > 0).then(|| Duration::from_secs(n));

    ObserverOptions {
      auto_sync_interval: secs(self.sync.auto_sync_interval_secs),
      health_check: secs(self.sync.health_check_interval_secs)
        .map(|every| (self.api.health_path.clone(), every)),
    }
  }

  /// Get the API bearer token from environment variables.
  ///
  /// Checks HMIS_API_TOKEN first, then HMIS_ACCESS_TOKEN as fallback.
  /// Requests are sent without authorization when neither is set.
  pub fn get_api_token() -> Option<String> {
    std::env::var("HMIS_API_TOKEN")
      .or_else(|_| std::env::var("HMIS_ACCESS_TOKEN"))
      .ok()
      .filter(|t| !t.is_empty())
  }
}
