use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all};
use std::path::PathBuf;

use crate::app_dirs;
use crate::error::{FingerprintError, Result};
use crate::fingerprint::types::{FingerprintOptions, ProbeGroup};
use crate::storage::cookie::DEFAULT_EXPIRY_DAYS;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
  #[serde(default = "default_cookie_expiry_days")]
  pub cookie_expiry_days: i64,
  #[serde(default)]
  pub default_transport: Option<String>, // "cookie", "local" or "database"; unset means cookie
  #[serde(default)]
  pub skip: Vec<ProbeGroup>,
  #[serde(default)]
  pub network_url: Option<String>,
  #[serde(default)]
  pub include_ip: bool,
  #[serde(default)]
  pub cookie_jar_path: Option<PathBuf>,
  #[serde(default)]
  pub local_storage_path: Option<PathBuf>,
  #[serde(default)]
  pub database_path: Option<PathBuf>,
  #[serde(default = "default_server_port")]
  pub server_port: u16,
  #[serde(default)]
  pub trust_proxy: bool,
}

fn default_cookie_expiry_days() -> i64 {
  DEFAULT_EXPIRY_DAYS
}

fn default_server_port() -> u16 {
  3000
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      cookie_expiry_days: DEFAULT_EXPIRY_DAYS,
      default_transport: None,
      skip: Vec::new(),
      network_url: None,
      include_ip: false,
      cookie_jar_path: None,
      local_storage_path: None,
      database_path: None,
      server_port: 3000,
      trust_proxy: false,
    }
  }
}

impl Settings {
  pub fn cookie_jar_path(&self) -> PathBuf {
    self
      .cookie_jar_path
      .clone()
      .unwrap_or_else(app_dirs::cookie_jar_path)
  }

  pub fn local_storage_path(&self) -> PathBuf {
    self
      .local_storage_path
      .clone()
      .unwrap_or_else(app_dirs::local_storage_path)
  }

  pub fn database_path(&self) -> PathBuf {
    self
      .database_path
      .clone()
      .unwrap_or_else(app_dirs::database_path)
  }

  /// Assembly options described by these settings.
  pub fn fingerprint_options(&self) -> FingerprintOptions {
    let mut options = FingerprintOptions::new().with_include_ip(self.include_ip);
    for group in &self.skip {
      options = options.skip(*group);
    }
    if let Some(url) = &self.network_url {
      options = options.with_network_url(url.clone());
    }
    options
  }
}

pub struct SettingsManager {
  settings_dir: PathBuf,
}

impl Default for SettingsManager {
  fn default() -> Self {
    Self::new()
  }
}

impl SettingsManager {
  pub fn new() -> Self {
    Self::with_dir(app_dirs::settings_dir())
  }

  pub fn with_dir(settings_dir: impl Into<PathBuf>) -> Self {
    Self {
      settings_dir: settings_dir.into(),
    }
  }

  pub fn get_settings_dir(&self) -> PathBuf {
    self.settings_dir.clone()
  }

  pub fn get_settings_file(&self) -> PathBuf {
    self.settings_dir.join("settings.json")
  }

  pub fn load_settings(&self) -> Result<Settings> {
    let settings_file = self.get_settings_file();

    if !settings_file.exists() {
      return Ok(Settings::default());
    }

    let content = fs::read_to_string(&settings_file)?;

    // serde fills in defaults for missing fields
    match serde_json::from_str::<Settings>(&content) {
      Ok(mut settings) => {
        if settings.cookie_expiry_days <= 0 {
          log::warn!(
            "Ignoring cookie_expiry_days = {}, using {DEFAULT_EXPIRY_DAYS}",
            settings.cookie_expiry_days
          );
          settings.cookie_expiry_days = DEFAULT_EXPIRY_DAYS;
        }
        Ok(settings)
      }
      Err(e) => {
        log::warn!(
          "Failed to parse settings file {}, using defaults: {e}",
          settings_file.display()
        );
        Ok(Settings::default())
      }
    }
  }

  pub fn save_settings(&self, settings: &Settings) -> Result<()> {
    create_dir_all(&self.settings_dir)?;

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(self.get_settings_file(), json)?;

    log::info!("Saved settings to {}", self.get_settings_file().display());
    Ok(())
  }

  /// Validate and save a transport name as the default.
  pub fn set_default_transport(&self, name: &str) -> Result<Settings> {
    if name.trim().is_empty() {
      return Err(FingerprintError::settings("transport name is empty"));
    }
    let mut settings = self.load_settings()?;
    settings.default_transport = Some(name.trim().to_string());
    self.save_settings(&settings)?;
    Ok(settings)
  }
}
