//! Probes for the machine the crate runs on.
//!
//! Only facets a native process can observe are answered here. Browser
//! surfaces (WebGL, codecs, media devices, plugins, screen) keep the
//! default "unsupported" answer and fall back in the assembler.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use super::{Platform, ProbeError, ProbeResult};

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc", "otc", "woff", "woff2", "dfont"];

pub struct HostPlatform {
  cores: Option<u32>,
  total_memory: Option<u64>,
  os_version: Option<String>,
  locales: Vec<String>,
  font_dirs: Vec<PathBuf>,
}

impl Default for HostPlatform {
  fn default() -> Self {
    Self::new()
  }
}

impl HostPlatform {
  /// Read system information once; the probes answer from this snapshot.
  pub fn new() -> Self {
    let system = System::new_with_specifics(
      RefreshKind::nothing()
        .with_cpu(CpuRefreshKind::everything())
        .with_memory(MemoryRefreshKind::everything()),
    );

    let cores = match system.cpus().len() {
      0 => std::thread::available_parallelism()
        .ok()
        .map(|n| n.get() as u32),
      n => Some(n as u32),
    };
    let total_memory = Some(system.total_memory()).filter(|bytes| *bytes > 0);

    Self {
      cores,
      total_memory,
      os_version: System::long_os_version(),
      locales: sys_locale::get_locales().collect(),
      font_dirs: default_font_dirs(),
    }
  }

  /// Replace the directories scanned for font files.
  pub fn with_font_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
    self.font_dirs = dirs;
    self
  }
}

#[async_trait]
impl Platform for HostPlatform {
  fn device_memory(&self) -> ProbeResult<f64> {
    self
      .total_memory
      .map(approximate_device_memory)
      .ok_or(ProbeError::Unsupported("device memory"))
  }

  fn hardware_concurrency(&self) -> ProbeResult<u32> {
    self
      .cores
      .ok_or(ProbeError::Unsupported("hardware concurrency"))
  }

  fn oscpu(&self) -> ProbeResult<String> {
    let os = self
      .os_version
      .as_deref()
      .ok_or(ProbeError::Unsupported("oscpu"))?;
    Ok(format!("{os} {}", std::env::consts::ARCH))
  }

  fn cookie_enabled(&self) -> ProbeResult<bool> {
    Ok(true)
  }

  fn language(&self) -> ProbeResult<String> {
    self
      .locales
      .first()
      .cloned()
      .ok_or(ProbeError::Unsupported("language"))
  }

  fn languages(&self) -> ProbeResult<Vec<String>> {
    if self.locales.is_empty() {
      return Err(ProbeError::Unsupported("languages"));
    }
    Ok(self.locales.clone())
  }

  fn user_agent(&self) -> ProbeResult<String> {
    Ok(format!(
      "ezfingerprint/{} ({})",
      env!("CARGO_PKG_VERSION"),
      navigator_platform()
    ))
  }

  fn webdriver(&self) -> ProbeResult<bool> {
    Ok(false)
  }

  fn time_zone(&self) -> ProbeResult<String> {
    host_time_zone().ok_or(ProbeError::Unsupported("time zone"))
  }

  async fn fonts(&self) -> ProbeResult<Vec<String>> {
    let dirs = self.font_dirs.clone();
    tokio::task::spawn_blocking(move || scan_font_families(&dirs))
      .await
      .map_err(|e| ProbeError::Failed(format!("font scan task: {e}")))
  }

  fn app_version(&self) -> ProbeResult<String> {
    Ok(env!("CARGO_PKG_VERSION").to_string())
  }

  fn platform(&self) -> ProbeResult<String> {
    Ok(navigator_platform())
  }
}

/// Round total memory down to a power of two GiB in `[0.25, 8]`, the
/// bucketing browsers apply before exposing it.
pub fn approximate_device_memory(total_bytes: u64) -> f64 {
  let gib = total_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
  let mut bucket = 0.25;
  while bucket * 2.0 <= gib && bucket < 8.0 {
    bucket *= 2.0;
  }
  bucket
}

fn navigator_platform() -> String {
  match std::env::consts::OS {
    "macos" => "MacIntel".to_string(),
    "windows" => "Win32".to_string(),
    os => {
      let mut name = os.to_string();
      if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
      }
      format!("{name} {}", std::env::consts::ARCH)
    }
  }
}

fn host_time_zone() -> Option<String> {
  if let Ok(tz) = std::env::var("TZ") {
    let tz = tz.trim_start_matches(':').trim();
    if !tz.is_empty() {
      return Some(tz.to_string());
    }
  }

  system_time_zone()
}

#[cfg(unix)]
fn system_time_zone() -> Option<String> {
  let target = std::fs::read_link("/etc/localtime").ok()?;
  zone_from_zoneinfo_path(&target)
}

#[cfg(not(unix))]
fn system_time_zone() -> Option<String> {
  None
}

#[cfg_attr(not(unix), allow(dead_code))]
fn zone_from_zoneinfo_path(path: &Path) -> Option<String> {
  let text = path.to_string_lossy();
  let (_, zone) = text.split_once("zoneinfo/")?;
  if zone.is_empty() {
    None
  } else {
    Some(zone.to_string())
  }
}

fn default_font_dirs() -> Vec<PathBuf> {
  let mut dirs = Vec::new();

  if cfg!(target_os = "windows") {
    let windir = std::env::var("WINDIR").unwrap_or_else(|_| "C:\\Windows".to_string());
    dirs.push(PathBuf::from(windir).join("Fonts"));
  } else if cfg!(target_os = "macos") {
    dirs.push(PathBuf::from("/System/Library/Fonts"));
    dirs.push(PathBuf::from("/Library/Fonts"));
  } else {
    dirs.push(PathBuf::from("/usr/share/fonts"));
    dirs.push(PathBuf::from("/usr/local/share/fonts"));
  }

  if let Some(base) = directories::BaseDirs::new() {
    if cfg!(target_os = "macos") {
      dirs.push(base.home_dir().join("Library/Fonts"));
    } else {
      dirs.push(base.home_dir().join(".fonts"));
      dirs.push(base.data_dir().join("fonts"));
    }
  }

  dirs
}

/// Font family names approximated from font file stems, sorted and unique.
fn scan_font_families(dirs: &[PathBuf]) -> Vec<String> {
  let mut families = BTreeSet::new();
  let mut pending: Vec<PathBuf> = dirs.to_vec();

  while let Some(dir) = pending.pop() {
    let Ok(entries) = std::fs::read_dir(&dir) else {
      continue;
    };
    for entry in entries.flatten() {
      let path = entry.path();
      if path.is_dir() {
        pending.push(path);
        continue;
      }
      let is_font = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
      if !is_font {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        families.insert(font_family_from_stem(stem));
      }
    }
  }

  families.into_iter().collect()
}

/// `DejaVuSans-Bold` -> `DejaVuSans`.
fn font_family_from_stem(stem: &str) -> String {
  stem
    .split_once('-')
    .map(|(family, _)| family)
    .unwrap_or(stem)
    .to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_device_memory_buckets() {
    const GIB: u64 = 1024 * 1024 * 1024;
    assert_eq!(approximate_device_memory(GIB / 8), 0.25);
    assert_eq!(approximate_device_memory(GIB), 1.0);
    assert_eq!(approximate_device_memory(3 * GIB), 2.0);
    assert_eq!(approximate_device_memory(16 * GIB), 8.0);
    assert_eq!(approximate_device_memory(128 * GIB), 8.0);
  }

  #[test]
  fn test_zone_from_zoneinfo_path() {
    assert_eq!(
      zone_from_zoneinfo_path(Path::new("/usr/share/zoneinfo/Europe/Paris")),
      Some("Europe/Paris".to_string())
    );
    assert_eq!(
      zone_from_zoneinfo_path(Path::new("/var/db/timezone/zoneinfo/America/New_York")),
      Some("America/New_York".to_string())
    );
    assert_eq!(zone_from_zoneinfo_path(Path::new("/etc/UTC")), None);
  }

  #[test]
  fn test_font_family_from_stem() {
    assert_eq!(font_family_from_stem("DejaVuSans-Bold"), "DejaVuSans");
    assert_eq!(font_family_from_stem("Arial"), "Arial");
  }

  #[tokio::test]
  async fn test_fonts_scan_nested_dirs() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("truetype").join("dejavu");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("DejaVuSans.ttf"), b"").unwrap();
    std::fs::write(nested.join("DejaVuSans-Bold.ttf"), b"").unwrap();
    std::fs::write(tmp.path().join("Inter.OTF"), b"").unwrap();
    std::fs::write(tmp.path().join("README.txt"), b"").unwrap();

    let platform = HostPlatform::new().with_font_dirs(vec![tmp.path().to_path_buf()]);
    let fonts = platform.fonts().await.unwrap();
    assert_eq!(fonts, vec!["DejaVuSans".to_string(), "Inter".to_string()]);
  }

  #[tokio::test]
  async fn test_missing_font_dirs_yield_empty_list() {
    let platform =
      HostPlatform::new().with_font_dirs(vec![PathBuf::from("/nonexistent/ezfp-fonts")]);
    assert!(platform.fonts().await.unwrap().is_empty());
  }

  #[test]
  fn test_host_answers_native_facets_only() {
    let platform = HostPlatform::new();
    assert!(platform.hardware_concurrency().unwrap() >= 1);
    assert_eq!(platform.cookie_enabled(), Ok(true));
    assert_eq!(platform.webdriver(), Ok(false));
    assert!(platform.user_agent().unwrap().starts_with("ezfingerprint/"));
    assert!(platform.gpu_info().is_err());
    assert!(platform.screen().is_err());
    assert!(platform.plugins().is_err());
  }
}
