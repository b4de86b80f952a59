//! A platform that answers from a captured capability report.
//!
//! The report is plain JSON, typically produced by a small script running
//! inside a browser or webview and handed to the native side. Any field
//! left out of the report reads as "capability unavailable".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DecodingQuery, GpuInfo, Platform, ProbeError, ProbeResult};
use crate::fingerprint::types::{MediaDevice, ScreenFingerprint};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuReport {
  pub vendor: String,
  pub renderer: String,
}

/// Everything a capability report may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
  #[serde(default)]
  pub gpu: Option<GpuReport>,
  #[serde(default)]
  pub unmasked_gpu: Option<GpuReport>,
  #[serde(default)]
  pub device_memory: Option<f64>,
  #[serde(default)]
  pub hardware_concurrency: Option<u32>,
  #[serde(default)]
  pub oscpu: Option<String>,
  /// `None` means enumeration was unavailable; an empty list means it
  /// succeeded and found nothing.
  #[serde(default)]
  pub media_devices: Option<Vec<MediaDevice>>,
  /// Set when enumeration was refused by the user.
  #[serde(default)]
  pub media_devices_denied: bool,
  #[serde(default)]
  pub screen: Option<ScreenFingerprint>,
  #[serde(default)]
  pub max_touch_points: Option<u32>,
  #[serde(default)]
  pub cookie_enabled: Option<bool>,
  #[serde(default)]
  pub language: Option<String>,
  #[serde(default)]
  pub languages: Option<Vec<String>>,
  /// Decoding answers keyed by the full candidate content type.
  #[serde(default)]
  pub decoding: BTreeMap<String, bool>,
  #[serde(default)]
  pub pdf_viewer_enabled: Option<bool>,
  #[serde(default)]
  pub user_agent: Option<String>,
  #[serde(default)]
  pub webdriver: Option<bool>,
  #[serde(default)]
  pub build_id: Option<String>,
  #[serde(default)]
  pub time_zone: Option<String>,
  #[serde(default)]
  pub fonts: Option<Vec<String>>,
  #[serde(default)]
  pub product: Option<String>,
  #[serde(default)]
  pub app_version: Option<String>,
  #[serde(default)]
  pub platform: Option<String>,
  #[serde(default)]
  pub plugins: Option<Vec<String>>,
}

pub struct SnapshotPlatform {
  snapshot: CapabilitySnapshot,
}

impl SnapshotPlatform {
  pub fn new(snapshot: CapabilitySnapshot) -> Self {
    Self { snapshot }
  }

  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    Ok(Self::new(serde_json::from_str(json)?))
  }

  pub fn snapshot(&self) -> &CapabilitySnapshot {
    &self.snapshot
  }
}

fn present<T: Clone>(value: &Option<T>, capability: &'static str) -> ProbeResult<T> {
  value.clone().ok_or(ProbeError::Unsupported(capability))
}

#[async_trait]
impl Platform for SnapshotPlatform {
  fn gpu_info(&self) -> ProbeResult<GpuInfo> {
    let gpu = present(&self.snapshot.gpu, "webgl")?;
    Ok(GpuInfo::new(gpu.vendor, gpu.renderer))
  }

  fn unmasked_gpu_info(&self) -> ProbeResult<GpuInfo> {
    let gpu = present(&self.snapshot.unmasked_gpu, "webgl debug renderer info")?;
    Ok(GpuInfo::new(gpu.vendor, gpu.renderer))
  }

  fn device_memory(&self) -> ProbeResult<f64> {
    present(&self.snapshot.device_memory, "device memory")
  }

  fn hardware_concurrency(&self) -> ProbeResult<u32> {
    present(&self.snapshot.hardware_concurrency, "hardware concurrency")
  }

  fn oscpu(&self) -> ProbeResult<String> {
    present(&self.snapshot.oscpu, "oscpu")
  }

  async fn media_devices(&self) -> ProbeResult<Vec<MediaDevice>> {
    if self.snapshot.media_devices_denied {
      return Err(ProbeError::PermissionDenied(
        "media device enumeration".to_string(),
      ));
    }
    present(&self.snapshot.media_devices, "media device enumeration")
  }

  fn screen(&self) -> ProbeResult<ScreenFingerprint> {
    present(&self.snapshot.screen, "screen")
  }

  fn max_touch_points(&self) -> ProbeResult<u32> {
    present(&self.snapshot.max_touch_points, "touch points")
  }

  fn cookie_enabled(&self) -> ProbeResult<bool> {
    present(&self.snapshot.cookie_enabled, "cookies")
  }

  fn language(&self) -> ProbeResult<String> {
    present(&self.snapshot.language, "language")
  }

  fn languages(&self) -> ProbeResult<Vec<String>> {
    present(&self.snapshot.languages, "languages")
  }

  async fn decoding_supported(&self, query: &DecodingQuery) -> ProbeResult<bool> {
    self
      .snapshot
      .decoding
      .get(query.content_type())
      .copied()
      .ok_or_else(|| ProbeError::UnsupportedType(query.content_type().to_string()))
  }

  fn pdf_viewer_enabled(&self) -> ProbeResult<bool> {
    present(&self.snapshot.pdf_viewer_enabled, "pdf viewer")
  }

  fn user_agent(&self) -> ProbeResult<String> {
    present(&self.snapshot.user_agent, "user agent")
  }

  fn webdriver(&self) -> ProbeResult<bool> {
    present(&self.snapshot.webdriver, "webdriver flag")
  }

  fn build_id(&self) -> ProbeResult<String> {
    present(&self.snapshot.build_id, "build id")
  }

  fn time_zone(&self) -> ProbeResult<String> {
    present(&self.snapshot.time_zone, "time zone")
  }

  async fn fonts(&self) -> ProbeResult<Vec<String>> {
    present(&self.snapshot.fonts, "fonts")
  }

  fn product(&self) -> ProbeResult<String> {
    present(&self.snapshot.product, "product")
  }

  fn app_version(&self) -> ProbeResult<String> {
    present(&self.snapshot.app_version, "app version")
  }

  fn platform(&self) -> ProbeResult<String> {
    present(&self.snapshot.platform, "platform")
  }

  fn plugins(&self) -> ProbeResult<Vec<String>> {
    present(&self.snapshot.plugins, "plugins")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::probe::codecs::CODEC_TABLE;

  #[test]
  fn test_from_json_reads_camel_case_report() {
    let platform = SnapshotPlatform::from_json(
      r#"{
        "gpu": {"vendor": "WebKit", "renderer": "WebKit WebGL"},
        "hardwareConcurrency": 8,
        "languages": ["en-US", "en"],
        "timeZone": "Europe/Berlin"
      }"#,
    )
    .unwrap();

    assert_eq!(
      platform.gpu_info(),
      Ok(GpuInfo::new("WebKit", "WebKit WebGL"))
    );
    assert_eq!(platform.hardware_concurrency(), Ok(8));
    assert_eq!(platform.time_zone(), Ok("Europe/Berlin".to_string()));
    assert_eq!(platform.oscpu(), Err(ProbeError::Unsupported("oscpu")));
  }

  #[tokio::test]
  async fn test_denied_media_devices() {
    let platform = SnapshotPlatform::new(CapabilitySnapshot {
      media_devices: Some(vec![MediaDevice::new("audioinput", "Mic", "abc")]),
      media_devices_denied: true,
      ..Default::default()
    });
    assert!(matches!(
      platform.media_devices().await,
      Err(ProbeError::PermissionDenied(_))
    ));
  }

  #[tokio::test]
  async fn test_decoding_answers_by_content_type() {
    let candidate = CODEC_TABLE.video[0];
    let mut decoding = BTreeMap::new();
    decoding.insert(candidate.content_type.to_string(), true);
    let platform = SnapshotPlatform::new(CapabilitySnapshot {
      decoding,
      ..Default::default()
    });

    assert_eq!(platform.decoding_supported(&candidate.query()).await, Ok(true));
    let other = CODEC_TABLE.video[1].query();
    assert!(matches!(
      platform.decoding_supported(&other).await,
      Err(ProbeError::UnsupportedType(_))
    ));
  }
}
