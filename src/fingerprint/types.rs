//! Fingerprint type definitions.
//!
//! Every map is a `BTreeMap` so iteration order matches the key-sorted form
//! that [`crate::hash`] digests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// One assembled observation of the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
  pub hardware: HardwareFingerprint,
  pub software: SoftwareFingerprint,
  /// Verbatim object returned by the configured network-info endpoint.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub network: Option<serde_json::Value>,
  /// Present only when the caller asked for the endpoint's `ip` field.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HardwareFingerprint {
  pub video_card: VideoCard,
  /// Approximate memory in GiB, `0` when unknown.
  pub device_memory: f64,
  pub hardware_concurrency: u32,
  pub oscpu: String,
  pub media_devices: Vec<MediaDevice>,
  pub screen: ScreenFingerprint,
  pub max_touch_points: u32,
}

/// GPU strings. The unmasked pair comes from the debug-renderer extension
/// and stays empty where that extension is unavailable or skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoCard {
  pub vendor: String,
  pub renderer: String,
  pub unmasked_vendor: String,
  pub unmasked_renderer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MediaDevice {
  pub kind: String,
  pub label: String,
  pub device_id: String,
}

impl MediaDevice {
  pub fn new(
    kind: impl Into<String>,
    label: impl Into<String>,
    device_id: impl Into<String>,
  ) -> Self {
    Self {
      kind: kind.into(),
      label: label.into(),
      device_id: device_id.into(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScreenFingerprint {
  pub width: u32,
  pub height: u32,
  pub color_depth: u32,
  pub pixel_depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareFingerprint {
  pub cookie_enabled: bool,
  pub language: String,
  pub languages: Vec<String>,
  pub video_codecs: BTreeMap<String, bool>,
  pub audio_codecs: BTreeMap<String, bool>,
  pub pdf_viewer_enabled: bool,
  pub user_agent: String,
  pub webdriver: bool,
  pub build_id: String,
  pub time_zone: String,
  pub fonts: Vec<String>,
  pub product: String,
  pub app_version: String,
  pub platform: String,
  pub plugins: Vec<String>,
}

/// Probe groups that can be left out of an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeGroup {
  Webgl,
  /// Extended GPU parameters (unmasked vendor/renderer).
  WebglUnmasked,
  MediaDevices,
  VideoCodecs,
  AudioCodecs,
  Fonts,
  Plugins,
}

impl ProbeGroup {
  pub const ALL: [ProbeGroup; 7] = [
    ProbeGroup::Webgl,
    ProbeGroup::WebglUnmasked,
    ProbeGroup::MediaDevices,
    ProbeGroup::VideoCodecs,
    ProbeGroup::AudioCodecs,
    ProbeGroup::Fonts,
    ProbeGroup::Plugins,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ProbeGroup::Webgl => "webgl",
      ProbeGroup::WebglUnmasked => "webgl-unmasked",
      ProbeGroup::MediaDevices => "media-devices",
      ProbeGroup::VideoCodecs => "video-codecs",
      ProbeGroup::AudioCodecs => "audio-codecs",
      ProbeGroup::Fonts => "fonts",
      ProbeGroup::Plugins => "plugins",
    }
  }
}

impl fmt::Display for ProbeGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown probe group: {0}")]
pub struct UnknownProbeGroup(pub String);

impl FromStr for ProbeGroup {
  type Err = UnknownProbeGroup;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_ascii_lowercase();
    ProbeGroup::ALL
      .into_iter()
      .find(|group| group.as_str() == wanted)
      .ok_or_else(|| UnknownProbeGroup(s.to_string()))
  }
}

/// Options recognised by the assembler.
#[derive(Debug, Clone, Default)]
pub struct FingerprintOptions {
  /// Probe groups to omit entirely.
  pub skip: HashSet<ProbeGroup>,
  /// Endpoint whose JSON response is merged into the `network` facet.
  pub network_url: Option<String>,
  /// Keep the endpoint's `ip` field as the top-level `ip` instead of dropping it.
  pub include_ip: bool,
}

impl FingerprintOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn skip(mut self, group: ProbeGroup) -> Self {
    self.skip.insert(group);
    self
  }

  pub fn with_network_url(mut self, url: impl Into<String>) -> Self {
    self.network_url = Some(url.into());
    self
  }

  pub fn with_include_ip(mut self, include_ip: bool) -> Self {
    self.include_ip = include_ip;
    self
  }

  pub fn skips(&self, group: ProbeGroup) -> bool {
    self.skip.contains(&group)
  }
}
