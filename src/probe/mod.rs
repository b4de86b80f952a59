//! Signal probes.
//!
//! The environment is only reached through [`Platform`]. Each method is a
//! best-effort read of one capability; the default bodies report the
//! capability as unsupported so an implementation only overrides what it
//! can actually observe. The assembler turns every [`ProbeError`] into the
//! slot's fallback value.

pub mod codecs;
pub mod host;
pub mod snapshot;

use async_trait::async_trait;

use crate::fingerprint::types::{MediaDevice, ScreenFingerprint};

pub use codecs::{canonical_codec_name, CodecCandidate, CodecKind, CodecTable, CODEC_TABLE};
pub use host::HostPlatform;
pub use snapshot::{CapabilitySnapshot, SnapshotPlatform};

/// Why a single probe produced no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
  #[error("{0} is not available on this platform")]
  Unsupported(&'static str),

  #[error("Permission denied: {0}")]
  PermissionDenied(String),

  #[error("Unsupported type: {0}")]
  UnsupportedType(String),

  #[error("Probe failed: {0}")]
  Failed(String),
}

pub type ProbeResult<T> = Result<T, ProbeError>;

/// A vendor/renderer pair as reported by the graphics stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GpuInfo {
  pub vendor: String,
  pub renderer: String,
}

impl GpuInfo {
  pub fn new(vendor: impl Into<String>, renderer: impl Into<String>) -> Self {
    Self {
      vendor: vendor.into(),
      renderer: renderer.into(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoConfiguration {
  pub width: u32,
  pub height: u32,
  pub bitrate: u64,
  pub framerate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioConfiguration {
  pub channels: u32,
  pub bitrate: u64,
  pub samplerate: u32,
}

/// One decoding-capability question.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodingQuery {
  Video {
    content_type: String,
    config: VideoConfiguration,
  },
  Audio {
    content_type: String,
    config: AudioConfiguration,
  },
}

impl DecodingQuery {
  pub fn content_type(&self) -> &str {
    match self {
      DecodingQuery::Video { content_type, .. } | DecodingQuery::Audio { content_type, .. } => {
        content_type
      }
    }
  }
}

/// Environment capabilities the probes read from.
#[async_trait]
pub trait Platform: Send + Sync {
  fn gpu_info(&self) -> ProbeResult<GpuInfo> {
    Err(ProbeError::Unsupported("webgl"))
  }

  fn unmasked_gpu_info(&self) -> ProbeResult<GpuInfo> {
    Err(ProbeError::Unsupported("webgl debug renderer info"))
  }

  fn device_memory(&self) -> ProbeResult<f64> {
    Err(ProbeError::Unsupported("device memory"))
  }

  fn hardware_concurrency(&self) -> ProbeResult<u32> {
    Err(ProbeError::Unsupported("hardware concurrency"))
  }

  fn oscpu(&self) -> ProbeResult<String> {
    Err(ProbeError::Unsupported("oscpu"))
  }

  async fn media_devices(&self) -> ProbeResult<Vec<MediaDevice>> {
    Err(ProbeError::Unsupported("media device enumeration"))
  }

  fn screen(&self) -> ProbeResult<ScreenFingerprint> {
    Err(ProbeError::Unsupported("screen"))
  }

  fn max_touch_points(&self) -> ProbeResult<u32> {
    Err(ProbeError::Unsupported("touch points"))
  }

  fn cookie_enabled(&self) -> ProbeResult<bool> {
    Err(ProbeError::Unsupported("cookies"))
  }

  fn language(&self) -> ProbeResult<String> {
    Err(ProbeError::Unsupported("language"))
  }

  fn languages(&self) -> ProbeResult<Vec<String>> {
    Err(ProbeError::Unsupported("languages"))
  }

  /// Whether the platform can decode `query`. Called once per codec candidate.
  async fn decoding_supported(&self, query: &DecodingQuery) -> ProbeResult<bool> {
    Err(ProbeError::UnsupportedType(query.content_type().to_string()))
  }

  fn pdf_viewer_enabled(&self) -> ProbeResult<bool> {
    Err(ProbeError::Unsupported("pdf viewer"))
  }

  fn user_agent(&self) -> ProbeResult<String> {
    Err(ProbeError::Unsupported("user agent"))
  }

  fn webdriver(&self) -> ProbeResult<bool> {
    Err(ProbeError::Unsupported("webdriver flag"))
  }

  fn build_id(&self) -> ProbeResult<String> {
    Err(ProbeError::Unsupported("build id"))
  }

  fn time_zone(&self) -> ProbeResult<String> {
    Err(ProbeError::Unsupported("time zone"))
  }

  /// Installed font families, once font loading has settled.
  async fn fonts(&self) -> ProbeResult<Vec<String>> {
    Err(ProbeError::Unsupported("fonts"))
  }

  fn product(&self) -> ProbeResult<String> {
    Err(ProbeError::Unsupported("product"))
  }

  fn app_version(&self) -> ProbeResult<String> {
    Err(ProbeError::Unsupported("app version"))
  }

  fn platform(&self) -> ProbeResult<String> {
    Err(ProbeError::Unsupported("platform"))
  }

  fn plugins(&self) -> ProbeResult<Vec<String>> {
    Err(ProbeError::Unsupported("plugins"))
  }
}

/// Unwrap a probe result, logging and substituting the default on failure.
pub(crate) fn or_fallback<T: Default>(probe: &str, result: ProbeResult<T>) -> T {
  match result {
    Ok(value) => value,
    Err(e) => {
      log::debug!("probe {probe} fell back to default: {e}");
      T::default()
    }
  }
}
