//! Fingerprint assembly.
//!
//! Local probes run first, one after another, each recovering to its
//! fallback on failure. The optional network merge runs last and is the
//! only step allowed to fail the whole assembly.

pub mod network;
pub mod types;

use std::sync::Arc;

use crate::error::Result;
use crate::hash;
use crate::probe::codecs::{probe_codecs, CODEC_TABLE};
use crate::probe::{or_fallback, Platform};
use types::*;

pub use network::{fetch_network_info, NetworkInfo};

/// Assembles fingerprints from an injected [`Platform`].
///
/// Holds no state between calls; every fingerprint is built fresh.
#[derive(Clone)]
pub struct Fingerprinter {
  platform: Arc<dyn Platform>,
  client: reqwest::Client,
}

impl Fingerprinter {
  pub fn new(platform: Arc<dyn Platform>) -> Self {
    Self {
      platform,
      client: reqwest::Client::new(),
    }
  }

  /// Use a preconfigured HTTP client for the network merge.
  pub fn with_client(mut self, client: reqwest::Client) -> Self {
    self.client = client;
    self
  }

  pub async fn assemble(&self, options: &FingerprintOptions) -> Result<Fingerprint> {
    let hardware = self.hardware(options).await;
    let software = self.software(options).await;

    let mut fingerprint = Fingerprint {
      hardware,
      software,
      network: None,
      ip: None,
    };

    if let Some(url) = &options.network_url {
      let info = fetch_network_info(&self.client, url).await?;
      fingerprint.network = Some(info.network);
      if options.include_ip {
        fingerprint.ip = info.ip;
      }
    }

    Ok(fingerprint)
  }

  /// Digest of `fingerprint`, or of a freshly assembled default one.
  pub async fn hash(&self, fingerprint: Option<&Fingerprint>) -> Result<String> {
    match fingerprint {
      Some(fingerprint) => hash::hash_fingerprint(fingerprint),
      None => {
        let fingerprint = self.assemble(&FingerprintOptions::default()).await?;
        hash::hash_fingerprint(&fingerprint)
      }
    }
  }

  async fn hardware(&self, options: &FingerprintOptions) -> HardwareFingerprint {
    let platform = self.platform.as_ref();

    let mut video_card = VideoCard::default();
    if !options.skips(ProbeGroup::Webgl) {
      let gpu = or_fallback("webgl", platform.gpu_info());
      video_card.vendor = gpu.vendor;
      video_card.renderer = gpu.renderer;

      if !options.skips(ProbeGroup::WebglUnmasked) {
        let unmasked = or_fallback("webgl-unmasked", platform.unmasked_gpu_info());
        video_card.unmasked_vendor = unmasked.vendor;
        video_card.unmasked_renderer = unmasked.renderer;
      }
    }

    let media_devices = if options.skips(ProbeGroup::MediaDevices) {
      Vec::new()
    } else {
      or_fallback("media-devices", platform.media_devices().await)
    };

    HardwareFingerprint {
      video_card,
      device_memory: or_fallback("device-memory", platform.device_memory()),
      hardware_concurrency: or_fallback("hardware-concurrency", platform.hardware_concurrency()),
      oscpu: or_fallback("oscpu", platform.oscpu()),
      media_devices,
      screen: or_fallback("screen", platform.screen()),
      max_touch_points: or_fallback("max-touch-points", platform.max_touch_points()),
    }
  }

  async fn software(&self, options: &FingerprintOptions) -> SoftwareFingerprint {
    let platform = self.platform.as_ref();

    let video_codecs = if options.skips(ProbeGroup::VideoCodecs) {
      Default::default()
    } else {
      probe_codecs(platform, CODEC_TABLE.video).await
    };

    let audio_codecs = if options.skips(ProbeGroup::AudioCodecs) {
      Default::default()
    } else {
      probe_codecs(platform, CODEC_TABLE.audio).await
    };

    let fonts = if options.skips(ProbeGroup::Fonts) {
      Vec::new()
    } else {
      or_fallback("fonts", platform.fonts().await)
    };

    let plugins = if options.skips(ProbeGroup::Plugins) {
      Vec::new()
    } else {
      or_fallback("plugins", platform.plugins())
    };

    SoftwareFingerprint {
      cookie_enabled: or_fallback("cookie-enabled", platform.cookie_enabled()),
      language: or_fallback("language", platform.language()),
      languages: or_fallback("languages", platform.languages()),
      video_codecs,
      audio_codecs,
      pdf_viewer_enabled: or_fallback("pdf-viewer", platform.pdf_viewer_enabled()),
      user_agent: or_fallback("user-agent", platform.user_agent()),
      webdriver: or_fallback("webdriver", platform.webdriver()),
      build_id: or_fallback("build-id", platform.build_id()),
      time_zone: or_fallback("time-zone", platform.time_zone()),
      fonts,
      product: or_fallback("product", platform.product()),
      app_version: or_fallback("app-version", platform.app_version()),
      platform: or_fallback("platform", platform.platform()),
      plugins,
    }
  }
}
