//! Media codec candidates and the decoding-support probe.
//!
//! The candidate list is a static table with its own version number; bump
//! `version` whenever a candidate is added, removed or reordered since that
//! changes the fingerprint of every device.

use std::collections::BTreeMap;

use super::{AudioConfiguration, DecodingQuery, Platform, VideoConfiguration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
  Video,
  Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecCandidate {
  pub kind: CodecKind,
  /// MIME type with optional `codecs` parameter.
  pub content_type: &'static str,
}

impl CodecCandidate {
  const fn video(content_type: &'static str) -> Self {
    Self {
      kind: CodecKind::Video,
      content_type,
    }
  }

  const fn audio(content_type: &'static str) -> Self {
    Self {
      kind: CodecKind::Audio,
      content_type,
    }
  }

  pub fn canonical_name(&self) -> String {
    canonical_codec_name(self.content_type)
  }

  pub fn query(&self) -> DecodingQuery {
    let content_type = self.content_type.to_string();
    match self.kind {
      CodecKind::Video => DecodingQuery::Video {
        content_type,
        config: VIDEO_QUERY,
      },
      CodecKind::Audio => DecodingQuery::Audio {
        content_type,
        config: AUDIO_QUERY,
      },
    }
  }
}

#[derive(Debug)]
pub struct CodecTable {
  pub version: u32,
  pub video: &'static [CodecCandidate],
  pub audio: &'static [CodecCandidate],
}

pub const VIDEO_QUERY: VideoConfiguration = VideoConfiguration {
  width: 1920,
  height: 1080,
  bitrate: 2_500_000,
  framerate: 30.0,
};

pub const AUDIO_QUERY: AudioConfiguration = AudioConfiguration {
  channels: 2,
  bitrate: 128_000,
  samplerate: 44_100,
};

pub static CODEC_TABLE: CodecTable = CodecTable {
  version: 1,
  video: &[
    CodecCandidate::video(r#"video/mp4; codecs="avc1.42E01E""#),
    CodecCandidate::video(r#"video/mp4; codecs="avc1.640028""#),
    CodecCandidate::video(r#"video/mp4; codecs="hvc1.1.6.L93.B0""#),
    CodecCandidate::video(r#"video/mp4; codecs="hev1.1.6.L93.B0""#),
    CodecCandidate::video(r#"video/mp4; codecs="av01.0.05M.08""#),
    CodecCandidate::video(r#"video/webm; codecs="vp8""#),
    CodecCandidate::video(r#"video/webm; codecs="vp9""#),
    CodecCandidate::video(r#"video/webm; codecs="vp09.00.10.08""#),
    CodecCandidate::video(r#"video/webm; codecs="av1""#),
    CodecCandidate::video(r#"video/ogg; codecs="theora""#),
    CodecCandidate::video("video/quicktime"),
    CodecCandidate::video("video/x-matroska"),
  ],
  audio: &[
    CodecCandidate::audio(r#"audio/mp4; codecs="mp4a.40.2""#),
    CodecCandidate::audio(r#"audio/mp4; codecs="mp4a.40.5""#),
    CodecCandidate::audio(r#"audio/mp4; codecs="ac-3""#),
    CodecCandidate::audio(r#"audio/mp4; codecs="ec-3""#),
    CodecCandidate::audio(r#"audio/mp4; codecs="flac""#),
    CodecCandidate::audio("audio/mpeg"),
    CodecCandidate::audio(r#"audio/ogg; codecs="vorbis""#),
    CodecCandidate::audio(r#"audio/ogg; codecs="opus""#),
    CodecCandidate::audio(r#"audio/webm; codecs="opus""#),
    CodecCandidate::audio(r#"audio/wav; codecs="1""#),
    CodecCandidate::audio("audio/aac"),
    CodecCandidate::audio("audio/flac"),
  ],
};

/// Short map key for a candidate content type.
///
/// Uses the `codecs` parameter when there is one, otherwise the MIME
/// subtype, and keeps only the part before the first `.` or `-`. Distinct
/// candidates can map to the same key (`avc1.42E01E` and `avc1.640028`
/// both become `avc1`, `x-matroska` becomes `x`); the later one wins.
pub fn canonical_codec_name(content_type: &str) -> String {
  let mut parts = content_type.split(';');
  let mime = parts.next().unwrap_or_default().trim();

  let codec_param = parts.find_map(|param| {
    let (key, value) = param.split_once('=')?;
    if key.trim().eq_ignore_ascii_case("codecs") {
      Some(value.trim().trim_matches('"').trim())
    } else {
      None
    }
  });

  let base = match codec_param {
    Some(codec) if !codec.is_empty() => codec,
    _ => mime.split_once('/').map(|(_, sub)| sub).unwrap_or(mime),
  };

  base
    .split(['.', '-'])
    .next()
    .unwrap_or_default()
    .to_ascii_lowercase()
}

/// Query every candidate in order, one at a time. A failed query records
/// `false` so the key set never depends on what the platform supports.
pub async fn probe_codecs(
  platform: &dyn Platform,
  candidates: &[CodecCandidate],
) -> BTreeMap<String, bool> {
  let mut support = BTreeMap::new();

  for candidate in candidates {
    let supported = match platform.decoding_supported(&candidate.query()).await {
      Ok(supported) => supported,
      Err(e) => {
        log::debug!(
          "decoding probe for {} failed, recording false: {e}",
          candidate.content_type
        );
        false
      }
    };
    support.insert(candidate.canonical_name(), supported);
  }

  support
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::probe::{ProbeError, ProbeResult};
  use async_trait::async_trait;
  use std::sync::Mutex;

  struct Recording {
    seen: Mutex<Vec<String>>,
  }

  #[async_trait]
  impl Platform for Recording {
    async fn decoding_supported(&self, query: &DecodingQuery) -> ProbeResult<bool> {
      let content_type = query.content_type().to_string();
      self.seen.lock().unwrap().push(content_type.clone());
      if content_type.contains("hvc1") {
        return Err(ProbeError::Failed("decoder crashed".to_string()));
      }
      Ok(content_type.contains("webm") || content_type.contains("42E01E"))
    }
  }

  #[test]
  fn test_canonical_names() {
    assert_eq!(canonical_codec_name(r#"video/mp4; codecs="avc1.42E01E""#), "avc1");
    assert_eq!(canonical_codec_name(r#"video/webm; codecs="vp9""#), "vp9");
    assert_eq!(canonical_codec_name(r#"video/webm; codecs="vp09.00.10.08""#), "vp09");
    assert_eq!(canonical_codec_name(r#"audio/mp4; codecs="mp4a.40.2""#), "mp4a");
    assert_eq!(canonical_codec_name(r#"audio/mp4; codecs="ac-3""#), "ac");
    assert_eq!(canonical_codec_name("audio/mpeg"), "mpeg");
    assert_eq!(canonical_codec_name("video/x-matroska"), "x");
    assert_eq!(canonical_codec_name("video/quicktime"), "quicktime");
    assert_eq!(canonical_codec_name("flac"), "flac");
  }

  // Known lossy normalization: these pairs share a key and the later
  // candidate overwrites the earlier one.
  #[test]
  fn test_canonical_name_collisions_are_kept() {
    let video: Vec<String> = CODEC_TABLE.video.iter().map(|c| c.canonical_name()).collect();
    assert_eq!(video.iter().filter(|n| *n == "avc1").count(), 2);

    let audio: Vec<String> = CODEC_TABLE.audio.iter().map(|c| c.canonical_name()).collect();
    assert_eq!(audio.iter().filter(|n| *n == "mp4a").count(), 2);
    assert_eq!(audio.iter().filter(|n| *n == "opus").count(), 2);
  }

  #[tokio::test]
  async fn test_probe_queries_each_candidate_in_order() {
    let platform = Recording {
      seen: Mutex::new(Vec::new()),
    };
    probe_codecs(&platform, CODEC_TABLE.video).await;

    let seen = platform.seen.lock().unwrap().clone();
    let expected: Vec<String> = CODEC_TABLE
      .video
      .iter()
      .map(|c| c.content_type.to_string())
      .collect();
    assert_eq!(seen, expected);
  }

  #[tokio::test]
  async fn test_failed_probe_records_false_and_collision_overwrites() {
    let platform = Recording {
      seen: Mutex::new(Vec::new()),
    };
    let support = probe_codecs(&platform, CODEC_TABLE.video).await;

    // hvc1 errored but still has a key.
    assert_eq!(support.get("hvc1"), Some(&false));
    // avc1.42E01E reported true, avc1.640028 false afterwards: last one wins.
    assert_eq!(support.get("avc1"), Some(&false));
    assert_eq!(support.get("vp8"), Some(&true));
    assert_eq!(support.get("vp09"), Some(&true));
    assert_eq!(support.get("quicktime"), Some(&false));
  }

  #[test]
  fn test_queries_carry_representative_parameters() {
    match CODEC_TABLE.video[0].query() {
      DecodingQuery::Video { config, .. } => {
        assert_eq!((config.width, config.height), (1920, 1080));
        assert_eq!(config.framerate, 30.0);
      }
      other => panic!("expected video query, got {other:?}"),
    }
    match CODEC_TABLE.audio[0].query() {
      DecodingQuery::Audio { config, .. } => assert_eq!(config.channels, 2),
      other => panic!("expected audio query, got {other:?}"),
    }
  }

  #[test]
  fn test_table_version() {
    assert_eq!(CODEC_TABLE.version, 1);
    assert!(!CODEC_TABLE.video.is_empty());
    assert!(!CODEC_TABLE.audio.is_empty());
  }
}
