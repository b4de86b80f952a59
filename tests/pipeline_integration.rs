//! End-to-end pipeline tests
//!
//! Probe a captured capability report, assemble, hash and persist through
//! the file-backed transports, then read everything back.

mod common;

use common::TestUtils;
use ezfingerprint_lib::persist::{Persistence, StoreOptions};
use ezfingerprint_lib::storage::Transport;
use ezfingerprint_lib::{
  hash_fingerprint, Fingerprint, FingerprintError, FingerprintOptions, ProbeGroup,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_snapshot_assembly_fills_every_facet() {
  let fingerprint = TestUtils::snapshot_fingerprinter()
    .assemble(&FingerprintOptions::default())
    .await
    .unwrap();

  assert_eq!(fingerprint.hardware.video_card.vendor, "WebKit");
  assert_eq!(fingerprint.hardware.device_memory, 8.0);
  assert_eq!(fingerprint.hardware.media_devices.len(), 2);
  assert_eq!(fingerprint.software.time_zone, "Europe/Amsterdam");
  assert_eq!(fingerprint.software.video_codecs.get("vp9"), Some(&true));
  // Absent from the report, so the probe failed and recorded false.
  assert_eq!(fingerprint.software.video_codecs.get("theora"), Some(&false));
  assert_eq!(fingerprint.software.audio_codecs.get("mpeg"), Some(&true));

  let value = serde_json::to_value(&fingerprint).unwrap();
  assert!(value.get("network").is_none());
  assert!(value.get("ip").is_none());
}

#[tokio::test]
async fn test_hash_is_stable_across_assemblies() {
  let fingerprinter = TestUtils::snapshot_fingerprinter();
  let first = fingerprinter.hash(None).await.unwrap();
  let second = fingerprinter.hash(None).await.unwrap();
  assert_eq!(first, second);
  assert_eq!(first.len(), 64);

  let skipped = fingerprinter
    .assemble(&FingerprintOptions::new().skip(ProbeGroup::Fonts))
    .await
    .unwrap();
  assert!(skipped.software.fonts.is_empty());
  assert_ne!(hash_fingerprint(&skipped).unwrap(), first);
}

#[tokio::test]
async fn test_store_and_read_back_through_every_transport() {
  let tmp = TempDir::new().unwrap();
  let persistence = Persistence::new(
    TestUtils::snapshot_fingerprinter(),
    TestUtils::isolated_registry(&tmp),
  );
  let digest = persistence.fingerprinter().hash(None).await.unwrap();

  for transport in ["cookie", "local", "database", "localStorage", "indexedDB"] {
    let record = persistence
      .store(StoreOptions::new().name(transport).transport(transport))
      .await
      .unwrap();
    assert_eq!(record.payload, digest);

    let stored = persistence
      .transports()
      .resolve(&transport.into())
      .load(transport)
      .await
      .unwrap();
    assert_eq!(stored.as_deref(), Some(digest.as_str()), "{transport}");
  }

  assert!(tmp.path().join("cookies.json").exists());
  assert!(tmp.path().join("local_storage.json").exists());
  assert!(tmp.path().join("EZFingerprint.sqlite").exists());
}

#[tokio::test]
async fn test_raw_record_round_trips_through_database() {
  let tmp = TempDir::new().unwrap();
  let persistence = Persistence::new(
    TestUtils::snapshot_fingerprinter(),
    TestUtils::isolated_registry(&tmp),
  );

  let record = persistence
    .store_raw(StoreOptions::new().transport("database"))
    .await
    .unwrap();

  // A fresh registry over the same files sees the record.
  let stored = TestUtils::isolated_registry(&tmp)
    .resolve(&"database".into())
    .load("default")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored, record.payload);

  let fingerprint: Fingerprint = serde_json::from_str(&stored).unwrap();
  let assembled = persistence
    .fingerprinter()
    .assemble(&FingerprintOptions::default())
    .await
    .unwrap();
  assert_eq!(fingerprint, assembled);
}

#[tokio::test]
async fn test_unknown_transport_lands_in_cookie_jar() {
  let tmp = TempDir::new().unwrap();
  let registry = TestUtils::isolated_registry(&tmp);
  let persistence = Persistence::new(TestUtils::snapshot_fingerprinter(), registry.clone());

  persistence
    .store(StoreOptions::new().hash("feedface").transport("sessionStorage"))
    .await
    .unwrap();

  let cookie = registry.resolve(&"cookie".into());
  assert_eq!(
    cookie.load("default").await.unwrap().as_deref(),
    Some("feedface")
  );
  let jar = std::fs::read_to_string(tmp.path().join("cookies.json")).unwrap();
  assert!(jar.contains("EZFingerprint-default"));
}

#[tokio::test]
async fn test_network_merge_end_to_end() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/whoami"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "ip": "203.0.113.50",
      "asn": "AS64500",
      "proxy": false
    })))
    .mount(&server)
    .await;

  let fingerprint = TestUtils::snapshot_fingerprinter()
    .assemble(
      &FingerprintOptions::new()
        .with_network_url(format!("{}/whoami", server.uri()))
        .with_include_ip(true),
    )
    .await
    .unwrap();

  assert_eq!(fingerprint.ip.as_deref(), Some("203.0.113.50"));
  assert_eq!(
    fingerprint.network,
    Some(json!({"asn": "AS64500", "proxy": false}))
  );
}

#[tokio::test]
async fn test_malformed_network_body_fails_assembly() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
    .mount(&server)
    .await;

  let result = TestUtils::snapshot_fingerprinter()
    .assemble(&FingerprintOptions::new().with_network_url(server.uri()))
    .await;
  assert!(matches!(result, Err(FingerprintError::NetworkBody { .. })));
}
