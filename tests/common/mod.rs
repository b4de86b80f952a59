use ezfingerprint_lib::fingerprint::Fingerprinter;
use ezfingerprint_lib::probe::SnapshotPlatform;
use ezfingerprint_lib::settings_manager::Settings;
use ezfingerprint_lib::storage::TransportRegistry;
use std::sync::Arc;
use tempfile::TempDir;

pub const SNAPSHOT: &str = include_str!("../fixtures/capability_snapshot.json");

/// Utility functions for integration tests
pub struct TestUtils;

impl TestUtils {
  pub fn snapshot_fingerprinter() -> Fingerprinter {
    let platform = SnapshotPlatform::from_json(SNAPSHOT).expect("fixture snapshot parses");
    Fingerprinter::new(Arc::new(platform))
  }

  /// Settings whose file-backed stores all live under `dir`.
  pub fn isolated_settings(dir: &TempDir) -> Settings {
    Settings {
      cookie_jar_path: Some(dir.path().join("cookies.json")),
      local_storage_path: Some(dir.path().join("local_storage.json")),
      database_path: Some(dir.path().join("EZFingerprint.sqlite")),
      ..Default::default()
    }
  }

  pub fn isolated_registry(dir: &TempDir) -> TransportRegistry {
    TransportRegistry::from_settings(&Self::isolated_settings(dir))
  }
}
