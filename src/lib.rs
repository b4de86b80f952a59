//! Device fingerprinting: probe the environment, assemble a record, digest
//! it, and persist the digest (or the full record) through a pluggable
//! transport. A small header normalizer covers the server side.

pub mod app_dirs;
pub mod error;
pub mod fingerprint;
pub mod hash;
pub mod persist;
pub mod probe;
pub mod server;
pub mod settings_manager;
pub mod storage;

pub use error::{FingerprintError, Result};
pub use fingerprint::types::{
  Fingerprint, FingerprintOptions, HardwareFingerprint, MediaDevice, ProbeGroup,
  ScreenFingerprint, SoftwareFingerprint, VideoCard,
};
pub use fingerprint::Fingerprinter;
pub use hash::{canonical_json, hash_fingerprint};
pub use persist::{Persistence, StoreOptions, StoredRecord};
pub use probe::{CapabilitySnapshot, HostPlatform, Platform, ProbeError, SnapshotPlatform};
pub use server::{normalize_headers, parse_accept_language, NormalizedRequest};
pub use settings_manager::{Settings, SettingsManager};
pub use storage::{
  transport_fn, StorageError, Transport, TransportRegistry, TransportSelector, NAMESPACE,
};
