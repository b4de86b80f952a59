//! Persistence orchestration: pick a payload, pick a transport, write once.

use crate::error::Result;
use crate::fingerprint::types::{Fingerprint, FingerprintOptions};
use crate::fingerprint::Fingerprinter;
use crate::hash;
use crate::storage::{TransportRegistry, TransportSelector, DEFAULT_RECORD_NAME};

/// What to store and where.
#[derive(Debug, Clone)]
pub struct StoreOptions {
  pub name: String,
  /// Precomputed digest. Takes precedence over `fingerprint`.
  pub hash: Option<String>,
  pub fingerprint: Option<Fingerprint>,
  pub transport: TransportSelector,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      name: DEFAULT_RECORD_NAME.to_string(),
      hash: None,
      fingerprint: None,
      transport: TransportSelector::Default,
    }
  }
}

impl StoreOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn hash(mut self, hash: impl Into<String>) -> Self {
    self.hash = Some(hash.into());
    self
  }

  pub fn fingerprint(mut self, fingerprint: Fingerprint) -> Self {
    self.fingerprint = Some(fingerprint);
    self
  }

  pub fn transport(mut self, transport: impl Into<TransportSelector>) -> Self {
    self.transport = transport.into();
    self
  }
}

/// The record a persistence call wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
  pub name: String,
  pub payload: String,
}

pub struct Persistence {
  fingerprinter: Fingerprinter,
  transports: TransportRegistry,
}

impl Persistence {
  pub fn new(fingerprinter: Fingerprinter, transports: TransportRegistry) -> Self {
    Self {
      fingerprinter,
      transports,
    }
  }

  pub fn fingerprinter(&self) -> &Fingerprinter {
    &self.fingerprinter
  }

  pub fn transports(&self) -> &TransportRegistry {
    &self.transports
  }

  /// Store the digest. Without a hash or a fingerprint in `options`, a
  /// default fingerprint is assembled and hashed first.
  pub async fn store(&self, options: StoreOptions) -> Result<StoredRecord> {
    let payload = match (&options.hash, &options.fingerprint) {
      (Some(hash), _) => hash.clone(),
      (None, Some(fingerprint)) => hash::hash_fingerprint(fingerprint)?,
      (None, None) => self.fingerprinter.hash(None).await?,
    };
    self.write(options, payload).await
  }

  /// Store the full canonical JSON of the fingerprint instead of its digest.
  /// `options.hash` is ignored on this path.
  pub async fn store_raw(&self, options: StoreOptions) -> Result<StoredRecord> {
    let fingerprint = match &options.fingerprint {
      Some(fingerprint) => fingerprint.clone(),
      None => {
        self
          .fingerprinter
          .assemble(&FingerprintOptions::default())
          .await?
      }
    };
    let payload = hash::canonical_json(&fingerprint)?;
    self.write(options, payload).await
  }

  async fn write(&self, options: StoreOptions, payload: String) -> Result<StoredRecord> {
    let transport = self.transports.resolve(&options.transport);
    log::debug!(
      "Persisting {} ({} bytes) via {}",
      options.name,
      payload.len(),
      transport.label()
    );
    transport.store(&options.name, &payload).await?;
    Ok(StoredRecord {
      name: options.name,
      payload,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::FingerprintError;
  use crate::probe::{CapabilitySnapshot, SnapshotPlatform};
  use crate::storage::{
    transport_fn, CookieTransport, DatabaseLocation, DatabaseTransport, LocalStorageTransport,
    MemoryCookieContext, StorageError, Transport,
  };
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use tempfile::TempDir;

  struct Fixture {
    persistence: Persistence,
    cookie: Arc<CookieTransport>,
    local: Arc<LocalStorageTransport>,
    database: Arc<DatabaseTransport>,
    _tmp: TempDir,
  }

  fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let cookie = Arc::new(CookieTransport::new(Arc::new(MemoryCookieContext::new())));
    let local = Arc::new(LocalStorageTransport::new(tmp.path().join("local.json")));
    let database = Arc::new(DatabaseTransport::new(DatabaseLocation::Memory));
    let registry = TransportRegistry::with_builtins(cookie.clone(), local.clone(), database.clone());

    let platform = SnapshotPlatform::new(CapabilitySnapshot {
      hardware_concurrency: Some(8),
      language: Some("en-GB".to_string()),
      ..Default::default()
    });
    let fingerprinter = Fingerprinter::new(Arc::new(platform));

    Fixture {
      persistence: Persistence::new(fingerprinter, registry),
      cookie,
      local,
      database,
      _tmp: tmp,
    }
  }

  #[tokio::test]
  async fn test_default_store_hashes_fresh_fingerprint_into_cookie() {
    let f = fixture();
    let record = f.persistence.store(StoreOptions::new()).await.unwrap();

    assert_eq!(record.name, "default");
    assert_eq!(record.payload.len(), 64);
    assert_eq!(
      f.cookie.load("default").await.unwrap(),
      Some(record.payload.clone())
    );
    let expected = f.persistence.fingerprinter().hash(None).await.unwrap();
    assert_eq!(record.payload, expected);
  }

  #[tokio::test]
  async fn test_precomputed_hash_is_stored_verbatim() {
    let f = fixture();
    f.persistence
      .store(StoreOptions::new().name("a").hash("abc123").transport("local"))
      .await
      .unwrap();
    assert_eq!(f.local.load("a").await.unwrap().as_deref(), Some("abc123"));
  }

  #[tokio::test]
  async fn test_supplied_fingerprint_is_hashed() {
    let f = fixture();
    let mut fingerprint = Fingerprint::default();
    fingerprint.software.platform = "Linux x86_64".to_string();

    let record = f
      .persistence
      .store(
        StoreOptions::new()
          .fingerprint(fingerprint.clone())
          .transport("database"),
      )
      .await
      .unwrap();
    assert_eq!(record.payload, hash::hash_fingerprint(&fingerprint).unwrap());
    assert_eq!(f.database.count().await.unwrap(), 1);
  }

  #[tokio::test]
  async fn test_raw_path_stores_full_record() {
    let f = fixture();
    let record = f
      .persistence
      .store_raw(StoreOptions::new().name("raw").transport("indexedDB"))
      .await
      .unwrap();

    let stored = f.database.load("raw").await.unwrap().unwrap();
    assert_eq!(stored, record.payload);
    let back: Fingerprint = serde_json::from_str(&stored).unwrap();
    assert_eq!(back.hardware.hardware_concurrency, 8);
    assert_eq!(back.software.language, "en-GB");

    let hashed = f
      .persistence
      .store(StoreOptions::new().name("raw").transport("indexedDB"))
      .await
      .unwrap();
    assert_ne!(hashed.payload, record.payload);
    assert_eq!(hashed.payload, hash::digest_hex(stored.as_bytes()));
  }

  #[tokio::test]
  async fn test_overwrite_is_idempotent_for_every_transport() {
    let f = fixture();
    for transport in ["cookie", "local", "database"] {
      for payload in ["first", "second"] {
        f.persistence
          .store(StoreOptions::new().name("a").hash(payload).transport(transport))
          .await
          .unwrap();
      }
    }

    assert_eq!(f.cookie.load("a").await.unwrap().as_deref(), Some("second"));
    assert_eq!(f.local.load("a").await.unwrap().as_deref(), Some("second"));
    assert_eq!(f.database.load("a").await.unwrap().as_deref(), Some("second"));
    assert_eq!(f.local.entries().await.unwrap().len(), 1);
    assert_eq!(f.database.count().await.unwrap(), 1);
  }

  #[tokio::test]
  async fn test_unknown_transport_writes_cookie() {
    let f = fixture();
    f.persistence
      .store(StoreOptions::new().name("x").hash("h").transport("webSQL"))
      .await
      .unwrap();
    assert_eq!(f.cookie.load("x").await.unwrap().as_deref(), Some("h"));
    assert_eq!(f.local.load("x").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_custom_transport_gets_exactly_one_write() {
    let f = fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let custom = transport_fn(move |name, payload| {
      let counter = counter.clone();
      async move {
        assert_eq!(name, "beacon");
        assert_eq!(payload, "digest");
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    });

    f.persistence
      .store(StoreOptions::new().name("beacon").hash("digest").transport(custom))
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_transport_failure_propagates() {
    let f = fixture();
    let failing = transport_fn(|_, _| async { Err(StorageError::custom("sink offline")) });

    let err = f
      .persistence
      .store(StoreOptions::new().hash("h").transport(failing))
      .await
      .unwrap_err();
    assert!(matches!(err, FingerprintError::Storage(_)));
    assert!(err.to_string().contains("sink offline"));
    // No fallback write happened.
    assert_eq!(f.cookie.load("default").await.unwrap(), None);
  }
}
