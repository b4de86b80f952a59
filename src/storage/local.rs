//! Local key-value transport backed by one JSON object file.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{storage_key, StorageError, Transport, LOCAL_TRANSPORT};

pub struct LocalStorageTransport {
  path: PathBuf,
  lock: Mutex<()>,
}

impl LocalStorageTransport {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock: Mutex::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Every stored key with its value.
  pub async fn entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
    let _guard = self.lock.lock().await;
    self.read_all().await
  }

  async fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
    match tokio::fs::read_to_string(&self.path).await {
      Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
      Ok(content) => Ok(serde_json::from_str(&content)?),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
      Err(e) => Err(e.into()),
    }
  }

  async fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
    if let Some(parent) = self.path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    tokio::fs::write(&self.path, json).await?;
    Ok(())
  }
}

#[async_trait]
impl Transport for LocalStorageTransport {
  fn label(&self) -> &str {
    LOCAL_TRANSPORT
  }

  async fn store(&self, name: &str, payload: &str) -> Result<(), StorageError> {
    let key = storage_key(name);
    let _guard = self.lock.lock().await;

    let mut entries = self.read_all().await?;
    entries.insert(key.clone(), payload.to_string());
    self.write_all(&entries).await?;

    log::info!("Stored {key} in {}", self.path.display());
    Ok(())
  }

  async fn load(&self, name: &str) -> Result<Option<String>, StorageError> {
    let _guard = self.lock.lock().await;
    Ok(self.read_all().await?.remove(&storage_key(name)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn test_overwrite_keeps_one_entry() {
    let tmp = TempDir::new().unwrap();
    let transport = LocalStorageTransport::new(tmp.path().join("local.json"));

    transport.store("a", "first").await.unwrap();
    transport.store("b", "other").await.unwrap();
    transport.store("a", "second").await.unwrap();

    let entries = transport.entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries.get("EZFingerprint-a").map(String::as_str), Some("second"));
    assert_eq!(transport.load("a").await.unwrap().as_deref(), Some("second"));
  }

  #[tokio::test]
  async fn test_missing_file_reads_empty() {
    let tmp = TempDir::new().unwrap();
    let transport = LocalStorageTransport::new(tmp.path().join("absent").join("local.json"));
    assert!(transport.entries().await.unwrap().is_empty());
    assert_eq!(transport.load("a").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_corrupt_file_surfaces_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("local.json");
    std::fs::write(&path, "{not json").unwrap();

    let transport = LocalStorageTransport::new(&path);
    assert!(matches!(
      transport.store("a", "x").await,
      Err(StorageError::Json(_))
    ));
  }
}
