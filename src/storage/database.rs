//! Structured database transport on SQLite.
//!
//! The database and its single `fingerprint` table are created on first
//! use. Records are keyed by the bare name, without the namespace prefix.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use super::{StorageError, Transport, DATABASE_TRANSPORT};

pub const DATABASE_FILE: &str = "EZFingerprint.sqlite";
pub const OBJECT_STORE: &str = "fingerprint";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
  File(PathBuf),
  Memory,
}

pub struct DatabaseTransport {
  location: DatabaseLocation,
  connection: OnceCell<Arc<Mutex<Connection>>>,
}

impl DatabaseTransport {
  pub fn new(location: DatabaseLocation) -> Self {
    Self {
      location,
      connection: OnceCell::new(),
    }
  }

  async fn connection(&self) -> Result<Arc<Mutex<Connection>>, StorageError> {
    self
      .connection
      .get_or_try_init(|| async {
        let location = self.location.clone();
        let conn = tokio::task::spawn_blocking(move || open_database(&location)).await??;
        Ok::<_, StorageError>(Arc::new(Mutex::new(conn)))
      })
      .await
      .cloned()
  }

  /// Number of stored records.
  pub async fn count(&self) -> Result<usize, StorageError> {
    let conn = self.connection().await?;
    tokio::task::spawn_blocking(move || -> Result<usize, StorageError> {
      let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
      let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {OBJECT_STORE}"),
        [],
        |row| row.get(0),
      )?;
      Ok(count as usize)
    })
    .await?
  }
}

fn open_database(location: &DatabaseLocation) -> Result<Connection, StorageError> {
  let conn = match location {
    DatabaseLocation::File(path) => {
      if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
      }
      log::debug!("Opening fingerprint database at {}", path.display());
      Connection::open(path)?
    }
    DatabaseLocation::Memory => Connection::open_in_memory()?,
  };

  conn.execute(
    &format!(
      "CREATE TABLE IF NOT EXISTS {OBJECT_STORE} (
        name TEXT PRIMARY KEY NOT NULL,
        payload TEXT NOT NULL
      )"
    ),
    [],
  )?;

  Ok(conn)
}

#[async_trait]
impl Transport for DatabaseTransport {
  fn label(&self) -> &str {
    DATABASE_TRANSPORT
  }

  async fn store(&self, name: &str, payload: &str) -> Result<(), StorageError> {
    let conn = self.connection().await?;
    let name = name.to_string();
    let payload = payload.to_string();

    tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
      let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
      conn.execute(
        &format!(
          "INSERT INTO {OBJECT_STORE} (name, payload) VALUES (?1, ?2)
           ON CONFLICT(name) DO UPDATE SET payload = excluded.payload"
        ),
        params![name, payload],
      )?;
      log::info!("Stored {name} in {OBJECT_STORE} store");
      Ok(())
    })
    .await?
  }

  async fn load(&self, name: &str) -> Result<Option<String>, StorageError> {
    let conn = self.connection().await?;
    let name = name.to_string();

    tokio::task::spawn_blocking(move || -> Result<Option<String>, StorageError> {
      let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
      let payload = conn
        .query_row(
          &format!("SELECT payload FROM {OBJECT_STORE} WHERE name = ?1"),
          params![name],
          |row| row.get(0),
        )
        .optional()?;
      Ok(payload)
    })
    .await?
  }
}
