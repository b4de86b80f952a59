//! Pluggable sinks for named payloads.
//!
//! Every sink implements [`Transport`]. The three built-ins are registered in
//! a [`TransportRegistry`] and picked with a [`TransportSelector`]; callers
//! can also hand in their own sink, including a plain async closure through
//! [`transport_fn`].

pub mod cookie;
pub mod database;
pub mod local;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::settings_manager::Settings;

pub use cookie::{CookieContext, CookieTransport, FileCookieContext, MemoryCookieContext};
pub use database::{DatabaseLocation, DatabaseTransport};
pub use local::LocalStorageTransport;

/// Prefix for cookie and local key-value storage keys.
pub const NAMESPACE: &str = "EZFingerprint";

/// Record name used when the caller does not pick one.
pub const DEFAULT_RECORD_NAME: &str = "default";

pub const COOKIE_TRANSPORT: &str = "cookie";
pub const LOCAL_TRANSPORT: &str = "local";
pub const DATABASE_TRANSPORT: &str = "database";

/// `<namespace>-<name>`
pub fn storage_key(name: &str) -> String {
  format!("{NAMESPACE}-{name}")
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Invalid stored JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("Cookie error: {0}")]
  Cookie(String),

  #[error("Background storage task failed: {0}")]
  Task(#[from] tokio::task::JoinError),

  #[error("Storage lock poisoned")]
  LockPoisoned,

  #[error("Transport {0} cannot read records back")]
  ReadUnsupported(String),

  #[error("{0}")]
  Custom(String),
}

impl StorageError {
  pub fn custom(message: impl Into<String>) -> Self {
    Self::Custom(message.into())
  }

  pub fn cookie(message: impl Into<String>) -> Self {
    Self::Cookie(message.into())
  }
}

/// A sink for one named payload.
///
/// `store` overwrites whatever was stored under `name` before.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Short label used in logs.
  fn label(&self) -> &str {
    "custom"
  }

  async fn store(&self, name: &str, payload: &str) -> Result<(), StorageError>;

  /// Read a record back. Write-only sinks keep the default.
  async fn load(&self, name: &str) -> Result<Option<String>, StorageError> {
    let _ = name;
    Err(StorageError::ReadUnsupported(self.label().to_string()))
  }
}

/// Adapter turning an async closure into a [`Transport`].
pub struct FnTransport<F> {
  f: F,
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
  F: Fn(String, String) -> Fut + Send + Sync,
  Fut: Future<Output = Result<(), StorageError>> + Send,
{
  async fn store(&self, name: &str, payload: &str) -> Result<(), StorageError> {
    (self.f)(name.to_string(), payload.to_string()).await
  }
}

/// Wrap `f` so it can be used wherever a transport is expected.
pub fn transport_fn<F, Fut>(f: F) -> Arc<dyn Transport>
where
  F: Fn(String, String) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<(), StorageError>> + Send + 'static,
{
  Arc::new(FnTransport { f })
}

/// How a caller picks the sink for one write.
#[derive(Clone, Default)]
pub enum TransportSelector {
  /// The registry's default, the cookie transport unless configured.
  #[default]
  Default,
  /// A registered name. Unknown names resolve to the cookie transport.
  Named(String),
  Custom(Arc<dyn Transport>),
}

impl fmt::Debug for TransportSelector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Default => f.write_str("Default"),
      Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
      Self::Custom(transport) => f.debug_tuple("Custom").field(&transport.label()).finish(),
    }
  }
}

impl From<&str> for TransportSelector {
  fn from(name: &str) -> Self {
    Self::Named(name.to_string())
  }
}

impl From<String> for TransportSelector {
  fn from(name: String) -> Self {
    Self::Named(name)
  }
}

impl From<Option<String>> for TransportSelector {
  fn from(name: Option<String>) -> Self {
    name.map(Self::Named).unwrap_or_default()
  }
}

impl From<Arc<dyn Transport>> for TransportSelector {
  fn from(transport: Arc<dyn Transport>) -> Self {
    Self::Custom(transport)
  }
}

/// Lookup table of named transports with the cookie transport as fallback.
#[derive(Clone)]
pub struct TransportRegistry {
  transports: HashMap<String, Arc<dyn Transport>>,
  cookie: Arc<dyn Transport>,
  default_name: Option<String>,
}

impl TransportRegistry {
  /// A registry holding only the cookie transport.
  pub fn new(cookie: Arc<dyn Transport>) -> Self {
    let mut transports = HashMap::new();
    transports.insert(COOKIE_TRANSPORT.to_string(), cookie.clone());
    Self {
      transports,
      cookie,
      default_name: None,
    }
  }

  /// Register the three built-ins under their names and the browser-style
  /// aliases `localStorage` and `indexedDB`.
  pub fn with_builtins(
    cookie: Arc<dyn Transport>,
    local: Arc<dyn Transport>,
    database: Arc<dyn Transport>,
  ) -> Self {
    let mut registry = Self::new(cookie);
    registry.register(LOCAL_TRANSPORT, local.clone());
    registry.register("localStorage", local);
    registry.register(DATABASE_TRANSPORT, database.clone());
    registry.register("indexedDB", database);
    registry
  }

  /// File-backed built-ins at the locations named in `settings`.
  pub fn from_settings(settings: &Settings) -> Self {
    let cookie = CookieTransport::new(Arc::new(FileCookieContext::new(settings.cookie_jar_path())))
      .with_expiry_days(settings.cookie_expiry_days);
    let local = LocalStorageTransport::new(settings.local_storage_path());
    let database = DatabaseTransport::new(DatabaseLocation::File(settings.database_path()));

    let mut registry = Self::with_builtins(Arc::new(cookie), Arc::new(local), Arc::new(database));
    if let Some(name) = &settings.default_transport {
      registry = registry.with_default(name.clone());
    }
    registry
  }

  /// Name resolved for [`TransportSelector::Default`].
  pub fn with_default(mut self, name: impl Into<String>) -> Self {
    self.default_name = Some(name.into());
    self
  }

  pub fn register(&mut self, name: impl Into<String>, transport: Arc<dyn Transport>) {
    self.transports.insert(name.into(), transport);
  }

  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.transports.keys().cloned().collect();
    names.sort();
    names
  }

  pub fn resolve(&self, selector: &TransportSelector) -> Arc<dyn Transport> {
    match selector {
      TransportSelector::Custom(transport) => transport.clone(),
      TransportSelector::Named(name) => self.lookup(name),
      TransportSelector::Default => match &self.default_name {
        Some(name) => self.lookup(name),
        None => self.cookie.clone(),
      },
    }
  }

  fn lookup(&self, name: &str) -> Arc<dyn Transport> {
    match self.transports.get(name) {
      Some(transport) => transport.clone(),
      None => {
        log::debug!("unknown transport {name:?}, falling back to cookie");
        self.cookie.clone()
      }
    }
  }
}
