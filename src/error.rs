//! Crate-wide error type.
//!
//! Local probe failures never reach this type: they are recovered inside the
//! assembler. Everything here is surfaced to the caller.

use crate::storage::StorageError;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, FingerprintError>;

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
  #[error("Network info request to {url} failed: {source}")]
  NetworkRequest {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("Network info endpoint {url} returned HTTP {status}")]
  NetworkStatus { url: String, status: u16 },

  #[error("Network info endpoint {url} returned a non-JSON body: {source}")]
  NetworkBody {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("Network info endpoint {url} returned JSON that is not an object")]
  NetworkShape { url: String },

  #[error("Invalid network info URL: {0}")]
  InvalidUrl(#[from] url::ParseError),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Storage error: {0}")]
  Storage(#[from] StorageError),

  #[error("Settings error: {0}")]
  Settings(String),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

impl FingerprintError {
  pub fn settings(message: impl Into<String>) -> Self {
    Self::Settings(message.into())
  }
}
