//! Cookie transport.
//!
//! Writes go through a [`CookieContext`], which mirrors the
//! `document.cookie` surface: reading yields `k=v; k2=v2`, writing takes one
//! assignment string with attributes. The transport never touches a jar
//! directly, so any cookie store can sit behind it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{storage_key, StorageError, Transport, COOKIE_TRANSPORT};

pub const DEFAULT_EXPIRY_DAYS: i64 = 365;

/// HTTP date as used in the `expires` attribute.
const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[async_trait]
pub trait CookieContext: Send + Sync {
  /// All live cookies as `name=value` pairs joined by `"; "`.
  async fn cookie_string(&self) -> Result<String, StorageError>;

  /// Apply one `name=value; attr=...` assignment.
  async fn write_cookie(&self, assignment: &str) -> Result<(), StorageError>;
}

pub struct CookieTransport {
  context: Arc<dyn CookieContext>,
  expiry_days: i64,
}

impl CookieTransport {
  pub fn new(context: Arc<dyn CookieContext>) -> Self {
    Self {
      context,
      expiry_days: DEFAULT_EXPIRY_DAYS,
    }
  }

  /// Days until a stored cookie expires. Checked on every `store`, which
  /// fails unless this is positive and representable.
  pub fn with_expiry_days(mut self, days: i64) -> Self {
    self.expiry_days = days;
    self
  }

  async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
    let cookies = self.context.cookie_string().await?;
    match find_cookie(&cookies, key) {
      Some(raw) => {
        let value = urlencoding::decode(raw)
          .map_err(|e| StorageError::cookie(format!("undecodable value for {key}: {e}")))?;
        Ok(Some(value.into_owned()))
      }
      None => Ok(None),
    }
  }
}

#[async_trait]
impl Transport for CookieTransport {
  fn label(&self) -> &str {
    COOKIE_TRANSPORT
  }

  async fn store(&self, name: &str, payload: &str) -> Result<(), StorageError> {
    let key = cookie_key(name);
    let expires = expiry_after(Utc::now(), self.expiry_days)?;
    let cookies = self.context.cookie_string().await?;

    if find_cookie(&cookies, &key).is_some() {
      self.context.write_cookie(&expired_assignment(&key)).await?;
    }

    self
      .context
      .write_cookie(&cookie_assignment(&key, payload, expires))
      .await?;

    log::info!("Stored {key} in cookie, expires in {} days", self.expiry_days);
    Ok(())
  }

  async fn load(&self, name: &str) -> Result<Option<String>, StorageError> {
    self.read(&cookie_key(name)).await
  }
}

/// Storage key with the record name percent-encoded, so `=`, `;` and
/// whitespace in a name cannot leak into the cookie syntax.
pub fn cookie_key(name: &str) -> String {
  storage_key(&urlencoding::encode(name))
}

fn expiry_after(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, StorageError> {
  if days <= 0 {
    return Err(StorageError::cookie(format!(
      "expiry must be at least one day, got {days}"
    )));
  }
  Duration::try_days(days)
    .and_then(|delta| now.checked_add_signed(delta))
    .ok_or_else(|| StorageError::cookie(format!("expiry of {days} days is out of range")))
}

pub fn cookie_assignment(key: &str, value: &str, expires: DateTime<Utc>) -> String {
  format!(
    "{key}={}; expires={}; path=/; SameSite=Strict",
    urlencoding::encode(value),
    expires.format(COOKIE_DATE_FORMAT)
  )
}

fn expired_assignment(key: &str) -> String {
  format!("{key}=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/; SameSite=Strict")
}

fn find_cookie<'a>(cookies: &'a str, key: &str) -> Option<&'a str> {
  cookies.split(';').find_map(|pair| {
    let (name, value) = pair.trim().split_once('=')?;
    (name == key).then_some(value)
  })
}

/// One cookie as kept by the built-in jars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
  pub value: String,
  pub expires: Option<DateTime<Utc>>,
  pub path: Option<String>,
  pub same_site: Option<String>,
}

/// Name-keyed cookie jar shared by the built-in contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
  cookies: BTreeMap<String, StoredCookie>,
}

impl CookieJar {
  pub fn apply(&mut self, assignment: &str, now: DateTime<Utc>) -> Result<(), StorageError> {
    let mut parts = assignment.split(';');
    let (name, value) = parts
      .next()
      .and_then(|pair| pair.split_once('='))
      .ok_or_else(|| StorageError::cookie(format!("malformed assignment: {assignment}")))?;
    let name = name.trim();
    if name.is_empty() {
      return Err(StorageError::cookie("cookie name is empty"));
    }

    let mut cookie = StoredCookie {
      value: value.trim().to_string(),
      expires: None,
      path: None,
      same_site: None,
    };

    for attribute in parts {
      let (key, val) = match attribute.split_once('=') {
        Some((key, val)) => (key.trim(), val.trim()),
        None => (attribute.trim(), ""),
      };
      match key.to_ascii_lowercase().as_str() {
        "expires" => cookie.expires = Some(parse_cookie_date(val)?),
        "path" => cookie.path = Some(val.to_string()),
        "samesite" => cookie.same_site = Some(val.to_string()),
        _ => {}
      }
    }

    if cookie.expires.is_some_and(|expires| expires <= now) {
      self.cookies.remove(name);
    } else {
      self.cookies.insert(name.to_string(), cookie);
    }
    Ok(())
  }

  pub fn cookie_string(&self, now: DateTime<Utc>) -> String {
    self
      .cookies
      .iter()
      .filter(|(_, cookie)| !cookie.expires.is_some_and(|expires| expires <= now))
      .map(|(name, cookie)| format!("{name}={}", cookie.value))
      .collect::<Vec<_>>()
      .join("; ")
  }

  pub fn get(&self, name: &str) -> Option<&StoredCookie> {
    self.cookies.get(name)
  }

  pub fn len(&self) -> usize {
    self.cookies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cookies.is_empty()
  }
}

fn parse_cookie_date(value: &str) -> Result<DateTime<Utc>, StorageError> {
  NaiveDateTime::parse_from_str(value, COOKIE_DATE_FORMAT)
    .map(|naive| naive.and_utc())
    .map_err(|e| StorageError::cookie(format!("invalid expires {value:?}: {e}")))
}

/// Jar held in memory for the life of the process.
#[derive(Default)]
pub struct MemoryCookieContext {
  jar: Mutex<CookieJar>,
}

impl MemoryCookieContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn jar(&self) -> Result<CookieJar, StorageError> {
    Ok(self.jar.lock().map_err(|_| StorageError::LockPoisoned)?.clone())
  }
}

#[async_trait]
impl CookieContext for MemoryCookieContext {
  async fn cookie_string(&self) -> Result<String, StorageError> {
    let jar = self.jar.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(jar.cookie_string(Utc::now()))
  }

  async fn write_cookie(&self, assignment: &str) -> Result<(), StorageError> {
    let mut jar = self.jar.lock().map_err(|_| StorageError::LockPoisoned)?;
    jar.apply(assignment, Utc::now())
  }
}

/// Jar persisted as JSON so records survive between CLI runs.
pub struct FileCookieContext {
  path: PathBuf,
  lock: tokio::sync::Mutex<()>,
}

impl FileCookieContext {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock: tokio::sync::Mutex::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub async fn jar(&self) -> Result<CookieJar, StorageError> {
    let _guard = self.lock.lock().await;
    self.read_jar().await
  }

  async fn read_jar(&self) -> Result<CookieJar, StorageError> {
    match tokio::fs::read_to_string(&self.path).await {
      Ok(content) if content.trim().is_empty() => Ok(CookieJar::default()),
      Ok(content) => Ok(serde_json::from_str(&content)?),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CookieJar::default()),
      Err(e) => Err(e.into()),
    }
  }

  async fn write_jar(&self, jar: &CookieJar) -> Result<(), StorageError> {
    if let Some(parent) = self.path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(jar)?;
    tokio::fs::write(&self.path, json).await?;
    Ok(())
  }
}

#[async_trait]
impl CookieContext for FileCookieContext {
  async fn cookie_string(&self) -> Result<String, StorageError> {
    Ok(self.jar().await?.cookie_string(Utc::now()))
  }

  async fn write_cookie(&self, assignment: &str) -> Result<(), StorageError> {
    let _guard = self.lock.lock().await;
    let mut jar = self.read_jar().await?;
    jar.apply(assignment, Utc::now())?;
    self.write_jar(&jar).await
  }
}
