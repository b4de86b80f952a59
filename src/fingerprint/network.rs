//! Network-info merge.
//!
//! Unlike local probes this step is opt-in, so every failure is fatal for
//! the assembly: transport errors, non-success status, a body that is not
//! JSON, or JSON that is not an object.

use serde_json::{Map, Value};
use url::Url;

use crate::error::{FingerprintError, Result};

/// Network facet plus the `ip` split out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInfo {
  pub network: Value,
  pub ip: Option<String>,
}

/// Fetch `url` and return its JSON object, with `ip` moved out of it.
///
/// No timeout is applied; a hung endpoint hangs the caller.
pub async fn fetch_network_info(client: &reqwest::Client, url: &str) -> Result<NetworkInfo> {
  let parsed = Url::parse(url)?;
  log::debug!("fetching network info from {parsed}");

  let response = client
    .get(parsed)
    .send()
    .await
    .map_err(|source| FingerprintError::NetworkRequest {
      url: url.to_string(),
      source,
    })?;

  let status = response.status();
  if !status.is_success() {
    return Err(FingerprintError::NetworkStatus {
      url: url.to_string(),
      status: status.as_u16(),
    });
  }

  let body = response
    .bytes()
    .await
    .map_err(|source| FingerprintError::NetworkRequest {
      url: url.to_string(),
      source,
    })?;

  let value: Value =
    serde_json::from_slice(&body).map_err(|source| FingerprintError::NetworkBody {
      url: url.to_string(),
      source,
    })?;

  match value {
    Value::Object(object) => Ok(split_ip(object)),
    _ => Err(FingerprintError::NetworkShape {
      url: url.to_string(),
    }),
  }
}

fn split_ip(mut object: Map<String, Value>) -> NetworkInfo {
  let ip = match object.remove("ip") {
    Some(Value::String(ip)) => Some(ip),
    Some(Value::Null) | None => None,
    Some(other) => Some(other.to_string()),
  };
  NetworkInfo {
    network: Value::Object(object),
    ip,
  }
}
