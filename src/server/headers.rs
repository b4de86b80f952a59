//! Request header normalization for server-side fingerprinting.

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Headers dropped before anything else looks at the request. They either
/// identify the site rather than the client, carry state, or are set by
/// intermediaries.
pub const STRIPPED_HEADERS: &[&str] = &[
  "host",
  "referer",
  "cookie",
  "if-none-match",
  "if-modified-since",
  "if-match",
  "if-unmodified-since",
  "if-range",
  "forwarded",
  "x-forwarded-for",
  "x-forwarded-host",
  "x-forwarded-proto",
  "x-forwarded-port",
  "x-real-ip",
  "via",
];

pub const CLIENT_HINT_MARKER: &str = "sec-ch";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageEntry {
  pub code: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,
  pub quality: f64,
  pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRequest {
  pub headers: BTreeMap<String, String>,
  #[serde(rename = "headersLength")]
  pub headers_length: usize,
  #[serde(rename = "headersPresent")]
  pub headers_present: Vec<String>,
  #[serde(rename = "sec-ch")]
  pub client_hints: BTreeMap<String, String>,
  pub accept: Option<String>,
  #[serde(rename = "user-agent")]
  pub user_agent: Option<String>,
  pub ip: Option<String>,
  pub languages: Vec<LanguageEntry>,
}

/// Normalize inbound headers.
///
/// Names are lowercased; repeated headers are joined with `", "`. The client
/// IP is the first `x-forwarded-for` entry only when `trust_proxy` is set,
/// otherwise (or when that header is absent) the transport address.
pub fn normalize_headers<I, K, V>(
  headers: I,
  remote_addr: Option<IpAddr>,
  trust_proxy: bool,
) -> NormalizedRequest
where
  I: IntoIterator<Item = (K, V)>,
  K: AsRef<str>,
  V: AsRef<str>,
{
  let mut all: BTreeMap<String, String> = BTreeMap::new();
  for (name, value) in headers {
    let name = name.as_ref().trim().to_ascii_lowercase();
    let value = value.as_ref();
    all
      .entry(name)
      .and_modify(|existing| {
        existing.push_str(", ");
        existing.push_str(value);
      })
      .or_insert_with(|| value.to_string());
  }

  let forwarded_ip = if trust_proxy {
    all.get("x-forwarded-for").and_then(|value| first_forwarded(value))
  } else {
    None
  };
  let ip = forwarded_ip.or_else(|| remote_addr.map(|addr| addr.to_canonical().to_string()));

  let languages = all
    .get("accept-language")
    .map(|raw| parse_accept_language(raw))
    .unwrap_or_default();

  let headers: BTreeMap<String, String> = all
    .into_iter()
    .filter(|(name, _)| !STRIPPED_HEADERS.contains(&name.as_str()))
    .collect();

  let client_hints = headers
    .iter()
    .filter(|(name, _)| name.contains(CLIENT_HINT_MARKER))
    .map(|(name, value)| (name.clone(), value.clone()))
    .collect();

  NormalizedRequest {
    headers_length: headers.len(),
    headers_present: headers.keys().cloned().collect(),
    client_hints,
    accept: headers.get("accept").cloned(),
    user_agent: headers.get("user-agent").cloned(),
    ip,
    languages,
    headers,
  }
}

fn first_forwarded(value: &str) -> Option<String> {
  value
    .split(',')
    .next()
    .map(str::trim)
    .filter(|ip| !ip.is_empty())
    .map(str::to_string)
}

/// Parse an `Accept-Language` value, highest quality first.
///
/// A missing weight counts as `1.0`, an unparseable one as `0.0`. Entries
/// with equal weight keep their header order.
pub fn parse_accept_language(raw: &str) -> Vec<LanguageEntry> {
  let mut entries: Vec<LanguageEntry> = raw
    .split(',')
    .filter_map(|token| {
      let token = token.trim();
      if token.is_empty() {
        return None;
      }

      let mut parts = token.split(';');
      let tag = parts.next().unwrap_or_default().trim();
      let mut subtags = tag.split('-');
      let code = subtags.next().unwrap_or_default().to_string();
      let region = subtags
        .next()
        .filter(|region| !region.is_empty())
        .map(str::to_string);

      let quality = parts
        .find_map(|param| {
          let (key, value) = param.split_once('=')?;
          key.trim().eq_ignore_ascii_case("q").then(|| value.trim())
        })
        .map(|value| value.parse::<f64>().ok().filter(|q| q.is_finite()).unwrap_or(0.0))
        .unwrap_or(1.0);

      Some(LanguageEntry {
        code,
        region,
        quality,
        raw: token.to_string(),
      })
    })
    .collect();

  entries.sort_by(|a, b| b.quality.total_cmp(&a.quality));
  entries
}
