use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Error, Result};

/// The literal `lastAccess` wire format used at the KV boundary.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|e| Error::Parse("lastAccess".to_string(), e.to_string()))?;
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}

pub fn service_root(prefix: &str, name: &str) -> String {
    format!("{prefix}/{name}")
}

pub fn service_leaf(prefix: &str, name: &str, leaf: &str) -> String {
    format!("{prefix}/{name}/{leaf}")
}

pub fn domain_root(prefix: &str, name: &str) -> String {
    format!("{prefix}/{name}")
}

pub fn domain_leaf(prefix: &str, name: &str, leaf: &str) -> String {
    format!("{prefix}/{name}/{leaf}")
}

/// Extracts the service/domain name from a node's full key given its
/// prefix, e.g. `env_from_node("/services", "/services/svc-1/status/current")
/// == Some("svc-1")`.
pub fn env_from_node(prefix: &str, node_key: &str) -> Option<String> {
    let rest = node_key.strip_prefix(prefix)?.trim_start_matches('/');
    rest.split('/').next().map(|s| s.to_string())
}
