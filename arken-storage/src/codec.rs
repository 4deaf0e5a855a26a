use std::collections::HashMap;

use arken_core::{Domain, Location, Service, ServiceConfig, Status, StatusToken};

use crate::error::{Error, Result};
use crate::tree;

/// A service's subtree, keyed by the leaf path relative to its root
/// (`status/current`, `location`, `config`, `actions`, `domain`,
/// `lastAccess`), values as raw bytes exactly as read from/written to the
/// KV store.
pub type Leaves = HashMap<String, Vec<u8>>;

pub fn status_token_to_str(token: StatusToken) -> &'static str {
    match token {
        StatusToken::Starting => "starting",
        StatusToken::Started => "started",
        StatusToken::Stopping => "stopping",
        StatusToken::Stopped => "stopped",
        StatusToken::Passivated => "passivated",
        StatusToken::Error => "error",
        StatusToken::Warning => "warning",
        StatusToken::Na => "n/a",
    }
}

pub fn status_token_from_str(raw: &str) -> Result<StatusToken> {
    Ok(match raw {
        "starting" => StatusToken::Starting,
        "started" => StatusToken::Started,
        "stopping" => StatusToken::Stopping,
        "stopped" => StatusToken::Stopped,
        "passivated" => StatusToken::Passivated,
        "error" => StatusToken::Error,
        "warning" => StatusToken::Warning,
        "n/a" => StatusToken::Na,
        other => return Err(Error::Parse("status".to_string(), other.to_string())),
    })
}

/// Builds the full set of leaves for a service, used when creating a node
/// from scratch (every leaf is written unconditionally).
pub fn encode_service(service: &Service) -> Leaves {
    let mut leaves = Leaves::new();
    leaves.insert(
        "status/expected".to_string(),
        status_token_to_str(service.status.expected).as_bytes().to_vec(),
    );
    leaves.insert(
        "status/current".to_string(),
        status_token_to_str(service.status.current).as_bytes().to_vec(),
    );
    leaves.insert(
        "status/alive".to_string(),
        if service.status.alive { b"1".to_vec() } else { Vec::new() },
    );
    leaves.insert(
        "location".to_string(),
        serde_json::to_vec(&service.location).expect("Location always serializes"),
    );
    leaves.insert(
        "config".to_string(),
        serde_json::to_vec(&service.config).expect("ServiceConfig always serializes"),
    );
    leaves.insert(
        "actions".to_string(),
        serde_json::to_vec(&service.actions).expect("ActionSet always serializes"),
    );
    leaves.insert("domain".to_string(), service.domain.clone().unwrap_or_default().into_bytes());
    if let Some(last_access) = service.last_access {
        leaves.insert("lastAccess".to_string(), tree::format_time(last_access).into_bytes());
    }
    leaves
}

/// Reconstructs a `Service` from a fully-read subtree.
pub fn decode_service(name: &str, node_key: &str, leaves: &Leaves) -> Result<Service> {
    let get_str = |leaf: &str| -> Result<String> {
        leaves
            .get(leaf)
            .map(|v| String::from_utf8_lossy(v).to_string())
            .ok_or_else(|| Error::Parse(leaf.to_string(), "missing leaf".to_string()))
    };

    let expected = status_token_from_str(&get_str("status/expected")?)?;
    let current = status_token_from_str(&get_str("status/current")?)?;
    let alive = leaves.get("status/alive").map(|v| !v.is_empty()).unwrap_or(false);

    let location: Location = leaves
        .get("location")
        .map(|v| serde_json::from_slice(v))
        .transpose()
        .map_err(|e: serde_json::Error| Error::Parse("location".to_string(), e.to_string()))?
        .unwrap_or_default();

    let config: ServiceConfig = leaves
        .get("config")
        .map(|v| serde_json::from_slice(v))
        .transpose()
        .map_err(|e: serde_json::Error| Error::Parse("config".to_string(), e.to_string()))?
        .unwrap_or_default();

    let actions = leaves
        .get("actions")
        .map(|v| serde_json::from_slice(v))
        .transpose()
        .map_err(|e: serde_json::Error| Error::Parse("actions".to_string(), e.to_string()))?
        .unwrap_or_default();

    let domain_raw = get_str("domain").unwrap_or_default();
    let domain = if domain_raw.is_empty() { None } else { Some(domain_raw) };

    let last_access = match leaves.get("lastAccess") {
        Some(raw) => Some(tree::parse_time(&String::from_utf8_lossy(raw))?),
        None => None,
    };

    Ok(Service {
        index: "1".to_string(),
        node_key: Some(node_key.to_string()),
        location,
        domain,
        name: name.to_string(),
        status: Status::new(current, expected, alive),
        actions,
        last_access,
        config,
    })
}

/// Computes which leaves differ between `old` and `new`, per the diff
/// rule: `config` and (when non-empty) `actions` are always rewritten;
/// every other leaf is rewritten only if its value actually changed.
pub fn diff_leaves(old: &Service, new: &Service) -> Leaves {
    let mut changed = Leaves::new();
    let fresh = encode_service(new);

    if old.status.expected != new.status.expected {
        changed.insert("status/expected".to_string(), fresh["status/expected"].clone());
    }
    if old.status.current != new.status.current {
        changed.insert("status/current".to_string(), fresh["status/current"].clone());
    }
    if old.status.alive != new.status.alive {
        changed.insert("status/alive".to_string(), fresh["status/alive"].clone());
    }
    if old.location != new.location {
        changed.insert("location".to_string(), fresh["location"].clone());
    }
    if old.domain != new.domain {
        changed.insert("domain".to_string(), fresh["domain"].clone());
    }
    if old.last_access != new.last_access {
        if let Some(v) = fresh.get("lastAccess") {
            changed.insert("lastAccess".to_string(), v.clone());
        }
    }

    // Always rewritten.
    changed.insert("config".to_string(), fresh["config"].clone());
    if !new.actions.is_empty() {
        changed.insert("actions".to_string(), fresh["actions"].clone());
    }

    changed
}

pub fn encode_domain(domain: &Domain) -> Leaves {
    let mut leaves = Leaves::new();
    leaves.insert("type".to_string(), domain.typ.as_bytes().to_vec());
    leaves.insert("value".to_string(), domain.value.as_bytes().to_vec());
    leaves
}

/// Computes which domain leaves differ between `old` and `new` — both
/// leaves (`type`, `value`) are independent and rewritten only if changed,
/// mirroring the original system's per-leaf `PrevExist` comparison.
pub fn diff_domain(old: &Domain, new: &Domain) -> Leaves {
    let mut changed = Leaves::new();
    let fresh = encode_domain(new);
    if old.typ != new.typ {
        changed.insert("type".to_string(), fresh["type"].clone());
    }
    if old.value != new.value {
        changed.insert("value".to_string(), fresh["value"].clone());
    }
    changed
}

pub fn decode_domain(name: &str, node_key: &str, leaves: &Leaves) -> Result<Domain> {
    let typ = leaves
        .get("type")
        .map(|v| String::from_utf8_lossy(v).to_string())
        .ok_or_else(|| Error::Parse("type".to_string(), "missing leaf".to_string()))?;
    let value = leaves
        .get("value")
        .map(|v| String::from_utf8_lossy(v).to_string())
        .ok_or_else(|| Error::Parse("value".to_string(), "missing leaf".to_string()))?;
    Ok(Domain {
        node_key: Some(node_key.to_string()),
        name: name.to_string(),
        typ,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_token_round_trips() {
        for token in [
            StatusToken::Starting,
            StatusToken::Started,
            StatusToken::Stopping,
            StatusToken::Stopped,
            StatusToken::Passivated,
            StatusToken::Error,
            StatusToken::Warning,
            StatusToken::Na,
        ] {
            let s = status_token_to_str(token);
            assert_eq!(status_token_from_str(s).unwrap(), token);
        }
    }

    #[test]
    fn diff_only_rewrites_changed_leaves_plus_config_and_actions() {
        let mut old = Service::init("svc");
        old.node_key = Some("/services/svc".to_string());
        let mut new = old.clone();
        new.status.current = StatusToken::Started;

        let diff = diff_leaves(&old, &new);
        assert!(diff.contains_key("status/current"));
        assert!(!diff.contains_key("location"));
        assert!(diff.contains_key("config"));
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut s = Service::init("svc");
        s.node_key = Some("/services/svc".to_string());
        s.location = Location { host: "h".into(), port: 80 };
        let leaves = encode_service(&s);
        let decoded = decode_service("svc", "/services/svc", &leaves).unwrap();
        assert!(s.equals(&decoded));
    }

    #[test]
    fn diff_domain_only_rewrites_changed_leaf() {
        let old = Domain { node_key: Some("/domains/d".into()), name: "d".into(), typ: "service".into(), value: "svc-a".into() };
        let mut new = old.clone();
        new.value = "svc-b".into();
        let diff = diff_domain(&old, &new);
        assert!(diff.contains_key("value"));
        assert!(!diff.contains_key("type"));
    }
}
