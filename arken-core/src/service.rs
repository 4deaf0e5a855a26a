use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionSet;
use crate::backend_info::BackendInfo;
use crate::status::{compute, Status, StatusToken};

/// A network location. `IsFullyDefined` iff host is non-empty and port > 0.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub host: String,
    pub port: u16,
}

impl Location {
    pub fn is_fully_defined(&self) -> bool {
        !self.host.is_empty() && self.port > 0
    }
}

/// `{enabled, delayInSeconds, action}` passivation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassivationConfig {
    pub enabled: bool,
    pub delay_in_seconds: u64,
    pub action: PassivationAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassivationAction {
    Passivate,
    Stop,
    Destroy,
}

impl Default for PassivationConfig {
    /// The original system's default: a twelve-hour idle delay, passivation
    /// enabled, action `passivate`.
    fn default() -> Self {
        Self {
            enabled: true,
            delay_in_seconds: 12 * 3600,
            action: PassivationAction::Passivate,
        }
    }
}

/// Free-form environment map, optional back-end info, passivation policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub environment: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_info: Option<BackendInfo>,
    #[serde(default)]
    pub passivation: PassivationConfig,
}

impl ServiceConfig {
    fn equals(&self, other: &ServiceConfig) -> bool {
        self.environment == other.environment
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Stable index, unique within the cluster.
    pub index: String,
    /// Opaque KV key; `None` iff never persisted.
    pub node_key: Option<String>,
    pub location: Location,
    pub domain: Option<String>,
    pub name: String,
    pub status: Status,
    pub actions: ActionSet,
    pub last_access: Option<DateTime<Utc>>,
    pub config: ServiceConfig,
}

impl Service {
    /// A freshly-initialized service: index "1", stopped, the initial
    /// action set, default config.
    pub fn init(name: impl Into<String>) -> Self {
        Self {
            index: "1".to_string(),
            node_key: None,
            location: Location::default(),
            domain: None,
            name: name.into(),
            status: Status::new(StatusToken::Stopped, StatusToken::Stopped, false),
            actions: crate::action::init_actions(),
            last_access: None,
            config: ServiceConfig::default(),
        }
    }

    /// Compares `location`, `status`, and `config.environment` (the
    /// surviving config field after dropping the unspecified `Robots`
    /// comparison; see the core entities design notes).
    pub fn equals(&self, other: &Service) -> bool {
        self.location == other.location
            && self.status.equals(&other.status)
            && self.config.equals(&other.config)
    }

    pub fn observed(&self) -> StatusToken {
        compute(&self.status)
    }

    /// `lastAccess` iff `current == started`, else `None`.
    pub fn started_since(&self) -> Option<DateTime<Utc>> {
        if self.status.current == StatusToken::Started {
            self.last_access
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_fully_defined() {
        assert!(Location { host: "h".into(), port: 80 }.is_fully_defined());
        assert!(!Location { host: "".into(), port: 80 }.is_fully_defined());
        assert!(!Location { host: "h".into(), port: 0 }.is_fully_defined());
    }

    #[test]
    fn init_service_is_coherent() {
        let s = Service::init("svc");
        assert_eq!(s.observed(), StatusToken::Stopped);
        assert!(s.node_key.is_none());
    }

    #[test]
    fn started_since_requires_current_started() {
        let mut s = Service::init("svc");
        s.last_access = Some(Utc::now());
        assert!(s.started_since().is_none());
        s.status.current = StatusToken::Started;
        assert!(s.started_since().is_some());
    }

    #[test]
    fn equals_compares_location_status_environment() {
        let a = Service::init("svc");
        let mut b = a.clone();
        assert!(a.equals(&b));
        b.location.host = "other".into();
        assert!(!a.equals(&b));
    }
}
