use arken_core::{Domain, Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Service,
    Domain,
}

/// The payload of a model event: either entity, keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modelType")]
pub enum ModelPayload {
    Service(Service),
    Domain(Domain),
}

impl ModelPayload {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelPayload::Service(_) => ModelKind::Service,
            ModelPayload::Domain(_) => ModelKind::Domain,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ModelPayload::Service(s) => &s.name,
            ModelPayload::Domain(d) => &d.name,
        }
    }
}

/// A single change notification, consumer-facing via `Model::listen`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvent {
    pub event_type: EventKind,
    pub model: ModelPayload,
    pub time: DateTime<Utc>,
}

impl ModelEvent {
    pub fn new(event_type: EventKind, model: ModelPayload) -> Self {
        Self {
            event_type,
            model,
            time: Utc::now(),
        }
    }

    /// Dedup key: `(modelType, eventType, name)`. The buffer's map overwrites
    /// on key collision so only the most recent event per key survives.
    pub fn key(&self) -> (ModelKind, EventKind, String) {
        (self.model.kind(), self.event_type, self.model.name().to_string())
    }
}

/// Internal watch notification consumed by the event-handler task. Replaces
/// the original's untyped channel: every variant is a concrete payload, so
/// there is no dynamic-dispatch adapter that can panic on a type mismatch.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Service(Service),
    Domain(Domain),
    BackendInfo(arken_core::BackendInfo),
    ServiceDeleted(String),
    DomainDeleted(String),
}
