use serde::{Deserialize, Serialize};

use crate::service::Location;
use crate::status::StatusToken;

/// Minimal info record returned by the unit-manager driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitManagerInfo {
    pub unit_name: String,
}

/// Info record returned by the container-orchestrator driver, decoded from
/// its resource-change stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerOrchestratorInfo {
    pub environment_id: String,
    pub environment_name: String,
    pub location: Location,
    pub health_state: String,
    pub current_status: StatusToken,
    pub template_id: String,
}

/// Tagged union over the supported back-ends; folded into
/// `ServiceConfig::backend_info` by the model's info-folding step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendInfo {
    UnitManager(UnitManagerInfo),
    ContainerOrchestrator(ContainerOrchestratorInfo),
}

impl BackendInfo {
    /// The status the driver observed, used to drive the info-fold.
    /// `None` for the unit manager, which carries no status of its own —
    /// optimistic status there is set by the mutator's own `apply` closure,
    /// never by folding driver info.
    pub fn current_status(&self) -> Option<StatusToken> {
        match self {
            BackendInfo::UnitManager(_) => None,
            BackendInfo::ContainerOrchestrator(info) => Some(info.current_status),
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            BackendInfo::UnitManager(_) => None,
            BackendInfo::ContainerOrchestrator(info) => Some(info.location.clone()),
        }
    }

    /// The service this info record refers to, when the back-end identifies
    /// services by a name distinct from Arken's own (the container
    /// orchestrator's `environmentName`); `None` when the driver has no such
    /// notion (the unit manager addresses services by unit name derived
    /// on-the-fly, not a stored identifier).
    pub fn environment_name(&self) -> Option<&str> {
        match self {
            BackendInfo::UnitManager(_) => None,
            BackendInfo::ContainerOrchestrator(info) => Some(&info.environment_name),
        }
    }
}

/// `HealthState -> status` mapping for the container-orchestrator driver.
pub fn health_state_to_status(health_state: &str) -> StatusToken {
    match health_state {
        "healthy" => StatusToken::Started,
        "degraded" | "activating" | "initializing" => StatusToken::Starting,
        _ => StatusToken::Stopped,
    }
}
