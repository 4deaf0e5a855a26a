pub mod action;
pub mod backend_info;
pub mod cluster;
pub mod domain;
pub mod error;
pub mod service;
pub mod status;

pub use action::{Action, ActionSet};
pub use backend_info::{health_state_to_status, BackendInfo, ContainerOrchestratorInfo, UnitManagerInfo};
pub use cluster::ServiceCluster;
pub use domain::Domain;
pub use error::{Error, Result};
pub use service::{Location, PassivationAction, PassivationConfig, Service, ServiceConfig};
pub use status::{compute, new_initial_status, Status, StatusToken};
