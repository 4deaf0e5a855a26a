use std::collections::HashMap;

use arken_core::{BackendInfo, Domain, Service};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::event::WatchEvent;

/// The back-end driver abstraction (C6): a polymorphic interface to a
/// concrete orchestrator. Every mutator returns the driver's observation of
/// the resulting state, which the model folds back into the service.
///
/// There is deliberately no `passivate` method: the reference mutators call
/// `stop` to passivate a service, matching the interface the original system
/// actually implements and exercises.
#[async_trait]
pub trait BackendDriver: Send + Sync {
    async fn create(&self, service: &Service, start_on_create: bool) -> anyhow::Result<BackendInfo>;
    async fn start(&self, service: &Service) -> anyhow::Result<BackendInfo>;
    async fn stop(&self, service: &Service) -> anyhow::Result<BackendInfo>;
    async fn upgrade(&self, service: &Service) -> anyhow::Result<BackendInfo>;
    async fn finish_upgrade(&self, service: &Service) -> anyhow::Result<BackendInfo>;
    async fn rollback(&self, service: &Service) -> anyhow::Result<BackendInfo>;
    async fn destroy(&self, service: &Service) -> anyhow::Result<()>;
    async fn get_info(&self, service: &Service) -> anyhow::Result<BackendInfo>;
    async fn need_to_be_upgraded(&self, service: &Service) -> anyhow::Result<bool>;

    /// Subscribes to the driver's own change stream (e.g. a WebSocket read
    /// loop), forwarding `BackendInfo` observations as `WatchEvent`s onto
    /// `sender`. Drivers with no push channel of their own (the unit
    /// manager) may leave this a no-op future that never resolves.
    async fn listen(&self, sender: mpsc::Sender<WatchEvent>) -> anyhow::Result<()>;
}

/// The persistence driver abstraction (C5): load/persist/destroy plus a
/// streaming watch over the hierarchical KV store.
#[async_trait]
pub trait PersistenceDriver: Send + Sync {
    async fn load_all_services(&self) -> anyhow::Result<HashMap<String, Service>>;
    async fn load_service(&self, name: &str) -> anyhow::Result<Option<Service>>;
    async fn persist_service(&self, service: &Service) -> anyhow::Result<Service>;
    async fn destroy_service(&self, name: &str) -> anyhow::Result<()>;

    async fn load_all_domains(&self) -> anyhow::Result<HashMap<String, Domain>>;
    async fn load_domain(&self, name: &str) -> anyhow::Result<Option<Domain>>;
    async fn persist_domain(&self, domain: &Domain) -> anyhow::Result<Domain>;
    async fn destroy_domain(&self, name: &str) -> anyhow::Result<()>;

    /// Streams watch-derived change notifications onto `sender` until the
    /// driver is dropped or the watch loop is cancelled.
    async fn listen(&self, sender: mpsc::Sender<WatchEvent>) -> anyhow::Result<()>;
}
