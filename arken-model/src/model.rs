use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arken_core::{action, Action, Domain, Service, StatusToken};
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use crate::broadcaster::Broadcaster;
use crate::buffer::EventBuffer;
use crate::driver::{BackendDriver, PersistenceDriver};
use crate::error::{Error, Result};
use crate::event::{EventKind, ModelEvent, ModelPayload, WatchEvent};
use crate::fold::fold_backend_info;

/// Short resync period (spec: 15s); the long pass runs every 40x this.
pub const DEFAULT_RESYNC_SHORT: Duration = Duration::from_secs(15);
pub const RESYNC_LONG_MULTIPLIER: u32 = 40;
pub const EVENT_BUFFER_PERIOD: Duration = Duration::from_secs(1);
const WATCH_CHANNEL_CAPACITY: usize = 256;

/// Which driver method a call to `Model::transition` should invoke.
enum DriverCall {
    Start,
    Stop,
    Upgrade,
    FinishUpgrade,
    Rollback,
}

/// Process-wide state: services and domains, the event pipeline, and the
/// two driver seams. Shared across tasks behind an `Arc`.
pub struct Model {
    services: RwLock<HashMap<String, Service>>,
    domains: RwLock<HashMap<String, Domain>>,
    broadcaster: Arc<Broadcaster>,
    buffer: EventBuffer,
    persistence: Arc<dyn PersistenceDriver>,
    driver: Option<Arc<dyn BackendDriver>>,
}

impl Model {
    pub fn new(persistence: Arc<dyn PersistenceDriver>, driver: Option<Arc<dyn BackendDriver>>) -> (Arc<Self>, mpsc::Receiver<ModelEvent>) {
        let broadcaster = Arc::new(Broadcaster::new());
        let (buffer, buffer_rx) = EventBuffer::new();
        let model = Arc::new(Self {
            services: RwLock::new(HashMap::new()),
            domains: RwLock::new(HashMap::new()),
            broadcaster,
            buffer,
            persistence,
            driver,
        });
        (model, buffer_rx)
    }

    /// A fresh subscriber queue carrying `ModelEvent` values. Consumers must
    /// drain promptly.
    pub fn listen(&self) -> mpsc::Receiver<ModelEvent> {
        self.broadcaster.listen()
    }

    pub async fn get_service(&self, name: &str) -> Option<Service> {
        self.services.read().await.get(name).cloned()
    }

    pub async fn get_domain(&self, name: &str) -> Option<Domain> {
        self.domains.read().await.get(name).cloned()
    }

    pub async fn all_services(&self) -> HashMap<String, Service> {
        self.services.read().await.clone()
    }

    /// Loads all services and domains, then spawns the long-lived tasks:
    /// the persistence watcher consumer, the back-end driver watcher
    /// consumer (if a driver is configured), the event-buffer flusher, and
    /// the resync loop. Returns their join handles so the caller can await
    /// or abort them on shutdown.
    ///
    /// `resync_short_period` and `resync_long_multiplier` come from the
    /// process config (`ARKEN_RESYNC_SHORT_SECS`/`ARKEN_RESYNC_LONG_MULTIPLIER`);
    /// callers exercising the model without that config can pass
    /// `DEFAULT_RESYNC_SHORT`/`RESYNC_LONG_MULTIPLIER`.
    pub async fn init(
        self: &Arc<Self>,
        buffer_rx: mpsc::Receiver<ModelEvent>,
        resync_short_period: Duration,
        resync_long_multiplier: u32,
    ) -> Result<Vec<tokio::task::JoinHandle<()>>> {
        {
            let services = self.persistence.load_all_services().await.map_err(Error::Persistence)?;
            let domains = self.persistence.load_all_domains().await.map_err(Error::Persistence)?;
            *self.services.write().await = services;
            *self.domains.write().await = domains;
        }

        let mut handles = Vec::new();

        let (watch_tx, watch_rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        let persistence = self.persistence.clone();
        let persistence_tx = watch_tx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(err) = persistence.listen(persistence_tx).await {
                warn!(error = %err, "persistence watcher stream ended");
            }
        }));

        if let Some(driver) = self.driver.clone() {
            let driver_tx = watch_tx.clone();
            handles.push(tokio::spawn(async move {
                if let Err(err) = driver.listen(driver_tx).await {
                    warn!(error = %err, "back-end driver stream ended");
                }
            }));
        }
        drop(watch_tx);

        let handler_model = self.clone();
        handles.push(tokio::spawn(async move {
            handler_model.run_event_handler(watch_rx).await;
        }));

        let buffer_broadcaster = self.broadcaster.clone();
        handles.push(tokio::spawn(EventBuffer::run(buffer_rx, buffer_broadcaster, EVENT_BUFFER_PERIOD)));

        let resync_model = self.clone();
        handles.push(tokio::spawn(async move {
            resync_model.run_resync_loop(resync_short_period, resync_long_multiplier).await;
        }));

        Ok(handles)
    }

    async fn publish(&self, event_type: EventKind, payload: ModelPayload) {
        self.buffer.push(ModelEvent::new(event_type, payload)).await;
    }

    // ---- event-handler task (4.6.1) ----

    async fn run_event_handler(self: Arc<Self>, mut rx: mpsc::Receiver<WatchEvent>) {
        while let Some(event) = rx.recv().await {
            self.apply_watch_event(event).await;
        }
    }

    async fn apply_watch_event(&self, event: WatchEvent) {
        match event {
            WatchEvent::Service(service) => {
                let name = service.name.clone();
                self.services.write().await.insert(name, service.clone());
                self.publish(EventKind::Update, ModelPayload::Service(service)).await;
            }
            WatchEvent::Domain(domain) => {
                let name = domain.name.clone();
                self.domains.write().await.insert(name, domain.clone());
                self.publish(EventKind::Update, ModelPayload::Domain(domain)).await;
            }
            WatchEvent::ServiceDeleted(name) => {
                self.services.write().await.remove(&name);
            }
            WatchEvent::DomainDeleted(name) => {
                self.domains.write().await.remove(&name);
            }
            WatchEvent::BackendInfo(info) => {
                let Some(env_name) = info.environment_name().map(|s| s.to_string()) else {
                    warn!("back-end info record carried no resolvable service reference");
                    return;
                };
                let mut services = self.services.write().await;
                let Some(service) = services.get_mut(&env_name) else {
                    warn!(service.name = %env_name, "back-end info referenced an unknown service");
                    return;
                };
                fold_backend_info(service, info);
                let updated = service.clone();
                drop(services);
                if let Err(err) = self.persistence.persist_service(&updated).await {
                    warn!(service.name = %updated.name, error = %err, "failed to persist folded service info");
                    return;
                }
                self.publish(EventKind::Update, ModelPayload::Service(updated)).await;
            }
        }
    }

    // ---- resync loop (4.6) ----

    async fn run_resync_loop(self: Arc<Self>, short_period: Duration, long_multiplier: u32) {
        let Some(_driver) = self.driver.clone() else {
            return;
        };
        let mut short_ticker = tokio::time::interval(short_period);
        let mut long_ticker = tokio::time::interval(short_period * long_multiplier);
        // The long tick always fires alongside a short tick at t=0; skip that
        // first redundant simultaneous firing by letting both warm up once.
        short_ticker.tick().await;
        long_ticker.tick().await;

        let mut long_pass_just_ran = false;
        loop {
            tokio::select! {
                _ = long_ticker.tick() => {
                    self.sync_services(None).await;
                    long_pass_just_ran = true;
                }
                _ = short_ticker.tick() => {
                    if long_pass_just_ran {
                        long_pass_just_ran = false;
                    } else {
                        self.sync_services(Some(&[StatusToken::Started, StatusToken::Error])).await;
                    }
                }
            }
        }
    }

    async fn sync_services(&self, filter: Option<&[StatusToken]>) {
        let names: Vec<String> = {
            let services = self.services.read().await;
            services
                .values()
                .filter(|s| filter.map(|f| f.contains(&s.observed())).unwrap_or(true))
                .map(|s| s.name.clone())
                .collect()
        };
        for name in names {
            if let Err(err) = self.sync_service(&name).await {
                warn!(service.name = %name, error = %err, "resync failed");
            }
        }
    }

    pub async fn sync_service(&self, name: &str) -> Result<()> {
        let Some(driver) = self.driver.clone() else {
            return Ok(());
        };
        let Some(service) = self.get_service(name).await else {
            return Err(Error::Core(arken_core::Error::NotFound(name.to_string())));
        };
        let info = driver.get_info(&service).await.map_err(Error::Persistence)?;
        let mut updated = service;
        fold_backend_info(&mut updated, info);
        let persisted = self.persistence.persist_service(&updated).await.map_err(Error::Persistence)?;
        self.services.write().await.insert(persisted.name.clone(), persisted.clone());
        self.publish(EventKind::Update, ModelPayload::Service(persisted)).await;
        Ok(())
    }

    // ---- mutators (4.6.3) ----
    //
    // Every mutator follows one ordering: call the driver first; on error,
    // return without touching the in-memory model; on success, fold info,
    // apply the status/action transition, persist, publish exactly once.

    pub async fn create_service(&self, mut service: Service, domain_name: Option<String>) -> Result<Service> {
        service.node_key = None;
        let persisted = self.persistence.persist_service(&service).await.map_err(Error::Persistence)?;
        service = persisted;

        if let Some(driver) = &self.driver {
            let info = driver.create(&service, true).await.map_err(Error::Persistence)?;
            fold_backend_info(&mut service, info);
        }

        service = self.persistence.persist_service(&service).await.map_err(Error::Persistence)?;

        if let Some(domain_name) = domain_name.or_else(|| service.domain.clone()) {
            let domain = Domain::for_service(domain_name.clone(), service.name.clone());
            let domain = self.persistence.persist_domain(&domain).await.map_err(Error::Persistence)?;
            service.domain = Some(domain_name.clone());
            self.domains.write().await.insert(domain_name, domain.clone());
            self.publish(EventKind::Create, ModelPayload::Domain(domain)).await;
        }

        self.services.write().await.insert(service.name.clone(), service.clone());
        self.publish(EventKind::Create, ModelPayload::Service(service.clone())).await;
        Ok(service)
    }

    pub async fn start_service(&self, name: &str) -> Result<Service> {
        self.transition(name, DriverCall::Start, |service| {
            service.status.expected = StatusToken::Started;
            service.status.current = StatusToken::Starting;
            service.actions = action::add_action(&service.actions, [Action::Stop, Action::Update, Action::Delete]);
        })
        .await
    }

    pub async fn stop_service(&self, name: &str) -> Result<Service> {
        self.transition(name, DriverCall::Stop, |service| {
            service.status.expected = StatusToken::Stopped;
            service.status.current = StatusToken::Stopped;
            service.status.alive = false;
            service.actions = action::add_action(&service.actions, [Action::Start, Action::Delete]);
        })
        .await
    }

    pub async fn passivate_service(&self, name: &str) -> Result<Service> {
        self.transition(name, DriverCall::Stop, |service| {
            service.status.expected = StatusToken::Passivated;
            service.status.current = StatusToken::Passivated;
            service.actions = action::add_action(&service.actions, [Action::Delete]);
        })
        .await
    }

    pub async fn upgrade_service(&self, name: &str) -> Result<Service> {
        self.transition(name, DriverCall::Upgrade, |service| {
            service.status.expected = StatusToken::Started;
            service.status.current = StatusToken::Starting;
            service.actions = action::add_action(&service.actions, [Action::FinishUpgrade, Action::Rollback]);
        })
        .await
    }

    pub async fn finish_upgrade_service(&self, name: &str) -> Result<Service> {
        self.transition(name, DriverCall::FinishUpgrade, |service| {
            service.status.expected = StatusToken::Started;
            service.status.current = StatusToken::Starting;
            service.actions = action::add_action(&service.actions, [Action::Update]);
        })
        .await
    }

    pub async fn rollback_service(&self, name: &str) -> Result<Service> {
        self.transition(name, DriverCall::Rollback, |service| {
            service.status.expected = StatusToken::Started;
            service.status.current = StatusToken::Starting;
            service.actions = action::add_action(&service.actions, [Action::Update]);
        })
        .await
    }

    /// Shared shape for the six driver-mutating transitions: call the
    /// driver, fold its info, apply the caller's status/action transition,
    /// persist, publish one `update` event.
    async fn transition(&self, name: &str, call: DriverCall, apply: impl FnOnce(&mut Service)) -> Result<Service> {
        let mut service = self
            .get_service(name)
            .await
            .ok_or_else(|| Error::Core(arken_core::Error::NotFound(name.to_string())))?;

        if let Some(driver) = &self.driver {
            let info = match call {
                DriverCall::Start => driver.start(&service).await,
                DriverCall::Stop => driver.stop(&service).await,
                DriverCall::Upgrade => driver.upgrade(&service).await,
                DriverCall::FinishUpgrade => driver.finish_upgrade(&service).await,
                DriverCall::Rollback => driver.rollback(&service).await,
            }
            .map_err(Error::Persistence)?;
            fold_backend_info(&mut service, info);
        }

        apply(&mut service);

        let persisted = self.persistence.persist_service(&service).await.map_err(Error::Persistence)?;
        self.services.write().await.insert(persisted.name.clone(), persisted.clone());
        self.publish(EventKind::Update, ModelPayload::Service(persisted.clone())).await;
        Ok(persisted)
    }

    pub async fn update_service(&self, name: &str, environment: HashMap<String, serde_json::Value>, passivation: Option<arken_core::PassivationConfig>, new_domain: Option<String>) -> Result<Service> {
        let mut service = self
            .get_service(name)
            .await
            .ok_or_else(|| Error::Core(arken_core::Error::NotFound(name.to_string())))?;

        service.config.environment.extend(environment);
        if let Some(passivation) = passivation {
            service.config.passivation = passivation;
        }

        if let Some(new_domain) = new_domain.clone() {
            if service.domain.as_deref() != Some(new_domain.as_str()) {
                if let Some(old_domain) = service.domain.clone() {
                    self.persistence.destroy_domain(&old_domain).await.map_err(Error::Persistence)?;
                    self.domains.write().await.remove(&old_domain);
                }
                let domain = Domain::for_service(new_domain.clone(), service.name.clone());
                let domain = self.persistence.persist_domain(&domain).await.map_err(Error::Persistence)?;
                self.domains.write().await.insert(new_domain.clone(), domain);
                service.domain = Some(new_domain);
            }
        }

        if let Some(driver) = &self.driver {
            if driver.need_to_be_upgraded(&service).await.map_err(Error::Persistence)? {
                service.actions = action::add_action(&service.actions, [Action::Upgrade]);
            }
        }

        let persisted = self.persistence.persist_service(&service).await.map_err(Error::Persistence)?;
        self.services.write().await.insert(persisted.name.clone(), persisted.clone());
        self.publish(EventKind::Update, ModelPayload::Service(persisted.clone())).await;
        Ok(persisted)
    }

    pub async fn destroy_service(&self, name: &str) -> Result<()> {
        let service = self
            .get_service(name)
            .await
            .ok_or_else(|| Error::Core(arken_core::Error::NotFound(name.to_string())))?;

        if let Some(driver) = &self.driver {
            driver.destroy(&service).await.map_err(Error::Persistence)?;
        }

        self.persistence.destroy_service(name).await.map_err(Error::Persistence)?;
        self.services.write().await.remove(name);
        self.publish(EventKind::Delete, ModelPayload::Service(service)).await;
        Ok(())
    }

    pub async fn create_domain(&self, domain: Domain) -> Result<Domain> {
        let persisted = self.persistence.persist_domain(&domain).await.map_err(Error::Persistence)?;
        self.domains.write().await.insert(persisted.name.clone(), persisted.clone());
        self.publish(EventKind::Create, ModelPayload::Domain(persisted.clone())).await;
        Ok(persisted)
    }

    pub async fn update_domain(&self, domain: Domain) -> Result<Domain> {
        let persisted = self.persistence.persist_domain(&domain).await.map_err(Error::Persistence)?;
        self.domains.write().await.insert(persisted.name.clone(), persisted.clone());
        self.publish(EventKind::Update, ModelPayload::Domain(persisted.clone())).await;
        Ok(persisted)
    }

    pub async fn destroy_domain(&self, name: &str) -> Result<()> {
        let domain = self
            .get_domain(name)
            .await
            .ok_or_else(|| Error::Core(arken_core::Error::NotFound(name.to_string())))?;
        self.persistence.destroy_domain(name).await.map_err(Error::Persistence)?;
        self.domains.write().await.remove(name);
        self.publish(EventKind::Delete, ModelPayload::Domain(domain)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{BackendDriver, PersistenceDriver};
    use crate::passivation::PassivationHandler;
    use arken_core::{BackendInfo, ContainerOrchestratorInfo, PassivationAction, PassivationConfig};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakePersistence {
        services: StdMutex<HashMap<String, Service>>,
        domains: StdMutex<HashMap<String, Domain>>,
    }

    #[async_trait]
    impl PersistenceDriver for FakePersistence {
        async fn load_all_services(&self) -> anyhow::Result<HashMap<String, Service>> {
            Ok(self.services.lock().unwrap().clone())
        }
        async fn load_service(&self, name: &str) -> anyhow::Result<Option<Service>> {
            Ok(self.services.lock().unwrap().get(name).cloned())
        }
        async fn persist_service(&self, service: &Service) -> anyhow::Result<Service> {
            let mut s = service.clone();
            if s.node_key.is_none() {
                s.node_key = Some(format!("/services/{}", s.name));
            }
            self.services.lock().unwrap().insert(s.name.clone(), s.clone());
            Ok(s)
        }
        async fn destroy_service(&self, name: &str) -> anyhow::Result<()> {
            self.services.lock().unwrap().remove(name);
            Ok(())
        }
        async fn load_all_domains(&self) -> anyhow::Result<HashMap<String, Domain>> {
            Ok(self.domains.lock().unwrap().clone())
        }
        async fn load_domain(&self, name: &str) -> anyhow::Result<Option<Domain>> {
            Ok(self.domains.lock().unwrap().get(name).cloned())
        }
        async fn persist_domain(&self, domain: &Domain) -> anyhow::Result<Domain> {
            let mut d = domain.clone();
            if d.node_key.is_none() {
                d.node_key = Some(format!("/domains/{}", d.name));
            }
            self.domains.lock().unwrap().insert(d.name.clone(), d.clone());
            Ok(d)
        }
        async fn destroy_domain(&self, name: &str) -> anyhow::Result<()> {
            self.domains.lock().unwrap().remove(name);
            Ok(())
        }
        async fn listen(&self, _sender: mpsc::Sender<WatchEvent>) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDriver {
        start_calls: StdMutex<u32>,
        stop_calls: StdMutex<u32>,
    }

    #[async_trait]
    impl BackendDriver for FakeDriver {
        async fn create(&self, service: &Service, _start_on_create: bool) -> anyhow::Result<BackendInfo> {
            Ok(fake_info(service, StatusToken::Started))
        }
        async fn start(&self, service: &Service) -> anyhow::Result<BackendInfo> {
            *self.start_calls.lock().unwrap() += 1;
            Ok(fake_info(service, StatusToken::Started))
        }
        async fn stop(&self, service: &Service) -> anyhow::Result<BackendInfo> {
            *self.stop_calls.lock().unwrap() += 1;
            Ok(fake_info(service, StatusToken::Stopped))
        }
        async fn upgrade(&self, service: &Service) -> anyhow::Result<BackendInfo> {
            Ok(fake_info(service, StatusToken::Started))
        }
        async fn finish_upgrade(&self, service: &Service) -> anyhow::Result<BackendInfo> {
            Ok(fake_info(service, StatusToken::Started))
        }
        async fn rollback(&self, service: &Service) -> anyhow::Result<BackendInfo> {
            Ok(fake_info(service, StatusToken::Started))
        }
        async fn destroy(&self, _service: &Service) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_info(&self, service: &Service) -> anyhow::Result<BackendInfo> {
            Ok(fake_info(service, StatusToken::Started))
        }
        async fn need_to_be_upgraded(&self, _service: &Service) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn listen(&self, _sender: mpsc::Sender<WatchEvent>) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn fake_info(service: &Service, status: StatusToken) -> BackendInfo {
        BackendInfo::ContainerOrchestrator(ContainerOrchestratorInfo {
            environment_id: format!("fake-{}", service.name),
            environment_name: service.name.clone(),
            location: arken_core::Location { host: "127.0.0.1".to_string(), port: 0 },
            current_status: status,
            health_state: "healthy".to_string(),
            template_id: "fake:latest".to_string(),
        })
    }

    #[tokio::test]
    async fn create_then_start_s1_s2() {
        let persistence = Arc::new(FakePersistence::default());
        let (model, buffer_rx) = Model::new(persistence, None);
        let _handles = model.init(buffer_rx, DEFAULT_RESYNC_SHORT, RESYNC_LONG_MULTIPLIER).await.unwrap();

        let mut subscriber = model.listen();

        let mut svc = Service::init("svc");
        svc.status = arken_core::Status::new(StatusToken::Stopped, StatusToken::Stopped, false);
        let created = model.create_service(svc, Some("d.example".to_string())).await.unwrap();
        assert!(created.node_key.is_some());

        let domain = model.get_domain("d.example").await.unwrap();
        assert_eq!(domain.value, "svc");
        assert!(domain.is_service());

        let evt = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
            .await
            .expect("no event within 2s");
        assert!(evt.is_some());

        let started = model.start_service("svc").await.unwrap();
        assert_eq!(started.status.expected, StatusToken::Started);
        assert_eq!(started.status.current, StatusToken::Starting);
        assert!(started.actions.contains(&Action::Stop));
        assert!(started.actions.contains(&Action::Update));
        assert!(started.actions.contains(&Action::Delete));
        assert_eq!(started.observed(), StatusToken::Starting);
    }

    #[tokio::test]
    async fn s3_driver_info_fold() {
        let persistence = Arc::new(FakePersistence::default());
        let driver = Arc::new(FakeDriver::default()) as Arc<dyn BackendDriver>;
        let (model, buffer_rx) = Model::new(persistence, Some(driver));
        let _handles = model.init(buffer_rx, DEFAULT_RESYNC_SHORT, RESYNC_LONG_MULTIPLIER).await.unwrap();

        let mut svc = Service::init("svc");
        svc.status = arken_core::Status::new(StatusToken::Stopped, StatusToken::Stopped, false);
        model.create_service(svc, None).await.unwrap();
        model.start_service("svc").await.unwrap();

        model
            .apply_watch_event(WatchEvent::BackendInfo(fake_info(
                &model.get_service("svc").await.unwrap(),
                StatusToken::Started,
            )))
            .await;

        let service = model.get_service("svc").await.unwrap();
        assert_eq!(service.status.expected, StatusToken::Started);
        assert_eq!(service.status.current, StatusToken::Started);
        assert!(service.status.alive);
        assert_eq!(service.observed(), StatusToken::Started);
        assert!(service.actions.contains(&Action::Stop));
        assert!(service.config.backend_info.is_some());
    }

    #[tokio::test]
    async fn s4_passivation_tick() {
        let persistence = Arc::new(FakePersistence::default());
        let driver = Arc::new(FakeDriver::default());
        let (model, buffer_rx) = Model::new(persistence, Some(driver.clone() as Arc<dyn BackendDriver>));
        let _handles = model.init(buffer_rx, DEFAULT_RESYNC_SHORT, RESYNC_LONG_MULTIPLIER).await.unwrap();

        let mut svc = Service::init("svc");
        svc.status = arken_core::Status::new(StatusToken::Started, StatusToken::Started, true);
        svc.last_access = Some(chrono::Utc::now() - chrono::Duration::hours(2));
        svc.config.passivation = PassivationConfig {
            enabled: true,
            delay_in_seconds: 3600,
            action: PassivationAction::Passivate,
        };
        model.apply_watch_event(WatchEvent::Service(svc)).await;

        let handler = PassivationHandler::new(model.clone());
        handler.passivate_idle_services().await;

        assert_eq!(*driver.stop_calls.lock().unwrap(), 1);
        let service = model.get_service("svc").await.unwrap();
        assert_eq!(service.status.expected, StatusToken::Passivated);
        assert_eq!(service.status.current, StatusToken::Passivated);
    }

    #[tokio::test]
    async fn s5_restart_on_access() {
        let persistence = Arc::new(FakePersistence::default());
        let driver = Arc::new(FakeDriver::default());
        let (model, buffer_rx) = Model::new(persistence, Some(driver.clone() as Arc<dyn BackendDriver>));
        let _handles = model.init(buffer_rx, DEFAULT_RESYNC_SHORT, RESYNC_LONG_MULTIPLIER).await.unwrap();

        let mut svc = Service::init("svc");
        svc.status = arken_core::Status::new(StatusToken::Passivated, StatusToken::Started, false);
        svc.last_access = Some(chrono::Utc::now() - chrono::Duration::hours(2));
        svc.config.passivation = PassivationConfig {
            enabled: true,
            delay_in_seconds: 3600,
            action: PassivationAction::Passivate,
        };
        model.apply_watch_event(WatchEvent::Service(svc)).await;

        let mut touched = model.get_service("svc").await.unwrap();
        touched.last_access = Some(chrono::Utc::now());
        model.apply_watch_event(WatchEvent::Service(touched.clone())).await;

        let handler = PassivationHandler::new(model.clone());
        handler.restart_if_needed(&touched).await;

        assert_eq!(*driver.start_calls.lock().unwrap(), 1);
        let service = model.get_service("svc").await.unwrap();
        assert_eq!(service.status.expected, StatusToken::Started);
        assert_eq!(service.status.current, StatusToken::Starting);
    }
}
