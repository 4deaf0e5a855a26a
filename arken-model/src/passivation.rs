use std::sync::Arc;
use std::time::Duration;

use arken_core::{PassivationAction, StatusToken};
use chrono::Utc;
use tracing::warn;

use crate::event::ModelPayload;
use crate::model::Model;

const TICK_PERIOD: Duration = Duration::from_secs(60);

/// Time-driven reconciler (C9): stops idle services on a one-minute ticker
/// and restarts passivated ones when an access touches them.
pub struct PassivationHandler {
    model: Arc<Model>,
}

impl PassivationHandler {
    pub fn new(model: Arc<Model>) -> Self {
        Self { model }
    }

    /// Runs until its task is aborted: a one-minute ticker driving
    /// `passivate_if_needed` over every service, and a subscription to
    /// model events driving `restart_if_needed` on each touch.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(TICK_PERIOD);
        let mut events = self.model.listen();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.passivate_idle_services().await;
                }
                event = events.recv() => {
                    match event {
                        Some(event) => {
                            if let ModelPayload::Service(service) = event.model {
                                self.restart_if_needed(&service).await;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    }

    /// Runs one passivation pass over every service, without waiting for
    /// the ticker. `pub(crate)` so integration tests can drive a single
    /// tick deterministically instead of waiting out `TICK_PERIOD`.
    pub(crate) async fn passivate_idle_services(&self) {
        let services = self.model.all_services().await;
        for service in services.values() {
            if !has_to_be_passivated(service) {
                continue;
            }
            let result = match service.config.passivation.action {
                PassivationAction::Destroy => self.model.destroy_service(&service.name).await.map(|_| ()),
                PassivationAction::Stop => self.model.stop_service(&service.name).await.map(|_| ()),
                PassivationAction::Passivate => self.model.passivate_service(&service.name).await.map(|_| ()),
            };
            if let Err(err) = result {
                warn!(service.name = %service.name, error = %err, "passivation action failed");
            }
        }
    }

    /// Processes a single touch event. `pub(crate)` for the same testing
    /// reason as `passivate_idle_services`.
    pub(crate) async fn restart_if_needed(&self, service: &arken_core::Service) {
        if has_to_be_restarted(service) {
            if let Err(err) = self.model.start_service(&service.name).await {
                warn!(service.name = %service.name, error = %err, "restart-on-touch failed");
            }
        }
    }
}

fn has_to_be_passivated(service: &arken_core::Service) -> bool {
    let config = &service.config.passivation;
    if !config.enabled {
        return false;
    }
    match service.started_since() {
        Some(started_since) => {
            let delay = chrono::Duration::seconds(config.delay_in_seconds as i64);
            Utc::now() > started_since + delay
        }
        None => false,
    }
}

fn has_to_be_restarted(service: &arken_core::Service) -> bool {
    service.config.passivation.enabled
        && service.last_access.is_some()
        && service.status.expected == StatusToken::Started
        && service.status.current == StatusToken::Passivated
}
