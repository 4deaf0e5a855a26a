use arken_core::{health_state_to_status, BackendInfo, ContainerOrchestratorInfo, Location, Service};
use arken_model::{BackendDriver, WatchEvent};
use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::Docker;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};

use crate::error::Result;

fn container_name(service: &Service) -> String {
    format!("arken-{}", service.name)
}

/// Drives a Docker-API-based container orchestrator: mutations go over
/// `bollard`'s HTTP API, change notifications arrive over a WebSocket
/// subscription (substituting for the original system's Rancher-specific
/// REST+websocket pair while keeping the same shape: mutate over HTTP,
/// observe over a push stream).
pub struct ContainerOrchestratorDriver {
    docker: Docker,
    events_ws_url: String,
}

impl ContainerOrchestratorDriver {
    pub fn new(docker: Docker, events_ws_url: impl Into<String>) -> Self {
        Self {
            docker,
            events_ws_url: events_ws_url.into(),
        }
    }

    fn desired_image(service: &Service) -> Option<String> {
        service
            .config
            .environment
            .get("image")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Renders `service.config.environment` into the `KEY=VALUE` list
    /// `bollard`'s container config and inspect response both use.
    fn rendered_env(service: &Service) -> Vec<String> {
        let mut env: Vec<String> = service
            .config
            .environment
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| format!("{k}={v}")))
            .collect();
        env.sort();
        env
    }

    async fn inspect_info(&self, service: &Service) -> Result<ContainerOrchestratorInfo> {
        let name = container_name(service);
        let inspect = self.docker.inspect_container(&name, None).await?;

        let health_state = inspect
            .state
            .as_ref()
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status.as_ref())
            .map(|s| format!("{s:?}").to_lowercase())
            .unwrap_or_else(|| "unknown".to_string());

        let port = inspect
            .network_settings
            .as_ref()
            .and_then(|n| n.ports.as_ref())
            .and_then(|ports| ports.values().flatten().next())
            .and_then(|bindings| bindings.iter().next())
            .and_then(|b| b.host_port.clone())
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(0);

        Ok(ContainerOrchestratorInfo {
            environment_id: inspect.id.clone().unwrap_or_default(),
            environment_name: service.name.clone(),
            location: Location {
                host: "127.0.0.1".to_string(),
                port,
            },
            current_status: health_state_to_status(&health_state),
            health_state,
            template_id: inspect
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
        })
    }

    async fn ensure_container(&self, service: &Service) -> Result<()> {
        let name = container_name(service);
        if self.docker.inspect_container(&name, None).await.is_ok() {
            return Ok(());
        }

        let image = Self::desired_image(service).unwrap_or_else(|| "busybox:latest".to_string());
        let env = Self::rendered_env(service);

        let config = ContainerConfig::<String> {
            image: Some(image),
            env: Some(env),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: name.clone(),
            ..Default::default()
        };
        self.docker.create_container(Some(options), config).await?;
        Ok(())
    }
}

#[async_trait]
impl BackendDriver for ContainerOrchestratorDriver {
    async fn create(&self, service: &Service, start_on_create: bool) -> anyhow::Result<BackendInfo> {
        self.ensure_container(service).await?;
        if start_on_create {
            let name = container_name(service);
            self.docker
                .start_container(&name, None::<StartContainerOptions<String>>)
                .await?;
        }
        info!(service = %service.name, "container orchestrator create");
        Ok(BackendInfo::ContainerOrchestrator(self.inspect_info(service).await?))
    }

    async fn start(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        let name = container_name(service);
        self.docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await?;
        Ok(BackendInfo::ContainerOrchestrator(self.inspect_info(service).await?))
    }

    async fn stop(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        let name = container_name(service);
        self.docker
            .stop_container(&name, Some(StopContainerOptions { t: 30 }))
            .await?;
        Ok(BackendInfo::ContainerOrchestrator(self.inspect_info(service).await?))
    }

    async fn upgrade(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        let name = container_name(service);
        self.docker
            .stop_container(&name, Some(StopContainerOptions { t: 30 }))
            .await?;
        self.docker
            .remove_container(&name, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await?;
        self.ensure_container(service).await?;
        self.docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await?;
        Ok(BackendInfo::ContainerOrchestrator(self.inspect_info(service).await?))
    }

    async fn finish_upgrade(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        Ok(BackendInfo::ContainerOrchestrator(self.inspect_info(service).await?))
    }

    async fn rollback(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        self.upgrade(service).await
    }

    async fn destroy(&self, service: &Service) -> anyhow::Result<()> {
        let name = container_name(service);
        self.docker
            .remove_container(&name, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await?;
        Ok(())
    }

    async fn get_info(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        Ok(BackendInfo::ContainerOrchestrator(self.inspect_info(service).await?))
    }

    async fn need_to_be_upgraded(&self, service: &Service) -> anyhow::Result<bool> {
        let name = container_name(service);
        let inspect = self.docker.inspect_container(&name, None).await?;

        if let Some(desired) = Self::desired_image(service) {
            let actual_image = inspect.config.as_ref().and_then(|c| c.image.clone()).unwrap_or_default();
            if actual_image != desired {
                return Ok(true);
            }
        }

        let mut actual_env = inspect.config.as_ref().and_then(|c| c.env.clone()).unwrap_or_default();
        actual_env.sort();
        Ok(actual_env != Self::rendered_env(service))
    }

    async fn listen(&self, sender: mpsc::Sender<WatchEvent>) -> anyhow::Result<()> {
        #[derive(Deserialize)]
        struct ResourceChange {
            resource_type: String,
            environment_name: String,
            environment_id: String,
            health_state: String,
            template_id: String,
            host: String,
            port: u16,
        }

        loop {
            let attempt = connect_async(&self.events_ws_url).await;
            let (ws, _) = match attempt {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "container orchestrator websocket connect failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
            };
            let (_write, mut read) = ws.split();

            while let Some(message) = read.next().await {
                let message = match message {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "container orchestrator websocket read failed");
                        break;
                    }
                };
                let Ok(text) = message.into_text() else { continue };
                let change: ResourceChange = match serde_json::from_str(&text) {
                    Ok(c) => c,
                    Err(e) => {
                        debug!(error = %e, "dropping unparseable resource change");
                        continue;
                    }
                };
                if change.resource_type != "environment" {
                    continue;
                }

                let info = ContainerOrchestratorInfo {
                    environment_id: change.environment_id,
                    environment_name: change.environment_name,
                    location: Location { host: change.host, port: change.port },
                    current_status: health_state_to_status(&change.health_state),
                    health_state: change.health_state,
                    template_id: change.template_id,
                };
                if sender
                    .send(WatchEvent::BackendInfo(BackendInfo::ContainerOrchestrator(info)))
                    .await
                    .is_err()
                {
                    return Ok(());
                }
            }

            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_is_namespaced() {
        let service = Service::init("svc");
        assert_eq!(container_name(&service), "arken-svc");
    }

    #[test]
    fn rendered_env_is_sorted_key_value_pairs() {
        let mut service = Service::init("svc");
        service.config.environment.insert("B".to_string(), serde_json::json!("2"));
        service.config.environment.insert("A".to_string(), serde_json::json!("1"));
        assert_eq!(ContainerOrchestratorDriver::rendered_env(&service), vec!["A=1".to_string(), "B=2".to_string()]);
    }
}
