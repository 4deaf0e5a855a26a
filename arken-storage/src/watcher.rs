use std::collections::HashMap;
use std::time::Duration;

use arken_core::{Domain, Service};
use arken_model::{PersistenceDriver, WatchEvent};
use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, DeleteOptions, EventType, GetOptions, WatchOptions};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::codec::{self, Leaves};
use crate::error::{Error, Result};
use crate::tree;

/// Backoff between watch-stream reconnect attempts, matching the original
/// system's fixed one-second retry.
const WATCH_RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Persistence driver (C5) backed by an etcd v3 KV tree, organized as two
/// flat prefixes (`service_prefix`, `domain_prefix`) each holding one
/// subtree of leaves per entity, per the tree layout.
pub struct EtcdPersistenceDriver {
    client: Mutex<Client>,
    service_prefix: String,
    domain_prefix: String,
    kv_timeout: Duration,
}

impl EtcdPersistenceDriver {
    pub async fn connect(
        endpoints: &[String],
        service_prefix: impl Into<String>,
        domain_prefix: impl Into<String>,
        kv_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::connect(endpoints, Some(ConnectOptions::new())).await?;
        Ok(Self {
            client: Mutex::new(client),
            service_prefix: service_prefix.into(),
            domain_prefix: domain_prefix.into(),
            kv_timeout,
        })
    }

    /// Wraps a single etcd-client call with the configured header timeout,
    /// per the one-second design default.
    async fn with_kv_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<T, etcd_client::Error>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.kv_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout(self.kv_timeout)),
        }
    }

    /// Reads every leaf under `root` and groups them by the entity name
    /// (the first path segment past `prefix`).
    async fn read_tree(&self, prefix: &str) -> Result<HashMap<String, Leaves>> {
        let mut client = self.client.lock().await;
        let resp = self
            .with_kv_timeout(client.get(prefix.as_bytes(), Some(GetOptions::new().with_prefix())))
            .await?;

        let mut grouped: HashMap<String, Leaves> = HashMap::new();
        for kv in resp.kvs() {
            let key = kv.key_str().map_err(|e| Error::Protocol(e.to_string()))?;
            let Some(name) = tree::env_from_node(prefix, key) else {
                continue;
            };
            let root = tree::service_root(prefix, &name);
            let Some(leaf) = key.strip_prefix(&format!("{root}/")) else {
                continue;
            };
            grouped
                .entry(name)
                .or_default()
                .insert(leaf.to_string(), kv.value().to_vec());
        }
        Ok(grouped)
    }

    async fn read_entity_leaves(&self, prefix: &str, name: &str) -> Result<Leaves> {
        let root = tree::service_root(prefix, name);
        let mut client = self.client.lock().await;
        let resp = self
            .with_kv_timeout(client.get(
                format!("{root}/").as_bytes(),
                Some(GetOptions::new().with_prefix()),
            ))
            .await?;
        let mut leaves = Leaves::new();
        for kv in resp.kvs() {
            let key = kv.key_str().map_err(|e| Error::Protocol(e.to_string()))?;
            if let Some(leaf) = key.strip_prefix(&format!("{root}/")) {
                leaves.insert(leaf.to_string(), kv.value().to_vec());
            }
        }
        Ok(leaves)
    }

    async fn write_leaves(&self, prefix: &str, name: &str, leaves: &Leaves) -> Result<()> {
        let root = tree::service_root(prefix, name);
        let mut client = self.client.lock().await;
        for (leaf, value) in leaves {
            let key = tree::service_leaf(prefix, name, leaf);
            if let Err(e) = self.with_kv_timeout(client.put(key.as_bytes(), value.clone(), None)).await {
                warn!(entity = name, root = %root, error = %e, "rolling back partial write");
                drop(client);
                self.delete_tree(prefix, name).await.ok();
                return Err(e);
            }
        }
        Ok(())
    }

    async fn delete_tree(&self, prefix: &str, name: &str) -> Result<()> {
        let root = tree::service_root(prefix, name);
        let mut client = self.client.lock().await;
        self.with_kv_timeout(client.delete(
            format!("{root}/").as_bytes(),
            Some(DeleteOptions::new().with_prefix()),
        ))
        .await?;
        Ok(())
    }

    async fn watch_prefix(&self, prefix: String, sender: mpsc::Sender<WatchEvent>, is_service: bool) {
        loop {
            let result = self.watch_prefix_once(&prefix, &sender, is_service).await;
            if let Err(e) = result {
                warn!(prefix = %prefix, error = %e, "watch stream ended, reconnecting");
            }
            tokio::time::sleep(WATCH_RECONNECT_BACKOFF).await;
        }
    }

    async fn watch_prefix_once(
        &self,
        prefix: &str,
        sender: &mpsc::Sender<WatchEvent>,
        is_service: bool,
    ) -> Result<()> {
        let (_watcher, mut stream) = {
            let mut client = self.client.lock().await;
            self.with_kv_timeout(client.watch(prefix.as_bytes(), Some(WatchOptions::new().with_prefix())))
                .await?
        };

        while let Some(resp) = stream.message().await? {
            for event in resp.events() {
                let Some(kv) = event.kv() else { continue };
                let Ok(key) = kv.key_str() else { continue };
                let Some(name) = tree::env_from_node(prefix, key) else {
                    continue;
                };

                match event.event_type() {
                    EventType::Put => {
                        debug!(entity = %name, prefix = %prefix, "watch put");
                        let leaves = self.read_entity_leaves(prefix, &name).await?;
                        if leaves.is_empty() {
                            continue;
                        }
                        let node_key = tree::service_root(prefix, &name);
                        let watch_event = if is_service {
                            match codec::decode_service(&name, &node_key, &leaves) {
                                Ok(service) => WatchEvent::Service(service),
                                Err(e) => {
                                    warn!(entity = %name, error = %e, "dropping unparseable service node");
                                    continue;
                                }
                            }
                        } else {
                            match codec::decode_domain(&name, &node_key, &leaves) {
                                Ok(domain) => WatchEvent::Domain(domain),
                                Err(e) => {
                                    warn!(entity = %name, error = %e, "dropping unparseable domain node");
                                    continue;
                                }
                            }
                        };
                        if sender.send(watch_event).await.is_err() {
                            return Ok(());
                        }
                    }
                    EventType::Delete => {
                        debug!(entity = %name, prefix = %prefix, "watch delete");
                        let watch_event = if is_service {
                            WatchEvent::ServiceDeleted(name)
                        } else {
                            WatchEvent::DomainDeleted(name)
                        };
                        if sender.send(watch_event).await.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceDriver for EtcdPersistenceDriver {
    async fn load_all_services(&self) -> anyhow::Result<HashMap<String, Service>> {
        let grouped = self.read_tree(&self.service_prefix).await?;
        let mut services = HashMap::with_capacity(grouped.len());
        for (name, leaves) in grouped {
            let node_key = tree::service_root(&self.service_prefix, &name);
            match codec::decode_service(&name, &node_key, &leaves) {
                Ok(service) => {
                    services.insert(name, service);
                }
                Err(e) => warn!(entity = %name, error = %e, "skipping unparseable service on load"),
            }
        }
        Ok(services)
    }

    async fn load_service(&self, name: &str) -> anyhow::Result<Option<Service>> {
        let leaves = self.read_entity_leaves(&self.service_prefix, name).await?;
        if leaves.is_empty() {
            return Ok(None);
        }
        let node_key = tree::service_root(&self.service_prefix, name);
        Ok(Some(codec::decode_service(name, &node_key, &leaves)?))
    }

    async fn persist_service(&self, service: &Service) -> anyhow::Result<Service> {
        let existing = self.read_entity_leaves(&self.service_prefix, &service.name).await?;

        let mut persisted = service.clone();
        let node_key = tree::service_root(&self.service_prefix, &service.name);
        persisted.node_key = Some(node_key.clone());

        if existing.is_empty() {
            let leaves = codec::encode_service(&persisted);
            self.write_leaves(&self.service_prefix, &service.name, &leaves).await?;
        } else {
            let old_node_key = node_key.clone();
            let old = codec::decode_service(&service.name, &old_node_key, &existing)
                .unwrap_or_else(|_| Service::init(&service.name));
            let diff = codec::diff_leaves(&old, &persisted);
            if !diff.is_empty() {
                let mut client = self.client.lock().await;
                for (leaf, value) in &diff {
                    let key = tree::service_leaf(&self.service_prefix, &service.name, leaf);
                    self.with_kv_timeout(client.put(key.as_bytes(), value.clone(), None)).await?;
                }
            }
        }

        info!(entity = %service.name, "persisted service");
        Ok(persisted)
    }

    async fn destroy_service(&self, name: &str) -> anyhow::Result<()> {
        self.delete_tree(&self.service_prefix, name).await?;
        Ok(())
    }

    async fn load_all_domains(&self) -> anyhow::Result<HashMap<String, Domain>> {
        let grouped = self.read_tree(&self.domain_prefix).await?;
        let mut domains = HashMap::with_capacity(grouped.len());
        for (name, leaves) in grouped {
            let node_key = tree::domain_root(&self.domain_prefix, &name);
            match codec::decode_domain(&name, &node_key, &leaves) {
                Ok(domain) => {
                    domains.insert(name, domain);
                }
                Err(e) => warn!(entity = %name, error = %e, "skipping unparseable domain on load"),
            }
        }
        Ok(domains)
    }

    async fn load_domain(&self, name: &str) -> anyhow::Result<Option<Domain>> {
        let leaves = self.read_entity_leaves(&self.domain_prefix, name).await?;
        if leaves.is_empty() {
            return Ok(None);
        }
        let node_key = tree::domain_root(&self.domain_prefix, name);
        Ok(Some(codec::decode_domain(name, &node_key, &leaves)?))
    }

    async fn persist_domain(&self, domain: &Domain) -> anyhow::Result<Domain> {
        let node_key = tree::domain_root(&self.domain_prefix, &domain.name);
        let mut persisted = domain.clone();
        persisted.node_key = Some(node_key.clone());

        if domain.node_key.is_none() {
            let leaves = codec::encode_domain(&persisted);
            self.write_leaves(&self.domain_prefix, &domain.name, &leaves).await?;
        } else {
            let existing = self.read_entity_leaves(&self.domain_prefix, &domain.name).await?;
            let old = codec::decode_domain(&domain.name, &node_key, &existing)
                .unwrap_or_else(|_| Domain::for_service(&domain.name, ""));
            let diff = codec::diff_domain(&old, &persisted);
            if !diff.is_empty() {
                let mut client = self.client.lock().await;
                for (leaf, value) in &diff {
                    let key = tree::domain_leaf(&self.domain_prefix, &domain.name, leaf);
                    self.with_kv_timeout(client.put(key.as_bytes(), value.clone(), None)).await?;
                }
            }
        }

        info!(entity = %domain.name, "persisted domain");
        Ok(persisted)
    }

    async fn destroy_domain(&self, name: &str) -> anyhow::Result<()> {
        self.delete_tree(&self.domain_prefix, name).await?;
        Ok(())
    }

    async fn listen(&self, sender: mpsc::Sender<WatchEvent>) -> anyhow::Result<()> {
        tokio::join!(
            self.watch_prefix(self.service_prefix.clone(), sender.clone(), true),
            self.watch_prefix(self.domain_prefix.clone(), sender, false),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_ignores_foreign_prefixes() {
        // read_tree's grouping logic is exercised indirectly through
        // tree::env_from_node, already covered in tree.rs; this module's
        // etcd-facing paths require a live server and are exercised by the
        // end-to-end scenarios instead.
        assert!(tree::env_from_node("/services", "/domains/d1/type").is_none());
    }
}
