use arken_core::{BackendInfo, Service, UnitManagerInfo};
use arken_model::{BackendDriver, WatchEvent};
use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{Error, Result};

/// Drives a host-level unit manager (e.g. systemd) by shelling out
/// `<command> start|stop|destroy <unit>`. The unit name is synthesized as
/// `<prefix>@<suffix>.service`, where `suffix` is the part of the service
/// name after its first `_` — matching the scheme the original fleet driver
/// hardcoded with `prefix = "nxio"`. Here `prefix` and `command` are
/// constructor parameters instead of literals.
pub struct UnitManagerDriver {
    prefix: String,
    command: String,
    suffix_pattern: Regex,
}

impl UnitManagerDriver {
    pub fn new(prefix: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            command: command.into(),
            suffix_pattern: Regex::new(r"^[^_]+_(.+)$").expect("static pattern compiles"),
        }
    }

    fn unit_name(&self, service: &Service) -> Result<String> {
        let caps = self
            .suffix_pattern
            .captures(&service.name)
            .ok_or_else(|| Error::UnitName(service.name.clone()))?;
        Ok(format!("{}@{}.service", self.prefix, &caps[1]))
    }

    async fn run(&self, verb: &str, unit: &str) -> Result<()> {
        let output = Command::new(&self.command)
            .arg(verb)
            .arg(unit)
            .output()
            .await
            .map_err(|e| Error::UnitManager(e.to_string()))?;
        if !output.status.success() {
            return Err(Error::UnitManager(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(())
    }

    fn info(&self, unit: &str) -> BackendInfo {
        BackendInfo::UnitManager(UnitManagerInfo {
            unit_name: unit.to_string(),
        })
    }
}

#[async_trait]
impl BackendDriver for UnitManagerDriver {
    async fn create(&self, service: &Service, start_on_create: bool) -> anyhow::Result<BackendInfo> {
        let unit = self.unit_name(service)?;
        if start_on_create {
            self.run("start", &unit).await?;
        }
        info!(unit = %unit, "unit manager create");
        Ok(self.info(&unit))
    }

    async fn start(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        let unit = self.unit_name(service)?;
        self.run("start", &unit).await?;
        Ok(self.info(&unit))
    }

    async fn stop(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        let unit = self.unit_name(service)?;
        self.run("stop", &unit).await?;
        Ok(self.info(&unit))
    }

    async fn upgrade(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        let unit = self.unit_name(service)?;
        self.run("stop", &unit).await?;
        self.run("start", &unit).await?;
        Ok(self.info(&unit))
    }

    async fn finish_upgrade(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        let unit = self.unit_name(service)?;
        Ok(self.info(&unit))
    }

    async fn rollback(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        let unit = self.unit_name(service)?;
        self.run("stop", &unit).await?;
        self.run("start", &unit).await?;
        Ok(self.info(&unit))
    }

    async fn destroy(&self, service: &Service) -> anyhow::Result<()> {
        let unit = self.unit_name(service)?;
        self.run("destroy", &unit).await?;
        Ok(())
    }

    async fn get_info(&self, service: &Service) -> anyhow::Result<BackendInfo> {
        let unit = self.unit_name(service)?;
        Ok(self.info(&unit))
    }

    async fn need_to_be_upgraded(&self, _service: &Service) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn listen(&self, _sender: mpsc::Sender<WatchEvent>) -> anyhow::Result<()> {
        // The unit manager has no push channel of its own; observations only
        // arrive through the resync loop's GetInfo polling.
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_name_splits_on_first_underscore() {
        let driver = UnitManagerDriver::new("nxio", "fleetctl");
        let service = Service::init("app_worker_1");
        assert_eq!(driver.unit_name(&service).unwrap(), "nxio@worker_1.service");
    }

    #[test]
    fn unit_name_rejects_name_without_underscore() {
        let driver = UnitManagerDriver::new("nxio", "fleetctl");
        let service = Service::init("solo");
        assert!(driver.unit_name(&service).is_err());
    }
}
