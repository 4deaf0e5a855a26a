use anyhow::{bail, Result};

/// Which back-end driver to construct. `none` runs the reconciliation
/// engine with no driver, which disables the resync loop and the
/// driver-mutating path of every mutator — useful for exercising the
/// persistence side alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    None,
    UnitManager,
    ContainerOrchestrator,
}

impl DriverKind {
    fn parse(raw: &str) -> Result<Self> {
        Ok(match raw {
            "none" => DriverKind::None,
            "unit_manager" => DriverKind::UnitManager,
            "container_orchestrator" => DriverKind::ContainerOrchestrator,
            other => bail!("unknown ARKEN_DRIVER value: {other}"),
        })
    }
}

/// Process configuration, loaded from environment variables. Covers only
/// the keys the core reconciliation engine needs; the HTTP API surface and
/// its port/auth configuration are out of scope for this process.
#[derive(Debug, Clone)]
pub struct Config {
    pub etcd_address: String,
    pub domain_dir: String,
    pub service_dir: String,
    pub driver: DriverKind,
    pub resync_short_secs: u64,
    pub resync_long_multiplier: u32,
    pub kv_timeout_ms: u64,
    pub unit_manager_prefix: String,
    pub unit_manager_command: String,
    pub container_events_ws: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            etcd_address: std::env::var("ARKEN_ETCD_ADDRESS")
                .unwrap_or_else(|_| "127.0.0.1:2379".to_string()),
            domain_dir: std::env::var("ARKEN_DOMAIN_DIR").unwrap_or_else(|_| "/domains".to_string()),
            service_dir: std::env::var("ARKEN_SERVICE_DIR").unwrap_or_else(|_| "/services".to_string()),
            driver: DriverKind::parse(&std::env::var("ARKEN_DRIVER").unwrap_or_else(|_| "none".to_string()))?,
            resync_short_secs: std::env::var("ARKEN_RESYNC_SHORT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()?,
            resync_long_multiplier: std::env::var("ARKEN_RESYNC_LONG_MULTIPLIER")
                .unwrap_or_else(|_| "40".to_string())
                .parse()?,
            kv_timeout_ms: std::env::var("ARKEN_KV_TIMEOUT_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            unit_manager_prefix: std::env::var("ARKEN_UNIT_MANAGER_PREFIX").unwrap_or_else(|_| "nxio".to_string()),
            unit_manager_command: std::env::var("ARKEN_UNIT_MANAGER_COMMAND")
                .unwrap_or_else(|_| "fleetctl".to_string()),
            container_events_ws: std::env::var("ARKEN_CONTAINER_EVENTS_WS")
                .unwrap_or_else(|_| "ws://127.0.0.1:2375/events".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_kind_rejects_unknown_value() {
        assert!(DriverKind::parse("rancher").is_err());
        assert_eq!(DriverKind::parse("none").unwrap(), DriverKind::None);
        assert_eq!(DriverKind::parse("unit_manager").unwrap(), DriverKind::UnitManager);
    }
}
