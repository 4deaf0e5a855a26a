use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use arken_drivers::{ContainerOrchestratorDriver, UnitManagerDriver};
use arken_logging::LoggingConfig;
use arken_model::{BackendDriver, Model, PassivationHandler, PersistenceDriver};
use arken_storage::EtcdPersistenceDriver;
use tracing::info;

mod config;

use crate::config::{Config, DriverKind};

async fn build_driver(config: &Config) -> Result<Option<Arc<dyn BackendDriver>>> {
    Ok(match config.driver {
        DriverKind::None => None,
        DriverKind::UnitManager => Some(Arc::new(UnitManagerDriver::new(
            config.unit_manager_prefix.clone(),
            config.unit_manager_command.clone(),
        )) as Arc<dyn BackendDriver>),
        DriverKind::ContainerOrchestrator => {
            let docker = bollard::Docker::connect_with_local_defaults()?;
            Some(Arc::new(ContainerOrchestratorDriver::new(docker, config.container_events_ws.clone()))
                as Arc<dyn BackendDriver>)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let logging_config = LoggingConfig::from_env("arken-server");
    arken_logging::init_logging(logging_config)?;

    info!(
        service.name = "arken-server",
        version = env!("CARGO_PKG_VERSION"),
        "starting arken reconciliation engine"
    );

    let config = Config::from_env()?;

    let persistence: Arc<dyn PersistenceDriver> = Arc::new(
        EtcdPersistenceDriver::connect(
            &[config.etcd_address.clone()],
            config.service_dir.clone(),
            config.domain_dir.clone(),
            Duration::from_millis(config.kv_timeout_ms),
        )
        .await?,
    );
    let driver = build_driver(&config).await?;

    let (model, buffer_rx) = Model::new(persistence, driver);
    let mut handles = model
        .init(
            buffer_rx,
            Duration::from_secs(config.resync_short_secs),
            config.resync_long_multiplier,
        )
        .await?;

    let passivation_model = model.clone();
    handles.push(tokio::spawn(async move {
        PassivationHandler::new(passivation_model).run().await;
    }));

    info!("arken reconciliation engine running, awaiting shutdown signal");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping reconciliation tasks");

    for handle in handles {
        handle.abort();
    }

    Ok(())
}
