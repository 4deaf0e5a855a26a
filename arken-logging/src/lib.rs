use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Logging configuration for Arken processes.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub format: LogFormat,
    pub level: String,
}

/// Log output format options.
#[derive(Debug, Clone)]
pub enum LogFormat {
    /// Human-readable format for development.
    Human,
    /// JSON format for production and log aggregation.
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "arken".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            format: LogFormat::Human,
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_environment(mut self, environment: &str) -> Self {
        self.environment = environment.to_string();
        self
    }

    /// Build config from environment variables.
    pub fn from_env(service_name: &str) -> Self {
        let format = match std::env::var("ARKEN_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };

        let level = std::env::var("ARKEN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let environment = std::env::var("ARKEN_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Self {
            service_name: service_name.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment,
            format,
            level,
        }
    }
}

/// Initialize structured logging for an Arken process.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => {
            subscriber
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(false)
                        .with_span_list(true)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true),
                )
                .init();
        }
        LogFormat::Human => {
            subscriber
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false),
                )
                .init();
        }
    }

    tracing::info!(
        service.name = %config.service_name,
        service.version = %config.service_version,
        environment = %config.environment,
        log.format = ?config.format,
        log.level = %config.level,
        "Structured logging initialized"
    );

    Ok(())
}

/// Standard field names for consistent logging across Arken components.
pub mod fields {
    // Identity and correlation
    pub const CORRELATION_ID: &str = "correlation_id";
    pub const REQUEST_ID: &str = "request_id";
    pub const ERROR_ID: &str = "error.id";

    // Domain entities
    pub const SERVICE_NAME: &str = "service.name";
    pub const SERVICE_INDEX: &str = "service.index";
    pub const DOMAIN_NAME: &str = "domain.name";
    pub const NODE_KEY: &str = "node_key";

    // Status / actions
    pub const STATUS_CURRENT: &str = "status.current";
    pub const STATUS_EXPECTED: &str = "status.expected";
    pub const STATUS_OBSERVED: &str = "status.observed";
    pub const ACTION: &str = "action";

    // Operations
    pub const OPERATION: &str = "operation";
    pub const OPERATION_TYPE: &str = "operation.type";
    pub const OPERATION_STATUS: &str = "operation.status";
    pub const DURATION_MS: &str = "duration_ms";

    // Back-end driver context
    pub const DRIVER_KIND: &str = "driver.kind";
    pub const DRIVER_OPERATION: &str = "driver.operation";

    // KV store context
    pub const KV_PREFIX: &str = "kv.prefix";
    pub const KV_REVISION: &str = "kv.revision";

    // Error context
    pub const ERROR_TYPE: &str = "error.type";
    pub const ERROR_MESSAGE: &str = "error.message";
}

/// Generate a new correlation ID.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new request ID.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new error ID.
pub fn new_error_id() -> String {
    Uuid::new_v4().to_string()
}

/// Creates a structured operation span tagged with a fresh correlation ID.
#[macro_export]
macro_rules! operation_span {
    ($operation:expr, $($field:ident = $value:expr),* $(,)?) => {
        tracing::info_span!(
            "operation",
            operation = $operation,
            correlation_id = %$crate::new_correlation_id(),
            $($field = $value,)*
        )
    };
}

/// Logs the outcome of a fallible operation.
#[macro_export]
macro_rules! log_operation_result {
    ($result:expr, $success_msg:expr, $error_msg:expr) => {
        match &$result {
            Ok(_) => {
                tracing::info!(
                    operation.status = "success",
                    $success_msg
                );
            }
            Err(e) => {
                tracing::error!(
                    operation.status = "failed",
                    error.message = %e,
                    $error_msg
                );
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.service_name, "arken");
        assert_eq!(config.environment, "development");
        assert!(matches!(config.format, LogFormat::Human));
    }

    #[test]
    fn logging_config_builder() {
        let config = LoggingConfig::new("arken-server")
            .with_format(LogFormat::Json)
            .with_level("debug")
            .with_environment("production");

        assert_eq!(config.service_name, "arken-server");
        assert_eq!(config.level, "debug");
        assert_eq!(config.environment, "production");
        assert!(matches!(config.format, LogFormat::Json));
    }

    #[test]
    fn correlation_id_generation() {
        let id1 = new_correlation_id();
        let id2 = new_correlation_id();

        assert_ne!(id1, id2);
        assert!(uuid::Uuid::parse_str(&id1).is_ok());
        assert!(uuid::Uuid::parse_str(&id2).is_ok());
    }
}
