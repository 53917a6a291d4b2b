//! Application configuration.
//!
//! Layered, later sources win:
//! 1. defaults in code
//! 2. `config/{environment}.toml` (optional)
//! 3. `SHOPLEDGER__SECTION__KEY` environment variables
//!
//! A `.env` file in the working directory is loaded into the environment first.

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use shopledger_infra::LifecycleConfig;
use shopledger_observability::LogFormat;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Environment name, selects the config file.
    pub environment: String,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Purchase engine tuning.
    #[serde(default)]
    pub engine: LifecycleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub filter: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let environment =
            std::env::var("SHOPLEDGER_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.format", "json")?
            .set_default("logging.filter", "info")?
            .set_default(
                "engine.max_conflict_retries",
                i64::from(LifecycleConfig::default().max_conflict_retries),
            )?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("SHOPLEDGER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_any_file() {
        let cfg = AppConfig::load().unwrap();
        assert!(!cfg.server.host.is_empty());
        assert!(cfg.engine.max_conflict_retries > 0);
        assert!(!cfg.logging.filter.is_empty());
    }
}
