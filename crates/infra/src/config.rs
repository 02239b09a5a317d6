//! Layered configuration.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `config/default.{toml,yaml,json}` (optional)
//! 3. `config/{RUN_ENV}` (optional, `RUN_ENV` defaults to `development`)
//! 4. Environment variables `LOOMERP__<SECTION>__<KEY>`, e.g. `LOOMERP__SERVER__PORT=9090`

use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_DIR: &str = "config";
pub const ENV_PREFIX: &str = "LOOMERP";
const DEFAULT_ENV: &str = "development";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Deepest BOM nesting the tree loader accepts.
    pub max_tree_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub log: LogConfig,
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.engine.max_tree_depth == 0 {
            return Err(ConfigLoadError::Invalid(
                "engine.max_tree_depth must be at least 1".to_string(),
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigLoadError::Invalid("server.host cannot be empty".to_string()));
        }
        if self.log.level.trim().is_empty() {
            return Err(ConfigLoadError::Invalid("log.level cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn builder_with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("engine.max_tree_depth", loomerp_bom::DEFAULT_MAX_DEPTH as i64)?
        .set_default("log.level", "info")?
        .set_default("log.json", true)
}

/// Load configuration from defaults, optional files and the environment.
pub fn load_config() -> Result<AppConfig, ConfigLoadError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let config = builder_with_defaults()?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            engine: EngineConfig {
                max_tree_depth: loomerp_bom::DEFAULT_MAX_DEPTH,
            },
            log: LogConfig {
                level: "info".to_string(),
                json: true,
            },
        }
    }
}
