//! Infrastructure layer: storage adapters, configuration, and the services that compose
//! the pure BOM domain with them.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod repository;
pub mod versioning;


pub use catalog::InMemoryItemCatalog;
pub use config::{AppConfig, ConfigLoadError, EngineConfig, LogConfig, ServerConfig, load_config};
pub use engine::{BomEngine, Explosion};
pub use repository::{BomRepository, InMemoryBomRepository, RepositoryError};
pub use versioning::{NewBom, NewVersion, VersionContent, VersionLifecycleManager};
