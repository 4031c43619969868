//! Layered configuration (defaults → YAML file → `APP_`-prefixed env),
//! matching the teacher framework's `figment`-based config layering.
//! Loaded once at startup and treated as immutable thereafter.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Selects the storage backend and its connection string. Only the
/// backend matching this binary's compiled-in feature is usable; the
/// other is rejected at startup with a clear error rather than silently
/// ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: String,
    pub dsn: String,
    pub multi_tenant: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "document".into(),
            dsn: "mongodb://localhost:27017/demo".into(),
            multi_tenant: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed("APP_").split("_"));
        Ok(figment.extract()?)
    }
}
