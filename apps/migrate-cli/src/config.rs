//! Layered configuration for the migration CLI, the same
//! defaults → YAML → env shape the demo server uses.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub multi_tenant: bool,
    pub meta_org_name: String,
    pub admin: Option<AdminConfig>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            multi_tenant: false,
            meta_org_name: "meta".into(),
            admin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateConfig {
    pub backend: String,
    pub dsn: String,
    pub migrations_dir: String,
    pub synthetic: SyntheticConfig,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            backend: "relational".into(),
            dsn: "postgres://localhost/demo".into(),
            migrations_dir: "migrations".into(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl MigrateConfig {
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(MigrateConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed("MIGRATE_").split("_"));
        Ok(figment.extract()?)
    }
}
