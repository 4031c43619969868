//! File-based relational migrations: `.sql` files under a directory, each
//! split into a `-- up` and an optional `-- down` section.
//!
//! There is no Rust equivalent of dynamically importing a JS module at
//! runtime, so the document backend has no file-loading counterpart —
//! document deployments supply their file-equivalent migrations the same
//! way they supply synthetic ones, as `Box<dyn Migration>` values built in
//! process.

use crate::migration::{Migration, MigrationContext};
use async_trait::async_trait;
use sea_orm::ConnectionTrait;
use std::path::Path;
use svc_errors::{Result, ServiceError};

const UP_MARKER: &str = "-- up";
const DOWN_MARKER: &str = "-- down";

pub struct FileMigration {
    name: String,
    up_sql: String,
    down_sql: String,
}

impl FileMigration {
    /// Parse one migration file's contents. `stem` is the filename without
    /// its `.sql` extension and becomes the migration's name.
    pub fn parse(stem: &str, contents: &str) -> Result<Self> {
        let lower = contents.to_ascii_lowercase();
        let up_start = lower.find(UP_MARKER).ok_or_else(|| {
            ServiceError::bad_request(format!("migration {stem}: missing {UP_MARKER} section"))
        })?;
        let down_start = lower.find(DOWN_MARKER);

        let up_body_start = up_start + UP_MARKER.len();
        let up_end = down_start.unwrap_or(contents.len());
        let up_sql = contents[up_body_start..up_end].trim().to_string();
        if up_sql.is_empty() {
            return Err(ServiceError::bad_request(format!(
                "migration {stem}: empty {UP_MARKER} section"
            )));
        }

        let down_sql = match down_start {
            Some(idx) => contents[idx + DOWN_MARKER.len()..].trim().to_string(),
            None => String::new(),
        };

        Ok(Self {
            name: stem.to_string(),
            up_sql,
            down_sql,
        })
    }

    /// Load every `*.sql` file in `dir`, sorted by filename so the
    /// 14-digit timestamp prefix naturally orders them.
    pub fn load_directory(dir: &Path) -> Result<Vec<Box<dyn Migration>>> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| ServiceError::internal(format!("reading migration directory: {e}")))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "sql"))
            .collect();
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    ServiceError::internal(format!("reading migration {}: {e}", path.display()))
                })?;
                let migration: Box<dyn Migration> = Box::new(Self::parse(&stem, &contents)?);
                Ok(migration)
            })
            .collect()
    }
}

#[async_trait]
impl Migration for FileMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        match ctx {
            MigrationContext::Relational(conn) => {
                conn.execute_unprepared(&self.up_sql)
                    .await
                    .map_err(|e| ServiceError::internal(format!("migration {}: {e}", self.name)))?;
                Ok(())
            }
            #[allow(unreachable_patterns)]
            _ => Err(ServiceError::internal(format!(
                "migration {} is relational-only",
                self.name
            ))),
        }
    }

    async fn down(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        if self.down_sql.is_empty() {
            return Ok(());
        }
        match ctx {
            MigrationContext::Relational(conn) => {
                conn.execute_unprepared(&self.down_sql)
                    .await
                    .map_err(|e| ServiceError::internal(format!("migration {}: {e}", self.name)))?;
                Ok(())
            }
            #[allow(unreachable_patterns)]
            _ => Err(ServiceError::internal(format!(
                "migration {} is relational-only",
                self.name
            ))),
        }
    }
}
