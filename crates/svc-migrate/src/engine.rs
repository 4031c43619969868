//! Orchestration: given a backend connection and a declared set of
//! migrations (synthetic + file, already merged and sorted by the
//! caller's choosing), compute what is pending against the ledger and run
//! it. Grounded on `modkit-db`'s `run_module_migrations`, generalized from
//! its per-module migration table to this engine's single global one.

use crate::ledger::ledger_for;
use crate::migration::{Migration, MigrationContext};
use std::collections::HashSet;
use svc_errors::{Result, ServiceError};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationResult {
    pub applied: usize,
    pub skipped: usize,
    pub applied_names: Vec<String>,
}

pub struct MigrationEngine<'a> {
    ctx: MigrationContext<'a>,
}

impl<'a> MigrationEngine<'a> {
    #[must_use]
    pub fn new(ctx: MigrationContext<'a>) -> Self {
        Self { ctx }
    }

    fn reject_duplicates(migrations: &[Box<dyn Migration>]) -> Result<()> {
        let mut seen = HashSet::new();
        for m in migrations {
            if !seen.insert(m.name().to_owned()) {
                return Err(ServiceError::internal(format!(
                    "duplicate migration name: {}",
                    m.name()
                )));
            }
        }
        Ok(())
    }

    /// Run every pending migration, in ascending name order. `to_name`, if
    /// given, stops the run after the migration with that exact name
    /// (inclusive) instead of running everything declared.
    pub async fn up(
        &self,
        migrations: Vec<Box<dyn Migration>>,
        to_name: Option<&str>,
    ) -> Result<MigrationResult> {
        Self::reject_duplicates(&migrations)?;

        let ledger = ledger_for(&self.ctx);
        ledger.ensure_table().await?;
        let applied = ledger.applied_names().await?;

        let mut sorted = migrations;
        sorted.sort_by(|a, b| a.name().cmp(b.name()));

        let mut result = MigrationResult::default();
        for migration in &sorted {
            let name = migration.name();

            if applied.contains(name) {
                debug!(migration = name, "already applied, skipping");
                result.skipped += 1;
                continue;
            }

            info!(migration = name, "applying migration");
            migration.up(&self.ctx).await.map_err(|e| {
                ServiceError::internal(format!("migration {name} failed: {e}"))
            })?;
            ledger.record(name).await?;
            result.applied += 1;
            result.applied_names.push(name.to_owned());

            if to_name == Some(name) {
                break;
            }
        }

        info!(
            applied = result.applied,
            skipped = result.skipped,
            "migration run complete"
        );
        Ok(result)
    }

    /// Revert applied migrations in descending name order. With `to_name`
    /// set, reverts everything applied *after* that migration, leaving it
    /// (and everything before it) in place. With `to_name` unset, reverts
    /// only the single most-recently-applied migration.
    pub async fn down(
        &self,
        migrations: Vec<Box<dyn Migration>>,
        to_name: Option<&str>,
    ) -> Result<MigrationResult> {
        Self::reject_duplicates(&migrations)?;

        let ledger = ledger_for(&self.ctx);
        let applied = ledger.applied_names().await?;

        let mut sorted = migrations;
        sorted.sort_by(|a, b| a.name().cmp(b.name()));
        sorted.retain(|m| applied.contains(m.name()));
        sorted.reverse();

        let to_revert: Vec<&Box<dyn Migration>> = match to_name {
            Some(target) => sorted
                .iter()
                .take_while(|m| m.name() != target)
                .collect(),
            None => sorted.iter().take(1).collect(),
        };

        let mut result = MigrationResult::default();
        for migration in to_revert {
            let name = migration.name();
            info!(migration = name, "reverting migration");
            migration.down(&self.ctx).await.map_err(|e| {
                ServiceError::internal(format!("reverting migration {name} failed: {e}"))
            })?;
            ledger.unrecord(name).await?;
            result.applied += 1;
            result.applied_names.push(name.to_owned());
        }

        Ok(result)
    }

    /// Revert every applied migration (in descending order) and re-run
    /// `up` from scratch. Unlike a schema drop, this goes through each
    /// migration's own `down`, so it only works cleanly when every applied
    /// migration's `down` is actually implemented.
    ///
    /// In multi-tenant deployments with admin bootstrap configured, the
    /// synthetic bootstrap migrations' `down` cleans up their own rows but
    /// cannot undo `SystemUserContext::initialize`, which panics if called
    /// a second time in the same process — `reset` in that configuration
    /// is meant to be followed by a fresh process (the same expectation
    /// `up` already has for its own bootstrap step at startup), not
    /// chained with further calls in the same run.
    pub async fn reset(&self, migrations: Vec<Box<dyn Migration>>) -> Result<MigrationResult> {
        Self::reject_duplicates(&migrations)?;

        let ledger = ledger_for(&self.ctx);
        let applied = ledger.applied_names().await?;

        let mut sorted: Vec<_> = migrations
            .iter()
            .filter(|m| applied.contains(m.name()))
            .collect();
        sorted.sort_by(|a, b| b.name().cmp(a.name()));

        for migration in &sorted {
            migration.down(&self.ctx).await.map_err(|e| {
                ServiceError::internal(format!(
                    "reset: reverting {} failed: {e}",
                    migration.name()
                ))
            })?;
        }
        ledger.clear().await?;

        self.up(migrations, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingMigration {
        name: &'static str,
        ups: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Migration for CountingMigration {
        fn name(&self) -> &str {
            self.name
        }

        async fn up(&self, _ctx: &MigrationContext<'_>) -> Result<()> {
            self.ups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn down(&self, _ctx: &MigrationContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let ups = Arc::new(AtomicUsize::new(0));
        let migrations: Vec<Box<dyn Migration>> = vec![
            Box::new(CountingMigration {
                name: "a",
                ups: ups.clone(),
            }),
            Box::new(CountingMigration {
                name: "a",
                ups: ups.clone(),
            }),
        ];
        let err = MigrationEngine::reject_duplicates(&migrations).unwrap_err();
        assert_eq!(err.kind(), svc_errors::ErrorKind::Internal);
    }
}
