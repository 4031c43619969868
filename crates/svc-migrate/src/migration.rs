//! A migration is `{name, up(ctx), down(ctx)}`; names sort lexicographically
//! and that sort order is the execution order — a 14-digit timestamp prefix
//! is how both synthetic and file migrations get a total, stable order.

use async_trait::async_trait;
use svc_errors::Result;

/// The backend a migration runs against. A migration only implements the
/// variant(s) it needs; running it against the wrong backend is a usage
/// error ([`svc_errors::ServiceError::Internal`]), not a silent no-op.
pub enum MigrationContext<'a> {
    #[cfg(feature = "relational")]
    Relational(&'a sea_orm::DatabaseConnection),
    #[cfg(feature = "document")]
    Document(&'a mongodb::Database),
}

#[async_trait]
pub trait Migration: Send + Sync {
    /// `<14-digit-timestamp>_<slug>`. Two migrations sharing a name is a
    /// configuration error the engine rejects before running anything.
    fn name(&self) -> &str;

    async fn up(&self, ctx: &MigrationContext<'_>) -> Result<()>;

    async fn down(&self, ctx: &MigrationContext<'_>) -> Result<()>;
}
