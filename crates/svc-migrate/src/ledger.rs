//! Bookkeeping: which migrations have already run. One global `migrations`
//! table/collection, not per-module — this engine owns the whole schema,
//! unlike a modular host that isolates each module's migration history.

use crate::migration::MigrationContext;
use async_trait::async_trait;
use std::collections::HashSet;
use svc_errors::Result;

#[async_trait]
pub(crate) trait Ledger {
    async fn ensure_table(&self) -> Result<()>;
    async fn applied_names(&self) -> Result<HashSet<String>>;
    async fn record(&self, name: &str) -> Result<()>;
    async fn unrecord(&self, name: &str) -> Result<()>;
    /// Drop every row — used by `reset` after every applied migration has
    /// been reverted via its own `down`, so the ledger matches the
    /// now-empty schema before `up` re-applies everything.
    async fn clear(&self) -> Result<()>;
}

#[cfg(feature = "relational")]
pub(crate) struct RelationalLedger<'a> {
    pub conn: &'a sea_orm::DatabaseConnection,
}

#[cfg(feature = "relational")]
#[async_trait]
impl Ledger for RelationalLedger<'_> {
    async fn ensure_table(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared(
                r#"CREATE TABLE IF NOT EXISTS migrations (
                    name TEXT PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )"#,
            )
            .await
            .map_err(|e| svc_errors::ServiceError::internal(format!("ensure migrations table: {e}")))?;
        Ok(())
    }

    async fn applied_names(&self) -> Result<HashSet<String>> {
        use sea_orm::{FromQueryResult, Statement};

        #[derive(FromQueryResult)]
        struct Row {
            name: String,
        }

        let backend = sea_orm::ConnectionTrait::get_database_backend(self.conn);
        let rows = Row::find_by_statement(Statement::from_string(
            backend,
            "SELECT name FROM migrations".to_string(),
        ))
        .all(self.conn)
        .await
        .map_err(|e| svc_errors::ServiceError::internal(format!("reading migrations table: {e}")))?;
        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    async fn record(&self, name: &str) -> Result<()> {
        use sea_orm::{ConnectionTrait, Statement};
        let backend = self.conn.get_database_backend();
        self.conn
            .execute(Statement::from_sql_and_values(
                backend,
                "INSERT INTO migrations (name) VALUES ($1)",
                [name.into()],
            ))
            .await
            .map_err(|e| svc_errors::ServiceError::internal(format!("recording migration {name}: {e}")))?;
        Ok(())
    }

    async fn unrecord(&self, name: &str) -> Result<()> {
        use sea_orm::{ConnectionTrait, Statement};
        let backend = self.conn.get_database_backend();
        self.conn
            .execute(Statement::from_sql_and_values(
                backend,
                "DELETE FROM migrations WHERE name = $1",
                [name.into()],
            ))
            .await
            .map_err(|e| svc_errors::ServiceError::internal(format!("unrecording migration {name}: {e}")))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("DELETE FROM migrations")
            .await
            .map_err(|e| svc_errors::ServiceError::internal(format!("clearing migrations table: {e}")))?;
        Ok(())
    }
}

#[cfg(feature = "document")]
pub(crate) struct DocumentLedger<'a> {
    pub db: &'a mongodb::Database,
}

#[cfg(feature = "document")]
impl DocumentLedger<'_> {
    fn collection(&self) -> mongodb::Collection<bson::Document> {
        self.db.collection("migrations")
    }
}

#[cfg(feature = "document")]
#[async_trait]
impl Ledger for DocumentLedger<'_> {
    async fn ensure_table(&self) -> Result<()> {
        // Collections are created implicitly on first write in MongoDB.
        Ok(())
    }

    async fn applied_names(&self) -> Result<HashSet<String>> {
        use futures::TryStreamExt;
        let mut cursor = self
            .collection()
            .find(bson::doc! {})
            .await
            .map_err(|e| svc_errors::ServiceError::internal(format!("reading migrations collection: {e}")))?;
        let mut names = HashSet::new();
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| svc_errors::ServiceError::internal(format!("reading migrations collection: {e}")))?
        {
            if let Ok(name) = doc.get_str("_id") {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    async fn record(&self, name: &str) -> Result<()> {
        self.collection()
            .insert_one(bson::doc! { "_id": name, "appliedAt": bson::DateTime::now() })
            .await
            .map_err(|e| svc_errors::ServiceError::internal(format!("recording migration {name}: {e}")))?;
        Ok(())
    }

    async fn unrecord(&self, name: &str) -> Result<()> {
        self.collection()
            .delete_one(bson::doc! { "_id": name })
            .await
            .map_err(|e| svc_errors::ServiceError::internal(format!("unrecording migration {name}: {e}")))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.collection()
            .delete_many(bson::doc! {})
            .await
            .map_err(|e| svc_errors::ServiceError::internal(format!("clearing migrations collection: {e}")))?;
        Ok(())
    }
}

pub(crate) fn ledger_for<'a>(ctx: &'a MigrationContext<'a>) -> Box<dyn Ledger + 'a> {
    match ctx {
        #[cfg(feature = "relational")]
        MigrationContext::Relational(conn) => Box::new(RelationalLedger { conn }),
        #[cfg(feature = "document")]
        MigrationContext::Document(db) => Box::new(DocumentLedger { db }),
    }
}
