//! Synthetic migrations: produced in-process by a config-driven builder
//! rather than loaded from disk. These are the tables every deployment of
//! this framework needs (`organizations`, `users`, `refresh_tokens`,
//! `roles`, `user_roles`, `features`, `authorizations`) plus the bootstrap
//! migrations that seed the meta-org and the first admin user.

use crate::migration::{Migration, MigrationContext};
use crate::password::PasswordHasher;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use svc_core::{SystemUserContext, UserRef};
use svc_errors::{Result, ServiceError};
use svc_model::Id;

/// Drives which synthetic migrations [`build`] emits.
pub struct SyntheticConfig {
    /// Whether deployments are tenant-scoped. When `true`, the
    /// `organizations` table and the meta-org bootstrap migration are
    /// included, and every other synthetic table carries `_orgId`.
    pub multi_tenant: bool,
    /// Name of the meta-org row created when `multi_tenant` is set.
    pub meta_org_name: String,
    /// When set, appends the admin-user and admin-authorization bootstrap
    /// migrations.
    pub admin: Option<AdminBootstrapConfig>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            multi_tenant: false,
            meta_org_name: "meta".to_string(),
            admin: None,
        }
    }
}

pub struct AdminBootstrapConfig {
    pub email: String,
    /// Plaintext; hashed inside [`AdminUserBootstrap::up`] before it ever
    /// touches storage.
    pub password: String,
}

/// Build the ordered set of synthetic migrations for `cfg`. Timestamps are
/// hardcoded and strictly increasing so the set sorts the same way on
/// every run, ahead of any file migration (those are expected to carry a
/// present-day timestamp).
pub fn build(cfg: &SyntheticConfig, hasher: Arc<dyn PasswordHasher>) -> Vec<Box<dyn Migration>> {
    let mut out: Vec<Box<dyn Migration>> = Vec::new();

    if cfg.multi_tenant {
        out.push(Box::new(CreateTable {
            name: "20240101000001_create_organizations",
            table: "organizations",
            relational_up: r#"CREATE TABLE organizations (
                _id SERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                _created TIMESTAMPTZ NOT NULL,
                _createdBy TEXT NOT NULL,
                _updated TIMESTAMPTZ NOT NULL,
                _updatedBy TEXT NOT NULL
            )"#,
        }));
    }

    out.push(Box::new(CreateTable {
        name: "20240101000002_create_users",
        table: "users",
        relational_up: r#"CREATE TABLE users (
            _id SERIAL PRIMARY KEY,
            _orgId TEXT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            _created TIMESTAMPTZ NOT NULL,
            _createdBy TEXT NOT NULL,
            _updated TIMESTAMPTZ NOT NULL,
            _updatedBy TEXT NOT NULL
        )"#,
    }));

    out.push(Box::new(CreateTable {
        name: "20240101000003_create_refresh_tokens",
        table: "refresh_tokens",
        relational_up: r#"CREATE TABLE refresh_tokens (
            _id SERIAL PRIMARY KEY,
            _orgId TEXT,
            user_id BIGINT NOT NULL REFERENCES users(_id),
            token_hash TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            _created TIMESTAMPTZ NOT NULL
        )"#,
    }));

    out.push(Box::new(CreateTable {
        name: "20240101000004_create_roles",
        table: "roles",
        relational_up: r#"CREATE TABLE roles (
            _id SERIAL PRIMARY KEY,
            _orgId TEXT,
            name TEXT NOT NULL,
            _created TIMESTAMPTZ NOT NULL
        )"#,
    }));

    out.push(Box::new(CreateTable {
        name: "20240101000005_create_user_roles",
        table: "user_roles",
        relational_up: r#"CREATE TABLE user_roles (
            _id SERIAL PRIMARY KEY,
            _orgId TEXT,
            user_id BIGINT NOT NULL REFERENCES users(_id),
            role_id BIGINT NOT NULL REFERENCES roles(_id),
            _created TIMESTAMPTZ NOT NULL
        )"#,
    }));

    out.push(Box::new(CreateTable {
        name: "20240101000006_create_features",
        table: "features",
        relational_up: r#"CREATE TABLE features (
            _id SERIAL PRIMARY KEY,
            _orgId TEXT,
            key TEXT NOT NULL,
            enabled BOOLEAN NOT NULL DEFAULT false,
            _created TIMESTAMPTZ NOT NULL
        )"#,
    }));

    out.push(Box::new(CreateTable {
        name: "20240101000007_create_authorizations",
        table: "authorizations",
        relational_up: r#"CREATE TABLE authorizations (
            _id SERIAL PRIMARY KEY,
            _orgId TEXT,
            user_id BIGINT NOT NULL REFERENCES users(_id),
            role_id BIGINT NOT NULL REFERENCES roles(_id),
            _created TIMESTAMPTZ NOT NULL
        )"#,
    }));

    if cfg.multi_tenant {
        out.push(Box::new(MetaOrgBootstrap {
            name: cfg.meta_org_name.clone(),
        }));
    }

    if let Some(admin) = &cfg.admin {
        out.push(Box::new(AdminUserBootstrap {
            email: admin.email.clone(),
            password: admin.password.clone(),
            hasher: hasher.clone(),
        }));
        out.push(Box::new(AdminAuthorizationBootstrap {
            email: admin.email.clone(),
        }));
    }

    out
}

/// A plain `CREATE TABLE`. Every synthetic table but the bootstrap rows
/// is one of these — the document backend has no DDL step since MongoDB
/// creates collections implicitly on first write.
struct CreateTable {
    name: &'static str,
    table: &'static str,
    relational_up: &'static str,
}

#[async_trait]
impl Migration for CreateTable {
    fn name(&self) -> &str {
        self.name
    }

    async fn up(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        match ctx {
            #[cfg(feature = "relational")]
            MigrationContext::Relational(conn) => {
                use sea_orm::ConnectionTrait;
                conn.execute_unprepared(self.relational_up)
                    .await
                    .map_err(|e| ServiceError::internal(format!("{}: {e}", self.name)))?;
                Ok(())
            }
            #[cfg(feature = "document")]
            MigrationContext::Document(_) => Ok(()),
        }
    }

    async fn down(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        match ctx {
            #[cfg(feature = "relational")]
            MigrationContext::Relational(conn) => {
                use sea_orm::ConnectionTrait;
                conn.execute_unprepared(&format!("DROP TABLE IF EXISTS {}", self.table))
                    .await
                    .map_err(|e| ServiceError::internal(format!("{}: {e}", self.name)))?;
                Ok(())
            }
            #[cfg(feature = "document")]
            MigrationContext::Document(db) => {
                db.collection::<bson::Document>(self.table)
                    .drop()
                    .await
                    .map_err(|e| ServiceError::internal(format!("{}: {e}", self.name)))?;
                Ok(())
            }
        }
    }
}

/// Creates the meta-org row and initializes the process-wide
/// [`SystemUserContext`] from it. Must run before [`AdminUserBootstrap`]
/// in multi-tenant mode.
struct MetaOrgBootstrap {
    name: String,
}

#[async_trait]
impl Migration for MetaOrgBootstrap {
    fn name(&self) -> &str {
        "20240101000008_bootstrap_meta_org"
    }

    async fn up(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let now = Utc::now();
        match ctx {
            #[cfg(feature = "relational")]
            MigrationContext::Relational(conn) => {
                use sea_orm::{ConnectionTrait, Statement};
                let backend = conn.get_database_backend();
                let system = Id::Relational(0);
                let row = conn
                    .query_one(Statement::from_sql_and_values(
                        backend,
                        r#"INSERT INTO organizations (name, _created, "_createdBy", _updated, "_updatedBy")
                           VALUES ($1, $2, $3, $2, $3) RETURNING _id"#,
                        [self.name.clone().into(), now.into(), system.to_string().into()],
                    ))
                    .await
                    .map_err(|e| ServiceError::internal(format!("bootstrap meta-org: {e}")))?
                    .ok_or_else(|| ServiceError::internal("bootstrap meta-org: no row returned"))?;
                let org_id: i64 = row
                    .try_get_by_index(0)
                    .map_err(|e| ServiceError::internal(format!("bootstrap meta-org: {e}")))?;
                SystemUserContext::initialize(UserRef::new(system), Some(org_id.to_string()));
                Ok(())
            }
            #[cfg(feature = "document")]
            MigrationContext::Document(db) => {
                let system = Id::new_document();
                let org_id = Id::new_document();
                db.collection::<bson::Document>("organizations")
                    .insert_one(bson::doc! {
                        "_id": org_id.to_string(),
                        "name": &self.name,
                        "_created": bson::DateTime::from_chrono(now),
                        "_createdBy": system.to_string(),
                        "_updated": bson::DateTime::from_chrono(now),
                        "_updatedBy": system.to_string(),
                    })
                    .await
                    .map_err(|e| ServiceError::internal(format!("bootstrap meta-org: {e}")))?;
                SystemUserContext::initialize(UserRef::new(system), Some(org_id.to_string()));
                Ok(())
            }
        }
    }

    async fn down(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        match ctx {
            #[cfg(feature = "relational")]
            MigrationContext::Relational(conn) => {
                use sea_orm::{ConnectionTrait, Statement};
                let backend = conn.get_database_backend();
                conn.execute(Statement::from_sql_and_values(
                    backend,
                    "DELETE FROM organizations WHERE name = $1",
                    [self.name.clone().into()],
                ))
                .await
                .map_err(|e| ServiceError::internal(format!("reverting bootstrap meta-org: {e}")))?;
                Ok(())
            }
            #[cfg(feature = "document")]
            MigrationContext::Document(db) => {
                db.collection::<bson::Document>("organizations")
                    .delete_one(bson::doc! { "name": &self.name })
                    .await
                    .map_err(|e| ServiceError::internal(format!("reverting bootstrap meta-org: {e}")))?;
                Ok(())
            }
        }
    }
}

/// Inserts the first admin user, hashing the plaintext password supplied
/// in configuration before it reaches storage. Requires
/// [`SystemUserContext`] to already be initialized — by
/// [`MetaOrgBootstrap`] in multi-tenant mode, or by the caller in
/// single-tenant mode.
struct AdminUserBootstrap {
    email: String,
    password: String,
    hasher: Arc<dyn PasswordHasher>,
}

#[async_trait]
impl Migration for AdminUserBootstrap {
    fn name(&self) -> &str {
        "20240101000009_bootstrap_admin_user"
    }

    async fn up(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        if !SystemUserContext::is_initialized() {
            return Err(ServiceError::internal(
                "SystemUserContext must be initialized before the admin-user migration",
            ));
        }
        let system = SystemUserContext::current();
        let password_hash = self.hasher.hash(&self.password)?;
        let now = Utc::now();

        match ctx {
            #[cfg(feature = "relational")]
            MigrationContext::Relational(conn) => {
                use sea_orm::{ConnectionTrait, Statement};
                let backend = conn.get_database_backend();
                conn.execute(Statement::from_sql_and_values(
                    backend,
                    r#"INSERT INTO users (_orgId, email, password_hash, _created, "_createdBy", _updated, "_updatedBy")
                       VALUES ($1, $2, $3, $4, $5, $4, $5)"#,
                    [
                        system.org_id().map(str::to_string).into(),
                        self.email.clone().into(),
                        password_hash.into(),
                        now.into(),
                        system.user().id.to_string().into(),
                    ],
                ))
                .await
                .map_err(|e| ServiceError::internal(format!("bootstrap admin user: {e}")))?;
                Ok(())
            }
            #[cfg(feature = "document")]
            MigrationContext::Document(db) => {
                db.collection::<bson::Document>("users")
                    .insert_one(bson::doc! {
                        "_id": Id::new_document().to_string(),
                        "_orgId": system.org_id(),
                        "email": &self.email,
                        "passwordHash": password_hash,
                        "_created": bson::DateTime::from_chrono(now),
                        "_createdBy": system.user().id.to_string(),
                        "_updated": bson::DateTime::from_chrono(now),
                        "_updatedBy": system.user().id.to_string(),
                    })
                    .await
                    .map_err(|e| ServiceError::internal(format!("bootstrap admin user: {e}")))?;
                Ok(())
            }
        }
    }

    async fn down(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        match ctx {
            #[cfg(feature = "relational")]
            MigrationContext::Relational(conn) => {
                use sea_orm::{ConnectionTrait, Statement};
                let backend = conn.get_database_backend();
                conn.execute(Statement::from_sql_and_values(
                    backend,
                    "DELETE FROM users WHERE email = $1",
                    [self.email.clone().into()],
                ))
                .await
                .map_err(|e| ServiceError::internal(format!("reverting bootstrap admin user: {e}")))?;
                Ok(())
            }
            #[cfg(feature = "document")]
            MigrationContext::Document(db) => {
                db.collection::<bson::Document>("users")
                    .delete_one(bson::doc! { "email": &self.email })
                    .await
                    .map_err(|e| ServiceError::internal(format!("reverting bootstrap admin user: {e}")))?;
                Ok(())
            }
        }
    }
}

/// Grants the admin user an `admin` role via the `roles`/`authorizations`
/// tables, so the bootstrapped account can act immediately.
struct AdminAuthorizationBootstrap {
    email: String,
}

#[async_trait]
impl Migration for AdminAuthorizationBootstrap {
    fn name(&self) -> &str {
        "20240101000010_bootstrap_admin_authorization"
    }

    async fn up(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        let now = Utc::now();
        match ctx {
            #[cfg(feature = "relational")]
            MigrationContext::Relational(conn) => {
                use sea_orm::{ConnectionTrait, Statement};
                let backend = conn.get_database_backend();
                conn.execute_unprepared(
                    "INSERT INTO roles (name, _created) VALUES ('admin', now()) ON CONFLICT DO NOTHING",
                )
                .await
                .map_err(|e| ServiceError::internal(format!("bootstrap admin role: {e}")))?;
                conn.execute(Statement::from_sql_and_values(
                    backend,
                    r#"INSERT INTO authorizations (user_id, role_id, _created)
                       SELECT u._id, r._id, $2
                       FROM users u, roles r
                       WHERE u.email = $1 AND r.name = 'admin'"#,
                    [self.email.clone().into(), now.into()],
                ))
                .await
                .map_err(|e| ServiceError::internal(format!("bootstrap admin authorization: {e}")))?;
                Ok(())
            }
            #[cfg(feature = "document")]
            MigrationContext::Document(db) => {
                db.collection::<bson::Document>("roles")
                    .update_one(
                        bson::doc! { "name": "admin" },
                        bson::doc! { "$setOnInsert": { "_id": Id::new_document().to_string(), "name": "admin", "_created": bson::DateTime::from_chrono(now) } },
                    )
                    .upsert(true)
                    .await
                    .map_err(|e| ServiceError::internal(format!("bootstrap admin role: {e}")))?;
                db.collection::<bson::Document>("authorizations")
                    .insert_one(bson::doc! {
                        "_id": Id::new_document().to_string(),
                        "userEmail": &self.email,
                        "role": "admin",
                        "_created": bson::DateTime::from_chrono(now),
                    })
                    .await
                    .map_err(|e| ServiceError::internal(format!("bootstrap admin authorization: {e}")))?;
                Ok(())
            }
        }
    }

    /// Removes the admin role grant this migration added. Leaves the
    /// shared `admin` row in `roles` in place — other authorizations may
    /// still reference it.
    async fn down(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        match ctx {
            #[cfg(feature = "relational")]
            MigrationContext::Relational(conn) => {
                use sea_orm::{ConnectionTrait, Statement};
                let backend = conn.get_database_backend();
                conn.execute(Statement::from_sql_and_values(
                    backend,
                    r#"DELETE FROM authorizations
                       WHERE user_id = (SELECT _id FROM users WHERE email = $1)
                       AND role_id = (SELECT _id FROM roles WHERE name = 'admin')"#,
                    [self.email.clone().into()],
                ))
                .await
                .map_err(|e| ServiceError::internal(format!("reverting bootstrap admin authorization: {e}")))?;
                Ok(())
            }
            #[cfg(feature = "document")]
            MigrationContext::Document(db) => {
                db.collection::<bson::Document>("authorizations")
                    .delete_many(bson::doc! { "userEmail": &self.email, "role": "admin" })
                    .await
                    .map_err(|e| ServiceError::internal(format!("reverting bootstrap admin authorization: {e}")))?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::Argon2PasswordHasher;

    #[test]
    fn single_tenant_without_admin_only_emits_plain_tables() {
        let cfg = SyntheticConfig::default();
        let names: Vec<_> = build(&cfg, Arc::new(Argon2PasswordHasher))
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names.len(), 6);
        assert!(!names.iter().any(|n| n.contains("organizations")));
        assert!(!names.iter().any(|n| n.contains("bootstrap")));
    }

    #[test]
    fn multi_tenant_with_admin_emits_bootstrap_migrations_in_order() {
        let cfg = SyntheticConfig {
            multi_tenant: true,
            meta_org_name: "meta".to_string(),
            admin: Some(AdminBootstrapConfig {
                email: "admin@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
            }),
        };
        let names: Vec<_> = build(&cfg, Arc::new(Argon2PasswordHasher))
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names.len(), 11);
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted, "declared order must already be name-sorted");
        assert!(names.last().unwrap().contains("admin_authorization"));
    }

    #[test]
    fn names_are_unique() {
        let cfg = SyntheticConfig {
            multi_tenant: true,
            admin: Some(AdminBootstrapConfig {
                email: "admin@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
            }),
            ..SyntheticConfig::default()
        };
        let names: std::collections::HashSet<_> = build(&cfg, Arc::new(Argon2PasswordHasher))
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names.len(), 11);
    }
}
