//! Tenant isolation as a wrapper around [`GenericService`], not a branch
//! inside it — every read filter, write body, and delete selector gets
//! `_orgId` forced to the acting context's tenant before the call reaches
//! the inner service.

use crate::generic::GenericService;
use crate::service::Service;
use crate::user_context::UserContext;
use async_trait::async_trait;
use serde_json::Value;
use svc_errors::{Result, ServiceError};
use svc_model::{Entity, Id, ModelSpec};
use svc_odata::{PagedResult, Predicate, QueryOptions};
use svc_storage::{DeleteResult, Operation, Storage};

/// Wraps a [`GenericService`] and enforces tenant scoping on every
/// operation. A system context whose `orgId` equals `meta_org_id`
/// bypasses scoping entirely — the one channel allowed to see or write
/// across tenants, used by the admin-bootstrap migration.
pub struct MultiTenantService<M: ModelSpec, ST: Storage<M>> {
    inner: GenericService<M, ST>,
    meta_org_id: Option<String>,
}

impl<M: ModelSpec, ST: Storage<M>> MultiTenantService<M, ST> {
    pub fn new(inner: GenericService<M, ST>, meta_org_id: Option<String>) -> Self {
        Self { inner, meta_org_id }
    }

    fn bypasses_scoping(&self, ctx: &UserContext) -> bool {
        ctx.is_system() && self.meta_org_id.is_some() && ctx.org_id() == self.meta_org_id.as_deref()
    }

    fn require_org(&self, ctx: &UserContext) -> Result<String> {
        ctx.org_id()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::forbidden("acting context has no orgId"))
    }

    fn scope_query(&self, ctx: &UserContext, query: &QueryOptions) -> Result<QueryOptions> {
        if self.bypasses_scoping(ctx) {
            return Ok(query.clone());
        }
        let org = self.require_org(ctx)?;
        let mut scoped = query.clone();
        scoped
            .filters
            .insert("_orgId".into(), Predicate::Eq(Value::String(org)));
        Ok(scoped)
    }

    /// Force the tenant field on an incoming write body. Rejects a body
    /// that names a different tenant outright rather than silently
    /// overwriting it.
    fn scope_write(&self, ctx: &UserContext, input: &mut Value) -> Result<()> {
        if self.bypasses_scoping(ctx) {
            return Ok(());
        }
        let org = self.require_org(ctx)?;
        if let Value::Object(map) = input {
            if let Some(supplied) = map.get("_orgId").and_then(Value::as_str) {
                if supplied != org {
                    return Err(ServiceError::forbidden("orgId does not match acting context"));
                }
            }
            map.insert("_orgId".into(), Value::String(org));
        }
        Ok(())
    }

    /// Fails `NotFound`, not `Forbidden`, on a cross-tenant id — existence
    /// of another tenant's row is not something to leak through the error
    /// kind.
    async fn check_owned(&self, ctx: &UserContext, id: &Id) -> Result<()> {
        if self.bypasses_scoping(ctx) {
            return Ok(());
        }
        let org = self.require_org(ctx)?;
        let entity = self.inner.storage().get_by_id(&[], id).await?;
        match entity.org_id() {
            Some(existing) if existing == org => Ok(()),
            _ => Err(ServiceError::not_found()),
        }
    }
}

#[async_trait]
impl<M: ModelSpec, ST: Storage<M>> Service<M> for MultiTenantService<M, ST> {
    async fn get_all(&self, ctx: &UserContext) -> Result<Vec<M::Full>> {
        let all = self.inner.get_all(ctx).await?;
        if self.bypasses_scoping(ctx) {
            return Ok(all);
        }
        let org = self.require_org(ctx)?;
        Ok(all
            .into_iter()
            .filter(|e| e.org_id() == Some(org.as_str()))
            .collect())
    }

    async fn get(
        &self,
        ctx: &UserContext,
        ops: &[Operation],
        query: &QueryOptions,
    ) -> Result<PagedResult<M::Full>> {
        let scoped = self.scope_query(ctx, query)?;
        self.inner.get(ctx, ops, &scoped).await
    }

    async fn get_by_id(&self, ctx: &UserContext, ops: &[Operation], id: &Id) -> Result<M::Full> {
        self.check_owned(ctx, id).await?;
        self.inner.get_by_id(ctx, ops, id).await
    }

    async fn get_count(&self, ctx: &UserContext, ops: &[Operation], query: &QueryOptions) -> Result<u64> {
        let scoped = self.scope_query(ctx, query)?;
        self.inner.get_count(ctx, ops, &scoped).await
    }

    async fn create(&self, ctx: &UserContext, mut input: Value) -> Result<M::Full> {
        self.scope_write(ctx, &mut input)?;
        self.inner.create(ctx, input).await
    }

    async fn create_many(&self, ctx: &UserContext, mut inputs: Vec<Value>) -> Result<Vec<M::Full>> {
        for input in &mut inputs {
            self.scope_write(ctx, input)?;
        }
        self.inner.create_many(ctx, inputs).await
    }

    async fn batch_update(&self, ctx: &UserContext, mut updates: Vec<Value>) -> Result<Vec<M::Full>> {
        for update in &updates {
            if let Some(raw) = update.get("_id").and_then(Value::as_str) {
                let id = Id::parse_permissive(raw)?;
                self.check_owned(ctx, &id).await?;
            }
        }
        for update in &mut updates {
            self.scope_write(ctx, update)?;
        }
        self.inner.batch_update(ctx, updates).await
    }

    async fn full_update_by_id(&self, ctx: &UserContext, id: &Id, mut input: Value) -> Result<M::Full> {
        self.check_owned(ctx, id).await?;
        self.scope_write(ctx, &mut input)?;
        self.inner.full_update_by_id(ctx, id, input).await
    }

    async fn partial_update_by_id(&self, ctx: &UserContext, id: &Id, mut input: Value) -> Result<M::Full> {
        self.check_owned(ctx, id).await?;
        self.scope_write(ctx, &mut input)?;
        self.inner.partial_update_by_id(ctx, id, input).await
    }

    async fn delete_by_id(&self, ctx: &UserContext, id: &Id) -> Result<DeleteResult> {
        self.check_owned(ctx, id).await?;
        self.inner.delete_by_id(ctx, id).await
    }

    async fn delete_many(&self, ctx: &UserContext, query: &QueryOptions) -> Result<DeleteResult> {
        let scoped = self.scope_query(ctx, query)?;
        self.inner.delete_many(ctx, &scoped).await
    }

    async fn find(&self, ctx: &UserContext, query: &QueryOptions) -> Result<Vec<M::Full>> {
        let scoped = self.scope_query(ctx, query)?;
        self.inner.find(ctx, &scoped).await
    }

    async fn find_one(&self, ctx: &UserContext, query: &QueryOptions) -> Result<Option<M::Full>> {
        let scoped = self.scope_query(ctx, query)?;
        self.inner.find_one(ctx, &scoped).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::hooks::NoopHooks;
    use crate::id_alloc::DocumentIdAllocator;
    use crate::user_context::UserRef;
    use chrono::{TimeZone, Utc};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Arc;
    use svc_model::AuditFields;
    use svc_storage::MemoryStorage;
    use validator::{Validate, ValidationErrors};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Doc {
        #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
        id: Option<Id>,
        #[serde(rename = "_orgId", skip_serializing_if = "Option::is_none")]
        org_id: Option<String>,
        name: String,
        #[serde(flatten, skip_serializing_if = "Option::is_none")]
        audit: Option<AuditFields>,
    }

    impl Entity for Doc {
        fn id(&self) -> Option<&Id> {
            self.id.as_ref()
        }
        fn set_id(&mut self, id: Id) {
            self.id = Some(id);
        }
        fn org_id(&self) -> Option<&str> {
            self.org_id.as_deref()
        }
        fn set_org_id(&mut self, org_id: String) {
            self.org_id = Some(org_id);
        }
        fn audit(&self) -> Option<&AuditFields> {
            self.audit.as_ref()
        }
        fn audit_mut(&mut self) -> Option<&mut AuditFields> {
            self.audit.as_mut()
        }
        fn set_audit(&mut self, audit: AuditFields) {
            self.audit = Some(audit);
        }
    }

    impl Validate for Doc {
        fn validate(&self) -> std::result::Result<(), ValidationErrors> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct DocPartial {
        name: Option<String>,
    }

    impl Validate for DocPartial {
        fn validate(&self) -> std::result::Result<(), ValidationErrors> {
            Ok(())
        }
    }

    struct DocSpec;
    impl ModelSpec for DocSpec {
        type Full = Doc;
        type Partial = DocPartial;
        type Projected = Doc;
        const NAME: &'static str = "doc";
        const IS_AUDITABLE: bool = true;
        fn apply_partial(full: &mut Doc, partial: DocPartial) {
            if let Some(name) = partial.name {
                full.name = name;
            }
        }
        fn project(value: &Doc) -> Doc {
            value.clone()
        }
    }

    fn tenant_service() -> MultiTenantService<DocSpec, MemoryStorage<DocSpec>> {
        let fixed = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let inner = GenericService::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(FixedClock(fixed)),
            Arc::new(DocumentIdAllocator),
            Arc::new(NoopHooks::default()),
        );
        MultiTenantService::new(inner, Some("meta".into()))
    }

    fn ctx_for(org: &str) -> UserContext {
        UserContext::authenticated(UserRef::new(Id::Relational(1)), Some(org.into()))
    }

    #[tokio::test]
    async fn create_forces_org_id_from_context() {
        let svc = tenant_service();
        let created = svc
            .create(&ctx_for("org-a"), json!({ "name": "widget", "_orgId": "someone-else" }))
            .await
            .unwrap_err();
        assert_eq!(created.kind(), svc_errors::ErrorKind::Forbidden);

        let created = svc
            .create(&ctx_for("org-a"), json!({ "name": "widget" }))
            .await
            .unwrap();
        assert_eq!(created.org_id.as_deref(), Some("org-a"));
    }

    #[tokio::test]
    async fn cross_tenant_read_reports_not_found() {
        let svc = tenant_service();
        let created = svc
            .create(&ctx_for("org-a"), json!({ "name": "widget" }))
            .await
            .unwrap();
        let id = created.id.unwrap();

        let err = svc.get_by_id(&ctx_for("org-b"), &[], &id).await.unwrap_err();
        assert_eq!(err.kind(), svc_errors::ErrorKind::NotFound);

        let ok = svc.get_by_id(&ctx_for("org-a"), &[], &id).await.unwrap();
        assert_eq!(ok.name, "widget");
    }

    #[tokio::test]
    async fn get_all_is_post_filtered_by_tenant() {
        let svc = tenant_service();
        svc.create(&ctx_for("org-a"), json!({ "name": "a" })).await.unwrap();
        svc.create(&ctx_for("org-b"), json!({ "name": "b" })).await.unwrap();

        let rows = svc.get_all(&ctx_for("org-a")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "a");
    }
}
