//! `GenericService`: the validate → preprocess → persist → postprocess
//! orchestration shared by every resource, parameterized by a
//! [`ModelSpec`] and a [`Storage`] adapter.

use crate::clock::Clock;
use crate::hooks::Hooks;
use crate::id_alloc::IdAllocator;
use crate::user_context::UserContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use svc_errors::{Result, ServiceError};
use svc_model::{AuditFields, Entity, Id, ModelSpec};
use svc_odata::{PagedResult, QueryOptions};
use svc_storage::{DeleteResult, Operation, Storage};

use crate::service::Service;

/// Strip every field whose name begins with `_` from an incoming wire
/// object, except `_orgId` (the tenant field, always allowed through) and
/// `_id` when `allow_id` is set (only true for operations where the body
/// itself carries the identity, e.g. `batchUpdate`). Bypassed entirely
/// for a system context — migrations are the one channel allowed to set
/// audit fields directly.
fn strip_tamper_fields(value: &mut Value, ctx: &UserContext, allow_id: bool) {
    if ctx.is_system() {
        return;
    }
    if let Value::Object(map) = value {
        map.retain(|k, _| !k.starts_with('_') || k == "_orgId" || (k == "_id" && allow_id));
    }
}

/// `GenericService` over a [`ModelSpec`] `M` and a concrete [`Storage`]
/// adapter `ST`. Resources needing tenant isolation wrap this in
/// [`crate::tenant::MultiTenantService`] rather than reimplementing the
/// pipeline.
pub struct GenericService<M: ModelSpec, ST: Storage<M>> {
    storage: Arc<ST>,
    clock: Arc<dyn Clock>,
    id_allocator: Arc<dyn IdAllocator>,
    hooks: Arc<dyn Hooks<M>>,
    _marker: PhantomData<M>,
}

impl<M: ModelSpec, ST: Storage<M>> GenericService<M, ST> {
    pub fn new(
        storage: Arc<ST>,
        clock: Arc<dyn Clock>,
        id_allocator: Arc<dyn IdAllocator>,
        hooks: Arc<dyn Hooks<M>>,
    ) -> Self {
        Self {
            storage,
            clock,
            id_allocator,
            hooks,
            _marker: PhantomData,
        }
    }

    pub(crate) fn storage(&self) -> &ST {
        &self.storage
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn decode_full(value: Value) -> Result<M::Full> {
        serde_json::from_value(value)
            .map_err(|e| ServiceError::bad_request(format!("malformed {}: {e}", M::NAME)))
    }

    fn decode_partial(value: Value) -> Result<M::Partial> {
        serde_json::from_value(value)
            .map_err(|e| ServiceError::bad_request(format!("malformed {}: {e}", M::NAME)))
    }

    /// Inject the audit quintuple's create stamp directly onto the wire
    /// object, ahead of decoding into `M::Full`. No-op for non-auditable
    /// specs.
    fn inject_audit_create(value: &mut Value, now: DateTime<Utc>, actor: &Id) {
        if !M::IS_AUDITABLE {
            return;
        }
        if let Value::Object(map) = value {
            let stamp = Value::String(now.to_rfc3339());
            let who = Value::String(actor.to_string());
            map.insert("_created".into(), stamp.clone());
            map.insert("_updated".into(), stamp);
            map.insert("_createdBy".into(), who.clone());
            map.insert("_updatedBy".into(), who);
        }
    }

    /// Carry `_created`/`_createdBy` forward from the row being replaced
    /// and refresh `_updated`/`_updatedBy`, ahead of decoding into
    /// `M::Full`. Used by `fullUpdateById`, which decodes straight into
    /// `Full` rather than applying a `Partial` onto the fetched row.
    fn inject_audit_update(value: &mut Value, now: DateTime<Utc>, actor: &Id, existing: &M::Full) {
        if !M::IS_AUDITABLE {
            return;
        }
        if let Value::Object(map) = value {
            if let Some(audit) = existing.audit() {
                map.insert("_created".into(), Value::String(audit.created.to_rfc3339()));
                map.insert(
                    "_createdBy".into(),
                    Value::String(audit.created_by.to_string()),
                );
            }
            map.insert("_updated".into(), Value::String(now.to_rfc3339()));
            map.insert("_updatedBy".into(), Value::String(actor.to_string()));
        }
    }

    /// Refresh `_updated`/`_updatedBy` on an already-decoded `Full`.
    /// `partialUpdateById`/`batchUpdate` apply a `Partial` onto the
    /// existing row rather than decoding audit fields through JSON, so
    /// the stamp happens here instead of via [`Self::inject_audit_update`].
    fn stamp_update(&self, entity: &mut M::Full, actor: &Id) {
        if !M::IS_AUDITABLE {
            return;
        }
        let now = self.clock.now();
        match entity.audit_mut() {
            Some(audit) => audit.on_update(now, actor.clone()),
            None => entity.set_audit(AuditFields::on_create(now, actor.clone())),
        }
    }

    fn extract_batch_id(value: &Value) -> Result<Id> {
        let raw = value
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::bad_request("batch update item is missing _id"))?;
        Id::parse_permissive(raw)
    }
}

#[async_trait]
impl<M: ModelSpec, ST: Storage<M>> Service<M> for GenericService<M, ST> {
    async fn get_all(&self, _ctx: &UserContext) -> Result<Vec<M::Full>> {
        self.storage.get_all().await
    }

    async fn get(
        &self,
        _ctx: &UserContext,
        ops: &[Operation],
        query: &QueryOptions,
    ) -> Result<PagedResult<M::Full>> {
        self.storage.get(ops, query).await
    }

    async fn get_by_id(&self, _ctx: &UserContext, ops: &[Operation], id: &Id) -> Result<M::Full> {
        self.storage.get_by_id(ops, id).await
    }

    async fn get_count(&self, _ctx: &UserContext, ops: &[Operation], query: &QueryOptions) -> Result<u64> {
        self.storage.get_count(ops, query).await
    }

    async fn create(&self, ctx: &UserContext, mut input: Value) -> Result<M::Full> {
        strip_tamper_fields(&mut input, ctx, false);
        Self::inject_audit_create(&mut input, self.clock.now(), &ctx.user().id);
        let mut entity = Self::decode_full(input)?;
        M::validate_full(&entity).map_err(ServiceError::validation)?;
        if let Some(id) = self.id_allocator.allocate() {
            entity.set_id(id);
        }
        let batch = self.hooks.before_create(ctx, vec![entity]).await?;
        let mut created = Vec::with_capacity(batch.len());
        for entity in batch {
            created.push(self.storage.create(entity).await?);
        }
        let mut created = self.hooks.after_create(ctx, created).await?;
        created
            .pop()
            .ok_or_else(|| ServiceError::internal("create produced no entity"))
    }

    async fn create_many(&self, ctx: &UserContext, inputs: Vec<Value>) -> Result<Vec<M::Full>> {
        let mut entities = Vec::with_capacity(inputs.len());
        for mut input in inputs {
            strip_tamper_fields(&mut input, ctx, false);
            Self::inject_audit_create(&mut input, self.clock.now(), &ctx.user().id);
            let mut entity = Self::decode_full(input)?;
            M::validate_full(&entity).map_err(ServiceError::validation)?;
            if let Some(id) = self.id_allocator.allocate() {
                entity.set_id(id);
            }
            entities.push(entity);
        }
        let entities = self.hooks.before_create(ctx, entities).await?;
        let created = self.storage.create_many(entities).await?;
        self.hooks.after_create(ctx, created).await
    }

    async fn batch_update(&self, ctx: &UserContext, updates: Vec<Value>) -> Result<Vec<M::Full>> {
        let mut pending = Vec::with_capacity(updates.len());
        for mut input in updates {
            let id = Self::extract_batch_id(&input)?;
            if let Value::Object(map) = &mut input {
                map.remove("_id");
            }
            strip_tamper_fields(&mut input, ctx, false);
            let partial = Self::decode_partial(input)?;
            M::validate_partial(&partial).map_err(ServiceError::validation)?;
            let mut entity = self.storage.get_by_id(&[], &id).await?;
            M::apply_partial(&mut entity, partial);
            self.stamp_update(&mut entity, &ctx.user().id);
            pending.push((id, entity));
        }

        let entities: Vec<M::Full> = pending.iter().map(|(_, e)| e.clone()).collect();
        let entities = self.hooks.before_update(ctx, entities).await?;
        let updates: Vec<(Id, M::Full)> = pending
            .into_iter()
            .map(|(id, _)| id)
            .zip(entities)
            .collect();
        let saved = self.storage.batch_update(updates).await?;
        self.hooks.after_update(ctx, saved).await
    }

    async fn full_update_by_id(&self, ctx: &UserContext, id: &Id, mut input: Value) -> Result<M::Full> {
        let existing = self.storage.get_by_id(&[], id).await?;
        strip_tamper_fields(&mut input, ctx, false);
        Self::inject_audit_update(&mut input, self.clock.now(), &ctx.user().id, &existing);
        let mut entity = Self::decode_full(input)?;
        M::validate_full(&entity).map_err(ServiceError::validation)?;
        entity.set_id(id.clone());
        let batch = self.hooks.before_update(ctx, vec![entity]).await?;
        let mut saved = Vec::with_capacity(batch.len());
        for entity in batch {
            saved.push(self.storage.full_update_by_id(id, entity).await?);
        }
        let mut saved = self.hooks.after_update(ctx, saved).await?;
        saved
            .pop()
            .ok_or_else(|| ServiceError::internal("update produced no entity"))
    }

    async fn partial_update_by_id(
        &self,
        ctx: &UserContext,
        id: &Id,
        mut input: Value,
    ) -> Result<M::Full> {
        strip_tamper_fields(&mut input, ctx, false);
        let partial = Self::decode_partial(input)?;
        M::validate_partial(&partial).map_err(ServiceError::validation)?;
        let mut entity = self.storage.get_by_id(&[], id).await?;
        M::apply_partial(&mut entity, partial);
        self.stamp_update(&mut entity, &ctx.user().id);
        let batch = self.hooks.before_update(ctx, vec![entity]).await?;
        let mut saved = Vec::with_capacity(batch.len());
        for entity in batch {
            saved.push(self.storage.partial_update_by_id(id, entity).await?);
        }
        let mut saved = self.hooks.after_update(ctx, saved).await?;
        saved
            .pop()
            .ok_or_else(|| ServiceError::internal("update produced no entity"))
    }

    async fn delete_by_id(&self, ctx: &UserContext, id: &Id) -> Result<DeleteResult> {
        let ids = self.hooks.before_delete(ctx, vec![id.clone()]).await?;
        let id = ids
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::internal("delete produced no id"))?;
        let result = self.storage.delete_by_id(&id).await?;
        self.hooks.after_delete(ctx, result).await
    }

    async fn delete_many(&self, _ctx: &UserContext, query: &QueryOptions) -> Result<DeleteResult> {
        self.storage.delete_many(query).await
    }

    async fn find(&self, _ctx: &UserContext, query: &QueryOptions) -> Result<Vec<M::Full>> {
        self.storage.find(query).await
    }

    async fn find_one(&self, _ctx: &UserContext, query: &QueryOptions) -> Result<Option<M::Full>> {
        self.storage.find_one(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::hooks::NoopHooks;
    use crate::id_alloc::DocumentIdAllocator;
    use crate::user_context::UserRef;
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use svc_storage::MemoryStorage;
    use validator::{Validate, ValidationErrors};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Widget {
        #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
        id: Option<Id>,
        #[serde(rename = "_orgId", skip_serializing_if = "Option::is_none")]
        org_id: Option<String>,
        name: String,
        #[serde(flatten, skip_serializing_if = "Option::is_none")]
        audit: Option<AuditFields>,
    }

    impl Entity for Widget {
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

    impl Validate for Widget {
        fn validate(&self) -> std::result::Result<(), ValidationErrors> {
            let mut errors = ValidationErrors::new();
            if self.name.is_empty() {
                errors.add("name", validator::ValidationError::new("required"));
            }
            if errors.is_empty() {
                Ok(())
            } else {
                Err(errors)
            }
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct WidgetPartial {
        name: Option<String>,
    }

    impl Validate for WidgetPartial {
        fn validate(&self) -> std::result::Result<(), ValidationErrors> {
            Ok(())
        }
    }

    struct WidgetSpec;
    impl ModelSpec for WidgetSpec {
        type Full = Widget;
        type Partial = WidgetPartial;
        type Projected = Widget;
        const NAME: &'static str = "widget";
        const IS_AUDITABLE: bool = true;
        fn apply_partial(full: &mut Widget, partial: WidgetPartial) {
            if let Some(name) = partial.name {
                full.name = name;
            }
        }
        fn project(value: &Widget) -> Widget {
            value.clone()
        }
    }

    fn service() -> GenericService<WidgetSpec, MemoryStorage<WidgetSpec>> {
        let fixed = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        GenericService::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(FixedClock(fixed)),
            Arc::new(DocumentIdAllocator),
            Arc::new(NoopHooks::default()),
        )
    }

    fn ctx(actor: &str) -> UserContext {
        UserContext::authenticated(UserRef::new(Id::Relational(actor.parse().unwrap())), None)
    }

    #[tokio::test]
    async fn create_stamps_audit_and_allocates_id() {
        let svc = service();
        let created = svc.create(&ctx("1"), json!({ "name": "widget" })).await.unwrap();
        assert!(created.id.is_some());
        let audit = created.audit.unwrap();
        assert_eq!(audit.created, audit.updated);
        assert_eq!(audit.created_by, Id::Relational(1));
    }

    #[tokio::test]
    async fn create_ignores_client_supplied_audit_fields() {
        let svc = service();
        let created = svc
            .create(
                &ctx("1"),
                json!({ "name": "widget", "_createdBy": "hacker", "_created": "2000-01-01T00:00:00Z" }),
            )
            .await
            .unwrap();
        assert_eq!(created.audit.unwrap().created_by, Id::Relational(1));
    }

    #[tokio::test]
    async fn full_update_preserves_created_fields() {
        let svc = service();
        let created = svc.create(&ctx("1"), json!({ "name": "widget" })).await.unwrap();
        let id = created.id.clone().unwrap();
        let original_created = created.audit.as_ref().unwrap().created;

        let updated = svc
            .full_update_by_id(
                &ctx("2"),
                &id,
                json!({ "name": "widget-v2", "_createdBy": "hacker" }),
            )
            .await
            .unwrap();

        let audit = updated.audit.unwrap();
        assert_eq!(audit.created, original_created);
        assert_eq!(audit.created_by, Id::Relational(1));
        assert_eq!(audit.updated_by, Id::Relational(2));
        assert_eq!(updated.name, "widget-v2");
    }

    #[tokio::test]
    async fn partial_update_only_touches_supplied_fields() {
        let svc = service();
        let created = svc.create(&ctx("1"), json!({ "name": "widget" })).await.unwrap();
        let id = created.id.clone().unwrap();

        let updated = svc
            .partial_update_by_id(&ctx("1"), &id, json!({}))
            .await
            .unwrap();
        assert_eq!(updated.name, "widget");
    }

    #[tokio::test]
    async fn create_rejects_empty_name() {
        let svc = service();
        let err = svc.create(&ctx("1"), json!({ "name": "" })).await.unwrap_err();
        assert_eq!(err.kind(), svc_errors::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn batch_update_routes_each_patch_by_id() {
        let svc = service();
        let a = svc.create(&ctx("1"), json!({ "name": "a" })).await.unwrap();
        let b = svc.create(&ctx("1"), json!({ "name": "b" })).await.unwrap();

        let updated = svc
            .batch_update(
                &ctx("1"),
                vec![
                    json!({ "_id": a.id.clone().unwrap().to_string(), "name": "a2" }),
                    json!({ "_id": b.id.clone().unwrap().to_string(), "name": "b2" }),
                ],
            )
            .await
            .unwrap();
        let names: Vec<_> = updated.iter().map(|w| w.name.clone()).collect();
        assert!(names.contains(&"a2".to_string()));
        assert!(names.contains(&"b2".to_string()));
    }
}
