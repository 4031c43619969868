//! The operation surface every resource's service exposes, uniform
//! regardless of storage backend or tenant mode. Every operation takes a
//! [`UserContext`] first — there is no way to call a service method
//! without an acting identity.
//!
//! `create`/`full_update_by_id`/`partial_update_by_id`/`batch_update`
//! accept `serde_json::Value` rather than `M::Full`/`M::Partial`
//! directly: the wire body is untyped JSON until the preprocess pipeline
//! has stripped tampering fields and stamped audit fields onto it, which
//! must happen *before* it is decoded into a schema-validated Rust type.
//! `ModelSpec::decode` is exactly this last step.

use crate::user_context::UserContext;
use async_trait::async_trait;
use serde_json::Value;
use svc_errors::Result;
use svc_model::{Id, ModelSpec};
use svc_odata::{PagedResult, QueryOptions};
use svc_storage::{DeleteResult, Operation};

#[async_trait]
pub trait Service<M: ModelSpec>: Send + Sync {
    /// Unpaginated read of every row in scope. Intended for bounded sets.
    async fn get_all(&self, ctx: &UserContext) -> Result<Vec<M::Full>>;

    /// Filtered, sorted, paginated read with declarative joins.
    async fn get(
        &self,
        ctx: &UserContext,
        ops: &[Operation],
        query: &QueryOptions,
    ) -> Result<PagedResult<M::Full>>;

    /// Applies `ops`'s joins the same way [`Service::get`] does, so a
    /// single-resource fetch of a joined resource sees the same fields its
    /// list endpoint does.
    async fn get_by_id(&self, ctx: &UserContext, ops: &[Operation], id: &Id) -> Result<M::Full>;

    async fn get_count(&self, ctx: &UserContext, ops: &[Operation], query: &QueryOptions) -> Result<u64>;

    /// Validates the full schema — the body need not carry identity or
    /// audit fields; the pipeline supplies those.
    async fn create(&self, ctx: &UserContext, input: Value) -> Result<M::Full>;

    /// All-or-nothing: the first duplicate-key failure aborts the whole
    /// batch and nothing is persisted.
    async fn create_many(&self, ctx: &UserContext, inputs: Vec<Value>) -> Result<Vec<M::Full>>;

    /// Each element must carry `_id`; partial-validates each, applies a
    /// single set per id in one storage round trip.
    async fn batch_update(&self, ctx: &UserContext, updates: Vec<Value>) -> Result<Vec<M::Full>>;

    /// Full validation; preserves `_created`/`_createdBy` from the
    /// existing row regardless of what the body supplies.
    async fn full_update_by_id(&self, ctx: &UserContext, id: &Id, input: Value) -> Result<M::Full>;

    /// Partial validation; only fields present in the body are applied.
    async fn partial_update_by_id(&self, ctx: &UserContext, id: &Id, input: Value) -> Result<M::Full>;

    async fn delete_by_id(&self, ctx: &UserContext, id: &Id) -> Result<DeleteResult>;

    async fn delete_many(&self, ctx: &UserContext, query: &QueryOptions) -> Result<DeleteResult>;

    async fn find(&self, ctx: &UserContext, query: &QueryOptions) -> Result<Vec<M::Full>>;

    async fn find_one(&self, ctx: &UserContext, query: &QueryOptions) -> Result<Option<M::Full>>;
}
