//! The backend-agnostic `Storage` contract every adapter implements.

use crate::ops::{DeleteResult, Operation};
use async_trait::async_trait;
use svc_errors::Result;
use svc_model::{Id, ModelSpec};
use svc_odata::{PagedResult, QueryOptions};

/// Uniform CRUD + filtered/paginated read + declarative joins, the same
/// surface regardless of which concrete adapter backs it.
///
/// There is no standalone `update` method, nor `preprocessEntity`/
/// `postprocessEntity` hooks: every write path already goes through
/// exactly one of `full_update_by_id`/`partial_update_by_id`/`batch_update`,
/// and the pre/post processing they'd otherwise wrap (audit stamping, id
/// allocation, validation) is owned by the service pipeline
/// (`svc_core::GenericService`) rather than the storage layer, so adding
/// hook points here would give adapters two different places to apply the
/// same transform. See `DESIGN.md` for the full rationale.
#[async_trait]
pub trait Storage<M: ModelSpec>: Send + Sync {
    async fn get_all(&self) -> Result<Vec<M::Full>>;

    async fn get(
        &self,
        ops: &[Operation],
        query: &QueryOptions,
    ) -> Result<PagedResult<M::Full>>;

    async fn get_by_id(&self, ops: &[Operation], id: &Id) -> Result<M::Full>;

    async fn get_count(&self, ops: &[Operation], query: &QueryOptions) -> Result<u64>;

    async fn create(&self, entity: M::Full) -> Result<M::Full>;

    /// All-or-nothing: the first duplicate-key failure aborts the whole
    /// batch and nothing is persisted.
    async fn create_many(&self, entities: Vec<M::Full>) -> Result<Vec<M::Full>>;

    /// Apply one partial update per `(id, patch)` pair in a single storage
    /// round trip.
    async fn batch_update(&self, updates: Vec<(Id, M::Full)>) -> Result<Vec<M::Full>>;

    async fn full_update_by_id(&self, id: &Id, entity: M::Full) -> Result<M::Full>;

    async fn partial_update_by_id(&self, id: &Id, entity: M::Full) -> Result<M::Full>;

    async fn delete_by_id(&self, id: &Id) -> Result<DeleteResult>;

    async fn delete_many(&self, query: &QueryOptions) -> Result<DeleteResult>;

    async fn find(&self, query: &QueryOptions) -> Result<Vec<M::Full>>;

    async fn find_one(&self, query: &QueryOptions) -> Result<Option<M::Full>>;
}
