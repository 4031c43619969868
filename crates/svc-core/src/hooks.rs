//! Pre/post hook seam. Resources customize service behavior through
//! composition here — tenant scoping, password lowercasing, cascading
//! deletes — rather than subclassing `GenericService`.
//!
//! Hooks run once per high-level operation, not once per entity in a
//! batch: `before_create`/`after_create` and their update counterparts
//! receive the whole batch and return the (possibly modified) whole
//! batch. They see already-preprocessed input — stripped of tampering
//! fields, audit-stamped, decoded — and may transform it further before
//! it reaches storage.

use crate::user_context::UserContext;
use async_trait::async_trait;
use std::marker::PhantomData;
use svc_errors::Result;
use svc_model::{Id, ModelSpec};
use svc_storage::DeleteResult;

#[async_trait]
pub trait Hooks<M: ModelSpec>: Send + Sync {
    async fn before_create(&self, _ctx: &UserContext, entities: Vec<M::Full>) -> Result<Vec<M::Full>> {
        Ok(entities)
    }

    async fn after_create(&self, _ctx: &UserContext, entities: Vec<M::Full>) -> Result<Vec<M::Full>> {
        Ok(entities)
    }

    async fn before_update(&self, _ctx: &UserContext, entities: Vec<M::Full>) -> Result<Vec<M::Full>> {
        Ok(entities)
    }

    async fn after_update(&self, _ctx: &UserContext, entities: Vec<M::Full>) -> Result<Vec<M::Full>> {
        Ok(entities)
    }

    async fn before_delete(&self, _ctx: &UserContext, ids: Vec<Id>) -> Result<Vec<Id>> {
        Ok(ids)
    }

    async fn after_delete(&self, _ctx: &UserContext, result: DeleteResult) -> Result<DeleteResult> {
        Ok(result)
    }
}

/// The default, no-op `Hooks` implementation — every resource that
/// doesn't need customization wires this in.
pub struct NoopHooks<M: ModelSpec>(PhantomData<M>);

impl<M: ModelSpec> Default for NoopHooks<M> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<M: ModelSpec> Hooks<M> for NoopHooks<M> {}
