//! MongoDB-backed [`Storage`](crate::Storage) adapter. Joins are expressed
//! as aggregation stages ([`pipeline`]); everything else is a direct
//! `Collection` call.

pub mod pipeline;

use crate::ops::{DeleteResult, Operation};
use crate::storage::Storage;
use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::Collection;
use std::marker::PhantomData;
use svc_errors::{Result, ServiceError};
use svc_model::{Id, ModelSpec};
use svc_odata::{PagedResult, QueryOptions};

/// Mongo's duplicate-key error code, raised on a unique-index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

fn map_mongo_error(err: mongodb::error::Error) -> ServiceError {
    if err.code() == Some(DUPLICATE_KEY_CODE) {
        ServiceError::DuplicateKey(err.to_string())
    } else {
        ServiceError::internal(err.to_string())
    }
}

fn id_filter(id: &Id) -> Document {
    doc! { "_id": id.to_string() }
}

pub struct DocumentStorage<M: ModelSpec> {
    collection: Collection<M::Full>,
    raw: Collection<Document>,
    _marker: PhantomData<M>,
}

impl<M: ModelSpec> DocumentStorage<M> {
    #[must_use]
    pub fn new(collection: Collection<M::Full>) -> Self {
        let raw = collection.clone_with_type::<Document>();
        Self {
            collection,
            raw,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<M: ModelSpec> Storage<M> for DocumentStorage<M> {
    async fn get_all(&self) -> Result<Vec<M::Full>> {
        let cursor = self
            .collection
            .find(doc! {})
            .await
            .map_err(map_mongo_error)?;
        cursor.try_collect().await.map_err(map_mongo_error)
    }

    async fn get(
        &self,
        ops: &[Operation],
        query: &QueryOptions,
    ) -> Result<PagedResult<M::Full>> {
        let stages = pipeline::read_pipeline(ops, query);
        let mut cursor = self
            .raw
            .aggregate(stages)
            .await
            .map_err(map_mongo_error)?;
        let facet = cursor
            .try_next()
            .await
            .map_err(map_mongo_error)?
            .unwrap_or_default();

        let total = facet
            .get_array("total")
            .ok()
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_document())
            .and_then(|d| d.get_i32("count").ok().map(i64::from).or_else(|| d.get_i64("count").ok()))
            .unwrap_or(0) as u64;

        let entities = facet
            .get_array("results")
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_document())
                    .filter_map(|d| bson::from_document::<M::Full>(d.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let page = query.page.unwrap_or(1).max(1);
        Ok(PagedResult::new(entities, total, page, query.page_size))
    }

    async fn get_by_id(&self, ops: &[Operation], id: &Id) -> Result<M::Full> {
        if ops.is_empty() {
            return self
                .collection
                .find_one(id_filter(id))
                .await
                .map_err(map_mongo_error)?
                .ok_or(ServiceError::NotFound);
        }

        let mut stages = pipeline::join_stages(ops);
        stages.push(doc! { "$match": id_filter(id) });
        stages.push(doc! { "$limit": 1 });
        let mut cursor = self.raw.aggregate(stages).await.map_err(map_mongo_error)?;
        let document = cursor
            .try_next()
            .await
            .map_err(map_mongo_error)?
            .ok_or(ServiceError::NotFound)?;
        bson::from_document(document)
            .map_err(|e| ServiceError::internal(format!("document decode failed: {e}")))
    }

    async fn get_count(&self, ops: &[Operation], query: &QueryOptions) -> Result<u64> {
        if ops.is_empty() {
            let filter = pipeline::filters_to_match(query).unwrap_or_default();
            return self
                .collection
                .count_documents(filter)
                .await
                .map_err(map_mongo_error);
        }

        let mut stages = pipeline::join_stages(ops);
        if let Some(m) = pipeline::filters_to_match(query) {
            stages.push(doc! { "$match": m });
        }
        stages.push(doc! { "$count": "count" });
        let mut cursor = self.raw.aggregate(stages).await.map_err(map_mongo_error)?;
        let count = cursor
            .try_next()
            .await
            .map_err(map_mongo_error)?
            .and_then(|d| d.get_i32("count").ok().map(i64::from).or_else(|| d.get_i64("count").ok()))
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn create(&self, entity: M::Full) -> Result<M::Full> {
        self.collection
            .insert_one(&entity)
            .await
            .map_err(map_mongo_error)?;
        Ok(entity)
    }

    async fn create_many(&self, entities: Vec<M::Full>) -> Result<Vec<M::Full>> {
        if entities.is_empty() {
            return Ok(entities);
        }
        self.collection
            .insert_many(&entities)
            .await
            .map_err(map_mongo_error)?;
        Ok(entities)
    }

    async fn batch_update(&self, updates: Vec<(Id, M::Full)>) -> Result<Vec<M::Full>> {
        let mut out = Vec::with_capacity(updates.len());
        for (id, replacement) in updates {
            out.push(self.full_update_by_id(&id, replacement).await?);
        }
        Ok(out)
    }

    async fn full_update_by_id(&self, id: &Id, entity: M::Full) -> Result<M::Full> {
        let result = self
            .collection
            .replace_one(id_filter(id), &entity)
            .await
            .map_err(map_mongo_error)?;
        if result.matched_count == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(entity)
    }

    async fn partial_update_by_id(&self, id: &Id, entity: M::Full) -> Result<M::Full> {
        self.full_update_by_id(id, entity).await
    }

    async fn delete_by_id(&self, id: &Id) -> Result<DeleteResult> {
        let result = self
            .collection
            .delete_one(id_filter(id))
            .await
            .map_err(map_mongo_error)?;
        if result.deleted_count == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(DeleteResult {
            acked: true,
            count: result.deleted_count,
        })
    }

    async fn delete_many(&self, query: &QueryOptions) -> Result<DeleteResult> {
        let filter = pipeline::filters_to_match(query).unwrap_or_default();
        let result = self
            .collection
            .delete_many(filter)
            .await
            .map_err(map_mongo_error)?;
        Ok(DeleteResult {
            acked: true,
            count: result.deleted_count,
        })
    }

    async fn find(&self, query: &QueryOptions) -> Result<Vec<M::Full>> {
        let filter = pipeline::filters_to_match(query).unwrap_or_default();
        let cursor = self
            .collection
            .find(filter)
            .await
            .map_err(map_mongo_error)?;
        cursor.try_collect().await.map_err(map_mongo_error)
    }

    async fn find_one(&self, query: &QueryOptions) -> Result<Option<M::Full>> {
        let filter = pipeline::filters_to_match(query).unwrap_or_default();
        self.collection
            .find_one(filter)
            .await
            .map_err(map_mongo_error)
    }
}
