//! In-memory `Storage` fake used to exercise `svc-core`'s pipeline
//! orchestration (preprocess/postprocess/hooks/tenant scoping) without a
//! live database — the storage-layer analogue of the teacher framework's
//! in-process fakes for its own unit tests.

use crate::ops::{DeleteResult, Operation};
use crate::storage::Storage;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use svc_errors::{Result, ServiceError};
use svc_model::{Entity, Id, ModelSpec};
use svc_odata::{PagedResult, Predicate, QueryOptions};

/// A naive, fully in-memory store: linear scan for reads, `Vec` for
/// storage. Never use outside tests.
///
/// `join_sources` lets a test register the rows a `LeftJoin`/`InnerJoin`/
/// `LeftJoinMany` resolves against (via [`MemoryStorage::seed_join_source`]),
/// so `get`/`get_by_id` can exercise the same `ops`-driven join behavior the
/// relational and document adapters implement against a real backend.
pub struct MemoryStorage<M: ModelSpec> {
    rows: Mutex<Vec<M::Full>>,
    join_sources: Mutex<HashMap<&'static str, Vec<Value>>>,
}

impl<M: ModelSpec> Default for MemoryStorage<M> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            join_sources: Mutex::new(HashMap::new()),
        }
    }
}

impl<M: ModelSpec> MemoryStorage<M> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the rows a join naming `name` as its `JoinSource` should
    /// resolve against. Test-only — real adapters join against their own
    /// backend instead of an in-process registry.
    pub fn seed_join_source(&self, name: &'static str, rows: Vec<Value>) {
        self.join_sources.lock().unwrap().insert(name, rows);
    }

    fn matches_filters(entity: &M::Full, query: &QueryOptions) -> bool {
        let Ok(json) = serde_json::to_value(entity) else {
            return false;
        };
        query.filters.iter().all(|(field, predicate)| {
            let value = json.get(field);
            predicate.matches(value)
        })
    }

    fn sort_key(entity: &M::Full, field: &str) -> Option<Value> {
        serde_json::to_value(entity)
            .ok()
            .and_then(|v| v.get(field).cloned())
    }

    fn decode(value: Value) -> Result<M::Full> {
        serde_json::from_value(value)
            .map_err(|e| ServiceError::internal(format!("joined entity decode failed: {e}")))
    }

    /// Merge each `op`'s matching rows onto `entity` under its alias,
    /// mirroring what a real backend's `JOIN`/`$lookup` would produce:
    /// a single object for `LeftJoin`/`InnerJoin`, an array for
    /// `LeftJoinMany`, `null`/`[]` when nothing in the registered source
    /// matches.
    fn apply_joins(&self, entity: &M::Full, ops: &[Operation]) -> Result<M::Full> {
        if ops.is_empty() {
            return Ok(entity.clone());
        }
        let mut json = serde_json::to_value(entity)
            .map_err(|e| ServiceError::internal(format!("entity encode failed: {e}")))?;
        let sources = self.join_sources.lock().unwrap();
        if let Value::Object(map) = &mut json {
            for op in ops {
                let from = op.from();
                let local = map.get(op.local_field()).cloned();
                let empty = Vec::new();
                let matches: Vec<Value> = sources
                    .get(from.name)
                    .unwrap_or(&empty)
                    .iter()
                    .filter(|row| row.get(op.foreign_field()) == local.as_ref())
                    .cloned()
                    .collect();
                let merged = if op.is_many() {
                    Value::Array(matches)
                } else {
                    matches.into_iter().next().unwrap_or(Value::Null)
                };
                map.insert(op.alias().to_string(), merged);
            }
        }
        Self::decode(json)
    }
}

#[async_trait]
impl<M: ModelSpec> Storage<M> for MemoryStorage<M> {
    async fn get_all(&self) -> Result<Vec<M::Full>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn get(&self, ops: &[Operation], query: &QueryOptions) -> Result<PagedResult<M::Full>> {
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<M::Full> = rows
            .iter()
            .filter(|e| Self::matches_filters(e, query))
            .cloned()
            .collect();
        drop(rows);

        if let Some(field) = &query.order_by {
            matched.sort_by(|a, b| {
                let ka = Self::sort_key(a, field);
                let kb = Self::sort_key(b, field);
                let ord = ka
                    .as_ref()
                    .and_then(|x| x.as_str())
                    .zip(kb.as_ref().and_then(|x| x.as_str()))
                    .map(|(x, y)| x.cmp(y))
                    .unwrap_or(std::cmp::Ordering::Equal);
                match query.sort_direction {
                    svc_odata::SortDirection::Asc => ord,
                    svc_odata::SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let total = matched.len() as u64;
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query.page_size;
        let page_rows: Vec<M::Full> = if let Some(size) = page_size {
            let (limit, offset) = query.limit_offset().unwrap_or((size, 0));
            matched
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect()
        } else {
            matched
        };
        let entities = page_rows
            .iter()
            .map(|e| self.apply_joins(e, ops))
            .collect::<Result<Vec<_>>>()?;

        Ok(PagedResult::new(entities, total, page, page_size))
    }

    async fn get_by_id(&self, ops: &[Operation], id: &Id) -> Result<M::Full> {
        let found = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id() == Some(id))
            .cloned()
            .ok_or(ServiceError::NotFound)?;
        self.apply_joins(&found, ops)
    }

    async fn get_count(&self, _ops: &[Operation], query: &QueryOptions) -> Result<u64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|e| Self::matches_filters(e, query))
            .count() as u64)
    }

    async fn create(&self, entity: M::Full) -> Result<M::Full> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(id) = entity.id() {
            if rows.iter().any(|e| e.id() == Some(id)) {
                return Err(ServiceError::DuplicateKey(id.to_string()));
            }
        }
        rows.push(entity.clone());
        Ok(entity)
    }

    async fn create_many(&self, entities: Vec<M::Full>) -> Result<Vec<M::Full>> {
        let mut rows = self.rows.lock().unwrap();
        for entity in &entities {
            if let Some(id) = entity.id() {
                if rows.iter().any(|e| e.id() == Some(id)) {
                    return Err(ServiceError::DuplicateKey(id.to_string()));
                }
            }
        }
        rows.extend(entities.iter().cloned());
        Ok(entities)
    }

    async fn batch_update(&self, updates: Vec<(Id, M::Full)>) -> Result<Vec<M::Full>> {
        let mut rows = self.rows.lock().unwrap();
        let mut out = Vec::with_capacity(updates.len());
        for (id, replacement) in updates {
            let slot = rows
                .iter_mut()
                .find(|e| e.id() == Some(&id))
                .ok_or(ServiceError::NotFound)?;
            *slot = replacement.clone();
            out.push(replacement);
        }
        Ok(out)
    }

    async fn full_update_by_id(&self, id: &Id, entity: M::Full) -> Result<M::Full> {
        let mut rows = self.rows.lock().unwrap();
        let slot = rows
            .iter_mut()
            .find(|e| e.id() == Some(id))
            .ok_or(ServiceError::NotFound)?;
        *slot = entity.clone();
        Ok(entity)
    }

    async fn partial_update_by_id(&self, id: &Id, entity: M::Full) -> Result<M::Full> {
        self.full_update_by_id(id, entity).await
    }

    async fn delete_by_id(&self, id: &Id) -> Result<DeleteResult> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| e.id() != Some(id));
        let count = (before - rows.len()) as u64;
        if count == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(DeleteResult {
            acked: true,
            count,
        })
    }

    async fn delete_many(&self, query: &QueryOptions) -> Result<DeleteResult> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| !Self::matches_filters(e, query));
        let count = (before - rows.len()) as u64;
        Ok(DeleteResult {
            acked: true,
            count,
        })
    }

    async fn find(&self, query: &QueryOptions) -> Result<Vec<M::Full>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|e| Self::matches_filters(e, query))
            .cloned()
            .collect())
    }

    async fn find_one(&self, query: &QueryOptions) -> Result<Option<M::Full>> {
        Ok(self.find(query).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use svc_model::{AuditFields, Entity};
    use validator::{Validate, ValidationErrors};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Item {
        #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
        id: Option<Id>,
        #[serde(rename = "_orgId", skip_serializing_if = "Option::is_none")]
        org_id: Option<String>,
        name: String,
        #[serde(flatten, skip_serializing_if = "Option::is_none")]
        audit: Option<AuditFields>,
    }

    impl Entity for Item {
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

    impl Validate for Item {
        fn validate(&self) -> std::result::Result<(), ValidationErrors> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct ItemPartial {
        name: Option<String>,
    }

    impl Validate for ItemPartial {
        fn validate(&self) -> std::result::Result<(), ValidationErrors> {
            Ok(())
        }
    }

    struct ItemSpec;
    impl ModelSpec for ItemSpec {
        type Full = Item;
        type Partial = ItemPartial;
        type Projected = Item;
        const NAME: &'static str = "item";
        const IS_AUDITABLE: bool = true;
        fn apply_partial(full: &mut Item, partial: ItemPartial) {
            if let Some(name) = partial.name {
                full.name = name;
            }
        }
        fn project(value: &Item) -> Item {
            value.clone()
        }
    }

    fn item(id: Id, name: &str) -> Item {
        Item {
            id: Some(id),
            org_id: None,
            name: name.to_string(),
            audit: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_by_id_round_trips() {
        let storage = MemoryStorage::<ItemSpec>::new();
        let id = Id::new_document();
        storage.create(item(id.clone(), "widget")).await.unwrap();
        let found = storage.get_by_id(&[], &id).await.unwrap();
        assert_eq!(found.name, "widget");
    }

    #[tokio::test]
    async fn duplicate_id_on_create_is_rejected() {
        let storage = MemoryStorage::<ItemSpec>::new();
        let id = Id::new_document();
        storage.create(item(id.clone(), "a")).await.unwrap();
        let err = storage.create(item(id, "b")).await.unwrap_err();
        assert_eq!(err.kind(), svc_errors::ErrorKind::DuplicateKey);
    }

    #[tokio::test]
    async fn delete_by_id_not_found_when_absent() {
        let storage = MemoryStorage::<ItemSpec>::new();
        let err = storage.delete_by_id(&Id::new_document()).await.unwrap_err();
        assert_eq!(err.kind(), svc_errors::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn pagination_limits_page_and_reports_total() {
        let storage = MemoryStorage::<ItemSpec>::new();
        for i in 0..5 {
            storage
                .create(item(Id::new_document(), &format!("item-{i}")))
                .await
                .unwrap();
        }
        let opts = QueryOptions::new().with_page(1, 2);
        let page = storage.get(&[], &opts).await.unwrap();
        assert_eq!(page.entities.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn contains_filter_matches_case_insensitively() {
        let storage = MemoryStorage::<ItemSpec>::new();
        storage
            .create(item(Id::new_document(), "Red Widget"))
            .await
            .unwrap();
        storage
            .create(item(Id::new_document(), "Blue Gadget"))
            .await
            .unwrap();
        let opts = QueryOptions::new().with_filter("name", Predicate::Contains("widget".into()));
        let found = storage.find(&opts).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Red Widget");
    }
}
