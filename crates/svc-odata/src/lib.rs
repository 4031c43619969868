//! The query DSL shared by every `Storage` adapter: filters, sort, paging,
//! and the paged-result envelope they produce.
//!
//! Deliberately smaller than a general OData implementation — it covers
//! exactly the predicate set and paging semantics `Storage::get` needs, the
//! way a purpose-built query options type would, not a full query language.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Sort direction for `QueryOptions::order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Asc
    }
}

/// A single-field comparison. `Contains` is always a case-insensitive
/// substring match, never a full regex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "lowercase")]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Contains(String),
}

impl Predicate {
    /// Evaluate this predicate against a scalar field value. Used by the
    /// in-memory storage fake and by adapters that need a reference
    /// implementation to test their own translation against.
    #[must_use]
    pub fn matches(&self, field_value: Option<&Value>) -> bool {
        match self {
            Predicate::Eq(v) => field_value == Some(v),
            Predicate::Ne(v) => field_value != Some(v),
            Predicate::In(vs) => field_value.is_some_and(|fv| vs.contains(fv)),
            Predicate::Gt(v) => compare(field_value, v).is_some_and(|o| o.is_gt()),
            Predicate::Gte(v) => compare(field_value, v).is_some_and(|o| !o.is_lt()),
            Predicate::Lt(v) => compare(field_value, v).is_some_and(|o| o.is_lt()),
            Predicate::Lte(v) => compare(field_value, v).is_some_and(|o| !o.is_gt()),
            Predicate::Contains(needle) => field_value
                .and_then(Value::as_str)
                .is_some_and(|hay| hay.to_lowercase().contains(&needle.to_lowercase())),
        }
    }
}

fn compare(field_value: Option<&Value>, rhs: &Value) -> Option<std::cmp::Ordering> {
    let lhs = field_value?;
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Options accepted by `Storage::get`/`find`/`deleteMany`.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filters: BTreeMap<String, Predicate>,
    pub order_by: Option<String>,
    pub sort_direction: SortDirection,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, predicate: Predicate) -> Self {
        self.filters.insert(field.into(), predicate);
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, field: impl Into<String>, dir: SortDirection) -> Self {
        self.order_by = Some(field.into());
        self.sort_direction = dir;
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: u64, page_size: u64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Pagination is disabled when `page_size` is absent, per the data
    /// model contract.
    #[must_use]
    pub fn is_paginated(&self) -> bool {
        self.page_size.is_some()
    }

    #[must_use]
    pub fn limit_offset(&self) -> Option<(u64, u64)> {
        let page_size = self.page_size?;
        let page = self.page.unwrap_or(1).max(1);
        Some((page_size, (page - 1) * page_size))
    }
}

/// A page of entities plus pagination bookkeeping. `total_pages` is always
/// `ceil(total / page_size)`; when pagination is disabled, `total` equals
/// `entities.len()` and `total_pages` is `1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub entities: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: Option<u64>,
    pub total_pages: u64,
}

impl<T> PagedResult<T> {
    #[must_use]
    pub fn new(entities: Vec<T>, total: u64, page: u64, page_size: Option<u64>) -> Self {
        let total_pages = match page_size {
            Some(size) if size > 0 => total.div_ceil(size),
            _ => 1,
        };
        Self {
            entities,
            total,
            page,
            page_size,
            total_pages,
        }
    }

    /// Build a result for the unpaginated case: `total == entities.len()`.
    #[must_use]
    pub fn unpaginated(entities: Vec<T>) -> Self {
        let total = entities.len() as u64;
        Self {
            entities,
            total,
            page: 1,
            page_size: None,
            total_pages: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contains_is_case_insensitive_substring() {
        let p = Predicate::Contains("wId".into());
        assert!(p.matches(Some(&json!("Widget"))));
        assert!(!p.matches(Some(&json!("Gadget"))));
    }

    #[test]
    fn total_pages_is_ceil_division() {
        let r: PagedResult<()> = PagedResult::new(vec![], 11, 1, Some(5));
        assert_eq!(r.total_pages, 3);
    }

    #[test]
    fn unpaginated_total_equals_entity_count() {
        let r = PagedResult::unpaginated(vec![1, 2, 3]);
        assert_eq!(r.total, 3);
        assert_eq!(r.total_pages, 1);
        assert!(r.page_size.is_none());
    }

    #[test]
    fn limit_offset_defaults_page_to_one() {
        let opts = QueryOptions::new().with_page(1, 20);
        assert_eq!(opts.limit_offset(), Some((20, 0)));
        let opts3 = QueryOptions::new().with_page(3, 20);
        assert_eq!(opts3.limit_offset(), Some((20, 40)));
    }
}
