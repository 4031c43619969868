//! Translates [`Operation`] joins and [`QueryOptions`] filters into a
//! MongoDB aggregation pipeline.

use crate::ops::Operation;
use bson::{doc, Bson, Document};
use svc_odata::{Predicate, QueryOptions, SortDirection};

/// One `$match` clause per filter, `$and`-ed together. `Contains` lowers to
/// a case-insensitive `$regex`; everything else maps directly onto its
/// Mongo query operator.
pub fn filters_to_match(query: &QueryOptions) -> Option<Document> {
    if query.filters.is_empty() {
        return None;
    }
    let mut clauses = Vec::with_capacity(query.filters.len());
    for (field, predicate) in &query.filters {
        clauses.push(doc! { field.as_str(): predicate_to_mongo(predicate) });
    }
    Some(doc! { "$and": clauses })
}

fn value_to_bson(value: &serde_json::Value) -> Bson {
    Bson::try_from(value.clone()).unwrap_or(Bson::Null)
}

fn predicate_to_mongo(predicate: &Predicate) -> Document {
    match predicate {
        Predicate::Eq(v) => doc! { "$eq": value_to_bson(v) },
        Predicate::Ne(v) => doc! { "$ne": value_to_bson(v) },
        Predicate::In(vs) => doc! { "$in": vs.iter().map(value_to_bson).collect::<Vec<_>>() },
        Predicate::Gt(v) => doc! { "$gt": value_to_bson(v) },
        Predicate::Gte(v) => doc! { "$gte": value_to_bson(v) },
        Predicate::Lt(v) => doc! { "$lt": value_to_bson(v) },
        Predicate::Lte(v) => doc! { "$lte": value_to_bson(v) },
        Predicate::Contains(needle) => {
            doc! { "$regex": needle, "$options": "i" }
        }
    }
}

/// One `$lookup` (+ `$unwind` for single-valued joins) stage per
/// [`Operation`], in declaration order. `InnerJoin` adds a follow-up
/// `$match` dropping rows left without a match.
pub fn join_stages(ops: &[Operation]) -> Vec<Document> {
    let mut stages = Vec::new();
    for op in ops {
        let from = op.from();
        stages.push(doc! {
            "$lookup": {
                "from": from.name,
                "localField": op.local_field(),
                "foreignField": op.foreign_field(),
                "as": op.alias(),
            }
        });
        if !op.is_many() {
            stages.push(doc! {
                "$unwind": {
                    "path": format!("${}", op.alias()),
                    "preserveNullAndEmptyArrays": !op.is_inner(),
                }
            });
        }
        if op.is_inner() {
            stages.push(doc! { "$match": { op.alias(): { "$ne": Bson::Null } } });
        }
    }
    stages
}

fn sort_stage(query: &QueryOptions) -> Option<Document> {
    let field = query.order_by.as_ref()?;
    let dir = match query.sort_direction {
        SortDirection::Asc => 1,
        SortDirection::Desc => -1,
    };
    Some(doc! { "$sort": { field.as_str(): dir } })
}

/// Build the full read pipeline: joins, filter, sort, then a `$facet`
/// splitting the matched set into a `total` count and the current page of
/// `results`. `$facet`'s two branches both run over the same filtered,
/// sorted input, so `total` always reflects the full match set regardless
/// of paging.
#[must_use]
pub fn read_pipeline(ops: &[Operation], query: &QueryOptions) -> Vec<Document> {
    let mut stages = join_stages(ops);
    if let Some(m) = filters_to_match(query) {
        stages.push(doc! { "$match": m });
    }
    if let Some(s) = sort_stage(query) {
        stages.push(s);
    }

    let mut data_stages = Vec::new();
    if let Some((limit, offset)) = query.limit_offset() {
        if offset > 0 {
            data_stages.push(doc! { "$skip": offset as i64 });
        }
        data_stages.push(doc! { "$limit": limit as i64 });
    }

    stages.push(doc! {
        "$facet": {
            "results": data_stages,
            "total": [ doc! { "$count": "count" } ],
        }
    });
    stages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::JoinSource;

    #[test]
    fn contains_predicate_lowers_to_case_insensitive_regex() {
        let opts = QueryOptions::new().with_filter("name", Predicate::Contains("widget".into()));
        let m = filters_to_match(&opts).unwrap();
        let and = m.get_array("$and").unwrap();
        assert_eq!(and.len(), 1);
    }

    #[test]
    fn left_join_preserves_unmatched_rows_inner_join_drops_them() {
        const ORDERS: JoinSource = JoinSource::new("orders", &["id", "customer_id"]);
        let left = Operation::LeftJoin {
            from: ORDERS,
            local_field: "_id",
            foreign_field: "customer_id",
            r#as: "orders",
        };
        let inner = Operation::InnerJoin {
            from: ORDERS,
            local_field: "_id",
            foreign_field: "customer_id",
            r#as: "orders",
        };
        let left_stages = join_stages(std::slice::from_ref(&left));
        let inner_stages = join_stages(std::slice::from_ref(&inner));
        assert_eq!(left_stages.len(), 2);
        assert_eq!(inner_stages.len(), 3);
    }

    #[test]
    fn many_join_skips_unwind() {
        const TAGS: JoinSource = JoinSource::new("tags", &["id"]);
        let many = Operation::LeftJoinMany {
            from: TAGS,
            local_field: "_id",
            foreign_field: "owner_id",
            r#as: "tags",
        };
        let stages = join_stages(std::slice::from_ref(&many));
        assert_eq!(stages.len(), 1);
    }
}
