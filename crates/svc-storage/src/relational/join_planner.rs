//! Compiles an [`Operation`] graph plus a [`QueryOptions`] into a single
//! SQL statement.
//!
//! One-to-one joins (`LeftJoin`/`InnerJoin`) become real SQL `JOIN`
//! clauses, with every joined column aliased `{as}__{column}` so
//! [`row_transform`](crate::relational::row_transform) can fold them back
//! into a nested object. `LeftJoinMany` cannot be expressed as a plain
//! join without duplicating the base row once per child, so it is
//! compiled into a correlated `jsonb_agg` subquery instead — one array
//! column per many-edge, independent of how many children exist.

use crate::ops::Operation;
use crate::relational::row_transform::sql_column_for;
use crate::relational::RelationalTable;
use sea_query::extension::postgres::PgExpr;
use sea_query::{Alias, Asterisk, Cond, Expr, JoinType, Order, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use svc_odata::{Predicate, QueryOptions, SortDirection};

const BASE: &str = "base";

fn predicate_cond(field: &str, predicate: &Predicate) -> sea_query::SimpleExpr {
    apply_predicate(
        Expr::col((Alias::new(BASE), Alias::new(sql_column_for(field)))),
        predicate,
    )
}

/// Lower one [`Predicate`] onto an already-built column reference. Shared
/// between the base-aliased queries here and the bare-column statements
/// (`UPDATE`/`DELETE`) in the parent module, which have no `base` alias.
pub(crate) fn apply_predicate(col: sea_query::Expr, predicate: &Predicate) -> sea_query::SimpleExpr {
    match predicate {
        Predicate::Eq(v) => col.eq(json_to_sea_value(v)),
        Predicate::Ne(v) => col.ne(json_to_sea_value(v)),
        Predicate::In(vs) => col.is_in(vs.iter().map(json_to_sea_value)),
        Predicate::Gt(v) => col.gt(json_to_sea_value(v)),
        Predicate::Gte(v) => col.gte(json_to_sea_value(v)),
        Predicate::Lt(v) => col.lt(json_to_sea_value(v)),
        Predicate::Lte(v) => col.lte(json_to_sea_value(v)),
        Predicate::Contains(needle) => col.ilike(format!("%{needle}%")),
    }
}

pub(crate) fn json_to_sea_value(v: &serde_json::Value) -> sea_query::Value {
    match v {
        serde_json::Value::String(s) => sea_query::Value::String(Some(Box::new(s.clone()))),
        serde_json::Value::Number(n) if n.is_i64() => {
            sea_query::Value::BigInt(n.as_i64())
        }
        serde_json::Value::Number(n) => sea_query::Value::Double(n.as_f64()),
        serde_json::Value::Bool(b) => sea_query::Value::Bool(Some(*b)),
        serde_json::Value::Null => sea_query::Value::String(None),
        other => sea_query::Value::String(Some(Box::new(other.to_string()))),
    }
}

/// Resolve the right-hand side of a `LeftJoinMany`'s correlation filter.
///
/// A bare `local_field` refers to the root table. `alias.field` referring
/// to an earlier one-to-one join is already present in the row as a plain
/// joined column. `alias.field` referring to an earlier `LeftJoinMany`
/// cannot be read from the row at all (it was never joined in) — the
/// chain is flattened into a nested `IN (SELECT ...)` that walks back
/// through each prior many-join to the root, one subquery per link.
fn local_ref(ops: &[Operation], idx: usize, depth: usize) -> String {
    let field = ops[idx].local_field();
    match field.split_once('.') {
        None => format!(r#""{BASE}"."{field}""#),
        Some((alias, sub_field)) => {
            let earlier_idx = ops[..idx]
                .iter()
                .position(|o| o.alias() == alias)
                .expect("chained local_field must reference an earlier join alias");
            let earlier = &ops[earlier_idx];
            if earlier.is_many() {
                let chain_alias = format!("_chain_{depth}");
                let inner = local_ref(ops, earlier_idx, depth + 1);
                let cmp = if inner.trim_start().starts_with('(') {
                    "IN"
                } else {
                    "="
                };
                format!(
                    r#"(SELECT "{chain_alias}"."{sub_field}" FROM "{table}" "{chain_alias}" WHERE "{chain_alias}"."{fk}" {cmp} {inner})"#,
                    table = earlier.from().name,
                    fk = earlier.foreign_field(),
                )
            } else {
                format!(r#""{alias}"."{sub_field}""#)
            }
        }
    }
}

fn many_join_subquery(ops: &[Operation], idx: usize) -> String {
    let op = &ops[idx];
    let from = op.from();
    let reference = local_ref(ops, idx, 0);
    let cmp = if reference.trim_start().starts_with('(') {
        "IN"
    } else {
        "="
    };
    format!(
        r#"(SELECT COALESCE(jsonb_agg(to_jsonb(t)), '[]'::jsonb) FROM "{table}" t WHERE t."{foreign}" {cmp} {reference}) AS "{alias}""#,
        table = from.name,
        foreign = op.foreign_field(),
        alias = op.alias(),
    )
}

/// Add the one-to-one `JOIN`s (`LeftJoin`/`InnerJoin`) from `ops` onto
/// `stmt`, aliased and correlated the same way [`build_select`] does, but
/// without projecting any joined columns — shared by `build_select` and
/// `build_count` so an `InnerJoin`'s row-filtering effect is reflected in
/// both. `LeftJoinMany`'s correlated subquery never changes the base row
/// count, so it is intentionally not added here.
fn apply_one_to_one_joins(stmt: &mut sea_query::SelectStatement, ops: &[Operation]) {
    for op in ops {
        if let Operation::LeftJoin { from, .. } | Operation::InnerJoin { from, .. } = op {
            let join_type = if op.is_inner() {
                JoinType::InnerJoin
            } else {
                JoinType::LeftJoin
            };
            let alias = Alias::new(op.alias());
            stmt.join_as(
                join_type,
                Alias::new(from.name),
                alias.clone(),
                Expr::col((alias, Alias::new(op.foreign_field())))
                    .equals((Alias::new(BASE), Alias::new(op.local_field()))),
            );
        }
    }
}

/// Add the per-join column projections (aliased foreign columns for
/// one-to-one joins, the correlated `jsonb_agg` expression for
/// `LeftJoinMany`) onto `stmt` — the part of [`build_select`] that doesn't
/// affect which rows match, so [`build_select_by_id`] can reuse it without
/// pulling in paging/ordering/filter handling meant for list queries.
fn project_join_columns(stmt: &mut sea_query::SelectStatement, ops: &[Operation]) {
    for (idx, op) in ops.iter().enumerate() {
        match op {
            Operation::LeftJoin { from, .. } | Operation::InnerJoin { from, .. } => {
                let alias = Alias::new(op.alias());
                for col in from.columns {
                    stmt.expr_as(
                        Expr::col((alias.clone(), Alias::new(*col))),
                        Alias::new(format!("{}__{}", op.alias(), col)),
                    );
                }
            }
            Operation::LeftJoinMany { .. } => {
                stmt.expr(Expr::cust(&many_join_subquery(ops, idx)));
            }
        }
    }
}

/// Build the final `SELECT ... LIMIT ... OFFSET ...` query plus its bound
/// parameters, ready for `sqlx::query_with`.
#[must_use]
pub fn build_select(
    table: &RelationalTable,
    ops: &[Operation],
    query: &QueryOptions,
) -> (String, sea_query_binder::SqlxValues) {
    let mut stmt = Query::select();
    stmt.from_as(Alias::new(table.name), Alias::new(BASE))
        .column((Alias::new(BASE), Asterisk));

    apply_one_to_one_joins(&mut stmt, ops);
    project_join_columns(&mut stmt, ops);

    let mut cond = Cond::all();
    for (field, predicate) in &query.filters {
        cond = cond.add(predicate_cond(field, predicate));
    }
    stmt.cond_where(cond);

    if let Some(field) = &query.order_by {
        let order = match query.sort_direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        stmt.order_by((Alias::new(BASE), Alias::new(sql_column_for(field))), order);
    }

    if let Some((limit, offset)) = query.limit_offset() {
        stmt.limit(limit).offset(offset);
    }

    stmt.build_sqlx(PostgresQueryBuilder)
}

/// Build a single-row `SELECT` over the same joins [`build_select`] would
/// apply, filtered down to one id instead of a [`QueryOptions`] — the
/// query [`RelationalStorage::get_by_id`](crate::relational::RelationalStorage::get_by_id)
/// runs so a joined resource's `GET /:id` populates the same fields its
/// list endpoint does.
#[must_use]
pub fn build_select_by_id(
    table: &RelationalTable,
    ops: &[Operation],
    id: sea_query::Value,
) -> (String, sea_query_binder::SqlxValues) {
    let mut stmt = Query::select();
    stmt.from_as(Alias::new(table.name), Alias::new(BASE))
        .column((Alias::new(BASE), Asterisk));

    apply_one_to_one_joins(&mut stmt, ops);
    project_join_columns(&mut stmt, ops);

    stmt.and_where(Expr::col((Alias::new(BASE), Alias::new(table.id_column))).eq(id));

    stmt.build_sqlx(PostgresQueryBuilder)
}

/// Build `SELECT count(*)` over the same joins and filters as
/// [`build_select`], ignoring paging and ordering. An `InnerJoin`'s
/// row-filtering effect must land in this count too, or
/// `PagedResult.total` disagrees with the joined page it's reporting on.
#[must_use]
pub fn build_count(
    table: &RelationalTable,
    ops: &[Operation],
    query: &QueryOptions,
) -> (String, sea_query_binder::SqlxValues) {
    let mut stmt = Query::select();
    stmt.from_as(Alias::new(table.name), Alias::new(BASE))
        .expr(Expr::col(Asterisk).count());

    apply_one_to_one_joins(&mut stmt, ops);

    let mut cond = Cond::all();
    for (field, predicate) in &query.filters {
        cond = cond.add(predicate_cond(field, predicate));
    }
    stmt.cond_where(cond);

    stmt.build_sqlx(PostgresQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::JoinSource;
    use svc_odata::QueryOptions;

    const CUSTOMERS: RelationalTable = RelationalTable {
        name: "customers",
        id_column: "_id",
    };

    #[test]
    fn plain_select_has_no_joins() {
        let (sql, _) = build_select(&CUSTOMERS, &[], &QueryOptions::new());
        assert!(sql.contains("FROM \"customers\""));
        assert!(!sql.to_uppercase().contains("JOIN"));
    }

    #[test]
    fn left_join_aliases_foreign_columns() {
        const ORDERS: JoinSource = JoinSource::new("orders", &["id", "total"]);
        let op = Operation::LeftJoin {
            from: ORDERS,
            local_field: "id",
            foreign_field: "customer_id",
            r#as: "orders",
        };
        let (sql, _) = build_select(&CUSTOMERS, &[op], &QueryOptions::new());
        assert!(sql.contains("LEFT JOIN"));
        assert!(sql.contains("orders__total") || sql.contains("orders__id"));
    }

    #[test]
    fn left_join_many_uses_correlated_jsonb_agg() {
        const TAGS: JoinSource = JoinSource::new("tags", &["id", "name"]);
        let op = Operation::LeftJoinMany {
            from: TAGS,
            local_field: "id",
            foreign_field: "owner_id",
            r#as: "tags",
        };
        let (sql, _) = build_select(&CUSTOMERS, &[op], &QueryOptions::new());
        assert!(sql.contains("jsonb_agg"));
        assert!(!sql.to_uppercase().contains("LEFT JOIN \"TAGS\""));
    }

    #[test]
    fn contains_filter_lowers_to_ilike() {
        let opts = QueryOptions::new().with_filter("name", Predicate::Contains("wid".into()));
        let (sql, _) = build_select(&CUSTOMERS, &[], &opts);
        assert!(sql.to_uppercase().contains("ILIKE"));
    }

    #[test]
    fn build_count_applies_inner_join_so_total_matches_filtered_rows() {
        const ORDERS: JoinSource = JoinSource::new("orders", &["id", "total"]);
        let op = Operation::InnerJoin {
            from: ORDERS,
            local_field: "id",
            foreign_field: "customer_id",
            r#as: "orders",
        };
        let (sql, _) = build_count(&CUSTOMERS, &[op], &QueryOptions::new());
        assert!(sql.to_uppercase().contains("INNER JOIN"));
        assert!(sql.to_uppercase().contains("COUNT"));
    }

    #[test]
    fn build_count_with_no_joins_has_no_join_clause() {
        let (sql, _) = build_count(&CUSTOMERS, &[], &QueryOptions::new());
        assert!(!sql.to_uppercase().contains("JOIN"));
    }

    #[test]
    fn build_select_by_id_filters_to_one_row_and_keeps_joins() {
        const ORDERS: JoinSource = JoinSource::new("orders", &["id", "total"]);
        let op = Operation::LeftJoin {
            from: ORDERS,
            local_field: "id",
            foreign_field: "customer_id",
            r#as: "orders",
        };
        let (sql, _) = build_select_by_id(&CUSTOMERS, &[op], sea_query::Value::BigInt(Some(1)));
        assert!(sql.contains("LEFT JOIN"));
        assert!(sql.contains("orders__total") || sql.contains("orders__id"));
        assert!(sql.to_uppercase().contains(&format!("\"BASE\".\"{}\"", CUSTOMERS.id_column).to_uppercase()));
    }
}
