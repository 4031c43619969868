//! Folds a `sqlx::postgres::PgRow` produced by
//! [`join_planner`](crate::relational::join_planner) back into the JSON
//! shape [`ModelSpec::Full`](svc_model::ModelSpec::Full) expects: own
//! columns at the top level, `LeftJoin`/`InnerJoin` columns nested under
//! their alias, `LeftJoinMany` columns already a JSON array under their
//! alias.

use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};
use std::collections::HashMap;

fn column_to_json(row: &PgRow, index: usize) -> Value {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();
    match type_name {
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|f| Value::from(f as f64))
            .unwrap_or(Value::Null),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" | "TIMESTAMP" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|dt| Value::from(dt.to_rfc3339()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(index)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
    }
}

fn snake_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for ch in s.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// A column's SQL name, translated to its JSON key. `_id`, `_orgId`,
/// `_createdBy` and the rest of the identity/audit columns pass through
/// verbatim (the relational schema stores them under their wire name,
/// underscore and all); every other column round-trips snake_case→camelCase.
fn json_key_for(db_column: &str) -> String {
    if db_column.starts_with('_') {
        db_column.to_string()
    } else {
        snake_to_camel(db_column)
    }
}

fn camel_to_snake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for ch in s.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Inverse of [`json_key_for`], used both for `INSERT`/`UPDATE` column
/// names and for translating `QueryOptions` filter/order-by field names
/// into SQL identifiers.
#[must_use]
pub fn sql_column_for(json_key: &str) -> String {
    if json_key.starts_with('_') {
        json_key.to_string()
    } else {
        camel_to_snake(json_key)
    }
}

/// Convert a full row into a JSON object, re-nesting aliased join columns.
///
/// A column named `orders__total` lands at `result["orders"]["total"]`.
/// A column whose name matches a `LeftJoinMany` alias directly (its value
/// is already a JSON array produced by `jsonb_agg`) is copied verbatim.
#[must_use]
pub fn row_to_json(row: &PgRow) -> Value {
    let mut own = Map::new();
    let mut nested: HashMap<String, Map<String, Value>> = HashMap::new();

    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let value = column_to_json(row, index);
        if let Some((alias, field)) = name.split_once("__") {
            nested
                .entry(alias.to_string())
                .or_default()
                .insert(json_key_for(field), value);
        } else {
            own.insert(json_key_for(name), value);
        }
    }

    for (alias, fields) in nested {
        let has_any_non_null = fields.values().any(|v| !v.is_null());
        let joined = if has_any_non_null {
            Value::Object(fields)
        } else {
            Value::Null
        };
        own.insert(alias, joined);
    }

    Value::Object(own)
}
