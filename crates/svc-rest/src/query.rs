//! Translate flat querystring pairs into a [`QueryOptions`]. Recognized
//! keys: `orderBy`, `sortDirection` (`asc`|`desc`, default `asc`), `page`,
//! `pageSize`, and any `filter[<field>]=<op>:<value>` pair.

use serde_json::Value;
use std::collections::HashMap;
use svc_errors::ServiceError;
use svc_odata::{Predicate, QueryOptions, SortDirection};

pub fn parse_query_options(params: &HashMap<String, String>) -> Result<QueryOptions, ServiceError> {
    let mut opts = QueryOptions::new();

    if let Some(order_by) = params.get("orderBy") {
        let dir = match params.get("sortDirection").map(String::as_str) {
            Some("desc") => SortDirection::Desc,
            Some("asc") | None => SortDirection::Asc,
            Some(other) => {
                return Err(ServiceError::bad_request(format!(
                    "sortDirection must be 'asc' or 'desc', got '{other}'"
                )))
            }
        };
        opts = opts.with_order_by(order_by.clone(), dir);
    }

    let page = params
        .get("page")
        .map(|raw| parse_positive(raw, "page"))
        .transpose()?;
    let page_size = params
        .get("pageSize")
        .map(|raw| parse_positive(raw, "pageSize"))
        .transpose()?;
    if page.is_some() || page_size.is_some() {
        opts = opts.with_page(page.unwrap_or(1), page_size.unwrap_or(20));
    }

    for (key, value) in params {
        let Some(field) = key.strip_prefix("filter[").and_then(|s| s.strip_suffix(']')) else {
            continue;
        };
        opts = opts.with_filter(field, parse_predicate(value)?);
    }

    Ok(opts)
}

fn parse_positive(raw: &str, field: &str) -> Result<u64, ServiceError> {
    raw.parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ServiceError::bad_request(format!("{field} must be a positive integer")))
}

fn parse_predicate(raw: &str) -> Result<Predicate, ServiceError> {
    let (op, value) = raw
        .split_once(':')
        .ok_or_else(|| ServiceError::bad_request(format!("malformed filter value: {raw}")))?;
    let predicate = match op {
        "eq" => Predicate::Eq(scalar(value)),
        "ne" => Predicate::Ne(scalar(value)),
        "gt" => Predicate::Gt(scalar(value)),
        "gte" => Predicate::Gte(scalar(value)),
        "lt" => Predicate::Lt(scalar(value)),
        "lte" => Predicate::Lte(scalar(value)),
        "contains" => Predicate::Contains(value.to_string()),
        "in" => Predicate::In(value.split(',').map(scalar).collect()),
        other => {
            return Err(ServiceError::bad_request(format!(
                "unknown filter operator: {other}"
            )))
        }
    };
    Ok(predicate)
}

fn scalar(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        Value::from(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::from(f)
    } else if raw == "true" || raw == "false" {
        Value::from(raw == "true")
    } else {
        Value::from(raw)
    }
}
