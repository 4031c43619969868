//! Postgres-backed [`Storage`](crate::Storage) adapter: one compiled SQL
//! statement per call, built by [`join_planner`] and bound with
//! `sea-query-binder`.

pub mod join_planner;
pub mod row_transform;

use crate::ops::{DeleteResult, Operation};
use crate::storage::Storage;
use async_trait::async_trait;
use join_planner::json_to_sea_value;
use sea_query::{Alias, Expr, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use serde_json::Value;
use sqlx::PgPool;
use std::marker::PhantomData;
use svc_errors::{Result, ServiceError};
use svc_model::{Id, ModelSpec};
use svc_odata::{PagedResult, QueryOptions};

/// Postgres SQLSTATE for a unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Identifies the physical table a [`RelationalStorage`] reads and writes.
///
/// `id_column` is the literal SQL column name, underscore and all — the
/// identity field is never snake_cased (see
/// [`row_transform::sql_column_for`]), so this is almost always `"_id"`.
#[derive(Debug, Clone, Copy)]
pub struct RelationalTable {
    pub name: &'static str,
    pub id_column: &'static str,
}

fn map_sqlx_error(err: sqlx::Error) -> ServiceError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return ServiceError::DuplicateKey(db_err.message().to_string());
        }
    }
    ServiceError::internal(err.to_string())
}

fn id_to_sea_value(id: &Id) -> sea_query::Value {
    match id {
        Id::Relational(n) => sea_query::Value::BigInt(Some(*n)),
        Id::Document(s) => sea_query::Value::String(Some(Box::new(s.clone()))),
    }
}

pub struct RelationalStorage<M: ModelSpec> {
    pool: PgPool,
    table: RelationalTable,
    _marker: PhantomData<M>,
}

impl<M: ModelSpec> RelationalStorage<M> {
    #[must_use]
    pub fn new(pool: PgPool, table: RelationalTable) -> Self {
        Self {
            pool,
            table,
            _marker: PhantomData,
        }
    }

    fn decode(value: Value) -> Result<M::Full> {
        serde_json::from_value(value)
            .map_err(|e| ServiceError::internal(format!("row decode failed: {e}")))
    }

    fn object_fields(entity: &M::Full) -> Result<serde_json::Map<String, Value>> {
        match serde_json::to_value(entity) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(ServiceError::internal(
                "entity did not serialize to a JSON object",
            )),
        }
    }

    async fn row_by_id(&self, ops: &[Operation], id: &Id) -> Result<Option<M::Full>> {
        let (sql, values) =
            join_planner::build_select_by_id(&self.table, ops, id_to_sea_value(id));

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|r| Self::decode(row_transform::row_to_json(&r)))
            .transpose()
    }

    /// Build the `INSERT ... RETURNING *` statement for one entity. The
    /// identity column is omitted when its incoming value is null so the
    /// table's `SERIAL`/`IDENTITY` default assigns it.
    fn insert_stmt(&self, entity: &M::Full) -> Result<sea_query::InsertStatement> {
        let fields = Self::object_fields(entity)?;
        let mut stmt = Query::insert();
        stmt.into_table(Alias::new(self.table.name));
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (key, value) in &fields {
            let column = row_transform::sql_column_for(key);
            if column == self.table.id_column && value.is_null() {
                continue;
            }
            columns.push(Alias::new(column));
            values.push(Expr::value(json_to_sea_value(value)));
        }
        stmt.columns(columns);
        stmt.values_panic(values);
        stmt.returning_all();
        Ok(stmt)
    }
}

#[async_trait]
impl<M: ModelSpec> Storage<M> for RelationalStorage<M> {
    async fn get_all(&self) -> Result<Vec<M::Full>> {
        self.find(&QueryOptions::new()).await
    }

    async fn get(
        &self,
        ops: &[Operation],
        query: &QueryOptions,
    ) -> Result<PagedResult<M::Full>> {
        let (sql, values) = join_planner::build_select(&self.table, ops, query);
        let rows = sqlx::query_with(&sql, values)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let entities = rows
            .iter()
            .map(row_transform::row_to_json)
            .map(Self::decode)
            .collect::<Result<Vec<_>>>()?;

        let total = self.get_count(ops, query).await?;
        let page = query.page.unwrap_or(1).max(1);
        Ok(PagedResult::new(entities, total, page, query.page_size))
    }

    async fn get_by_id(&self, ops: &[Operation], id: &Id) -> Result<M::Full> {
        self.row_by_id(ops, id).await?.ok_or(ServiceError::NotFound)
    }

    async fn get_count(&self, ops: &[Operation], query: &QueryOptions) -> Result<u64> {
        let (sql, values) = join_planner::build_count(&self.table, ops, query);
        let row: (i64,) = sqlx::query_as_with(&sql, values)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.0 as u64)
    }

    async fn create(&self, entity: M::Full) -> Result<M::Full> {
        let stmt = self.insert_stmt(&entity)?;
        let (sql, bind_values) = stmt.build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(&sql, bind_values)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Self::decode(row_transform::row_to_json(&row))
    }

    async fn create_many(&self, entities: Vec<M::Full>) -> Result<Vec<M::Full>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut out = Vec::with_capacity(entities.len());
        for entity in &entities {
            let stmt = self.insert_stmt(entity)?;
            let (sql, bind_values) = stmt.build_sqlx(PostgresQueryBuilder);
            let row = sqlx::query_with(&sql, bind_values)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            out.push(Self::decode(row_transform::row_to_json(&row))?);
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(out)
    }

    async fn batch_update(&self, updates: Vec<(Id, M::Full)>) -> Result<Vec<M::Full>> {
        let mut out = Vec::with_capacity(updates.len());
        for (id, entity) in updates {
            out.push(self.full_update_by_id(&id, entity).await?);
        }
        Ok(out)
    }

    async fn full_update_by_id(&self, id: &Id, entity: M::Full) -> Result<M::Full> {
        let fields = Self::object_fields(&entity)?;
        let mut stmt = Query::update();
        stmt.table(Alias::new(self.table.name));
        for (key, value) in &fields {
            let column = row_transform::sql_column_for(key);
            if column == self.table.id_column {
                continue;
            }
            stmt.value(Alias::new(column), json_to_sea_value(value));
        }
        stmt.and_where(Expr::col(Alias::new(self.table.id_column)).eq(id_to_sea_value(id)));
        let (sql, values) = stmt.build_sqlx(PostgresQueryBuilder);
        let result = sqlx::query_with(&sql, values)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(entity)
    }

    async fn partial_update_by_id(&self, id: &Id, entity: M::Full) -> Result<M::Full> {
        self.full_update_by_id(id, entity).await
    }

    async fn delete_by_id(&self, id: &Id) -> Result<DeleteResult> {
        let (sql, values) = Query::delete()
            .from_table(Alias::new(self.table.name))
            .and_where(Expr::col(Alias::new(self.table.id_column)).eq(id_to_sea_value(id)))
            .build_sqlx(PostgresQueryBuilder);
        let result = sqlx::query_with(&sql, values)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(DeleteResult {
            acked: true,
            count: result.rows_affected(),
        })
    }

    async fn delete_many(&self, query: &QueryOptions) -> Result<DeleteResult> {
        let mut stmt = Query::delete();
        stmt.from_table(Alias::new(self.table.name));
        let mut cond = sea_query::Cond::all();
        for (field, predicate) in &query.filters {
            let col = Expr::col(Alias::new(row_transform::sql_column_for(field)));
            cond = cond.add(join_planner::apply_predicate(col, predicate));
        }
        stmt.cond_where(cond);
        let (sql, values) = stmt.build_sqlx(PostgresQueryBuilder);
        let result = sqlx::query_with(&sql, values)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(DeleteResult {
            acked: true,
            count: result.rows_affected(),
        })
    }

    async fn find(&self, query: &QueryOptions) -> Result<Vec<M::Full>> {
        Ok(self.get(&[], query).await?.entities)
    }

    async fn find_one(&self, query: &QueryOptions) -> Result<Option<M::Full>> {
        Ok(self.find(query).await?.into_iter().next())
    }
}
