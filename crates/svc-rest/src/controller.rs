//! Generic REST surface for one resource, per §4.5: nine routes wired
//! uniformly over any `ModelSpec` + `Service` pair. Path `:id` is
//! converted through the deployment's `IdSchema`; responses are the
//! entity's `Projected` shape wrapped in `{"data": ...}`.

use crate::auth::Authenticator;
use crate::envelope::{ApiError, ApiResponse};
use crate::query::parse_query_options;
use axum::extract::{Json, Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, patch};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use svc_core::Service;
use svc_errors::ServiceError;
use svc_model::{IdSchema, ModelSpec};
use svc_odata::PagedResult;
use svc_storage::{DeleteResult, Operation};

/// The fixed, per-resource configuration every handler closes over: which
/// service backs the resource, how to parse its path ids, which joins
/// `get` always applies, and how to authenticate the caller.
pub struct ResourceState<M: ModelSpec, S> {
    pub service: Arc<S>,
    pub id_schema: Arc<dyn IdSchema>,
    pub authenticator: Arc<dyn Authenticator>,
    pub ops: Arc<Vec<Operation>>,
    _marker: PhantomData<M>,
}

impl<M: ModelSpec, S> ResourceState<M, S> {
    #[must_use]
    pub fn new(
        service: Arc<S>,
        id_schema: Arc<dyn IdSchema>,
        authenticator: Arc<dyn Authenticator>,
        ops: Vec<Operation>,
    ) -> Self {
        Self {
            service,
            id_schema,
            authenticator,
            ops: Arc::new(ops),
            _marker: PhantomData,
        }
    }
}

impl<M: ModelSpec, S> Clone for ResourceState<M, S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            id_schema: self.id_schema.clone(),
            authenticator: self.authenticator.clone(),
            ops: self.ops.clone(),
            _marker: PhantomData,
        }
    }
}

fn project_paged<M: ModelSpec>(paged: PagedResult<M::Full>) -> PagedResult<M::Projected> {
    PagedResult {
        entities: paged.entities.iter().map(M::project).collect(),
        total: paged.total,
        page: paged.page,
        page_size: paged.page_size,
        total_pages: paged.total_pages,
    }
}

/// Mount the nine routes of §4.5 for resource `slug` onto a fresh router,
/// ready to `.merge()` into the application's combined router.
pub fn register_routes<M, S>(slug: &str, state: ResourceState<M, S>) -> Router
where
    M: ModelSpec,
    S: Service<M> + Send + Sync + 'static,
{
    let base = format!("/api/{slug}");
    Router::new()
        .route(&base, get(list::<M, S>).post(create::<M, S>))
        .route(&format!("{base}/all"), get(list_all::<M, S>))
        .route(&format!("{base}/count"), get(count::<M, S>))
        .route(&format!("{base}/batch"), patch(batch_update::<M, S>))
        .route(
            &format!("{base}/{{id}}"),
            get(get_by_id::<M, S>)
                .put(full_update_by_id::<M, S>)
                .patch(partial_update_by_id::<M, S>)
                .delete(delete_by_id::<M, S>),
        )
        .with_state(state)
}

async fn authenticate<M: ModelSpec, S>(
    state: &ResourceState<M, S>,
    headers: &HeaderMap,
) -> Result<svc_core::UserContext, ApiError> {
    Ok(state.authenticator.authenticate(headers).await?)
}

async fn list<M, S>(
    State(state): State<ResourceState<M, S>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ApiResponse<PagedResult<M::Projected>>, ApiError>
where
    M: ModelSpec,
    S: Service<M> + 'static,
{
    let ctx = authenticate(&state, &headers).await?;
    let query = parse_query_options(&params)?;
    let paged = state.service.get(&ctx, &state.ops, &query).await?;
    Ok(ApiResponse::ok(project_paged::<M>(paged)))
}

async fn list_all<M, S>(
    State(state): State<ResourceState<M, S>>,
    headers: HeaderMap,
) -> Result<ApiResponse<Vec<M::Projected>>, ApiError>
where
    M: ModelSpec,
    S: Service<M> + 'static,
{
    let ctx = authenticate(&state, &headers).await?;
    let all = state.service.get_all(&ctx).await?;
    Ok(ApiResponse::ok(all.iter().map(M::project).collect()))
}

async fn count<M, S>(
    State(state): State<ResourceState<M, S>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ApiResponse<u64>, ApiError>
where
    M: ModelSpec,
    S: Service<M> + 'static,
{
    let ctx = authenticate(&state, &headers).await?;
    let query = parse_query_options(&params)?;
    let n = state.service.get_count(&ctx, &state.ops, &query).await?;
    Ok(ApiResponse::ok(n))
}

async fn get_by_id<M, S>(
    State(state): State<ResourceState<M, S>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<M::Projected>, ApiError>
where
    M: ModelSpec,
    S: Service<M> + 'static,
{
    let ctx = authenticate(&state, &headers).await?;
    let id = state.id_schema.parse(&raw_id)?;
    let entity = state.service.get_by_id(&ctx, &state.ops, &id).await?;
    Ok(ApiResponse::ok(M::project(&entity)))
}

async fn create<M, S>(
    State(state): State<ResourceState<M, S>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<ApiResponse<M::Projected>, ApiError>
where
    M: ModelSpec,
    S: Service<M> + 'static,
{
    let ctx = authenticate(&state, &headers).await?;
    let entity = state.service.create(&ctx, body).await?;
    Ok(ApiResponse::created(M::project(&entity)))
}

async fn batch_update<M, S>(
    State(state): State<ResourceState<M, S>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<ApiResponse<Vec<M::Projected>>, ApiError>
where
    M: ModelSpec,
    S: Service<M> + 'static,
{
    let ctx = authenticate(&state, &headers).await?;
    let updates = match body {
        Value::Array(items) => items,
        _ => return Err(ApiError(ServiceError::bad_request("batch body must be a JSON array"))),
    };
    let entities = state.service.batch_update(&ctx, updates).await?;
    Ok(ApiResponse::ok(entities.iter().map(M::project).collect()))
}

async fn full_update_by_id<M, S>(
    State(state): State<ResourceState<M, S>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<ApiResponse<M::Projected>, ApiError>
where
    M: ModelSpec,
    S: Service<M> + 'static,
{
    let ctx = authenticate(&state, &headers).await?;
    let id = state.id_schema.parse(&raw_id)?;
    let entity = state.service.full_update_by_id(&ctx, &id, body).await?;
    Ok(ApiResponse::ok(M::project(&entity)))
}

async fn partial_update_by_id<M, S>(
    State(state): State<ResourceState<M, S>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<ApiResponse<M::Projected>, ApiError>
where
    M: ModelSpec,
    S: Service<M> + 'static,
{
    let ctx = authenticate(&state, &headers).await?;
    let id = state.id_schema.parse(&raw_id)?;
    let entity = state.service.partial_update_by_id(&ctx, &id, body).await?;
    Ok(ApiResponse::ok(M::project(&entity)))
}

async fn delete_by_id<M, S>(
    State(state): State<ResourceState<M, S>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<DeleteResult>, ApiError>
where
    M: ModelSpec,
    S: Service<M> + 'static,
{
    let ctx = authenticate(&state, &headers).await?;
    let id = state.id_schema.parse(&raw_id)?;
    let result = state.service.delete_by_id(&ctx, &id).await?;
    Ok(ApiResponse::ok(result))
}
