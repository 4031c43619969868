//! Exercises the generic REST surface through a real axum router, the
//! way the teacher framework's own `tests/*_integration.rs` files drive a
//! router with `tower::ServiceExt::oneshot` rather than calling handlers
//! directly.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use svc_core::{DocumentIdAllocator, GenericService, SystemClock};
use svc_core::hooks::NoopHooks;
use svc_model::{AuditFields, DocumentIdSchema, Entity, Id, ModelSpec};
use svc_rest::{register_routes, HeaderAuthenticator, ResourceState};
use svc_storage::{JoinSource, MemoryStorage, Operation};
use tower::ServiceExt;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Widget {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<Id>,
    #[serde(rename = "_orgId", skip_serializing_if = "Option::is_none")]
    org_id: Option<String>,
    name: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    audit: Option<AuditFields>,
}

impl Entity for Widget {
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

impl Validate for Widget {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.is_empty() {
            errors.add("name", ValidationError::new("required"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WidgetPartial {
    name: Option<String>,
}

impl Validate for WidgetPartial {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

struct WidgetSpec;
impl ModelSpec for WidgetSpec {
    type Full = Widget;
    type Partial = WidgetPartial;
    type Projected = Widget;
    const NAME: &'static str = "widget";
    const IS_AUDITABLE: bool = true;
    fn apply_partial(full: &mut Widget, partial: WidgetPartial) {
        if let Some(name) = partial.name {
            full.name = name;
        }
    }
    fn project(value: &Widget) -> Widget {
        value.clone()
    }
}

fn app() -> axum::Router {
    let service = Arc::new(GenericService::<WidgetSpec, MemoryStorage<WidgetSpec>>::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(SystemClock),
        Arc::new(DocumentIdAllocator),
        Arc::new(NoopHooks::default()),
    ));
    let state = ResourceState::new(
        service,
        Arc::new(DocumentIdSchema),
        Arc::new(HeaderAuthenticator),
        vec![],
    );
    register_routes::<WidgetSpec, _>("widgets", state)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryRef {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<Id>,
    #[serde(rename = "_orgId", skip_serializing_if = "Option::is_none")]
    org_id: Option<String>,
    name: String,
    category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<CategoryRef>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    audit: Option<AuditFields>,
}

impl Entity for Product {
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

impl Validate for Product {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.is_empty() {
            errors.add("name", ValidationError::new("required"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProductPartial {
    name: Option<String>,
}

impl Validate for ProductPartial {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

struct ProductSpec;
impl ModelSpec for ProductSpec {
    type Full = Product;
    type Partial = ProductPartial;
    type Projected = Product;
    const NAME: &'static str = "product";
    const IS_AUDITABLE: bool = true;
    fn apply_partial(full: &mut Product, partial: ProductPartial) {
        if let Some(name) = partial.name {
            full.name = name;
        }
    }
    fn project(value: &Product) -> Product {
        value.clone()
    }
}

/// Builds a router over a joined resource, seeding the `MemoryStorage`'s
/// join registry with the `categories` rows the `LeftJoin` resolves
/// against — the in-memory analogue of `apps/demo-server`'s
/// products-joined-onto-categories wiring.
fn joined_app() -> axum::Router {
    let storage = Arc::new(MemoryStorage::<ProductSpec>::new());
    storage.seed_join_source(
        "categories",
        vec![json!({ "_id": "cat-1", "name": "Gadgets" })],
    );
    let service = Arc::new(GenericService::<ProductSpec, MemoryStorage<ProductSpec>>::new(
        storage,
        Arc::new(SystemClock),
        Arc::new(DocumentIdAllocator),
        Arc::new(NoopHooks::default()),
    ));
    let ops = vec![Operation::LeftJoin {
        from: JoinSource::new("categories", &["_id", "name"]),
        local_field: "categoryId",
        foreign_field: "_id",
        r#as: "category",
    }];
    let state = ResourceState::new(
        service,
        Arc::new(DocumentIdSchema),
        Arc::new(HeaderAuthenticator),
        ops,
    );
    register_routes::<ProductSpec, _>("products", state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn create_then_get_by_id_round_trips_through_the_router() {
    let app = app();

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/widgets")
                .header("content-type", "application/json")
                .header("x-user-id", "a".repeat(24))
                .body(Body::from(json!({ "name": "sprocket" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create_response.status(), StatusCode::CREATED);
    let created = body_json(create_response).await;
    let id = created["data"]["_id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["name"], "sprocket");

    let get_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/widgets/{id}"))
                .header("x-user-id", "a".repeat(24))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);
    let fetched = body_json(get_response).await;
    assert_eq!(fetched["data"]["name"], "sprocket");
}

#[tokio::test]
async fn get_by_id_on_a_joined_resource_populates_the_join() {
    let app = joined_app();

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/products")
                .header("content-type", "application/json")
                .header("x-user-id", "a".repeat(24))
                .body(Body::from(
                    json!({ "name": "Flux Capacitor", "categoryId": "cat-1" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create_response.status(), StatusCode::CREATED);
    let created = body_json(create_response).await;
    let id = created["data"]["_id"].as_str().unwrap().to_string();

    let get_response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/products/{id}"))
                .header("x-user-id", "a".repeat(24))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);
    let fetched = body_json(get_response).await;
    assert_eq!(fetched["data"]["category"]["name"], "Gadgets");
}

#[tokio::test]
async fn missing_auth_header_is_unauthenticated() {
    let app = app();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/widgets/all")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_path_id_is_bad_request() {
    let app = app();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/widgets/not-an-id")
                .header("x-user-id", "a".repeat(24))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_body_that_is_not_an_array_is_bad_request() {
    let app = app();
    let response = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/widgets/batch")
                .header("content-type", "application/json")
                .header("x-user-id", "a".repeat(24))
                .body(Body::from(json!({ "not": "an array" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_resource_not_found_yields_404() {
    let app = app();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/widgets/{}", "f".repeat(24)))
                .header("x-user-id", "a".repeat(24))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
