mod backend;
mod config;
mod models;

use anyhow::Result;
use axum::Router;
use config::AppConfig;
use models::{ProductSpec, TestItemSpec};
use std::sync::Arc;
use svc_core::hooks::NoopHooks;
use svc_core::tenant::MultiTenantService;
use svc_core::{DocumentIdAllocator, GenericService, RelationalIdAllocator, SystemClock};
use svc_rest::{register_routes, HeaderAuthenticator, ResourceState};
use svc_storage::{JoinSource, Operation};

const CATEGORIES: JoinSource = JoinSource::new("categories", &["_id", "name"]);

fn category_join() -> Vec<Operation> {
    vec![Operation::LeftJoin {
        from: CATEGORIES,
        local_field: "category_id",
        foreign_field: "_id",
        r#as: "category",
    }]
}

#[cfg(feature = "document")]
async fn build_router(config: &config::StorageConfig) -> Result<Router> {
    use svc_model::DocumentIdSchema;

    let backend = backend::connect_document(config).await?;
    let id_schema = || Arc::new(DocumentIdSchema) as Arc<dyn svc_model::IdSchema>;
    let authenticator = || Arc::new(HeaderAuthenticator) as Arc<dyn svc_rest::Authenticator>;

    if config.multi_tenant {
        let test_items = Arc::new(MultiTenantService::new(
            GenericService::<TestItemSpec, _>::new(
                Arc::new(backend.test_items),
                Arc::new(SystemClock),
                Arc::new(DocumentIdAllocator),
                Arc::new(NoopHooks::default()),
            ),
            None,
        ));
        let products = Arc::new(MultiTenantService::new(
            GenericService::<ProductSpec, _>::new(
                Arc::new(backend.products),
                Arc::new(SystemClock),
                Arc::new(DocumentIdAllocator),
                Arc::new(NoopHooks::default()),
            ),
            None,
        ));
        Ok(register_routes(
            "test-items",
            ResourceState::new(test_items, id_schema(), authenticator(), vec![]),
        )
        .merge(register_routes(
            "products",
            ResourceState::new(products, id_schema(), authenticator(), category_join()),
        )))
    } else {
        let test_items = Arc::new(GenericService::<TestItemSpec, _>::new(
            Arc::new(backend.test_items),
            Arc::new(SystemClock),
            Arc::new(DocumentIdAllocator),
            Arc::new(NoopHooks::default()),
        ));
        let products = Arc::new(GenericService::<ProductSpec, _>::new(
            Arc::new(backend.products),
            Arc::new(SystemClock),
            Arc::new(DocumentIdAllocator),
            Arc::new(NoopHooks::default()),
        ));
        Ok(register_routes(
            "test-items",
            ResourceState::new(test_items, id_schema(), authenticator(), vec![]),
        )
        .merge(register_routes(
            "products",
            ResourceState::new(products, id_schema(), authenticator(), category_join()),
        )))
    }
}

#[cfg(all(feature = "relational", not(feature = "document")))]
async fn build_router(config: &config::StorageConfig) -> Result<Router> {
    use svc_model::RelationalIdSchema;

    let backend = backend::connect_relational(config).await?;
    let id_schema = || Arc::new(RelationalIdSchema) as Arc<dyn svc_model::IdSchema>;
    let authenticator = || Arc::new(HeaderAuthenticator) as Arc<dyn svc_rest::Authenticator>;

    if config.multi_tenant {
        let test_items = Arc::new(MultiTenantService::new(
            GenericService::<TestItemSpec, _>::new(
                Arc::new(backend.test_items),
                Arc::new(SystemClock),
                Arc::new(RelationalIdAllocator),
                Arc::new(NoopHooks::default()),
            ),
            None,
        ));
        let products = Arc::new(MultiTenantService::new(
            GenericService::<ProductSpec, _>::new(
                Arc::new(backend.products),
                Arc::new(SystemClock),
                Arc::new(RelationalIdAllocator),
                Arc::new(NoopHooks::default()),
            ),
            None,
        ));
        Ok(register_routes(
            "test-items",
            ResourceState::new(test_items, id_schema(), authenticator(), vec![]),
        )
        .merge(register_routes(
            "products",
            ResourceState::new(products, id_schema(), authenticator(), category_join()),
        )))
    } else {
        let test_items = Arc::new(GenericService::<TestItemSpec, _>::new(
            Arc::new(backend.test_items),
            Arc::new(SystemClock),
            Arc::new(RelationalIdAllocator),
            Arc::new(NoopHooks::default()),
        ));
        let products = Arc::new(GenericService::<ProductSpec, _>::new(
            Arc::new(backend.products),
            Arc::new(SystemClock),
            Arc::new(RelationalIdAllocator),
            Arc::new(NoopHooks::default()),
        ));
        Ok(register_routes(
            "test-items",
            ResourceState::new(test_items, id_schema(), authenticator(), vec![]),
        )
        .merge(register_routes(
            "products",
            ResourceState::new(products, id_schema(), authenticator(), category_join()),
        )))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("APP_CONFIG").ok();
    let config = AppConfig::load(config_path.as_deref())?;

    tracing::info!(backend = %config.storage.backend, multi_tenant = config.storage.multi_tenant, "starting demo-server");

    let router = build_router(&config.storage).await?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
