//! Backend-specific storage construction, gated by this binary's compiled
//! feature. Only one of `document`/`relational` is linked in at a time —
//! picking the other at runtime via config is a startup error, not a
//! silent fallback.

use crate::config::StorageConfig;
use crate::models::{Product, TestItem};
use anyhow::{bail, Result};

#[cfg(feature = "document")]
pub struct DocumentBackend {
    pub test_items: svc_storage::document::DocumentStorage<crate::models::TestItemSpec>,
    pub products: svc_storage::document::DocumentStorage<crate::models::ProductSpec>,
}

#[cfg(feature = "document")]
pub async fn connect_document(config: &StorageConfig) -> Result<DocumentBackend> {
    if config.backend != "document" {
        bail!("this binary was built with the `document` feature but storage.backend is '{}'", config.backend);
    }
    let client = mongodb::Client::with_uri_str(&config.dsn).await?;
    let db = client.default_database().unwrap_or_else(|| client.database("demo"));
    let test_items: mongodb::Collection<TestItem> = db.collection("test_items");
    let products: mongodb::Collection<Product> = db.collection("products");
    Ok(DocumentBackend {
        test_items: svc_storage::document::DocumentStorage::new(test_items),
        products: svc_storage::document::DocumentStorage::new(products),
    })
}

#[cfg(feature = "relational")]
pub struct RelationalBackend {
    pub test_items: svc_storage::relational::RelationalStorage<crate::models::TestItemSpec>,
    pub products: svc_storage::relational::RelationalStorage<crate::models::ProductSpec>,
}

#[cfg(feature = "relational")]
pub async fn connect_relational(config: &StorageConfig) -> Result<RelationalBackend> {
    if config.backend != "relational" {
        bail!("this binary was built with the `relational` feature but storage.backend is '{}'", config.backend);
    }
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.dsn)
        .await?;
    Ok(RelationalBackend {
        test_items: svc_storage::relational::RelationalStorage::new(
            pool.clone(),
            svc_storage::relational::RelationalTable {
                name: "test_items",
                id_column: "_id",
            },
        ),
        products: svc_storage::relational::RelationalStorage::new(
            pool,
            svc_storage::relational::RelationalTable {
                name: "products",
                id_column: "_id",
            },
        ),
    })
}
