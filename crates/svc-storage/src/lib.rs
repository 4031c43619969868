//! Backend-agnostic storage contract plus the adapters that implement it.
//!
//! [`Storage`] is the seam between the service pipeline (`svc-core`) and
//! whichever database backs a given deployment. [`ops`] describes joins
//! declaratively so the same service code drives either adapter. [`memory`]
//! is always available for tests; `document` and `relational` are opt-in
//! Cargo features selecting the MongoDB-backed and Postgres-backed adapters
//! respectively.

pub mod memory;
pub mod ops;
pub mod storage;

#[cfg(feature = "document")]
pub mod document;

#[cfg(feature = "relational")]
pub mod relational;

pub use memory::MemoryStorage;
pub use ops::{DeleteResult, JoinSource, Operation};
pub use storage::Storage;
