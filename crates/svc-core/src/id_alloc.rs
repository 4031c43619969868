//! `IdAllocator`: the external collaborator that assigns a new entity's
//! identity before the first storage round trip, or defers to the backend
//! when the backend assigns it itself.

use svc_model::Id;

pub trait IdAllocator: Send + Sync {
    /// Allocate a fresh identity for a newly created entity, or `None` to
    /// leave assignment to the storage backend (a relational `SERIAL`/
    /// `IDENTITY` column, assigned on insert and read back via
    /// `RETURNING`).
    fn allocate(&self) -> Option<Id>;
}

/// The document backend has no server-side default for its id column, so
/// the pipeline must mint one before the insert.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentIdAllocator;

impl IdAllocator for DocumentIdAllocator {
    fn allocate(&self) -> Option<Id> {
        Some(Id::new_document())
    }
}

/// The relational backend's identity column assigns itself; the pipeline
/// leaves `_id` unset and the adapter reads the generated value back.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationalIdAllocator;

impl IdAllocator for RelationalIdAllocator {
    fn allocate(&self) -> Option<Id> {
        None
    }
}
