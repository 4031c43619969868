//! Schema-driven validation, encode/decode, and response projection for one
//! resource.
//!
//! A `ModelSpec` replaces ad-hoc per-resource inheritance: a service or
//! controller is parameterized by a spec, not by a subclass per entity.
//! Customization (tenant scoping, field lowercasing, ...) is composition
//! via hooks at the service layer, never inheritance here.

pub mod audit;
pub mod entity;
pub mod id;
pub mod spec;

pub use audit::AuditFields;
pub use entity::Entity;
pub use id::{DocumentIdSchema, Id, IdSchema, RelationalIdSchema};
pub use spec::{violations_from, ModelSpec};
