//! The service pipeline: request-scoped identity, the generic
//! validate → preprocess → persist → postprocess orchestration, tenant
//! isolation, and the pre/post hook seams resources customize through.
//!
//! Everything here is parameterized by a [`svc_model::ModelSpec`] and a
//! [`svc_storage::Storage`] implementation rather than subclassed per
//! resource — composition over inheritance, the way the rest of this
//! workspace is built.

pub mod clock;
pub mod generic;
pub mod hooks;
pub mod id_alloc;
pub mod service;
pub mod tenant;
pub mod user_context;

pub use clock::{Clock, SystemClock};
pub use generic::GenericService;
pub use hooks::Hooks;
pub use id_alloc::{DocumentIdAllocator, IdAllocator, RelationalIdAllocator};
pub use service::Service;
pub use tenant::MultiTenantService;
pub use user_context::{SystemUserContext, UserContext, UserRef};
