//! Controller: the REST surface of §4.5, generic over any
//! `ModelSpec` + `Service` pair. Wires nine routes per resource, converts
//! path ids through the deployment's `IdSchema`, applies the response
//! projection, and wraps every body in the `{"data": ...}` /
//! `{"errors": [...]}` envelope from §6.

pub mod auth;
pub mod controller;
pub mod envelope;
pub mod query;

pub use auth::{Authenticator, HeaderAuthenticator};
pub use controller::{register_routes, ResourceState};
pub use envelope::{ApiError, ApiResponse, DataEnvelope};
pub use query::parse_query_options;
