//! `Authenticator`: the controller-side external collaborator from the
//! core's interface list. The core never issues or validates credentials
//! itself; this crate only defines the seam and a minimal default so the
//! demo app and tests can run without a real identity provider wired in.

use async_trait::async_trait;
use axum::http::HeaderMap;
use svc_core::{UserContext, UserRef};
use svc_errors::ServiceError;
use svc_model::Id;

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<UserContext, ServiceError>;
}

/// Trusts `x-user-id` (required) and `x-org-id` (optional) verbatim, with
/// no signature or session check. Good enough for the demo app and for
/// exercising the controller in tests; real deployments supply an
/// `Authenticator` backed by whatever JWT/OIDC/session validation they
/// use.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderAuthenticator;

#[async_trait]
impl Authenticator for HeaderAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<UserContext, ServiceError> {
        let raw_user_id = headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or(ServiceError::Unauthenticated)?;
        let user_id = Id::parse_permissive(raw_user_id).map_err(|_| ServiceError::Unauthenticated)?;
        let org_id = headers
            .get("x-org-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(UserContext::authenticated(UserRef::new(user_id), org_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn missing_user_id_header_is_unauthenticated() {
        let err = HeaderAuthenticator
            .authenticate(&HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), svc_errors::ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn valid_headers_produce_a_context_carrying_org_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("42"));
        headers.insert("x-org-id", HeaderValue::from_static("7"));
        let ctx = HeaderAuthenticator.authenticate(&headers).await.unwrap();
        assert_eq!(ctx.org_id(), Some("7"));
        assert!(!ctx.is_system());
    }
}
