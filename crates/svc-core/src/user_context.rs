//! Request-scoped acting identity, and the one process-wide exception to
//! that rule: [`SystemUserContext`], set once at startup by migrations or
//! explicit bootstrap and read-only thereafter.

use std::sync::OnceLock;
use svc_model::Id;

/// The minimal identity carried by a [`UserContext`]. Real deployments
/// will have a richer `User` entity; the pipeline only ever needs the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: Id,
    pub email: Option<String>,
}

impl UserRef {
    #[must_use]
    pub fn new(id: Id) -> Self {
        Self { id, email: None }
    }
}

/// `{user, orgId?, isSystem}`, flowing by value through one request.
/// Never stored beyond the request's lifetime. `is_system` is `true` only
/// when obtained through [`SystemUserContext`] — nothing on the external
/// request path can forge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user: UserRef,
    org_id: Option<String>,
    is_system: bool,
}

impl UserContext {
    /// Build an ordinary, non-system context for an authenticated request.
    #[must_use]
    pub fn authenticated(user: UserRef, org_id: Option<String>) -> Self {
        Self {
            user,
            org_id,
            is_system: false,
        }
    }

    #[must_use]
    pub fn user(&self) -> &UserRef {
        &self.user
    }

    #[must_use]
    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }
}

/// Process-wide `UserContext` used by migrations and other bootstrap
/// code. Set exactly once, at startup; every later read sees the same
/// value. There is no lazy-initialize path — code that needs it before
/// [`SystemUserContext::initialize`] has run is a startup-ordering bug,
/// and `current` fails loudly rather than silently running unscoped.
pub struct SystemUserContext;

static SYSTEM_CONTEXT: OnceLock<UserContext> = OnceLock::new();

impl SystemUserContext {
    /// Set the process-wide system context. Called once, by the
    /// meta-org bootstrap migration (multi-tenant) or explicitly by the
    /// caller before running migrations (single-tenant).
    ///
    /// # Panics
    /// Panics if called more than once — a second call means two startup
    /// paths raced to initialize the same global, which is a bootstrap
    /// bug, not a runtime condition to recover from.
    pub fn initialize(user: UserRef, meta_org_id: Option<String>) {
        let ctx = UserContext {
            user,
            org_id: meta_org_id,
            is_system: true,
        };
        SYSTEM_CONTEXT
            .set(ctx)
            .expect("SystemUserContext initialized more than once");
    }

    #[must_use]
    pub fn is_initialized() -> bool {
        SYSTEM_CONTEXT.get().is_some()
    }

    /// Borrow the process-wide system context.
    ///
    /// # Panics
    /// Panics if called before [`SystemUserContext::initialize`] — the
    /// admin-user migration and any other system-only path must not run
    /// before bootstrap has set this.
    #[must_use]
    pub fn current() -> &'static UserContext {
        SYSTEM_CONTEXT
            .get()
            .expect("SystemUserContext used before initialize()")
    }
}
