//! `Entity`: the minimal generic surface `Storage` needs to read and
//! stamp identity, tenant, and audit fields on a `ModelSpec::Full` value
//! without knowing its concrete shape.

use crate::audit::AuditFields;
use crate::id::Id;

pub trait Entity: Clone + Send + Sync {
    fn id(&self) -> Option<&Id>;
    fn set_id(&mut self, id: Id);

    /// Tenant the entity belongs to. `None` for non-tenant-scoped entities
    /// (e.g. `Organization` itself).
    fn org_id(&self) -> Option<&str>;
    fn set_org_id(&mut self, org_id: String);

    fn audit(&self) -> Option<&AuditFields>;
    fn audit_mut(&mut self) -> Option<&mut AuditFields>;
    fn set_audit(&mut self, audit: AuditFields);
}
