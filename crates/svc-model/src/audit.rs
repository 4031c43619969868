//! Audit quintuple maintained by the pipeline for every auditable entity.

use crate::id::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{_created, _createdBy, _updated, _updatedBy}` plus the optional
/// soft-delete pair. `created`/`created_by` are set exactly once, on
/// insert, and never mutated thereafter; `updated`/`updated_by` are
/// refreshed on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFields {
    #[serde(rename = "_created")]
    pub created: DateTime<Utc>,
    #[serde(rename = "_createdBy")]
    pub created_by: Id,
    #[serde(rename = "_updated")]
    pub updated: DateTime<Utc>,
    #[serde(rename = "_updatedBy")]
    pub updated_by: Id,
    #[serde(rename = "_deleted", skip_serializing_if = "Option::is_none", default)]
    pub deleted: Option<DateTime<Utc>>,
    #[serde(
        rename = "_deletedBy",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub deleted_by: Option<Id>,
}

impl AuditFields {
    /// Stamp the quintuple for a brand-new entity created by `actor`.
    #[must_use]
    pub fn on_create(now: DateTime<Utc>, actor: Id) -> Self {
        Self {
            created: now,
            created_by: actor.clone(),
            updated: now,
            updated_by: actor,
            deleted: None,
            deleted_by: None,
        }
    }

    /// Refresh `updated`/`updated_by` on a mutation, leaving
    /// `created`/`created_by` untouched.
    pub fn on_update(&mut self, now: DateTime<Utc>, actor: Id) {
        self.updated = now;
        self.updated_by = actor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn on_create_sets_created_and_updated_to_the_same_instant() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let actor = Id::Relational(1);
        let audit = AuditFields::on_create(now, actor.clone());
        assert_eq!(audit.created, audit.updated);
        assert_eq!(audit.created_by, actor);
        assert_eq!(audit.updated_by, actor);
    }

    #[test]
    fn on_update_preserves_created_fields() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let mut audit = AuditFields::on_create(t0, Id::Relational(1));
        audit.on_update(t1, Id::Relational(2));
        assert_eq!(audit.created, t0);
        assert_eq!(audit.created_by, Id::Relational(1));
        assert_eq!(audit.updated, t1);
        assert_eq!(audit.updated_by, Id::Relational(2));
    }
}
