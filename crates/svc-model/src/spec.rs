//! `ModelSpec`: the compiled schema behind one resource — full validation,
//! partial validation, and response projection, all derived once at
//! process startup and treated as immutable afterwards.

use crate::entity::Entity;
use svc_errors::FieldViolation;
use validator::{Validate, ValidationErrors};

/// Turn `validator`'s per-field error map into the flat, ordered list of
/// `FieldViolation`s the rest of the pipeline expects.
#[must_use]
pub fn violations_from(errors: &ValidationErrors) -> Vec<FieldViolation> {
    let mut out = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for err in field_errors {
            let message = err
                .message
                .as_ref()
                .map(std::borrow::Cow::to_string)
                .unwrap_or_else(|| format!("failed `{}` validation", err.code));
            out.push(FieldViolation::new(field.to_string(), message));
        }
    }
    out
}

/// A compiled schema for one resource. `Full` and `Partial` are distinct
/// Rust types by design — the partial schema is "all fields optional",
/// which in Rust is best expressed as its own type rather than wrapping
/// every field of `Full` in `Option` at the use site.
///
/// `Projected` is a structural subset of `Full` used to strip
/// sensitive fields (e.g. password hashes) from external responses;
/// nothing outside of `project` is allowed to see the omitted fields.
pub trait ModelSpec: Send + Sync + 'static {
    /// The complete, validated entity shape.
    type Full: Entity
        + Validate
        + Clone
        + Send
        + Sync
        + serde::Serialize
        + serde::de::DeserializeOwned
        + 'static;

    /// The all-optional shape accepted by partial-update operations.
    type Partial: Validate + Clone + Send + Sync + serde::Serialize + serde::de::DeserializeOwned + 'static;

    /// The response-safe projection of `Full`.
    type Projected: serde::Serialize + Send + Sync + 'static;

    /// Resource name, used in log fields and error messages.
    const NAME: &'static str;

    /// Whether the pipeline maintains the audit quintuple for this
    /// resource.
    const IS_AUDITABLE: bool;

    /// Validate a complete entity against the full schema.
    fn validate_full(value: &Self::Full) -> Result<(), Vec<FieldViolation>> {
        value.validate().map_err(|e| violations_from(&e))
    }

    /// Validate a partial entity against the all-optional schema. Only
    /// fields that are present are checked; absent fields never fail
    /// validation.
    fn validate_partial(value: &Self::Partial) -> Result<(), Vec<FieldViolation>> {
        value.validate().map_err(|e| violations_from(&e))
    }

    /// Merge a partial update onto an existing full entity. Only fields
    /// present in `partial` are applied to `full`; identity and audit
    /// fields are never touched here (the pipeline owns those).
    fn apply_partial(full: &mut Self::Full, partial: Self::Partial);

    /// Project a full entity down to its externally-visible shape.
    fn project(value: &Self::Full) -> Self::Projected;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use validator::ValidationError;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Full {
        name: String,
        secret: String,
        id: Option<crate::id::Id>,
        org_id: Option<String>,
        audit: Option<crate::audit::AuditFields>,
    }

    impl Entity for Full {
        fn id(&self) -> Option<&crate::id::Id> {
            self.id.as_ref()
        }
        fn set_id(&mut self, id: crate::id::Id) {
            self.id = Some(id);
        }
        fn org_id(&self) -> Option<&str> {
            self.org_id.as_deref()
        }
        fn set_org_id(&mut self, org_id: String) {
            self.org_id = Some(org_id);
        }
        fn audit(&self) -> Option<&crate::audit::AuditFields> {
            self.audit.as_ref()
        }
        fn audit_mut(&mut self) -> Option<&mut crate::audit::AuditFields> {
            self.audit.as_mut()
        }
        fn set_audit(&mut self, audit: crate::audit::AuditFields) {
            self.audit = Some(audit);
        }
    }

    impl Full {
        fn new(name: &str, secret: &str) -> Self {
            Self {
                name: name.to_string(),
                secret: secret.to_string(),
                id: None,
                org_id: None,
                audit: None,
            }
        }
    }

    impl Validate for Full {
        fn validate(&self) -> Result<(), ValidationErrors> {
            let mut errors = ValidationErrors::new();
            if self.name.is_empty() {
                errors.add("name", ValidationError::new("required"));
            }
            if errors.is_empty() {
                Ok(())
            } else {
                Err(errors)
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, Default)]
    struct Partial {
        name: Option<String>,
    }

    impl Validate for Partial {
        fn validate(&self) -> Result<(), ValidationErrors> {
            Ok(())
        }
    }

    #[derive(Serialize)]
    struct Projected {
        name: String,
    }

    struct TestSpec;

    impl ModelSpec for TestSpec {
        type Full = Full;
        type Partial = Partial;
        type Projected = Projected;
        const NAME: &'static str = "test";
        const IS_AUDITABLE: bool = true;

        fn apply_partial(full: &mut Self::Full, partial: Self::Partial) {
            if let Some(name) = partial.name {
                full.name = name;
            }
        }

        fn project(value: &Self::Full) -> Self::Projected {
            Projected {
                name: value.name.clone(),
            }
        }
    }

    #[test]
    fn validate_full_reports_field_violations() {
        let bad = Full::new("", "x");
        let errs = TestSpec::validate_full(&bad).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "name");
    }

    #[test]
    fn project_omits_fields_absent_from_projection_schema() {
        let full = Full::new("widget", "s3cr3t");
        let projected = TestSpec::project(&full);
        let json = serde_json::to_value(&projected).unwrap();
        assert!(json.get("secret").is_none());
        assert_eq!(json["name"], "widget");
    }

    #[test]
    fn apply_partial_only_touches_present_fields() {
        let mut full = Full::new("old", "keep");
        TestSpec::apply_partial(&mut full, Partial { name: None });
        assert_eq!(full.name, "old");
        TestSpec::apply_partial(
            &mut full,
            Partial {
                name: Some("new".into()),
            },
        );
        assert_eq!(full.name, "new");
        assert_eq!(full.secret, "keep");
    }
}
