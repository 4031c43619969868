//! The two example resources this app wires up: `test-items`, a bare
//! auditable entity, and `products`, which additionally demonstrates a
//! one-to-one join (`category`) and a projection that hides an internal
//! field.

use serde::{Deserialize, Serialize};
use svc_model::{AuditFields, Entity, Id, ModelSpec};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestItem {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(rename = "_orgId", skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditFields>,
}

impl Entity for TestItem {
    fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }
    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
    fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }
    fn set_org_id(&mut self, org_id: String) {
        self.org_id = Some(org_id);
    }
    fn audit(&self) -> Option<&AuditFields> {
        self.audit.as_ref()
    }
    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        self.audit.as_mut()
    }
    fn set_audit(&mut self, audit: AuditFields) {
        self.audit = Some(audit);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TestItemPartial {
    #[validate(length(min = 1))]
    pub name: Option<String>,
}

pub struct TestItemSpec;

impl ModelSpec for TestItemSpec {
    type Full = TestItem;
    type Partial = TestItemPartial;
    type Projected = TestItem;
    const NAME: &'static str = "test-item";
    const IS_AUDITABLE: bool = true;

    fn apply_partial(full: &mut TestItem, partial: TestItemPartial) {
        if let Some(name) = partial.name {
            full.name = name;
        }
    }

    fn project(value: &TestItem) -> TestItem {
        value.clone()
    }
}

/// A category joined onto a product via `Operation::LeftJoin`. Storage
/// fills this in from the join's `as` alias; it is never written through
/// the product resource itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(rename = "_orgId", skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[validate(length(min = 1))]
    pub name: String,
    /// Internal SKU, stripped from the response by [`ProductProjected`].
    pub internal_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryRef>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditFields>,
}

impl Entity for Product {
    fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }
    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
    fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }
    fn set_org_id(&mut self, org_id: String) {
        self.org_id = Some(org_id);
    }
    fn audit(&self) -> Option<&AuditFields> {
        self.audit.as_ref()
    }
    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        self.audit.as_mut()
    }
    fn set_audit(&mut self, audit: AuditFields) {
        self.audit = Some(audit);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProductPartial {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub internal_number: Option<String>,
    pub category_id: Option<Id>,
}

/// Response-safe projection: carries `category` but never
/// `internal_number` (§8 scenario 5).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductProjected {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryRef>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditFields>,
}

pub struct ProductSpec;

impl ModelSpec for ProductSpec {
    type Full = Product;
    type Partial = ProductPartial;
    type Projected = ProductProjected;
    const NAME: &'static str = "product";
    const IS_AUDITABLE: bool = true;

    fn apply_partial(full: &mut Product, partial: ProductPartial) {
        if let Some(name) = partial.name {
            full.name = name;
        }
        if let Some(internal_number) = partial.internal_number {
            full.internal_number = internal_number;
        }
        if let Some(category_id) = partial.category_id {
            full.category_id = Some(category_id);
        }
    }

    fn project(value: &Product) -> ProductProjected {
        ProductProjected {
            id: value.id.clone(),
            name: value.name.clone(),
            category: value.category.clone(),
            audit: value.audit.clone(),
        }
    }
}
