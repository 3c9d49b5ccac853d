//! Catalog domain module.
//!
//! Business rules for products, variants and attribute values, implemented as
//! deterministic domain logic (no IO, no storage). The planning half of
//! reconciliation lives here; executing a plan against a store is the job of
//! `storefront-infra`.

pub mod attributes;
pub mod diff;
pub mod payload;
pub mod product;
pub mod revalidate;
pub mod slug;

pub use attributes::{AttributePlan, dedupe_attributes, plan_attribute_changes};
pub use diff::{NewVariant, PlaceholderPattern, UpdateTarget, VariantChange, VariantDiff, VariantUpdate, diff_variants};
pub use payload::{AttributeInput, ProductFields, ProductPayload, VariantInput};
pub use product::{
    Attribute, AttributeValue, Category, Product, ProductDetail, ProductStatus, Variant,
};
pub use revalidate::{Revalidation, RevalidationReason, ViewKey, product_view_keys};
pub use slug::slugify;
