//! `storefront-core` — shared building blocks for the storefront back office.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AttributeId, CategoryId, ProductId, VariantId};
pub use money::Price;
pub use value_object::ValueObject;
