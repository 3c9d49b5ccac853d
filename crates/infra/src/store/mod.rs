//! Catalog persistence boundary.
//!
//! The engine talks to storage only through [`CatalogStore`] (a handle that
//! opens transactions) and [`CatalogTx`] (one open transaction). Both backends
//! implement the same contract:
//!
//! - every write happens inside a transaction
//! - dropping a transaction without `commit` rolls it back
//! - at most one attribute value per `(variant, attribute)`; duplicate inserts
//!   are skipped, not errors
//! - deleting a product removes its variants, deleting a variant removes its
//!   attribute values

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{Fault, InMemoryCatalogStore, Operation};
pub use postgres::PostgresCatalogStore;
pub use r#trait::{CatalogStore, CatalogTx};
