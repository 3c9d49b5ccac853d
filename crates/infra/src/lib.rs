//! Infrastructure layer: catalog persistence, reconciliation orchestration, config.

pub mod catalog_service;
pub mod config;
pub mod error;
pub mod mutation;
pub mod store;

mod integration_tests;

pub use catalog_service::CatalogService;
pub use config::CatalogConfig;
pub use error::{CatalogError, StoreError};
pub use mutation::{
    AppliedVariant, AttributeResult, MutationReport, MutationResult, VariantFailure, VariantOutcome,
};
pub use store::{CatalogStore, CatalogTx, InMemoryCatalogStore, PostgresCatalogStore};
