//! Error types for catalog persistence and reconciliation.
//!
//! Two layers, mirroring where failures originate:
//!
//! - [`StoreError`]: what a storage backend reports (missing rows, violated
//!   constraints, anything else the backend throws).
//! - [`CatalogError`]: what the reconciliation engine reports to its caller.
//!   Its `Display` text is the `message` of a failed mutation, verbatim.

use std::time::Duration;

use thiserror::Error;

use storefront_core::DomainError;

/// Storage backend failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// Unique or foreign-key constraint violated.
    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Reconciliation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Payload shape problem that slipped past upstream validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced category, product or variant does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A transaction exceeded its wall-clock budget and was rolled back.
    #[error("transaction timed out after {}ms ({scope})", budget.as_millis())]
    TransactionTimeout { scope: &'static str, budget: Duration },

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("storage error: {0}")]
    Store(String),
}

impl CatalogError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn timeout(scope: &'static str, budget: Duration) -> Self {
        Self::TransactionTimeout { scope, budget }
    }

    /// Short machine-friendly label, used as a tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Validation(_) => "validation",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::TransactionTimeout { .. } => "timeout",
            CatalogError::ConstraintViolation(_) => "constraint_violation",
            CatalogError::Store(_) => "store",
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => CatalogError::NotFound(what),
            StoreError::ConstraintViolation(msg) => CatalogError::ConstraintViolation(msg),
            StoreError::Backend(msg) => CatalogError::Store(msg),
        }
    }
}

impl From<DomainError> for CatalogError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(what) => CatalogError::NotFound(what),
            DomainError::Validation(msg) => CatalogError::Validation(msg),
            other => CatalogError::Validation(other.to_string()),
        }
    }
}

/// Map a sqlx error to a [`StoreError`].
///
/// | sqlx error | SQLSTATE | StoreError |
/// |---|---|---|
/// | Database (unique violation) | `23505` | `ConstraintViolation` |
/// | Database (foreign key violation) | `23503` | `ConstraintViolation` |
/// | Database (check violation) | `23514` | `ConstraintViolation` |
/// | RowNotFound | n/a | `NotFound` |
/// | anything else | n/a | `Backend` |
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{} in {}", db_err.message(), operation);
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") | Some("23514") => StoreError::ConstraintViolation(msg),
                _ => StoreError::Backend(format!("database error: {msg}")),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row for {operation}")),
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}
