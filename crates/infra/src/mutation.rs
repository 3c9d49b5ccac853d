//! What a catalog mutation hands back to its caller.
//!
//! [`MutationResult`] is the user-facing `{ success, message }` pair. It only
//! reflects the atomic product transaction; the outcome of every best-effort
//! variant item travels next to it in [`MutationReport::variants`].

use serde::{Deserialize, Serialize};

use storefront_catalog::{Attribute, VariantChange, ViewKey};
use storefront_core::{ProductId, VariantId};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    pub success: bool,
    pub message: String,
}

impl MutationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Failure carrying the error text verbatim.
    pub fn failed(err: &CatalogError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
        }
    }
}

/// A best-effort item that committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedVariant {
    /// Persisted id (freshly minted for creates).
    pub id: VariantId,
    pub change: VariantChange,
}

/// A best-effort item that was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantFailure {
    pub change: VariantChange,
    pub error: CatalogError,
}

pub type VariantOutcome = Result<AppliedVariant, VariantFailure>;

/// Outcome of a create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub result: MutationResult,
    /// Set once the atomic phase committed.
    pub product_id: Option<ProductId>,
    /// One entry per best-effort item: updates first, then creates, each in
    /// submission order.
    pub variants: Vec<VariantOutcome>,
    /// Views announced after the atomic phase committed; empty on failure.
    pub revalidated: Vec<ViewKey>,
}

impl MutationReport {
    pub(crate) fn failed(err: &CatalogError) -> Self {
        Self {
            result: MutationResult::failed(err),
            product_id: None,
            variants: Vec::new(),
            revalidated: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.success
    }

    pub fn applied(&self) -> impl Iterator<Item = &AppliedVariant> {
        self.variants.iter().filter_map(|outcome| outcome.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &VariantFailure> {
        self.variants.iter().filter_map(|outcome| outcome.as_ref().err())
    }

    /// Ids of created variants, in submission order.
    pub fn created_ids(&self) -> Vec<VariantId> {
        self.applied()
            .filter(|applied| matches!(applied.change, VariantChange::Create { .. }))
            .map(|applied| applied.id)
            .collect()
    }
}

/// Result of `create_attribute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeResult {
    #[serde(flatten)]
    pub result: MutationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<Attribute>,
}
