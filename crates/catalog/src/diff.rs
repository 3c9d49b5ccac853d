//! Variant diff: classify a submitted variant list against persisted rows.
//!
//! Submitted variants carry no reliable "new" marker, only an optional raw id.
//! The classification is therefore a heuristic:
//!
//! 1. no id → create
//! 2. id of a persisted variant of this product → update (always wins)
//! 3. id with the placeholder prefix → create
//! 4. any other id → update, even when it is not a variant id at all
//!
//! Updates whose id names no persisted variant fail on their own when applied.
//! A persisted id submitted twice yields two updates, applied in submission
//! order, so the last one wins. Persisted variants whose id is not submitted
//! are deleted. Classification never fails.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use storefront_core::{Entity, Price, VariantId};

use crate::payload::{AttributeInput, VariantInput};
use crate::product::Variant;

/// Default prefix of client-generated variant ids.
pub const DEFAULT_PLACEHOLDER_PREFIX: &str = "temp-";

/// Shape of client-side placeholder ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderPattern {
    prefix: String,
}

impl PlaceholderPattern {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, raw_id: &str) -> bool {
        !self.prefix.is_empty() && raw_id.starts_with(&self.prefix)
    }
}

impl Default for PlaceholderPattern {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_PREFIX)
    }
}

/// What a best-effort item does to the variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VariantChange {
    /// Not yet persisted; `position` is the index in the submitted list.
    Create { position: usize },
    Update { id: VariantId },
    /// Update whose submitted id is not a variant id; `position` as above.
    Unrecognized { position: usize },
}

/// Row a submitted update points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    Variant(VariantId),
    /// Raw id that parses as no variant id, kept verbatim for reporting.
    Unrecognized(String),
}

impl core::fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UpdateTarget::Variant(id) => write!(f, "{id}"),
            UpdateTarget::Unrecognized(raw) => write!(f, "'{raw}'"),
        }
    }
}

/// A submitted variant carrying a non-placeholder id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantUpdate {
    pub target: UpdateTarget,
    pub position: usize,
    pub price: Price,
    pub attributes: Vec<AttributeInput>,
}

impl VariantUpdate {
    pub fn id(&self) -> Option<VariantId> {
        match self.target {
            UpdateTarget::Variant(id) => Some(id),
            UpdateTarget::Unrecognized(_) => None,
        }
    }

    pub fn change(&self) -> VariantChange {
        match self.target {
            UpdateTarget::Variant(id) => VariantChange::Update { id },
            UpdateTarget::Unrecognized(_) => VariantChange::Unrecognized {
                position: self.position,
            },
        }
    }
}

/// A submitted variant that must be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVariant {
    pub position: usize,
    pub price: Price,
    pub attributes: Vec<AttributeInput>,
}

impl NewVariant {
    pub fn change(&self) -> VariantChange {
        VariantChange::Create {
            position: self.position,
        }
    }
}

/// Disjoint delete/update/create partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantDiff {
    pub to_delete: Vec<VariantId>,
    pub to_update: Vec<VariantUpdate>,
    pub to_create: Vec<NewVariant>,
}

impl VariantDiff {
    /// Number of best-effort items the plan produces.
    pub fn item_count(&self) -> usize {
        self.to_update.len() + self.to_create.len()
    }
}

/// Classify `submitted` against `persisted`.
pub fn diff_variants(
    persisted: &[Variant],
    submitted: &[VariantInput],
    placeholder: &PlaceholderPattern,
) -> VariantDiff {
    let persisted_ids: HashSet<VariantId> = persisted.iter().map(|v| *v.id()).collect();

    let mut diff = VariantDiff::default();
    let mut kept: HashSet<VariantId> = HashSet::new();

    for (position, input) in submitted.iter().enumerate() {
        let Some(raw) = input.id.as_deref() else {
            diff.to_create.push(new_variant(position, input));
            continue;
        };

        let parsed = raw.parse::<VariantId>().ok();
        match parsed {
            Some(id) if persisted_ids.contains(&id) => {
                kept.insert(id);
                diff.to_update.push(variant_update(UpdateTarget::Variant(id), position, input));
            }
            _ if placeholder.matches(raw) => {
                diff.to_create.push(new_variant(position, input));
            }
            Some(id) => {
                diff.to_update.push(variant_update(UpdateTarget::Variant(id), position, input));
            }
            None => {
                let target = UpdateTarget::Unrecognized(raw.to_string());
                diff.to_update.push(variant_update(target, position, input));
            }
        }
    }

    diff.to_delete = persisted
        .iter()
        .map(|v| *v.id())
        .filter(|id| !kept.contains(id))
        .collect();

    diff
}

fn new_variant(position: usize, input: &VariantInput) -> NewVariant {
    NewVariant {
        position,
        price: input.price,
        attributes: input.attributes.clone(),
    }
}

fn variant_update(target: UpdateTarget, position: usize, input: &VariantInput) -> VariantUpdate {
    VariantUpdate {
        target,
        position,
        price: input.price,
        attributes: input.attributes.clone(),
    }
}
