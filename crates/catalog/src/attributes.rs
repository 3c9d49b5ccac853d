//! Attribute value planning for a single variant.
//!
//! Changed values are never updated in place: the old row is deleted and a new
//! one inserted, so row identity changes whenever the value does.

use std::collections::HashMap;

use storefront_core::AttributeId;

use crate::payload::AttributeInput;
use crate::product::AttributeValue;

/// Rows to drop and rows to insert for one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePlan {
    /// Persisted attribute ids that are gone or changed.
    pub to_delete: Vec<AttributeId>,
    /// Submitted values that are new or changed.
    pub to_create: Vec<AttributeInput>,
}

impl AttributePlan {
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }
}

/// Collapse repeated attribute ids; the last submitted value wins and keeps
/// the position of the first occurrence.
pub fn dedupe_attributes(submitted: &[AttributeInput]) -> Vec<AttributeInput> {
    let mut slots: HashMap<AttributeId, usize> = HashMap::with_capacity(submitted.len());
    let mut unique: Vec<AttributeInput> = Vec::with_capacity(submitted.len());

    for input in submitted {
        match slots.get(&input.attribute_id) {
            Some(&slot) => unique[slot].value = input.value.clone(),
            None => {
                slots.insert(input.attribute_id, unique.len());
                unique.push(input.clone());
            }
        }
    }

    unique
}

/// Compare a variant's persisted values with the submitted ones.
pub fn plan_attribute_changes(persisted: &[AttributeValue], submitted: &[AttributeInput]) -> AttributePlan {
    let submitted = dedupe_attributes(submitted);
    let wanted: HashMap<AttributeId, &str> = submitted
        .iter()
        .map(|a| (a.attribute_id, a.value.as_str()))
        .collect();
    let current: HashMap<AttributeId, &str> = persisted
        .iter()
        .map(|a| (a.attribute_id, a.value.as_str()))
        .collect();

    let to_delete = persisted
        .iter()
        .filter(|row| wanted.get(&row.attribute_id) != Some(&row.value.as_str()))
        .map(|row| row.attribute_id)
        .collect();

    let to_create = submitted
        .iter()
        .filter(|input| current.get(&input.attribute_id) != Some(&input.value.as_str()))
        .cloned()
        .collect();

    AttributePlan { to_delete, to_create }
}
