//! Product mutation payloads, as handed over by the (already validated) admin form.

use serde::{Deserialize, Serialize};

use storefront_core::{AttributeId, CategoryId, DomainError, DomainResult, Price, VariantId};

use crate::product::ProductStatus;

/// One attribute assignment inside a submitted variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInput {
    #[serde(rename = "id")]
    pub attribute_id: AttributeId,
    pub value: String,
}

impl AttributeInput {
    pub fn new(attribute_id: AttributeId, value: impl Into<String>) -> Self {
        Self {
            attribute_id,
            value: value.into(),
        }
    }
}

/// A submitted variant.
///
/// `id` is the raw client value: absent or `temp-…` for rows the client
/// created, a persisted id otherwise. Classification happens in
/// [`crate::diff::diff_variants`]; prefer the typed constructors over writing
/// ids by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub attributes: Vec<AttributeInput>,
}

impl VariantInput {
    /// A variant that does not exist yet.
    pub fn new_variant(price: Price, attributes: Vec<AttributeInput>) -> Self {
        Self {
            id: None,
            price,
            attributes,
        }
    }

    /// A new variant carrying a client-side placeholder id.
    pub fn placeholder(placeholder_id: impl Into<String>, price: Price, attributes: Vec<AttributeInput>) -> Self {
        Self {
            id: Some(placeholder_id.into()),
            price,
            attributes,
        }
    }

    /// A previously persisted variant.
    pub fn existing(id: VariantId, price: Price, attributes: Vec<AttributeInput>) -> Self {
        Self {
            id: Some(id.to_string()),
            price,
            attributes,
        }
    }
}

/// Full create/update payload for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub status: ProductStatus,
    pub category: CategoryId,
    pub has_variant: bool,
    /// Explicit slug for creation; ignored on update.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
}

/// Scalar product fields written in the atomic phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub status: ProductStatus,
    pub category_id: CategoryId,
    pub has_variant: bool,
}

impl ProductPayload {
    /// Enforce the shape rules the engine relies on.
    ///
    /// A product without variants is reduced to its first variant with no
    /// attribute values, whatever the client sent in `variants[0].attributes`.
    pub fn normalized(mut self) -> DomainResult<Self> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if !self.has_variant {
            let Some(mut single) = self.variants.into_iter().next() else {
                return Err(DomainError::validation(
                    "a product without variants still needs one price",
                ));
            };
            single.attributes.clear();
            self.variants = vec![single];
        }

        Ok(self)
    }

    pub fn fields(&self) -> ProductFields {
        ProductFields {
            name: self.name.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            status: self.status,
            category_id: self.category,
            has_variant: self.has_variant,
        }
    }
}
