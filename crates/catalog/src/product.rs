use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{AttributeId, CategoryId, Entity, Price, ProductId, VariantId};

/// Storefront visibility of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Visible,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Visible => "visible",
            ProductStatus::Archived => "archived",
        }
    }
}

impl core::str::FromStr for ProductStatus {
    type Err = storefront_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visible" => Ok(ProductStatus::Visible),
            "archived" => Ok(ProductStatus::Archived),
            other => Err(storefront_core::DomainError::validation(format!(
                "unknown product status '{other}'"
            ))),
        }
    }
}

/// Persisted product row (scalar fields only; variants are loaded separately).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Derived once on create, never recomputed.
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub status: ProductStatus,
    pub has_variant: bool,
    pub featured: bool,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether shoppers can see the product.
    pub fn is_visible(&self) -> bool {
        self.status == ProductStatus::Visible
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A purchasable configuration of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub price: Price,
    pub attributes: Vec<AttributeValue>,
}

impl Variant {
    /// Value assigned to `attribute_id`, if any.
    pub fn attribute(&self, attribute_id: AttributeId) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.attribute_id == attribute_id)
            .map(|a| a.value.as_str())
    }
}

impl Entity for Variant {
    type Id = VariantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Catalog-wide attribute dictionary entry (e.g. "Size").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
}

impl Entity for Attribute {
    type Id = AttributeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Concrete value of one attribute for one variant.
///
/// At most one row exists per `(variant_id, attribute_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    pub variant_id: VariantId,
    pub attribute_id: AttributeId,
    pub value: String,
}

/// Product category. The engine only needs its identity and its parent, which
/// decides the listings a product shows up in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<CategoryId>,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Product with its variants and their attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub product: Product,
    pub variants: Vec<Variant>,
}

impl ProductDetail {
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn attribute_value_count(&self) -> usize {
        self.variants.iter().map(|v| v.attributes.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProductStatus::Archived).unwrap(),
            "\"archived\""
        );
        assert_eq!("visible".parse::<ProductStatus>().unwrap(), ProductStatus::Visible);
        assert!("draft".parse::<ProductStatus>().is_err());
    }

    #[test]
    fn variant_attribute_lookup() {
        let variant_id = VariantId::new();
        let size = AttributeId::new();
        let variant = Variant {
            id: variant_id,
            product_id: ProductId::new(),
            price: Price::from_units(100).unwrap(),
            attributes: vec![AttributeValue {
                variant_id,
                attribute_id: size,
                value: "Small".to_string(),
            }],
        };

        assert_eq!(variant.attribute(size), Some("Small"));
        assert_eq!(variant.attribute(AttributeId::new()), None);
    }

    #[test]
    fn detail_lookups_go_through_entity_ids() {
        let product_id = ProductId::new();
        let variant = Variant {
            id: VariantId::new(),
            product_id,
            price: Price::from_units(5).unwrap(),
            attributes: vec![],
        };
        let now = chrono::Utc::now();
        let detail = ProductDetail {
            product: Product {
                id: product_id,
                name: "Saw".to_string(),
                slug: "saw".to_string(),
                description: None,
                image: None,
                status: ProductStatus::Archived,
                has_variant: false,
                featured: false,
                category_id: CategoryId::new(),
                created_at: now,
                updated_at: now,
            },
            variants: vec![variant.clone()],
        };

        assert_eq!(detail.product.id(), &product_id);
        assert!(!detail.product.is_visible());
        assert_eq!(detail.variant(*variant.id()), Some(&variant));
        assert_eq!(detail.attribute_value_count(), 0);
    }
}
