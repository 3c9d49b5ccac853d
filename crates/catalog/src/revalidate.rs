//! Logical view keys affected by catalog mutations.
//!
//! The engine only names the views; how a consumer invalidates them (path
//! revalidation, CDN purge, ...) is its own business.

use serde::{Deserialize, Serialize};

use storefront_core::{CategoryId, ProductId};

use crate::product::Category;

/// A cached view that may render catalog data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum ViewKey {
    Home,
    /// Top-level listing.
    CategoryListing { category: CategoryId },
    /// Listing of a child category below its parent's page.
    SubCategoryListing { parent: CategoryId, category: CategoryId },
    ProductDetail { slug: String },
    AdminProductList,
    AdminProductDetail { product: ProductId },
}

impl core::fmt::Display for ViewKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ViewKey::Home => write!(f, "home"),
            ViewKey::CategoryListing { category } => write!(f, "category:{category}"),
            ViewKey::SubCategoryListing { parent, category } => write!(f, "category:{parent}/{category}"),
            ViewKey::ProductDetail { slug } => write!(f, "product:{slug}"),
            ViewKey::AdminProductList => write!(f, "admin:products"),
            ViewKey::AdminProductDetail { product } => write!(f, "admin:product:{product}"),
        }
    }
}

/// Why a revalidation was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevalidationReason {
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    StatusChanged,
    FeaturedChanged,
}

/// Message published once a mutation's atomic phase committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revalidation {
    pub product_id: ProductId,
    pub reason: RevalidationReason,
    pub keys: Vec<ViewKey>,
}

/// Every view that can show `product`.
///
/// `categories` usually holds the product's category; pass the previous one
/// too when a product moved so both listings refresh. A child category
/// refreshes its parent's listing plus its own sub-category listing; a root
/// category has no sub-category listing. Duplicates are skipped.
pub fn product_view_keys<'a>(
    product_id: ProductId,
    slug: &str,
    categories: impl IntoIterator<Item = &'a Category>,
) -> Vec<ViewKey> {
    let mut keys = vec![ViewKey::Home];
    let mut push = |key: ViewKey| {
        if !keys.contains(&key) {
            keys.push(key);
        }
    };

    for category in categories {
        match category.parent_id {
            Some(parent) => {
                push(ViewKey::CategoryListing { category: parent });
                push(ViewKey::SubCategoryListing {
                    parent,
                    category: category.id,
                });
            }
            None => push(ViewKey::CategoryListing { category: category.id }),
        }
    }

    keys.push(ViewKey::ProductDetail {
        slug: slug.to_string(),
    });
    keys.push(ViewKey::AdminProductList);
    keys.push(ViewKey::AdminProductDetail {
        product: product_id,
    });
    keys
}
