use async_trait::async_trait;

use storefront_catalog::{Attribute, AttributeValue, Category, Product, ProductFields, ProductStatus, Variant};
use storefront_core::{AttributeId, CategoryId, Price, ProductId, VariantId};

use crate::error::StoreError;

/// Handle to catalog storage. Every read and write goes through a transaction
/// opened here.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    type Tx: CatalogTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One open transaction.
///
/// Dropping the value without calling [`CatalogTx::commit`] discards every
/// write made through it.
#[async_trait]
pub trait CatalogTx: Send + Sized {
    async fn find_category(&mut self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError>;

    /// Fails with `ConstraintViolation` on a taken slug or a missing category.
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Overwrite the scalar fields and bump `updated_at`. The slug is never
    /// touched.
    async fn update_product(&mut self, id: ProductId, fields: &ProductFields) -> Result<Product, StoreError>;

    async fn set_product_status(&mut self, id: ProductId, status: ProductStatus) -> Result<Product, StoreError>;

    async fn set_product_featured(&mut self, id: ProductId, featured: bool) -> Result<Product, StoreError>;

    /// Remove a product with its variants and their attribute values.
    async fn delete_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Variants of a product with their attribute values, oldest first.
    async fn list_variants(&mut self, product_id: ProductId) -> Result<Vec<Variant>, StoreError>;

    /// Delete the listed variants of `product_id`; returns how many rows went.
    async fn delete_variants(&mut self, product_id: ProductId, ids: &[VariantId]) -> Result<u64, StoreError>;

    async fn insert_variant(&mut self, id: VariantId, product_id: ProductId, price: Price) -> Result<(), StoreError>;

    async fn update_variant_price(&mut self, id: VariantId, price: Price) -> Result<(), StoreError>;

    async fn delete_attribute_values(
        &mut self,
        variant_id: VariantId,
        attribute_ids: &[AttributeId],
    ) -> Result<u64, StoreError>;

    /// Insert values, skipping any `(variant, attribute)` pair that already
    /// has a row. Returns the number of rows actually written.
    async fn insert_attribute_values(&mut self, values: &[AttributeValue]) -> Result<u64, StoreError>;

    /// Fails with `ConstraintViolation` when the name is taken.
    async fn insert_attribute(&mut self, attribute: &Attribute) -> Result<(), StoreError>;

    /// Attribute dictionary ordered by name.
    async fn list_attributes(&mut self) -> Result<Vec<Attribute>, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}
