//! In-memory catalog store.
//!
//! Intended for tests/dev. Transactions are serialized: `begin` takes the
//! store lock and works on a private copy of the state, `commit` swaps the copy
//! in. Dropping a transaction releases the lock and throws the copy away.
//!
//! Faults can be injected per operation to exercise rollback and timeout paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use storefront_catalog::{Attribute, AttributeValue, Category, Product, ProductFields, ProductStatus, Variant};
use storefront_core::{AttributeId, CategoryId, Price, ProductId, VariantId};

use super::r#trait::{CatalogStore, CatalogTx};
use crate::error::StoreError;

/// Store operations a fault can be attached to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Begin,
    Commit,
    FindCategory,
    InsertCategory,
    InsertProduct,
    FindProduct,
    UpdateProduct,
    SetProductStatus,
    SetProductFeatured,
    DeleteProduct,
    ListVariants,
    DeleteVariants,
    InsertVariant,
    UpdateVariantPrice,
    DeleteAttributeValues,
    InsertAttributeValues,
    InsertAttribute,
    ListAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Fail(StoreError),
    /// Sleep before running the operation.
    Delay(Duration),
}

#[derive(Debug)]
struct FaultRule {
    op: Operation,
    /// Absolute call count of `op` that trips the fault.
    occurrence: usize,
    fault: Fault,
}

#[derive(Debug, Default)]
struct FaultPlan {
    rules: Vec<FaultRule>,
    seen: HashMap<Operation, usize>,
}

impl FaultPlan {
    fn observe(&mut self, op: Operation) -> Option<Fault> {
        let count = self.seen.entry(op).or_insert(0);
        *count += 1;
        let count = *count;

        self.rules
            .iter()
            .find(|rule| rule.op == op && rule.occurrence == count)
            .map(|rule| rule.fault.clone())
    }
}

#[derive(Debug, Clone)]
struct VariantRow {
    id: VariantId,
    product_id: ProductId,
    price: Price,
}

#[derive(Debug, Clone)]
struct ValueRow {
    row_id: Uuid,
    value: AttributeValue,
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    /// Insertion order doubles as creation order.
    variants: Vec<VariantRow>,
    values: Vec<ValueRow>,
    attributes: Vec<Attribute>,
}

impl CatalogState {
    fn product_mut(&mut self, id: ProductId) -> Result<&mut Product, StoreError> {
        self.products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("product {id}")))
    }

    fn remove_variants(&mut self, doomed: impl Fn(&VariantRow) -> bool) -> u64 {
        let before = self.variants.len();
        self.variants.retain(|row| !doomed(row));
        let removed = (before - self.variants.len()) as u64;

        let variants = &self.variants;
        self.values
            .retain(|row| variants.iter().any(|v| v.id == row.value.variant_id));
        removed
    }

    fn variant(&self, row: &VariantRow) -> Variant {
        Variant {
            id: row.id,
            product_id: row.product_id,
            price: row.price,
            attributes: self
                .values
                .iter()
                .filter(|v| v.value.variant_id == row.id)
                .map(|v| v.value.clone())
                .collect(),
        }
    }
}

/// Shared in-memory catalog. Clones point at the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogStore {
    state: Arc<AsyncMutex<CatalogState>>,
    faults: Arc<Mutex<FaultPlan>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger `fault` on the `occurrence`-th call (1-based) of `op` made
    /// after this point, counted across all transactions of this store.
    pub fn inject(&self, op: Operation, occurrence: usize, fault: Fault) {
        let mut plan = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let already = plan.seen.get(&op).copied().unwrap_or(0);
        plan.rules.push(FaultRule {
            op,
            occurrence: already + occurrence,
            fault,
        });
    }

    /// Row identity of a committed attribute value.
    pub async fn attribute_value_row(&self, variant_id: VariantId, attribute_id: AttributeId) -> Option<Uuid> {
        let state = self.state.lock().await;
        state
            .values
            .iter()
            .find(|row| row.value.variant_id == variant_id && row.value.attribute_id == attribute_id)
            .map(|row| row.row_id)
    }

    /// Committed variant rows across all products.
    pub async fn variant_count(&self) -> usize {
        self.state.lock().await.variants.len()
    }

    /// Committed attribute value rows across all variants.
    pub async fn attribute_value_count(&self) -> usize {
        self.state.lock().await.values.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, StoreError> {
        trip(&self.faults, Operation::Begin).await?;

        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx {
            guard,
            working,
            faults: self.faults.clone(),
        })
    }
}

/// Open in-memory transaction. Holds the store lock until dropped.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<CatalogState>,
    working: CatalogState,
    faults: Arc<Mutex<FaultPlan>>,
}

impl std::fmt::Debug for InMemoryTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTx")
            .field("products", &self.working.products.len())
            .field("variants", &self.working.variants.len())
            .finish_non_exhaustive()
    }
}

async fn trip(faults: &Mutex<FaultPlan>, op: Operation) -> Result<(), StoreError> {
    let fault = faults.lock().unwrap_or_else(PoisonError::into_inner).observe(op);
    match fault {
        Some(Fault::Fail(err)) => Err(err),
        Some(Fault::Delay(pause)) => {
            tokio::time::sleep(pause).await;
            Ok(())
        }
        None => Ok(()),
    }
}

#[async_trait]
impl CatalogTx for InMemoryTx {
    async fn find_category(&mut self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        trip(&self.faults, Operation::FindCategory).await?;
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError> {
        trip(&self.faults, Operation::InsertCategory).await?;

        let state = &mut self.working;
        if state.categories.contains_key(&category.id) {
            return Err(StoreError::constraint(format!("category {} already exists", category.id)));
        }
        if state.categories.values().any(|c| c.slug == category.slug) {
            return Err(StoreError::constraint(format!(
                "categories.slug '{}' already exists",
                category.slug
            )));
        }
        if let Some(parent) = category.parent_id {
            if !state.categories.contains_key(&parent) {
                return Err(StoreError::constraint(format!("parent category {parent} does not exist")));
            }
        }
        state.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        trip(&self.faults, Operation::InsertProduct).await?;

        let state = &mut self.working;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::constraint(format!("product {} already exists", product.id)));
        }
        if !state.categories.contains_key(&product.category_id) {
            return Err(StoreError::constraint(format!(
                "category {} does not exist",
                product.category_id
            )));
        }
        if state.products.values().any(|p| p.slug == product.slug) {
            return Err(StoreError::constraint(format!(
                "products.slug '{}' already exists",
                product.slug
            )));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        trip(&self.faults, Operation::FindProduct).await?;
        Ok(self.working.products.get(&id).cloned())
    }

    async fn update_product(&mut self, id: ProductId, fields: &ProductFields) -> Result<Product, StoreError> {
        trip(&self.faults, Operation::UpdateProduct).await?;

        if !self.working.categories.contains_key(&fields.category_id) {
            return Err(StoreError::constraint(format!(
                "category {} does not exist",
                fields.category_id
            )));
        }

        let product = self.working.product_mut(id)?;
        product.name = fields.name.clone();
        product.description = fields.description.clone();
        product.image = fields.image.clone();
        product.status = fields.status;
        product.category_id = fields.category_id;
        product.has_variant = fields.has_variant;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn set_product_status(&mut self, id: ProductId, status: ProductStatus) -> Result<Product, StoreError> {
        trip(&self.faults, Operation::SetProductStatus).await?;

        let product = self.working.product_mut(id)?;
        product.status = status;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn set_product_featured(&mut self, id: ProductId, featured: bool) -> Result<Product, StoreError> {
        trip(&self.faults, Operation::SetProductFeatured).await?;

        let product = self.working.product_mut(id)?;
        product.featured = featured;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        trip(&self.faults, Operation::DeleteProduct).await?;

        let removed = self.working.products.remove(&id);
        if removed.is_some() {
            self.working.remove_variants(|row| row.product_id == id);
        }
        Ok(removed)
    }

    async fn list_variants(&mut self, product_id: ProductId) -> Result<Vec<Variant>, StoreError> {
        trip(&self.faults, Operation::ListVariants).await?;

        let state = &self.working;
        Ok(state
            .variants
            .iter()
            .filter(|row| row.product_id == product_id)
            .map(|row| state.variant(row))
            .collect())
    }

    async fn delete_variants(&mut self, product_id: ProductId, ids: &[VariantId]) -> Result<u64, StoreError> {
        trip(&self.faults, Operation::DeleteVariants).await?;

        if ids.is_empty() {
            return Ok(0);
        }
        Ok(self
            .working
            .remove_variants(|row| row.product_id == product_id && ids.contains(&row.id)))
    }

    async fn insert_variant(&mut self, id: VariantId, product_id: ProductId, price: Price) -> Result<(), StoreError> {
        trip(&self.faults, Operation::InsertVariant).await?;

        let state = &mut self.working;
        if !state.products.contains_key(&product_id) {
            return Err(StoreError::constraint(format!("product {product_id} does not exist")));
        }
        if state.variants.iter().any(|row| row.id == id) {
            return Err(StoreError::constraint(format!("variant {id} already exists")));
        }
        state.variants.push(VariantRow { id, product_id, price });
        Ok(())
    }

    async fn update_variant_price(&mut self, id: VariantId, price: Price) -> Result<(), StoreError> {
        trip(&self.faults, Operation::UpdateVariantPrice).await?;

        let row = self
            .working
            .variants
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| StoreError::not_found(format!("variant {id}")))?;
        row.price = price;
        Ok(())
    }

    async fn delete_attribute_values(
        &mut self,
        variant_id: VariantId,
        attribute_ids: &[AttributeId],
    ) -> Result<u64, StoreError> {
        trip(&self.faults, Operation::DeleteAttributeValues).await?;

        let values = &mut self.working.values;
        let before = values.len();
        values.retain(|row| {
            !(row.value.variant_id == variant_id && attribute_ids.contains(&row.value.attribute_id))
        });
        Ok((before - values.len()) as u64)
    }

    async fn insert_attribute_values(&mut self, values: &[AttributeValue]) -> Result<u64, StoreError> {
        trip(&self.faults, Operation::InsertAttributeValues).await?;

        let state = &mut self.working;
        let mut inserted = 0;
        for value in values {
            if !state.variants.iter().any(|row| row.id == value.variant_id) {
                return Err(StoreError::constraint(format!("variant {} does not exist", value.variant_id)));
            }
            if !state.attributes.iter().any(|a| a.id == value.attribute_id) {
                return Err(StoreError::constraint(format!(
                    "attribute {} does not exist",
                    value.attribute_id
                )));
            }
            let taken = state
                .values
                .iter()
                .any(|row| row.value.variant_id == value.variant_id && row.value.attribute_id == value.attribute_id);
            if taken {
                continue;
            }
            state.values.push(ValueRow {
                row_id: Uuid::now_v7(),
                value: value.clone(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn insert_attribute(&mut self, attribute: &Attribute) -> Result<(), StoreError> {
        trip(&self.faults, Operation::InsertAttribute).await?;

        let attributes = &mut self.working.attributes;
        if attributes.iter().any(|a| a.id == attribute.id) {
            return Err(StoreError::constraint(format!("attribute {} already exists", attribute.id)));
        }
        if attributes.iter().any(|a| a.name == attribute.name) {
            return Err(StoreError::constraint(format!(
                "attributes.name '{}' already exists",
                attribute.name
            )));
        }
        attributes.push(attribute.clone());
        Ok(())
    }

    async fn list_attributes(&mut self) -> Result<Vec<Attribute>, StoreError> {
        trip(&self.faults, Operation::ListAttributes).await?;

        let mut attributes = self.working.attributes.clone();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(attributes)
    }

    async fn commit(self) -> Result<(), StoreError> {
        trip(&self.faults, Operation::Commit).await?;

        let InMemoryTx { mut guard, working, .. } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
