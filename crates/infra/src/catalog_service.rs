//! Catalog reconciliation engine.
//!
//! Every product mutation runs in two phases:
//!
//! ```text
//! payload
//!   ↓
//! normalize + diff against persisted variants
//!   ↓
//! Phase 1: one transaction (product row, variant deletions), hard budget
//!   ↓ commit
//! publish Revalidation
//!   ↓
//! Phase 2: one transaction per variant update/create, sequential, own budget
//!   ↓
//! MutationReport
//! ```
//!
//! A Phase 1 failure fails the call and writes nothing. A Phase 2 failure is
//! logged and recorded in the report, but leaves `success` untouched and never
//! rolls back Phase 1 or sibling items.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use storefront_catalog::{
    Attribute, AttributeInput, AttributeValue, Category, NewVariant, PlaceholderPattern, Product, ProductDetail,
    ProductFields, ProductPayload, ProductStatus, Revalidation, RevalidationReason, UpdateTarget, Variant,
    VariantChange, VariantDiff, VariantInput, VariantUpdate, ViewKey, dedupe_attributes, diff_variants,
    plan_attribute_changes, product_view_keys, slugify,
};
use storefront_core::{AttributeId, CategoryId, DomainError, ProductId, VariantId};
use storefront_events::EventBus;

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::mutation::{AppliedVariant, AttributeResult, MutationReport, MutationResult, VariantFailure, VariantOutcome};
use crate::store::{CatalogStore, CatalogTx};

const PRODUCT_SCOPE: &str = "product transaction";
const VARIANT_SCOPE: &str = "variant transaction";

pub const PRODUCT_CREATED: &str = "Product created successfully";
pub const PRODUCT_UPDATED: &str = "Product updated successfully";
pub const PRODUCT_DELETED: &str = "Product deleted successfully";
pub const ATTRIBUTE_CREATED: &str = "Attribute created successfully";

/// What Phase 1 of an update hands to Phase 2.
struct CommittedUpdate {
    product: Product,
    /// Previous and current category, for revalidation.
    categories: Vec<Category>,
    persisted: Vec<Variant>,
    diff: VariantDiff,
}

/// Entry points for catalog mutations.
///
/// - `S`: storage backend
/// - `B`: bus receiving [`Revalidation`] messages after each commit
pub struct CatalogService<S, B> {
    store: S,
    bus: B,
    config: CatalogConfig,
    placeholder: PlaceholderPattern,
}

impl<S, B> CatalogService<S, B>
where
    S: CatalogStore,
    B: EventBus<Revalidation>,
{
    pub fn new(store: S, bus: B, config: CatalogConfig) -> Self {
        let placeholder = config.placeholder();
        Self {
            store,
            bus,
            config,
            placeholder,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Insert a product, then create its variants one by one.
    #[instrument(skip(self, payload), fields(name = %payload.name, variants = payload.variants.len()))]
    pub async fn create_product(&self, payload: ProductPayload) -> MutationReport {
        match self.try_create_product(payload).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, kind = err.kind(), "product creation failed");
                MutationReport::failed(&err)
            }
        }
    }

    /// Reconcile a product and its variants with `payload`.
    #[instrument(skip(self, payload), fields(product_id = %id, variants = payload.variants.len()))]
    pub async fn update_product(&self, id: ProductId, payload: ProductPayload) -> MutationReport {
        match self.try_update_product(id, payload).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, kind = err.kind(), "product update failed");
                MutationReport::failed(&err)
            }
        }
    }

    /// Hard delete; variants and attribute values go with the product.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> MutationResult {
        let budget = self.config.phase_one_budget;
        match within(PRODUCT_SCOPE, budget, self.remove_product(id)).await {
            Ok((product, categories)) => {
                info!(slug = %product.slug, "product deleted");
                self.announce(&product, &categories, RevalidationReason::ProductDeleted);
                MutationResult::ok(PRODUCT_DELETED)
            }
            Err(err) => {
                error!(error = %err, kind = err.kind(), "product deletion failed");
                MutationResult::failed(&err)
            }
        }
    }

    #[instrument(skip(self), fields(product_id = %id, status = status.as_str()), err)]
    pub async fn set_product_status(&self, id: ProductId, status: ProductStatus) -> Result<(), CatalogError> {
        let budget = self.config.phase_one_budget;
        let (product, categories) = within(PRODUCT_SCOPE, budget, async {
            let mut tx = self.store.begin().await?;
            let product = tx.set_product_status(id, status).await?;
            let categories = listing_categories(&mut tx, &[product.category_id]).await?;
            tx.commit().await?;
            Ok::<_, CatalogError>((product, categories))
        })
        .await?;

        self.announce(&product, &categories, RevalidationReason::StatusChanged);
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn set_featured(&self, id: ProductId, featured: bool) -> Result<(), CatalogError> {
        let budget = self.config.phase_one_budget;
        let (product, categories) = within(PRODUCT_SCOPE, budget, async {
            let mut tx = self.store.begin().await?;
            let product = tx.set_product_featured(id, featured).await?;
            let categories = listing_categories(&mut tx, &[product.category_id]).await?;
            tx.commit().await?;
            Ok::<_, CatalogError>((product, categories))
        })
        .await?;

        self.announce(&product, &categories, RevalidationReason::FeaturedChanged);
        Ok(())
    }

    /// Add an entry to the attribute dictionary.
    #[instrument(skip(self))]
    pub async fn create_attribute(&self, name: &str) -> AttributeResult {
        match self.try_create_attribute(name).await {
            Ok(attribute) => {
                info!(attribute_id = %attribute.id, "attribute created");
                AttributeResult {
                    result: MutationResult::ok(ATTRIBUTE_CREATED),
                    attribute: Some(attribute),
                }
            }
            Err(err) => {
                error!(error = %err, kind = err.kind(), "attribute creation failed");
                AttributeResult {
                    result: MutationResult::failed(&err),
                    attribute: None,
                }
            }
        }
    }

    /// Seed a category. The slug is derived from the name.
    #[instrument(skip(self), err)]
    pub async fn create_category(&self, name: &str, parent_id: Option<CategoryId>) -> Result<Category, CatalogError> {
        let category = Category {
            id: CategoryId::new(),
            name: name.trim().to_string(),
            slug: usable_slug(name)?,
            parent_id,
        };

        let budget = self.config.phase_one_budget;
        within(PRODUCT_SCOPE, budget, async {
            let mut tx = self.store.begin().await?;
            tx.insert_category(&category).await?;
            tx.commit().await?;
            Ok::<_, CatalogError>(())
        })
        .await?;

        Ok(category)
    }

    /// Committed product with its variants, oldest variant first.
    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, CatalogError> {
        let mut tx = self.store.begin().await?;
        let Some(product) = tx.find_product(id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        let variants = tx.list_variants(id).await?;
        tx.rollback().await?;

        Ok(Some(ProductDetail { product, variants }))
    }

    #[instrument(skip(self), err)]
    pub async fn list_attributes(&self) -> Result<Vec<Attribute>, CatalogError> {
        let mut tx = self.store.begin().await?;
        let attributes = tx.list_attributes().await?;
        tx.rollback().await?;
        Ok(attributes)
    }

    async fn try_create_product(&self, payload: ProductPayload) -> Result<MutationReport, CatalogError> {
        let payload = payload.normalized()?;
        let diff = diff_variants(&[], &payload.variants, &self.placeholder);

        let budget = self.config.phase_one_budget;
        let (product, category) = within(PRODUCT_SCOPE, budget, self.insert_product(&payload)).await?;
        info!(product_id = %product.id, slug = %product.slug, "product committed");

        let revalidated = self.announce(
            &product,
            std::slice::from_ref(&category),
            RevalidationReason::ProductCreated,
        );
        let variants = self.apply_variants(product.id, &[], &diff).await;

        Ok(MutationReport {
            result: MutationResult::ok(PRODUCT_CREATED),
            product_id: Some(product.id),
            variants,
            revalidated,
        })
    }

    async fn try_update_product(&self, id: ProductId, payload: ProductPayload) -> Result<MutationReport, CatalogError> {
        let payload = payload.normalized()?;
        let fields = payload.fields();

        let budget = self.config.phase_one_budget;
        let committed = within(PRODUCT_SCOPE, budget, self.update_product_row(id, &fields, &payload.variants)).await?;
        info!(
            deleted = committed.diff.to_delete.len(),
            updates = committed.diff.to_update.len(),
            creates = committed.diff.to_create.len(),
            "product committed"
        );

        let product = &committed.product;
        let revalidated = self.announce(product, &committed.categories, RevalidationReason::ProductUpdated);
        let variants = self
            .apply_variants(product.id, &committed.persisted, &committed.diff)
            .await;

        Ok(MutationReport {
            result: MutationResult::ok(PRODUCT_UPDATED),
            product_id: Some(product.id),
            variants,
            revalidated,
        })
    }

    async fn try_create_attribute(&self, name: &str) -> Result<Attribute, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("attribute name cannot be empty").into());
        }

        let attribute = Attribute {
            id: AttributeId::new(),
            name: name.to_string(),
        };

        let budget = self.config.phase_one_budget;
        within(PRODUCT_SCOPE, budget, async {
            let mut tx = self.store.begin().await?;
            tx.insert_attribute(&attribute).await?;
            tx.commit().await?;
            Ok::<_, CatalogError>(())
        })
        .await?;

        Ok(attribute)
    }

    /// Phase 1 of a create.
    async fn insert_product(&self, payload: &ProductPayload) -> Result<(Product, Category), CatalogError> {
        let slug = match payload.slug.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(explicit) => usable_slug(explicit)?,
            None => usable_slug(&payload.name)?,
        };

        let mut tx = self.store.begin().await?;
        let category = tx
            .find_category(payload.category)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("category {}", payload.category)))?;

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            name: payload.name.trim().to_string(),
            slug,
            description: payload.description.clone(),
            image: payload.image.clone(),
            status: payload.status,
            has_variant: payload.has_variant,
            featured: false,
            category_id: payload.category,
            created_at: now,
            updated_at: now,
        };
        tx.insert_product(&product).await?;
        tx.commit().await?;

        Ok((product, category))
    }

    /// Phase 1 of an update: product fields and variant deletions.
    async fn update_product_row(
        &self,
        id: ProductId,
        fields: &ProductFields,
        submitted: &[VariantInput],
    ) -> Result<CommittedUpdate, CatalogError> {
        let mut tx = self.store.begin().await?;

        let previous = tx
            .find_product(id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("product {id}")))?;
        let category = tx
            .find_category(fields.category_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("category {}", fields.category_id)))?;
        let mut categories = listing_categories(&mut tx, &[previous.category_id]).await?;
        categories.push(category);

        let persisted = tx.list_variants(id).await?;
        let diff = diff_variants(&persisted, submitted, &self.placeholder);

        let product = tx.update_product(id, fields).await?;
        tx.delete_variants(id, &diff.to_delete).await?;
        tx.commit().await?;

        Ok(CommittedUpdate {
            product,
            categories,
            persisted,
            diff,
        })
    }

    async fn remove_product(&self, id: ProductId) -> Result<(Product, Vec<Category>), CatalogError> {
        let mut tx = self.store.begin().await?;
        let product = tx
            .delete_product(id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("product {id}")))?;
        let categories = listing_categories(&mut tx, &[product.category_id]).await?;
        tx.commit().await?;
        Ok((product, categories))
    }

    /// Phase 2: updates first, then creates, one transaction each.
    ///
    /// Each update is planned against the attribute values left by the
    /// previous committed update of the same variant.
    async fn apply_variants(&self, product_id: ProductId, persisted: &[Variant], diff: &VariantDiff) -> Vec<VariantOutcome> {
        let budget = self.config.item_budget;
        let mut outcomes = Vec::with_capacity(diff.item_count());
        let mut current: HashMap<VariantId, Vec<AttributeValue>> = persisted
            .iter()
            .map(|v| (v.id, v.attributes.clone()))
            .collect();

        for update in &diff.to_update {
            let result = match (&update.target, update.id().and_then(|id| current.get(&id))) {
                (UpdateTarget::Variant(id), Some(values)) => {
                    within(VARIANT_SCOPE, budget, self.update_variant(*id, values, update))
                        .await
                        .map(|()| *id)
                }
                (target, _) => Err(CatalogError::not_found(format!("variant {target}"))),
            };
            if let Ok(id) = &result {
                current.insert(*id, attribute_rows(*id, &dedupe_attributes(&update.attributes)));
            }
            outcomes.push(record(update.change(), result));
        }

        for create in &diff.to_create {
            let id = VariantId::new();
            let result = within(VARIANT_SCOPE, budget, self.create_variant(product_id, id, create))
                .await
                .map(|()| id);
            outcomes.push(record(create.change(), result));
        }

        outcomes
    }

    async fn update_variant(
        &self,
        id: VariantId,
        values: &[AttributeValue],
        update: &VariantUpdate,
    ) -> Result<(), CatalogError> {
        let plan = plan_attribute_changes(values, &update.attributes);

        let mut tx = self.store.begin().await?;
        tx.delete_attribute_values(id, &plan.to_delete).await?;
        tx.insert_attribute_values(&attribute_rows(id, &plan.to_create)).await?;
        tx.update_variant_price(id, update.price).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_variant(&self, product_id: ProductId, id: VariantId, create: &NewVariant) -> Result<(), CatalogError> {
        let attributes = dedupe_attributes(&create.attributes);

        let mut tx = self.store.begin().await?;
        tx.insert_variant(id, product_id, create.price).await?;
        tx.insert_attribute_values(&attribute_rows(id, &attributes)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Publish the views `product` appears in. Failures are logged only.
    fn announce(&self, product: &Product, categories: &[Category], reason: RevalidationReason) -> Vec<ViewKey> {
        let keys = product_view_keys(product.id, &product.slug, categories);
        let message = Revalidation {
            product_id: product.id,
            reason,
            keys: keys.clone(),
        };

        if let Err(err) = self.bus.publish(message) {
            warn!(product_id = %product.id, error = ?err, "revalidation publish failed");
        }
        keys
    }
}

async fn within<T>(
    scope: &'static str,
    budget: Duration,
    work: impl Future<Output = Result<T, CatalogError>>,
) -> Result<T, CatalogError> {
    tokio::time::timeout(budget, work)
        .await
        .map_err(|_| CatalogError::timeout(scope, budget))?
}

/// Categories behind `ids`; ids with no row are skipped.
async fn listing_categories<T: CatalogTx>(tx: &mut T, ids: &[CategoryId]) -> Result<Vec<Category>, CatalogError> {
    let mut categories = Vec::with_capacity(ids.len());
    for &id in ids {
        if let Some(category) = tx.find_category(id).await? {
            categories.push(category);
        }
    }
    Ok(categories)
}

fn record(change: VariantChange, result: Result<VariantId, CatalogError>) -> VariantOutcome {
    match result {
        Ok(id) => Ok(AppliedVariant { id, change }),
        Err(error) => {
            warn!(?change, error = %error, kind = error.kind(), "variant change rolled back");
            Err(VariantFailure { change, error })
        }
    }
}

fn attribute_rows(variant_id: VariantId, inputs: &[AttributeInput]) -> Vec<AttributeValue> {
    inputs
        .iter()
        .map(|input| AttributeValue {
            variant_id,
            attribute_id: input.attribute_id,
            value: input.value.clone(),
        })
        .collect()
}

fn usable_slug(source: &str) -> Result<String, CatalogError> {
    let slug = slugify(source);
    if slug.is_empty() {
        return Err(DomainError::validation(format!("'{source}' does not produce a usable slug")).into());
    }
    Ok(slug)
}
