//! Postgres-backed catalog store.
//!
//! Each [`PostgresTx`] wraps one `sqlx` transaction; dropping it without
//! committing rolls back on the server. Constraint enforcement (unique slugs
//! and attribute names, foreign keys, one value per variant and attribute)
//! lives in the schema, see `migrations/0001_catalog.sql`. Errors are mapped
//! with [`map_sqlx_error`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use storefront_catalog::{Attribute, AttributeValue, Category, Product, ProductFields, ProductStatus, Variant};
use storefront_core::{AttributeId, CategoryId, Price, ProductId, VariantId};

use super::r#trait::{CatalogStore, CatalogTx};
use crate::config::{CatalogConfig, ENV_DATABASE_URL};
use crate::error::{StoreError, map_sqlx_error};

const SCHEMA: &str = include_str!("../../migrations/0001_catalog.sql");

const PRODUCT_COLUMNS: &str = "id, name, slug, description, image, status, has_variant, featured, category_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool from `DATABASE_URL` / `STOREFRONT_DB_MAX_CONNECTIONS`.
    pub async fn connect(config: &CatalogConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::backend(format!("{ENV_DATABASE_URL} is not set")))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self::new(pool))
    }

    /// Create the catalog tables if they are missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTx { tx })
    }
}

pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CatalogTx for PostgresTx {
    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn find_category(&mut self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query("SELECT id, name, slug, parent_id FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_category", e))?;

        row.map(|row| {
            CategoryRow::from_row(&row)
                .map(Category::from)
                .map_err(|e| StoreError::backend(format!("failed to deserialize category row: {e}")))
        })
        .transpose()
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name, slug, parent_id) VALUES ($1, $2, $3, $4)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(&category.slug)
            .bind(category.parent_id.map(Uuid::from))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id, slug = %product.slug), err)]
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, slug, description, image, status,
                has_variant, featured, category_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(&product.image)
        .bind(product.status.as_str())
        .bind(product.has_variant)
        .bind(product.featured)
        .bind(product.category_id.as_uuid())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_product", e))?;

        row.map(|row| product_from_row(&row)).transpose()
    }

    #[instrument(skip(self, fields), fields(product_id = %id), err)]
    async fn update_product(&mut self, id: ProductId, fields: &ProductFields) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET name = $2,
                description = $3,
                image = $4,
                status = $5,
                category_id = $6,
                has_variant = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.image)
        .bind(fields.status.as_str())
        .bind(fields.category_id.as_uuid())
        .bind(fields.has_variant)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        match row {
            Some(row) => product_from_row(&row),
            None => Err(StoreError::not_found(format!("product {id}"))),
        }
    }

    #[instrument(skip(self), fields(product_id = %id, status = status.as_str()), err)]
    async fn set_product_status(&mut self, id: ProductId, status: ProductStatus) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE products SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("set_product_status", e))?;

        match row {
            Some(row) => product_from_row(&row),
            None => Err(StoreError::not_found(format!("product {id}"))),
        }
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn set_product_featured(&mut self, id: ProductId, featured: bool) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE products SET featured = $2, updated_at = NOW() WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(featured)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("set_product_featured", e))?;

        match row {
            Some(row) => product_from_row(&row),
            None => Err(StoreError::not_found(format!("product {id}"))),
        }
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        // Variants and their attribute values go with the product (ON DELETE CASCADE).
        let row = sqlx::query(&format!("DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;

        row.map(|row| product_from_row(&row)).transpose()
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn list_variants(&mut self, product_id: ProductId) -> Result<Vec<Variant>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, product_id, price FROM variants WHERE product_id = $1 ORDER BY created_at, id",
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_variants", e))?;

        let mut variants = Vec::with_capacity(rows.len());
        for row in rows {
            let variant_row = VariantRow::from_row(&row)
                .map_err(|e| StoreError::backend(format!("failed to deserialize variant row: {e}")))?;
            variants.push(variant_row.into_variant()?);
        }

        if variants.is_empty() {
            return Ok(variants);
        }

        let ids: Vec<Uuid> = variants.iter().map(|v| *v.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT variant_id, attribute_id, value
            FROM attribute_values
            WHERE variant_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_attribute_values", e))?;

        for row in rows {
            let value: AttributeValue = AttributeValueRow::from_row(&row)
                .map_err(|e| StoreError::backend(format!("failed to deserialize attribute value row: {e}")))?
                .into();
            if let Some(variant) = variants.iter_mut().find(|v| v.id == value.variant_id) {
                variant.attributes.push(value);
            }
        }

        Ok(variants)
    }

    #[instrument(skip(self, ids), fields(product_id = %product_id, count = ids.len()), err)]
    async fn delete_variants(&mut self, product_id: ProductId, ids: &[VariantId]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM variants WHERE product_id = $1 AND id = ANY($2)")
            .bind(product_id.as_uuid())
            .bind(&ids)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_variants", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(variant_id = %id, product_id = %product_id), err)]
    async fn insert_variant(&mut self, id: VariantId, product_id: ProductId, price: Price) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO variants (id, product_id, price) VALUES ($1, $2, $3)")
            .bind(id.as_uuid())
            .bind(product_id.as_uuid())
            .bind(price.amount())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_variant", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(variant_id = %id), err)]
    async fn update_variant_price(&mut self, id: VariantId, price: Price) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE variants SET price = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(price.amount())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_variant_price", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("variant {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, attribute_ids), fields(variant_id = %variant_id, count = attribute_ids.len()), err)]
    async fn delete_attribute_values(
        &mut self,
        variant_id: VariantId,
        attribute_ids: &[AttributeId],
    ) -> Result<u64, StoreError> {
        if attribute_ids.is_empty() {
            return Ok(0);
        }

        let attribute_ids: Vec<Uuid> = attribute_ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM attribute_values WHERE variant_id = $1 AND attribute_id = ANY($2)")
            .bind(variant_id.as_uuid())
            .bind(&attribute_ids)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_attribute_values", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, values), fields(count = values.len()), err)]
    async fn insert_attribute_values(&mut self, values: &[AttributeValue]) -> Result<u64, StoreError> {
        if values.is_empty() {
            return Ok(0);
        }

        let variant_ids: Vec<Uuid> = values.iter().map(|v| *v.variant_id.as_uuid()).collect();
        let attribute_ids: Vec<Uuid> = values.iter().map(|v| *v.attribute_id.as_uuid()).collect();
        let texts: Vec<String> = values.iter().map(|v| v.value.clone()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO attribute_values (variant_id, attribute_id, value)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::text[])
            ON CONFLICT (variant_id, attribute_id) DO NOTHING
            "#,
        )
        .bind(&variant_ids)
        .bind(&attribute_ids)
        .bind(&texts)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_attribute_values", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, attribute), fields(attribute_id = %attribute.id, name = %attribute.name), err)]
    async fn insert_attribute(&mut self, attribute: &Attribute) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO attributes (id, name) VALUES ($1, $2)")
            .bind(attribute.id.as_uuid())
            .bind(&attribute.name)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_attribute", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_attributes(&mut self) -> Result<Vec<Attribute>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM attributes ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_attributes", e))?;

        let mut attributes = Vec::with_capacity(rows.len());
        for row in rows {
            let attribute_row = AttributeRow::from_row(&row)
                .map_err(|e| StoreError::backend(format!("failed to deserialize attribute row: {e}")))?;
            attributes.push(Attribute {
                id: AttributeId::from_uuid(attribute_row.id),
                name: attribute_row.name,
            });
        }
        Ok(attributes)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    parent_id: Option<Uuid>,
}

impl<'r> FromRow<'r, PgRow> for CategoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CategoryRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            parent_id: row.try_get("parent_id")?,
        })
    }
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: CategoryId::from_uuid(row.id),
            name: row.name,
            slug: row.slug,
            parent_id: row.parent_id.map(CategoryId::from_uuid),
        }
    }
}

struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    image: Option<String>,
    status: String,
    has_variant: bool,
    featured: bool,
    category_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            image: row.try_get("image")?,
            status: row.try_get("status")?,
            has_variant: row.try_get("has_variant")?,
            featured: row.try_get("featured")?,
            category_id: row.try_get("category_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let row = ProductRow::from_row(row)
        .map_err(|e| StoreError::backend(format!("failed to deserialize product row: {e}")))?;
    let status: ProductStatus = row
        .status
        .parse()
        .map_err(|e| StoreError::backend(format!("product {}: {e}", row.id)))?;

    Ok(Product {
        id: ProductId::from_uuid(row.id),
        name: row.name,
        slug: row.slug,
        description: row.description,
        image: row.image,
        status,
        has_variant: row.has_variant,
        featured: row.featured,
        category_id: CategoryId::from_uuid(row.category_id),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

struct VariantRow {
    id: Uuid,
    product_id: Uuid,
    price: Decimal,
}

impl<'r> FromRow<'r, PgRow> for VariantRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(VariantRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            price: row.try_get("price")?,
        })
    }
}

impl VariantRow {
    fn into_variant(self) -> Result<Variant, StoreError> {
        let price = Price::new(self.price).map_err(|e| StoreError::backend(format!("variant {}: {e}", self.id)))?;
        Ok(Variant {
            id: VariantId::from_uuid(self.id),
            product_id: ProductId::from_uuid(self.product_id),
            price,
            attributes: Vec::new(),
        })
    }
}

struct AttributeValueRow {
    variant_id: Uuid,
    attribute_id: Uuid,
    value: String,
}

impl<'r> FromRow<'r, PgRow> for AttributeValueRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AttributeValueRow {
            variant_id: row.try_get("variant_id")?,
            attribute_id: row.try_get("attribute_id")?,
            value: row.try_get("value")?,
        })
    }
}

impl From<AttributeValueRow> for AttributeValue {
    fn from(row: AttributeValueRow) -> Self {
        AttributeValue {
            variant_id: VariantId::from_uuid(row.variant_id),
            attribute_id: AttributeId::from_uuid(row.attribute_id),
            value: row.value,
        }
    }
}

struct AttributeRow {
    id: Uuid,
    name: String,
}

impl<'r> FromRow<'r, PgRow> for AttributeRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AttributeRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}
