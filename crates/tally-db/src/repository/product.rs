//! # Product Repository
//!
//! Products carry the selling price and the (optional) cost price that the
//! reconciliation engine joins onto every stock row.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::validation::{validate_name, validate_price_cents, validate_sku};
use tally_core::Product;

const PRODUCT_COLUMNS: &str =
    "id, sku, name, price_cents, cost_price_cents, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Validates and inserts a new product with a generated id.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let latte = db.products().create("LATTE", "Latte", 450, Some(150)).await?;
    /// ```
    pub async fn create(
        &self,
        sku: &str,
        name: &str,
        price_cents: i64,
        cost_price_cents: Option<i64>,
    ) -> DbResult<Product> {
        validate_sku(sku)?;
        validate_name("name", name)?;
        validate_price_cents("price", price_cents)?;
        if let Some(cost) = cost_price_cents {
            validate_price_cents("cost price", cost)?;
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.trim().to_string(),
            name: name.trim().to_string(),
            price_cents,
            cost_price_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.insert(&product).await
    }

    /// Inserts a product whose id was generated by the caller.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price_cents, cost_price_cents,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.cost_price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(product.clone()),
            Err(e) => match DbError::from(e) {
                DbError::UniqueViolation { .. } => Err(DbError::duplicate("sku", &product.sku)),
                other => Err(other),
            },
        }
    }

    /// Gets a product by id, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists active products ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name, sku"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed active products");
        Ok(products)
    }

    /// Updates price and cost and returns the updated product. History rows
    /// pick up the new figures on the next read because prices are joined,
    /// not copied.
    pub async fn update_prices(
        &self,
        id: &str,
        price_cents: i64,
        cost_price_cents: Option<i64>,
    ) -> DbResult<Product> {
        validate_price_cents("price", price_cents)?;
        if let Some(cost) = cost_price_cents {
            validate_price_cents("cost price", cost)?;
        }

        let result = sqlx::query(
            "UPDATE products SET price_cents = ?1, cost_price_cents = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(price_cents)
        .bind(cost_price_cents)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id = %id, price_cents, cost_price_cents = ?cost_price_cents, "Product prices updated");
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
