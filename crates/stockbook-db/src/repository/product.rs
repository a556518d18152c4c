//! # Product Repository
//!
//! Database operations for products - the stock store.
//!
//! ## Compare-and-Deduct
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read-then-write (the race this design removes)              │
//! │     let q = SELECT quantity_on_hand ...;                               │
//! │     UPDATE products SET quantity_on_hand = q - 3 ...;                  │
//! │     Two concurrent sales both read q=1 and both "succeed".             │
//! │                                                                         │
//! │  ✅ CORRECT: guarded single-statement deduct                           │
//! │     UPDATE products                                                    │
//! │     SET quantity_on_hand = quantity_on_hand - 3                        │
//! │     WHERE id = ? AND quantity_on_hand >= 3                             │
//! │     RETURNING quantity_on_hand, unit_price_cents                       │
//! │                                                                         │
//! │  The check and the deduct are one indivisible statement. Zero rows     │
//! │  back means the product is missing or short on stock - and in either   │
//! │  case nothing changed.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use stockbook_core::Product;

/// Outcome of a compare-and-deduct attempt.
///
/// Returned instead of an error so the caller decides which typed failure
/// to surface (the db layer doesn't know about settlement semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductOutcome {
    /// Stock was deducted. Carries the post-deduction quantity and the
    /// catalog price at the moment of deduction (for price snapshots).
    Deducted {
        new_quantity: i64,
        unit_price_cents: i64,
    },
    /// Product exists but has fewer units than requested. Nothing changed.
    Insufficient { available: i64 },
    /// No such product. Nothing changed.
    NotFound,
}

/// Row shape for the deduct/restock RETURNING clause.
#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    quantity_on_hand: i64,
    unit_price_cents: i64,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, name, description,
                unit_price_cents, quantity_on_hand,
                created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists all products sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, name, description,
                unit_price_cents, quantity_on_hand,
                created_at, updated_at
            FROM products
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description,
                unit_price_cents, quantity_on_hand,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(product.quantity_on_hand)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a product's catalog fields (name, description, price).
    ///
    /// ## Note
    /// Deliberately does NOT touch `quantity_on_hand`: stock only moves
    /// through [`ProductRepository::try_deduct`] and
    /// [`ProductRepository::restock`], never via blind writes.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                unit_price_cents = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Deletes a product row.
    ///
    /// Invoice lines keep their product_id and frozen price, so history
    /// survives the delete.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Atomically deducts stock if enough is on hand.
    ///
    /// Standalone (auto-commit) variant of [`Self::deduct_in_tx`] for
    /// single-product deductions outside a settlement.
    pub async fn try_deduct(&self, id: &str, amount: i64) -> DbResult<DeductOutcome> {
        let mut conn = self.pool.acquire().await?;
        Self::deduct_in_tx(&mut conn, id, amount).await
    }

    /// Atomically deducts stock inside an existing transaction.
    ///
    /// The availability check and the deduction are a single guarded UPDATE,
    /// so no interleaving of concurrent deducts/restocks can drive
    /// `quantity_on_hand` negative.
    ///
    /// ## Arguments
    /// * `conn` - Transaction connection (all lines of one settlement share it)
    /// * `id` - Product ID
    /// * `amount` - Units to deduct (must be positive, validated upstream)
    pub async fn deduct_in_tx(
        conn: &mut SqliteConnection,
        id: &str,
        amount: i64,
    ) -> DbResult<DeductOutcome> {
        debug!(id = %id, amount = %amount, "Deducting stock");

        let now = Utc::now();

        let row = sqlx::query_as::<_, StockRow>(
            r#"
            UPDATE products
            SET
                quantity_on_hand = quantity_on_hand - ?2,
                updated_at = ?3
            WHERE id = ?1 AND quantity_on_hand >= ?2
            RETURNING quantity_on_hand, unit_price_cents
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = row {
            return Ok(DeductOutcome::Deducted {
                new_quantity: row.quantity_on_hand,
                unit_price_cents: row.unit_price_cents,
            });
        }

        // Zero rows: distinguish "missing" from "short on stock".
        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity_on_hand FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        match available {
            Some(available) => Ok(DeductOutcome::Insufficient { available }),
            None => Ok(DeductOutcome::NotFound),
        }
    }

    /// Reads the current catalog price inside a transaction.
    ///
    /// Used by reprice flows that need a fresh price snapshot for lines
    /// whose stock did not move (so no RETURNING row carried the price).
    pub async fn catalog_price_in_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<i64>> {
        let price: Option<i64> =
            sqlx::query_scalar("SELECT unit_price_cents FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        Ok(price)
    }

    /// Increases stock. No upper bound is enforced.
    ///
    /// ## Returns
    /// The new quantity on hand.
    pub async fn restock(&self, id: &str, amount: i64) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::restock_in_tx(&mut conn, id, amount).await
    }

    /// Increases stock inside an existing transaction.
    pub async fn restock_in_tx(
        conn: &mut SqliteConnection,
        id: &str,
        amount: i64,
    ) -> DbResult<i64> {
        debug!(id = %id, amount = %amount, "Restocking");

        let now = Utc::now();

        let new_quantity: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET
                quantity_on_hand = quantity_on_hand + ?2,
                updated_at = ?3
            WHERE id = ?1
            RETURNING quantity_on_hand
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        new_quantity.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
