//! # Invoice Repository
//!
//! Database operations for invoices and their lines - the sales ledger.
//!
//! ## Transaction Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Settlement Writes Share One Transaction                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. UPDATE products SET quantity_on_hand = ... (per line)      │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO invoices (...)                                 │   │
//! │  │                                                                 │   │
//! │  │  3. INSERT INTO invoice_lines (...) (per line)                 │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Stock deduction and invoice durability succeed together      │
//! │           or not at all. A failed insert rolls the deductions back.    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! That is why the mutating operations here are `_in_tx` functions taking a
//! `&mut SqliteConnection`: the settlement engine owns the transaction and
//! threads it through stock and ledger writes.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use stockbook_core::{Invoice, InvoiceLine};

/// One month's summed totals, as returned by the GROUP BY queries.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct MonthSum {
    /// Calendar month 1..=12.
    pub month: i64,
    /// Summed cents for that month.
    pub total_cents: i64,
}

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, date,
    customer_name, customer_email, customer_phone,
    subtotal_cents, discount_cents, total_cents, paid_cents
"#;

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Gets an invoice by ID, with its lines in submission order.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut invoice) = invoice else {
            return Ok(None);
        };

        invoice.lines = self.get_lines(id).await?;
        Ok(Some(invoice))
    }

    /// Gets the lines of an invoice, ordered by line number.
    pub async fn get_lines(&self, invoice_id: &str) -> DbResult<Vec<InvoiceLine>> {
        let lines = sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT id, invoice_id, product_id, line_no, quantity, price_at_sale_cents
            FROM invoice_lines
            WHERE invoice_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Lists all invoices (newest first), lines attached.
    pub async fn list_all(&self) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY date DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.attach_lines(invoices).await
    }

    /// Lists invoices with `date` in `[start, end]` inclusive, lines attached.
    pub async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE date BETWEEN ?1 AND ?2 ORDER BY date"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        self.attach_lines(invoices).await
    }

    /// Fetches lines for a batch of invoices in one query and groups them.
    async fn attach_lines(&self, mut invoices: Vec<Invoice>) -> DbResult<Vec<Invoice>> {
        if invoices.is_empty() {
            return Ok(invoices);
        }

        // One IN query scoped to the fetched invoices, not a full-table scan.
        let placeholders = (1..=invoices.len())
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT id, invoice_id, product_id, line_no, quantity, price_at_sale_cents \
             FROM invoice_lines \
             WHERE invoice_id IN ({placeholders}) \
             ORDER BY invoice_id, line_no"
        );

        let mut query = sqlx::query_as::<_, InvoiceLine>(&sql);
        for invoice in &invoices {
            query = query.bind(&invoice.id);
        }
        let lines = query.fetch_all(&self.pool).await?;

        for invoice in invoices.iter_mut() {
            invoice.lines = lines
                .iter()
                .filter(|l| l.invoice_id == invoice.id)
                .cloned()
                .collect();
        }

        Ok(invoices)
    }

    /// Inserts an invoice and all of its lines inside a transaction.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - invoice_number already exists
    pub async fn insert_in_tx(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
        debug!(id = %invoice.id, invoice_number = %invoice.invoice_number, "Inserting invoice");

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, date,
                customer_name, customer_email, customer_phone,
                subtotal_cents, discount_cents, total_cents, paid_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(invoice.date)
        .bind(&invoice.customer_name)
        .bind(&invoice.customer_email)
        .bind(&invoice.customer_phone)
        .bind(invoice.subtotal_cents)
        .bind(invoice.discount_cents)
        .bind(invoice.total_cents)
        .bind(invoice.paid_cents)
        .execute(&mut *conn)
        .await?;

        Self::insert_lines_in_tx(conn, &invoice.lines).await
    }

    /// Inserts a set of lines inside a transaction.
    async fn insert_lines_in_tx(
        conn: &mut SqliteConnection,
        lines: &[InvoiceLine],
    ) -> DbResult<()> {
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (
                    id, invoice_id, product_id, line_no, quantity, price_at_sale_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&line.id)
            .bind(&line.invoice_id)
            .bind(&line.product_id)
            .bind(line.line_no)
            .bind(line.quantity)
            .bind(line.price_at_sale_cents)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Gets an invoice's lines inside a transaction (for reprice/delete
    /// flows that must see a consistent snapshot of what they will undo).
    pub async fn get_lines_in_tx(
        conn: &mut SqliteConnection,
        invoice_id: &str,
    ) -> DbResult<Vec<InvoiceLine>> {
        let lines = sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT id, invoice_id, product_id, line_no, quantity, price_at_sale_cents
            FROM invoice_lines
            WHERE invoice_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Gets an invoice header (no lines) inside a transaction.
    pub async fn get_header_in_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(invoice)
    }

    /// Replaces an invoice's whole line set and updates its totals.
    ///
    /// Whole-set semantics: lines are never edited in place. The stock
    /// delta for the replacement is the settlement engine's job; this
    /// function only rewrites the ledger rows.
    pub async fn replace_lines_in_tx(
        conn: &mut SqliteConnection,
        invoice: &Invoice,
    ) -> DbResult<()> {
        debug!(id = %invoice.id, lines = invoice.lines.len(), "Replacing invoice lines");

        sqlx::query("DELETE FROM invoice_lines WHERE invoice_id = ?1")
            .bind(&invoice.id)
            .execute(&mut *conn)
            .await?;

        Self::insert_lines_in_tx(conn, &invoice.lines).await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                subtotal_cents = ?2,
                discount_cents = ?3,
                total_cents = ?4,
                paid_cents = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&invoice.id)
        .bind(invoice.subtotal_cents)
        .bind(invoice.discount_cents)
        .bind(invoice.total_cents)
        .bind(invoice.paid_cents)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", &invoice.id));
        }

        Ok(())
    }

    /// Deletes an invoice inside a transaction. Lines cascade.
    pub async fn delete_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting invoice");

        let result = sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        Ok(())
    }

    /// Sums `total_cents` over invoices with `date` in `[start, end]`.
    ///
    /// Returns `None` when no rows match; the aggregation engine owns the
    /// coalesce-to-zero policy.
    pub async fn sum_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Option<i64>> {
        let sum: Option<i64> =
            sqlx::query_scalar("SELECT SUM(total_cents) FROM invoices WHERE date BETWEEN ?1 AND ?2")
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await?;

        Ok(sum)
    }

    /// Per-month revenue sums over `[start, end]`.
    ///
    /// Only months with at least one invoice appear; zero-filling the
    /// other months is the aggregation engine's job.
    pub async fn sum_by_month(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<MonthSum>> {
        let rows = sqlx::query_as::<_, MonthSum>(
            r#"
            SELECT CAST(strftime('%m', date) AS INTEGER) AS month,
                   SUM(total_cents) AS total_cents
            FROM invoices
            WHERE date BETWEEN ?1 AND ?2
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Helper to generate a new invoice ID.
pub fn generate_invoice_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper to generate a new invoice line ID.
pub fn generate_line_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
