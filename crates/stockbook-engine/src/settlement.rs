//! # Settlement Engine
//!
//! Turns proposed sales into durable invoices while keeping the stock
//! ledger consistent.
//!
//! ## Settlement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        settle(SaleRequest)                              │
//! │                                                                         │
//! │  validate ──▶ BEGIN ──▶ per line: guarded deduct ──▶ freeze price ──▶  │
//! │               │         (UPDATE .. WHERE qty >= n)   (snapshot)        │
//! │               │                                                         │
//! │               ├── any line short/missing ──▶ ROLLBACK, typed error     │
//! │               │                                                         │
//! │               └── all lines ok ──▶ insert invoice + lines ──▶ COMMIT   │
//! │                                                                         │
//! │  Atomicity: every stock movement and the invoice write share ONE       │
//! │  transaction. A failed settlement leaves no trace.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Amendments
//! [`SettlementEngine::reprice`] replaces an invoice's whole line set and
//! applies the net stock delta in the same transaction. Lines are never
//! edited in place. [`SettlementEngine::delete_invoice`] restocks every
//! line and removes the invoice, also atomically.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{debug, info};

use stockbook_core::validation::validate_sale_request;
use stockbook_core::{Invoice, InvoiceLine, SaleRequest};
use stockbook_db::repository::invoice::{generate_invoice_id, generate_line_id};
use stockbook_db::{Database, DbError, DeductOutcome, InvoiceRepository, ProductRepository};

use crate::error::{EngineError, EngineResult};

/// Monotonic suffix for generated invoice numbers. The millisecond prefix
/// alone can collide under concurrent settlements; the counter breaks ties.
static INVOICE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generates an invoice number of the form `INV-<millis>-<seq>`.
fn next_invoice_number() -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = INVOICE_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("INV-{millis}-{seq:04}")
}

/// Settlement engine: the only write path for invoices and stock.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    db: Database,
}

impl SettlementEngine {
    /// Creates a settlement engine over an open database handle.
    pub fn new(db: Database) -> Self {
        SettlementEngine { db }
    }

    /// Settles a proposed sale: deducts stock for every line and writes the
    /// invoice, all in one transaction.
    ///
    /// Line order follows submission order. Each line freezes its unit
    /// price at settlement time: the caller's override when supplied,
    /// otherwise the catalog price read in the same guarded UPDATE that
    /// deducts the stock.
    ///
    /// ## Errors
    /// * `Validation` - empty sale, non-positive quantity, negative amounts
    /// * `ProductNotFound` - a line references an unknown product
    /// * `InsufficientStock` - a line asks for more than is on hand; the
    ///   error carries the requested and available counts of the first
    ///   short line, and nothing was deducted
    /// * `DuplicateInvoiceNumber` - caller-supplied number already settled
    /// * `Busy` - writer contention timed out; retry with the same request
    pub async fn settle(&self, request: SaleRequest) -> EngineResult<Invoice> {
        validate_sale_request(&request)?;

        let invoice_id = generate_invoice_id();
        let invoice_number = request
            .invoice_number
            .clone()
            .unwrap_or_else(next_invoice_number);
        let date = request.date.unwrap_or_else(Utc::now);

        debug!(
            invoice_number = %invoice_number,
            lines = request.lines.len(),
            "Settling sale"
        );

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let mut lines = Vec::with_capacity(request.lines.len());
        for (idx, sale_line) in request.lines.iter().enumerate() {
            let outcome =
                ProductRepository::deduct_in_tx(&mut tx, &sale_line.product_id, sale_line.quantity)
                    .await?;

            // Dropping the transaction on the error paths rolls back every
            // deduction made for earlier lines.
            let catalog_price_cents = match outcome {
                DeductOutcome::Deducted {
                    unit_price_cents, ..
                } => unit_price_cents,
                DeductOutcome::Insufficient { available } => {
                    return Err(EngineError::InsufficientStock {
                        product_id: sale_line.product_id.clone(),
                        requested: sale_line.quantity,
                        available,
                    });
                }
                DeductOutcome::NotFound => {
                    return Err(EngineError::ProductNotFound(sale_line.product_id.clone()));
                }
            };

            let price_at_sale_cents = match sale_line.unit_price {
                Some(price) => price.cents(),
                None => catalog_price_cents,
            };

            lines.push(InvoiceLine {
                id: generate_line_id(),
                invoice_id: invoice_id.clone(),
                product_id: sale_line.product_id.clone(),
                line_no: (idx + 1) as i64,
                quantity: sale_line.quantity,
                price_at_sale_cents,
            });
        }

        let mut invoice = Invoice {
            id: invoice_id,
            invoice_number,
            date,
            customer_name: request.customer_name.clone(),
            customer_email: request.customer_email.clone(),
            customer_phone: request.customer_phone.clone(),
            subtotal_cents: 0,
            discount_cents: request.discount.cents(),
            total_cents: 0,
            paid_cents: request.paid.cents(),
            lines,
        };
        invoice.recompute_totals();

        InvoiceRepository::insert_in_tx(&mut tx, &invoice)
            .await
            .map_err(|err| match err {
                DbError::UniqueViolation { ref field, .. } if field.contains("invoice_number") => {
                    EngineError::DuplicateInvoiceNumber(invoice.invoice_number.clone())
                }
                other => other.into(),
            })?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total_cents = invoice.total_cents,
            "Sale settled"
        );

        Ok(invoice)
    }

    /// Amends a settled invoice by replacing its whole line set.
    ///
    /// The net per-product stock delta between the old and new line sets is
    /// applied in the same transaction: grown quantities deduct, shrunken
    /// quantities restock. `invoice_number` and `date` are immutable;
    /// customer fields, discount, and paid are taken from the request.
    ///
    /// New lines re-freeze their price: the caller's override when
    /// supplied, otherwise the catalog price at amendment time.
    ///
    /// ## Errors
    /// Same taxonomy as [`Self::settle`], plus `InvoiceNotFound`. Any
    /// failure rolls back the whole amendment.
    pub async fn reprice(&self, invoice_id: &str, request: SaleRequest) -> EngineResult<Invoice> {
        validate_sale_request(&request)?;

        debug!(id = %invoice_id, lines = request.lines.len(), "Repricing invoice");

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let header = InvoiceRepository::get_header_in_tx(&mut tx, invoice_id)
            .await?
            .ok_or_else(|| EngineError::InvoiceNotFound(invoice_id.to_string()))?;
        let old_lines = InvoiceRepository::get_lines_in_tx(&mut tx, invoice_id).await?;

        // Per-product quantity totals. BTreeMap keeps the delta pass in a
        // deterministic order, which keeps lock acquisition order stable.
        let mut old_qty: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &old_lines {
            *old_qty.entry(line.product_id.as_str()).or_default() += line.quantity;
        }
        let mut new_qty: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &request.lines {
            *new_qty.entry(line.product_id.as_str()).or_default() += line.quantity;
        }

        let mut products: Vec<&str> = old_qty.keys().chain(new_qty.keys()).copied().collect();
        products.sort_unstable();
        products.dedup();

        for product_id in products {
            let before = old_qty.get(product_id).copied().unwrap_or(0);
            let after = new_qty.get(product_id).copied().unwrap_or(0);
            let delta = after - before;

            if delta > 0 {
                let outcome =
                    ProductRepository::deduct_in_tx(&mut tx, product_id, delta).await?;
                match outcome {
                    DeductOutcome::Deducted { .. } => {}
                    DeductOutcome::Insufficient { available } => {
                        return Err(EngineError::InsufficientStock {
                            product_id: product_id.to_string(),
                            requested: delta,
                            available,
                        });
                    }
                    DeductOutcome::NotFound => {
                        return Err(EngineError::ProductNotFound(product_id.to_string()));
                    }
                }
            } else if delta < 0 {
                match ProductRepository::restock_in_tx(&mut tx, product_id, -delta).await {
                    Ok(_) => {}
                    Err(DbError::NotFound { .. }) => {
                        return Err(EngineError::ProductNotFound(product_id.to_string()));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        let mut lines = Vec::with_capacity(request.lines.len());
        for (idx, sale_line) in request.lines.iter().enumerate() {
            let price_at_sale_cents = match sale_line.unit_price {
                Some(price) => price.cents(),
                None => ProductRepository::catalog_price_in_tx(&mut tx, &sale_line.product_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::ProductNotFound(sale_line.product_id.clone())
                    })?,
            };

            lines.push(InvoiceLine {
                id: generate_line_id(),
                invoice_id: invoice_id.to_string(),
                product_id: sale_line.product_id.clone(),
                line_no: (idx + 1) as i64,
                quantity: sale_line.quantity,
                price_at_sale_cents,
            });
        }

        let mut invoice = Invoice {
            id: header.id,
            invoice_number: header.invoice_number,
            date: header.date,
            customer_name: request.customer_name.clone(),
            customer_email: request.customer_email.clone(),
            customer_phone: request.customer_phone.clone(),
            subtotal_cents: 0,
            discount_cents: request.discount.cents(),
            total_cents: 0,
            paid_cents: request.paid.cents(),
            lines,
        };
        invoice.recompute_totals();

        InvoiceRepository::replace_lines_in_tx(&mut tx, &invoice).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(id = %invoice.id, total_cents = invoice.total_cents, "Invoice repriced");

        Ok(invoice)
    }

    /// Deletes an invoice and returns its stock.
    ///
    /// Every line's quantity is restocked to its product before the invoice
    /// is removed, in one transaction.
    pub async fn delete_invoice(&self, invoice_id: &str) -> EngineResult<()> {
        debug!(id = %invoice_id, "Deleting invoice");

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        if InvoiceRepository::get_header_in_tx(&mut tx, invoice_id)
            .await?
            .is_none()
        {
            return Err(EngineError::InvoiceNotFound(invoice_id.to_string()));
        }

        let lines = InvoiceRepository::get_lines_in_tx(&mut tx, invoice_id).await?;

        let mut quantities: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &lines {
            *quantities.entry(line.product_id.as_str()).or_default() += line.quantity;
        }

        for (product_id, quantity) in quantities {
            // A product deleted since the sale simply has nowhere to put
            // the stock back; the invoice removal still proceeds.
            match ProductRepository::restock_in_tx(&mut tx, product_id, quantity).await {
                Ok(_) | Err(DbError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }

        InvoiceRepository::delete_in_tx(&mut tx, invoice_id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(id = %invoice_id, "Invoice deleted, stock returned");

        Ok(())
    }

    /// Fetches a settled invoice with its lines.
    pub async fn get_invoice(&self, invoice_id: &str) -> EngineResult<Invoice> {
        self.db
            .invoices()
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| EngineError::InvoiceNotFound(invoice_id.to_string()))
    }

    /// Lists all settled invoices, newest first.
    pub async fn list_invoices(&self) -> EngineResult<Vec<Invoice>> {
        Ok(self.db.invoices().list_all().await?)
    }

    /// Lists invoices settled in `[start, end]` inclusive.
    pub async fn list_invoices_between(
        &self,
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
    ) -> EngineResult<Vec<Invoice>> {
        stockbook_core::validation::validate_datetime_range(start, end)?;
        Ok(self.db.invoices().list_between(start, end).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
