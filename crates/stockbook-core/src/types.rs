//! # Domain Types
//!
//! Core domain types used throughout Stockbook.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Invoice      │   │    Expense      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  unit_price     │   │  invoice_number │   │  date           │       │
//! │  │  quantity_on_   │   │  lines[]        │   │  title          │       │
//! │  │    hand         │   │  totals         │   │  amount_cents   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  InvoiceLine references a Product by id and freezes price_at_sale.     │
//! │  No object graph, no cycles: everything is keyed by id.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! An [`InvoiceLine`] copies the unit price at settlement time into
//! `price_at_sale_cents`. Later catalog price changes never alter a
//! settled invoice.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product tracked by the stock ledger.
///
/// `quantity_on_hand` is the authoritative on-hand count; it only changes
/// through guarded deductions and restocks, never via blind writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Current catalog price in cents. Mutable; settled invoices are
    /// unaffected by changes (snapshot pattern).
    pub unit_price_cents: i64,

    /// Units currently on hand. Invariant: never negative.
    pub quantity_on_hand: i64,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the current catalog price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Checks whether the on-hand quantity covers a requested amount.
    #[inline]
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.quantity_on_hand >= quantity
    }
}

// =============================================================================
// Invoice Line
// =============================================================================

/// A line item in an invoice.
/// Uses the snapshot pattern to freeze the sale price at settlement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    /// Reference to the product by id, not a live object reference.
    pub product_id: String,
    /// Position within the invoice. Lines are ordered by submission order.
    pub line_no: i64,
    /// Units sold. Always positive.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub price_at_sale_cents: i64,
}

impl InvoiceLine {
    /// Returns the frozen sale price as Money.
    #[inline]
    pub fn price_at_sale(&self) -> Money {
        Money::from_cents(self.price_at_sale_cents)
    }

    /// Returns the line total (price_at_sale × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price_at_sale().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A settled sale: durable record of lines, totals, and payment.
///
/// ## Invariants
/// - `subtotal_cents == Σ(line.price_at_sale_cents × line.quantity)`
/// - `total_cents == subtotal_cents − discount_cents`
/// - `invoice_number` is unique and immutable once assigned
///
/// Totals are always recomputed from the lines via
/// [`Invoice::recompute_totals`], never stored independently of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,

    /// Unique human-readable number (e.g. `INV-1709200000000-0001`).
    pub invoice_number: String,

    /// Settlement timestamp.
    pub date: DateTime<Utc>,

    /// Customer contact fields. Opaque strings, not validated by the core.
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,

    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,

    /// Ordered line items. Owned exclusively by this invoice.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    /// Recomputes `subtotal_cents` and `total_cents` from the lines.
    ///
    /// ## Determinism
    /// The subtotal is a plain sum over the lines, so it is independent of
    /// line order. Call this after any whole-set line replacement.
    pub fn recompute_totals(&mut self) {
        let subtotal: Money = self.lines.iter().map(InvoiceLine::line_total).sum();
        self.subtotal_cents = subtotal.cents();
        self.total_cents = subtotal.cents() - self.discount_cents;
    }

    /// Returns the subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Returns the discount as Money.
    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the amount paid as Money.
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }
}

// =============================================================================
// Expense
// =============================================================================

/// A recorded expense. Independent ledger with no relation to invoices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: String,
    /// Calendar date of the expense (no time component).
    pub date: NaiveDate,
    pub title: String,
    /// Amount in cents. Always positive.
    pub amount_cents: i64,
    pub description: Option<String>,
    pub added_by: Option<String>,
}

impl Expense {
    /// Returns the expense amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Sale Request (Settlement input)
// =============================================================================

/// One proposed line of a sale, as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    /// Product to sell.
    pub product_id: String,
    /// Units requested. Must be positive.
    pub quantity: i64,
    /// Optional caller-supplied unit price.
    ///
    /// ## Override Policy
    /// When present and positive, this price is used as `price_at_sale`
    /// instead of the catalog price. This supports manual per-item
    /// discounting at the counter and is deliberate, not a bug.
    pub unit_price: Option<Money>,
}

/// A proposed sale submitted to the settlement engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleRequest {
    /// Ordered sale lines. Submission order becomes line order.
    pub lines: Vec<SaleLine>,

    /// Whole-invoice discount. Defaults to zero.
    #[serde(default)]
    pub discount: Money,

    /// Amount the customer paid. Defaults to zero.
    #[serde(default)]
    pub paid: Money,

    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,

    /// Caller-supplied invoice number. When `None` the engine generates one.
    /// Supplying a stable number makes retries safe: a replay collides with
    /// the unique constraint instead of settling twice.
    pub invoice_number: Option<String>,

    /// Settlement timestamp. When `None` the engine uses now.
    pub date: Option<DateTime<Utc>>,
}

// =============================================================================
// Period Aggregates (derived, never stored)
// =============================================================================

/// Revenue, expenses and profit for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyProfit {
    /// Calendar month, 1..=12.
    pub month: u32,
    pub revenue: Money,
    pub expenses: Money,
    pub profit: Money,
}

impl MonthlyProfit {
    /// A month with no transactions.
    pub fn zero(month: u32) -> Self {
        MonthlyProfit {
            month,
            revenue: Money::zero(),
            expenses: Money::zero(),
            profit: Money::zero(),
        }
    }
}

/// Revenue, expenses and profit for one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i32,
    pub revenue: Money,
    pub expenses: Money,
    pub profit: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(invoice_id: &str, no: i64, qty: i64, price_cents: i64) -> InvoiceLine {
        InvoiceLine {
            id: format!("line-{no}"),
            invoice_id: invoice_id.to_string(),
            product_id: format!("prod-{no}"),
            line_no: no,
            quantity: qty,
            price_at_sale_cents: price_cents,
        }
    }

    fn invoice_with_lines(lines: Vec<InvoiceLine>) -> Invoice {
        Invoice {
            id: "inv-1".to_string(),
            invoice_number: "INV-TEST-1".to_string(),
            date: Utc::now(),
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            subtotal_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            paid_cents: 0,
            lines,
        }
    }

    #[test]
    fn test_line_total() {
        let l = line("inv-1", 1, 3, 299);
        assert_eq!(l.line_total().cents(), 897);
    }

    #[test]
    fn test_totals_identity() {
        let mut invoice = invoice_with_lines(vec![
            line("inv-1", 1, 3, 1000),
            line("inv-1", 2, 2, 250),
        ]);
        invoice.discount_cents = 200;
        invoice.recompute_totals();

        assert_eq!(invoice.subtotal_cents, 3500);
        assert_eq!(invoice.total_cents, 3300);
    }

    #[test]
    fn test_totals_independent_of_line_order() {
        let mut a = invoice_with_lines(vec![
            line("inv-1", 1, 3, 1000),
            line("inv-1", 2, 2, 250),
            line("inv-1", 3, 1, 4999),
        ]);
        let mut b = invoice_with_lines(a.lines.iter().rev().cloned().collect());

        a.recompute_totals();
        b.recompute_totals();

        assert_eq!(a.subtotal_cents, b.subtotal_cents);
        assert_eq!(a.total_cents, b.total_cents);
    }

    #[test]
    fn test_totals_empty_lines() {
        let mut invoice = invoice_with_lines(vec![]);
        invoice.discount_cents = 0;
        invoice.recompute_totals();
        assert_eq!(invoice.subtotal_cents, 0);
        assert_eq!(invoice.total_cents, 0);
    }

    #[test]
    fn test_price_snapshot_is_frozen() {
        // A settled line keeps its price even when the catalog moves.
        let mut product = Product {
            id: "prod-1".to_string(),
            name: "Widget".to_string(),
            description: None,
            unit_price_cents: 1000,
            quantity_on_hand: 5,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut invoice = invoice_with_lines(vec![InvoiceLine {
            id: "line-1".to_string(),
            invoice_id: "inv-1".to_string(),
            product_id: product.id.clone(),
            line_no: 1,
            quantity: 3,
            price_at_sale_cents: product.unit_price_cents,
        }]);
        invoice.recompute_totals();
        assert_eq!(invoice.subtotal_cents, 3000);

        product.unit_price_cents = 9999;
        invoice.recompute_totals();
        assert_eq!(invoice.subtotal_cents, 3000);
    }

    #[test]
    fn test_can_fulfill() {
        let product = Product {
            id: "prod-1".to_string(),
            name: "Widget".to_string(),
            description: None,
            unit_price_cents: 1000,
            quantity_on_hand: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(product.can_fulfill(2));
        assert!(!product.can_fulfill(3));
    }

    #[test]
    fn test_monthly_profit_zero() {
        let m = MonthlyProfit::zero(4);
        assert_eq!(m.month, 4);
        assert!(m.revenue.is_zero());
        assert!(m.expenses.is_zero());
        assert!(m.profit.is_zero());
    }
}
