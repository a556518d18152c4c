//! # stockbook-engine: Settlement & Aggregation Engines
//!
//! The library API surface of Stockbook. Callers construct a
//! [`Database`](stockbook_db::Database), hand it to the engines, and get
//! typed operations with typed errors back.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        stockbook-engine                                 │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐      │
//! │  │ SettlementEngine │  │  ExpenseLedger   │  │ AggregationEngine│      │
//! │  │  settle          │  │  record          │  │  sum_revenue     │      │
//! │  │  reprice         │  │  update/delete   │  │  sum_expenses    │      │
//! │  │  delete_invoice  │  │  get/list        │  │  monthly/yearly  │      │
//! │  └────────┬─────────┘  └────────┬─────────┘  └────────┬─────────┘      │
//! │           │                     │                     │                │
//! │           └─────────────────────┴─────────────────────┘                │
//! │                                 │                                      │
//! │                          stockbook-db                                  │
//! │                  (sqlx/SQLite pool + repositories)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockbook_db::{Database, DbConfig};
//! use stockbook_engine::{SettlementEngine, AggregationEngine};
//!
//! let db = Database::new(DbConfig::new("stockbook.sqlite")).await?;
//! let settlement = SettlementEngine::new(db.clone());
//! let invoice = settlement.settle(request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregation;
pub mod error;
pub mod expense;
pub mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use aggregation::AggregationEngine;
pub use error::{EngineError, EngineResult};
pub use expense::{ExpenseEntry, ExpenseLedger};
pub use settlement::SettlementEngine;

// Callers need the core types and the db handle to drive the engines.
pub use stockbook_core::{
    Expense, Invoice, InvoiceLine, Money, MonthlyProfit, Product, SaleLine, SaleRequest,
    YearSummary,
};
pub use stockbook_db::{Database, DbConfig};
