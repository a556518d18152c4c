//! # Repository Module
//!
//! Database repository implementations for Stockbook.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Settlement / Aggregation Engine                                       │
//! │       │                                                                 │
//! │       │  db.products().try_deduct("p-1", 3)                            │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── try_deduct(&self, id, amount)                                     │
//! │  ├── restock(&self, id, amount)                                        │
//! │  ├── get_by_id(&self, id)                                              │
//! │  └── insert(&self, product)                                            │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Settlement writes additionally use `_in_tx` associated functions      │
//! │  that take a `&mut SqliteConnection`, so every write of one sale       │
//! │  shares one transaction.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product CRUD and atomic stock updates
//! - [`invoice::InvoiceRepository`] - Invoice + line operations and revenue sums
//! - [`expense::ExpenseRepository`] - Expense CRUD and expense sums

pub mod expense;
pub mod invoice;
pub mod product;
