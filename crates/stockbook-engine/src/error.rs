//! Engine error types.
//!
//! Every operation in this crate returns `EngineResult<T>`. The taxonomy
//! separates caller mistakes (validation, unknown ids), business rejections
//! (insufficient stock, duplicate invoice number), transient contention
//! (busy), and infrastructure failures (storage). Callers can branch on the
//! variant; `is_retryable` identifies the transient subset.

use stockbook_core::error::ValidationError;
use stockbook_db::DbError;
use thiserror::Error;

/// Errors surfaced by the settlement, aggregation, and expense engines.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A sale line referenced a product id that does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The requested invoice id does not exist.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// The requested expense id does not exist.
    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    /// Input failed validation before touching storage.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A deduction would have driven stock negative. The whole settlement
    /// was rolled back; no stock moved and no invoice was written.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// The supplied invoice number already exists. Carries the attempted
    /// number. With caller-supplied numbers this usually means a retry of
    /// a settlement that already committed.
    #[error("Invoice number already exists: {0}")]
    DuplicateInvoiceNumber(String),

    /// The requested year cannot be represented as a calendar period.
    #[error("Invalid year: {0}")]
    InvalidYear(i32),

    /// Writer contention timed out. Transient; safe to retry.
    #[error("Storage busy, retry the operation")]
    Busy,

    /// Underlying storage failure.
    #[error("Storage error: {0}")]
    Storage(DbError),
}

impl EngineError {
    /// Returns true when the failure is transient and the same call can be
    /// retried without changing its inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Busy)
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Busy | DbError::PoolExhausted => EngineError::Busy,
            other => EngineError::Storage(other),
        }
    }
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Tests
// =============================================================================
