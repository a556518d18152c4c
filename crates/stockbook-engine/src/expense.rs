//! # Expense Ledger
//!
//! Recording and maintenance of expenses. Expenses live in their own
//! ledger with no relation to invoices or stock; they only meet revenue
//! inside the aggregation engine's profit math.

use chrono::NaiveDate;
use tracing::{debug, info};

use stockbook_core::validation::{validate_expense_amount, validate_expense_title};
use stockbook_core::{Expense, Money};
use stockbook_db::repository::expense::generate_expense_id;
use stockbook_db::Database;

use crate::error::{EngineError, EngineResult};

/// Input for recording or updating an expense.
#[derive(Debug, Clone)]
pub struct ExpenseEntry {
    /// Calendar date of the expense.
    pub date: NaiveDate,
    pub title: String,
    /// Must be positive.
    pub amount: Money,
    pub description: Option<String>,
    pub added_by: Option<String>,
}

/// Expense ledger: the write path for expenses.
#[derive(Debug, Clone)]
pub struct ExpenseLedger {
    db: Database,
}

impl ExpenseLedger {
    /// Creates an expense ledger over an open database handle.
    pub fn new(db: Database) -> Self {
        ExpenseLedger { db }
    }

    /// Records a new expense.
    ///
    /// ## Errors
    /// * `Validation` - empty/overlong title or non-positive amount
    pub async fn record(&self, entry: ExpenseEntry) -> EngineResult<Expense> {
        validate_expense_title(&entry.title)?;
        validate_expense_amount(entry.amount)?;

        let expense = Expense {
            id: generate_expense_id(),
            date: entry.date,
            title: entry.title,
            amount_cents: entry.amount.cents(),
            description: entry.description,
            added_by: entry.added_by,
        };

        self.db.expenses().insert(&expense).await?;
        info!(id = %expense.id, amount_cents = expense.amount_cents, "Expense recorded");

        Ok(expense)
    }

    /// Replaces an expense's fields. The id is immutable.
    pub async fn update(&self, id: &str, entry: ExpenseEntry) -> EngineResult<Expense> {
        validate_expense_title(&entry.title)?;
        validate_expense_amount(entry.amount)?;

        let expense = Expense {
            id: id.to_string(),
            date: entry.date,
            title: entry.title,
            amount_cents: entry.amount.cents(),
            description: entry.description,
            added_by: entry.added_by,
        };

        self.db
            .expenses()
            .update(&expense)
            .await
            .map_err(|err| match err {
                stockbook_db::DbError::NotFound { .. } => {
                    EngineError::ExpenseNotFound(id.to_string())
                }
                other => other.into(),
            })?;
        debug!(id = %id, "Expense updated");

        Ok(expense)
    }

    /// Deletes an expense.
    pub async fn delete(&self, id: &str) -> EngineResult<()> {
        self.db
            .expenses()
            .delete(id)
            .await
            .map_err(|err| match err {
                stockbook_db::DbError::NotFound { .. } => {
                    EngineError::ExpenseNotFound(id.to_string())
                }
                other => other.into(),
            })?;
        info!(id = %id, "Expense deleted");

        Ok(())
    }

    /// Fetches one expense.
    pub async fn get(&self, id: &str) -> EngineResult<Expense> {
        self.db
            .expenses()
            .get_by_id(id)
            .await?
            .ok_or_else(|| EngineError::ExpenseNotFound(id.to_string()))
    }

    /// Lists all expenses, newest first.
    pub async fn list(&self) -> EngineResult<Vec<Expense>> {
        Ok(self.db.expenses().list().await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
