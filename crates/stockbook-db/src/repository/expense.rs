//! # Expense Repository
//!
//! Database operations for the expense ledger.
//!
//! Expenses are an independent ledger: they never reference products or
//! invoices, and only meet the sales ledger inside the aggregation engine
//! when profit is computed.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::invoice::MonthSum;
use stockbook_core::Expense;

/// Repository for expense database operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Gets an expense by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, date, title, amount_cents, description, added_by
            FROM expenses
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(expense)
    }

    /// Lists all expenses, newest first.
    pub async fn list(&self) -> DbResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, date, title, amount_cents, description, added_by
            FROM expenses
            ORDER BY date DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    /// Inserts a new expense.
    pub async fn insert(&self, expense: &Expense) -> DbResult<()> {
        debug!(id = %expense.id, title = %expense.title, "Inserting expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (id, date, title, amount_cents, description, added_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&expense.id)
        .bind(expense.date)
        .bind(&expense.title)
        .bind(expense.amount_cents)
        .bind(&expense.description)
        .bind(&expense.added_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing expense.
    pub async fn update(&self, expense: &Expense) -> DbResult<()> {
        debug!(id = %expense.id, "Updating expense");

        let result = sqlx::query(
            r#"
            UPDATE expenses SET
                date = ?2,
                title = ?3,
                amount_cents = ?4,
                description = ?5,
                added_by = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&expense.id)
        .bind(expense.date)
        .bind(&expense.title)
        .bind(expense.amount_cents)
        .bind(&expense.description)
        .bind(&expense.added_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", &expense.id));
        }

        Ok(())
    }

    /// Deletes an expense.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting expense");

        let result = sqlx::query("DELETE FROM expenses WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", id));
        }

        Ok(())
    }

    /// Sums `amount_cents` over expenses with `date` in `[start, end]`.
    ///
    /// Returns `None` when no rows match; the aggregation engine owns the
    /// coalesce-to-zero policy.
    pub async fn sum_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Option<i64>> {
        let sum: Option<i64> =
            sqlx::query_scalar("SELECT SUM(amount_cents) FROM expenses WHERE date BETWEEN ?1 AND ?2")
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await?;

        Ok(sum)
    }

    /// Per-month expense sums over `[start, end]`.
    pub async fn sum_by_month(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<MonthSum>> {
        let rows = sqlx::query_as::<_, MonthSum>(
            r#"
            SELECT CAST(strftime('%m', date) AS INTEGER) AS month,
                   SUM(amount_cents) AS total_cents
            FROM expenses
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

/// Helper to generate a new expense ID.
pub fn generate_expense_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn expense(id: &str, date: NaiveDate, amount_cents: i64) -> Expense {
        Expense {
            id: id.to_string(),
            date,
            title: format!("Expense {id}"),
            amount_cents,
            description: None,
            added_by: Some("tests".to_string()),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let db = test_db().await;
        let repo = db.expenses();

        repo.insert(&expense("e-1", day(2024, 3, 10), 5000))
            .await
            .unwrap();

        let mut fetched = repo.get_by_id("e-1").await.unwrap().unwrap();
        assert_eq!(fetched.amount_cents, 5000);

        fetched.title = "Rent".to_string();
        fetched.amount_cents = 6000;
        repo.update(&fetched).await.unwrap();

        let fetched = repo.get_by_id("e-1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Rent");
        assert_eq!(fetched.amount_cents, 6000);

        repo.delete("e-1").await.unwrap();
        assert!(repo.get_by_id("e-1").await.unwrap().is_none());
        assert!(matches!(
            repo.delete("e-1").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_sum_between_inclusive_bounds() {
        let db = test_db().await;
        let repo = db.expenses();

        repo.insert(&expense("e-1", day(2024, 3, 10), 5000))
            .await
            .unwrap();
        repo.insert(&expense("e-2", day(2024, 3, 20), 2500))
            .await
            .unwrap();
        repo.insert(&expense("e-3", day(2024, 4, 1), 9999))
            .await
            .unwrap();

        // Both endpoints are inclusive.
        let sum = repo
            .sum_between(day(2024, 3, 10), day(2024, 3, 20))
            .await
            .unwrap();
        assert_eq!(sum, Some(7500));

        // No rows: None, not zero - coalescing is the engine's job.
        let sum = repo
            .sum_between(day(2023, 1, 1), day(2023, 12, 31))
            .await
            .unwrap();
        assert_eq!(sum, None);
    }

    #[tokio::test]
    async fn test_sum_by_month() {
        let db = test_db().await;
        let repo = db.expenses();

        repo.insert(&expense("e-1", day(2024, 3, 10), 5000))
            .await
            .unwrap();
        repo.insert(&expense("e-2", day(2024, 3, 20), 2500))
            .await
            .unwrap();
        repo.insert(&expense("e-3", day(2024, 11, 1), 1000))
            .await
            .unwrap();

        let rows = repo
            .sum_by_month(day(2024, 1, 1), day(2024, 12, 31))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].month, 3);
        assert_eq!(rows[0].total_cents, 7500);
        assert_eq!(rows[1].month, 11);
        assert_eq!(rows[1].total_cents, 1000);
    }
}
