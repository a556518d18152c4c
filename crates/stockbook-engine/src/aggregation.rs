//! # Aggregation Engine
//!
//! Read-only revenue/expense/profit aggregation over periods.
//!
//! ## Period Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Period Windows                                  │
//! │                                                                         │
//! │  Arbitrary:  [start, end]                   caller-supplied, inclusive │
//! │  Today:      [today 00:00:00, today 23:59:59]                          │
//! │  Last 7:     [today−6 00:00:00, today 23:59:59]   (7 calendar days,    │
//! │  Last 30:    [today−29 00:00:00, today 23:59:59]   today included)     │
//! │  Year:       [Jan 1 00:00:00, Dec 31 23:59:59]                         │
//! │  Month:      rows grouped by strftime('%m'), zero-filled to 12 here    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Aggregates are always derived from the ledgers at query time, never
//! stored. Revenue sums invoice `total_cents` (post-discount). A period
//! with no rows aggregates to zero; [`coalesce`] is the single place that
//! policy lives.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use stockbook_core::validation::{validate_date_range, validate_datetime_range};
use stockbook_core::{Money, MonthlyProfit, YearSummary};
use stockbook_db::{Database, MonthSum};

use crate::error::{EngineError, EngineResult};

/// Maps an absent SQL `SUM` to zero. Every aggregate in this module goes
/// through here; no other code decides what "no rows" means.
fn coalesce(sum: Option<i64>) -> Money {
    Money::from_cents(sum.unwrap_or(0))
}

/// First instant of a calendar day, UTC.
fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last whole second of a calendar day, UTC.
fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::seconds(1)
}

/// Calendar bounds of a year, or `InvalidYear` outside chrono's range.
fn year_days(year: i32) -> EngineResult<(NaiveDate, NaiveDate)> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .zip(NaiveDate::from_ymd_opt(year, 12, 31))
        .ok_or(EngineError::InvalidYear(year))
}

/// Aggregation engine: derives period figures from the ledgers.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    db: Database,
}

impl AggregationEngine {
    /// Creates an aggregation engine over an open database handle.
    pub fn new(db: Database) -> Self {
        AggregationEngine { db }
    }

    // =========================================================================
    // Arbitrary periods
    // =========================================================================

    /// Total revenue (invoice totals) for `[start, end]` inclusive.
    pub async fn sum_revenue(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> EngineResult<Money> {
        validate_datetime_range(start, end)?;
        Ok(coalesce(self.db.invoices().sum_between(start, end).await?))
    }

    /// Total expenses for `[start, end]` inclusive.
    pub async fn sum_expenses(&self, start: NaiveDate, end: NaiveDate) -> EngineResult<Money> {
        validate_date_range(start, end)?;
        Ok(coalesce(self.db.expenses().sum_between(start, end).await?))
    }

    // =========================================================================
    // Calendar year
    // =========================================================================

    /// Revenue, expenses and profit for one calendar year.
    pub async fn year_summary(&self, year: i32) -> EngineResult<YearSummary> {
        let (first, last) = year_days(year)?;

        let revenue = coalesce(
            self.db
                .invoices()
                .sum_between(start_of_day(first), end_of_day(last))
                .await?,
        );
        let expenses = coalesce(self.db.expenses().sum_between(first, last).await?);

        debug!(year, revenue_cents = revenue.cents(), expense_cents = expenses.cents(), "Year summary");

        Ok(YearSummary {
            year,
            revenue,
            expenses,
            profit: revenue - expenses,
        })
    }

    /// Per-month revenue, expenses and profit for one calendar year.
    ///
    /// Always returns exactly 12 entries, January..December; months with
    /// no transactions are zero.
    pub async fn monthly_breakdown(&self, year: i32) -> EngineResult<Vec<MonthlyProfit>> {
        let (first, last) = year_days(year)?;

        let revenue_rows = self
            .db
            .invoices()
            .sum_by_month(start_of_day(first), end_of_day(last))
            .await?;
        let expense_rows = self.db.expenses().sum_by_month(first, last).await?;

        let mut months: Vec<MonthlyProfit> = (1..=12).map(MonthlyProfit::zero).collect();
        Self::fill(&mut months, &revenue_rows, |m, v| m.revenue = v);
        Self::fill(&mut months, &expense_rows, |m, v| m.expenses = v);
        for month in &mut months {
            month.profit = month.revenue - month.expenses;
        }

        Ok(months)
    }

    /// Writes grouped sums into their month slots via `set`.
    fn fill(months: &mut [MonthlyProfit], rows: &[MonthSum], set: impl Fn(&mut MonthlyProfit, Money)) {
        for row in rows {
            // strftime yields 1..=12; anything else is ignored.
            let idx = row.month.wrapping_sub(1) as usize;
            if let Some(month) = months.get_mut(idx) {
                set(month, Money::from_cents(row.total_cents));
            }
        }
    }

    // =========================================================================
    // Standard rolling windows
    // =========================================================================

    /// Revenue for today (one calendar day).
    pub async fn revenue_today(&self) -> EngineResult<Money> {
        self.revenue_last_days(1).await
    }

    /// Revenue for the last 7 calendar days, today included.
    pub async fn revenue_last_7_days(&self) -> EngineResult<Money> {
        self.revenue_last_days(7).await
    }

    /// Revenue for the last 30 calendar days, today included.
    pub async fn revenue_last_30_days(&self) -> EngineResult<Money> {
        self.revenue_last_days(30).await
    }

    /// Expenses for today (one calendar day).
    pub async fn expenses_today(&self) -> EngineResult<Money> {
        self.expenses_last_days(1).await
    }

    /// Expenses for the last 7 calendar days, today included.
    pub async fn expenses_last_7_days(&self) -> EngineResult<Money> {
        self.expenses_last_days(7).await
    }

    /// Expenses for the last 30 calendar days, today included.
    pub async fn expenses_last_30_days(&self) -> EngineResult<Money> {
        self.expenses_last_days(30).await
    }

    /// Revenue for a window of `days` calendar days ending today.
    async fn revenue_last_days(&self, days: i64) -> EngineResult<Money> {
        let today = Utc::now().date_naive();
        let start = today - Duration::days(days - 1);
        Ok(coalesce(
            self.db
                .invoices()
                .sum_between(start_of_day(start), end_of_day(today))
                .await?,
        ))
    }

    /// Expenses for a window of `days` calendar days ending today.
    async fn expenses_last_days(&self, days: i64) -> EngineResult<Money> {
        let today = Utc::now().date_naive();
        let start = today - Duration::days(days - 1);
        Ok(coalesce(self.db.expenses().sum_between(start, today).await?))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stockbook_core::{Product, SaleLine, SaleRequest};
    use stockbook_db::DbConfig;

    use crate::expense::{ExpenseEntry, ExpenseLedger};
    use crate::settlement::SettlementEngine;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, id: &str, price_cents: i64, quantity: i64) {
        let now = Utc::now();
        db.products()
            .insert(&Product {
                id: id.to_string(),
                name: format!("Widget {id}"),
                description: None,
                unit_price_cents: price_cents,
                quantity_on_hand: quantity,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    /// Settles one sale dated at a fixed instant.
    async fn settle_on(
        engine: &SettlementEngine,
        product_id: &str,
        quantity: i64,
        date: DateTime<Utc>,
    ) {
        engine
            .settle(SaleRequest {
                lines: vec![SaleLine {
                    product_id: product_id.to_string(),
                    quantity,
                    unit_price: None,
                }],
                date: Some(date),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    async fn record_expense(ledger: &ExpenseLedger, date: NaiveDate, cents: i64) {
        ledger
            .record(ExpenseEntry {
                date,
                title: "Expense".to_string(),
                amount: Money::from_cents(cents),
                description: None,
                added_by: None,
            })
            .await
            .unwrap();
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn instant(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_empty_period_aggregates_to_zero() {
        let db = test_db().await;
        let agg = AggregationEngine::new(db);

        let revenue = agg
            .sum_revenue(instant(2024, 1, 1), instant(2024, 12, 31))
            .await
            .unwrap();
        assert!(revenue.is_zero());

        let expenses = agg
            .sum_expenses(day(2024, 1, 1), day(2024, 12, 31))
            .await
            .unwrap();
        assert!(expenses.is_zero());

        let summary = agg.year_summary(2024).await.unwrap();
        assert!(summary.revenue.is_zero());
        assert!(summary.expenses.is_zero());
        assert!(summary.profit.is_zero());
    }

    #[tokio::test]
    async fn test_monthly_breakdown_is_zero_filled() {
        let db = test_db().await;
        let agg = AggregationEngine::new(db);

        let months = agg.monthly_breakdown(2024).await.unwrap();
        assert_eq!(months.len(), 12);
        for (i, month) in months.iter().enumerate() {
            assert_eq!(month.month, (i + 1) as u32);
            assert!(month.revenue.is_zero());
            assert!(month.profit.is_zero());
        }
    }

    #[tokio::test]
    async fn test_profit_scenario() {
        // Expense of 50.00 on Mar 10, sale of 200.00 on Mar 12:
        // March shows revenue 200.00, expenses 50.00, profit 150.00.
        let db = test_db().await;
        seed_product(&db, "p-1", 20_000, 10).await;
        let settlement = SettlementEngine::new(db.clone());
        let ledger = ExpenseLedger::new(db.clone());
        let agg = AggregationEngine::new(db);

        record_expense(&ledger, day(2024, 3, 10), 5_000).await;
        settle_on(&settlement, "p-1", 1, instant(2024, 3, 12)).await;

        let months = agg.monthly_breakdown(2024).await.unwrap();
        let march = months[2];
        assert_eq!(march.month, 3);
        assert_eq!(march.revenue.cents(), 20_000);
        assert_eq!(march.expenses.cents(), 5_000);
        assert_eq!(march.profit.cents(), 15_000);

        // Every other month stays zero.
        for month in months.iter().filter(|m| m.month != 3) {
            assert!(month.revenue.is_zero());
            assert!(month.expenses.is_zero());
        }
    }

    #[tokio::test]
    async fn test_year_summary_equals_sum_of_months() {
        let db = test_db().await;
        seed_product(&db, "p-1", 1_000, 100).await;
        let settlement = SettlementEngine::new(db.clone());
        let ledger = ExpenseLedger::new(db.clone());
        let agg = AggregationEngine::new(db);

        settle_on(&settlement, "p-1", 2, instant(2024, 1, 15)).await;
        settle_on(&settlement, "p-1", 3, instant(2024, 6, 20)).await;
        settle_on(&settlement, "p-1", 1, instant(2024, 12, 31)).await;
        record_expense(&ledger, day(2024, 2, 1), 700).await;
        record_expense(&ledger, day(2024, 6, 15), 1_300).await;

        let summary = agg.year_summary(2024).await.unwrap();
        let months = agg.monthly_breakdown(2024).await.unwrap();

        let revenue: Money = months.iter().map(|m| m.revenue).sum();
        let expenses: Money = months.iter().map(|m| m.expenses).sum();
        assert_eq!(summary.revenue, revenue);
        assert_eq!(summary.expenses, expenses);
        assert_eq!(summary.profit, revenue - expenses);
    }

    #[tokio::test]
    async fn test_revenue_uses_post_discount_totals() {
        let db = test_db().await;
        seed_product(&db, "p-1", 1_000, 10).await;
        let settlement = SettlementEngine::new(db.clone());
        let agg = AggregationEngine::new(db);

        settlement
            .settle(SaleRequest {
                lines: vec![SaleLine {
                    product_id: "p-1".to_string(),
                    quantity: 3,
                    unit_price: None,
                }],
                discount: Money::from_cents(200),
                date: Some(instant(2024, 3, 12)),
                ..Default::default()
            })
            .await
            .unwrap();

        let revenue = agg
            .sum_revenue(instant(2024, 3, 1), instant(2024, 3, 31))
            .await
            .unwrap();
        assert_eq!(revenue.cents(), 2_800);
    }

    #[tokio::test]
    async fn test_period_bounds_are_inclusive() {
        let db = test_db().await;
        let ledger = ExpenseLedger::new(db.clone());
        let agg = AggregationEngine::new(db);

        record_expense(&ledger, day(2024, 3, 1), 100).await;
        record_expense(&ledger, day(2024, 3, 31), 200).await;
        record_expense(&ledger, day(2024, 4, 1), 400).await;

        let march = agg
            .sum_expenses(day(2024, 3, 1), day(2024, 3, 31))
            .await
            .unwrap();
        assert_eq!(march.cents(), 300);
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let db = test_db().await;
        let agg = AggregationEngine::new(db);

        let err = agg
            .sum_expenses(day(2024, 3, 31), day(2024, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = agg
            .sum_revenue(instant(2024, 3, 31), instant(2024, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rolling_windows_include_today() {
        let db = test_db().await;
        seed_product(&db, "p-1", 1_000, 10).await;
        let settlement = SettlementEngine::new(db.clone());
        let ledger = ExpenseLedger::new(db.clone());
        let agg = AggregationEngine::new(db);

        let today = Utc::now().date_naive();

        // Today, 6 days back (inside last-7), 29 days back (inside last-30),
        // and 31 days back (outside every window).
        record_expense(&ledger, today, 100).await;
        record_expense(&ledger, today - Duration::days(6), 200).await;
        record_expense(&ledger, today - Duration::days(29), 400).await;
        record_expense(&ledger, today - Duration::days(31), 800).await;

        assert_eq!(agg.expenses_today().await.unwrap().cents(), 100);
        assert_eq!(agg.expenses_last_7_days().await.unwrap().cents(), 300);
        assert_eq!(agg.expenses_last_30_days().await.unwrap().cents(), 700);

        settle_on(&settlement, "p-1", 1, Utc::now()).await;
        assert_eq!(agg.revenue_today().await.unwrap().cents(), 1_000);
        assert_eq!(agg.revenue_last_7_days().await.unwrap().cents(), 1_000);
        assert_eq!(agg.revenue_last_30_days().await.unwrap().cents(), 1_000);
    }

    #[tokio::test]
    async fn test_deleted_invoice_leaves_aggregates() {
        let db = test_db().await;
        seed_product(&db, "p-1", 1_000, 10).await;
        let settlement = SettlementEngine::new(db.clone());
        let agg = AggregationEngine::new(db);

        settle_on(&settlement, "p-1", 2, instant(2024, 5, 10)).await;
        let invoices = settlement.list_invoices().await.unwrap();
        settlement.delete_invoice(&invoices[0].id).await.unwrap();

        let revenue = agg
            .sum_revenue(instant(2024, 5, 1), instant(2024, 5, 31))
            .await
            .unwrap();
        assert!(revenue.is_zero());
    }
}
