//! # Validation Module
//!
//! Input validation for settlement and expense requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure rules)                                     │
//! │  ├── Positive quantities and amounts                                   │
//! │  ├── Required fields                                                   │
//! │  └── Well-formed date ranges                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── CHECK (quantity_on_hand >= 0)                                     │
//! │  ├── UNIQUE (invoice_number)                                           │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Every failure here aborts a settlement before any mutation runs.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{SaleLine, SaleRequest};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Sale Validation
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be strictly positive
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a caller-supplied unit price override.
///
/// A price override is only honored when positive; zero and negative
/// overrides are rejected rather than silently ignored.
pub fn validate_price_override(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "unit_price".to_string(),
        });
    }
    Ok(())
}

/// Validates a single sale line.
pub fn validate_sale_line(line: &SaleLine) -> ValidationResult<()> {
    if line.product_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "product_id".to_string(),
        });
    }
    validate_quantity(line.quantity)?;
    if let Some(price) = line.unit_price {
        validate_price_override(price)?;
    }
    Ok(())
}

/// Validates a whole sale request before any stock is touched.
///
/// ## Rules
/// - At least one line
/// - Every line passes [`validate_sale_line`]
/// - Discount and paid amounts are not negative
pub fn validate_sale_request(request: &SaleRequest) -> ValidationResult<()> {
    if request.lines.is_empty() {
        return Err(ValidationError::EmptySale);
    }
    for line in &request.lines {
        validate_sale_line(line)?;
    }
    if request.discount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        });
    }
    if request.paid.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "paid".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Expense Validation
// =============================================================================

/// Validates an expense title.
pub fn validate_expense_title(title: &str) -> ValidationResult<()> {
    let title = title.trim();

    if title.is_empty() {
        return Err(ValidationError::Required {
            field: "title".to_string(),
        });
    }

    if title.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an expense amount.
pub fn validate_expense_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Date Range Validation
// =============================================================================

/// Validates a timestamp range (inclusive on both ends).
pub fn validate_datetime_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ValidationResult<()> {
    if end < start {
        return Err(ValidationError::InvalidDateRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    Ok(())
}

/// Validates a calendar date range (inclusive on both ends).
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> ValidationResult<()> {
    if end < start {
        return Err(ValidationError::InvalidDateRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_line(product_id: &str, quantity: i64) -> SaleLine {
        SaleLine {
            product_id: product_id.to_string(),
            quantity,
            unit_price: None,
        }
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }

    #[test]
    fn test_price_override_must_be_positive() {
        assert!(validate_price_override(Money::from_cents(1)).is_ok());
        assert!(validate_price_override(Money::zero()).is_err());
        assert!(validate_price_override(Money::from_cents(-100)).is_err());
    }

    #[test]
    fn test_empty_sale_rejected() {
        let request = SaleRequest::default();
        assert!(matches!(
            validate_sale_request(&request),
            Err(ValidationError::EmptySale)
        ));
    }

    #[test]
    fn test_negative_discount_rejected() {
        let request = SaleRequest {
            lines: vec![sale_line("p-1", 1)],
            discount: Money::from_cents(-100),
            ..Default::default()
        };
        assert!(validate_sale_request(&request).is_err());
    }

    #[test]
    fn test_valid_sale_request() {
        let request = SaleRequest {
            lines: vec![sale_line("p-1", 2), sale_line("p-2", 1)],
            discount: Money::from_cents(200),
            ..Default::default()
        };
        assert!(validate_sale_request(&request).is_ok());
    }

    #[test]
    fn test_blank_product_id_rejected() {
        let request = SaleRequest {
            lines: vec![sale_line("  ", 2)],
            ..Default::default()
        };
        assert!(validate_sale_request(&request).is_err());
    }

    #[test]
    fn test_expense_rules() {
        assert!(validate_expense_title("Rent").is_ok());
        assert!(validate_expense_title("   ").is_err());
        assert!(validate_expense_amount(Money::from_cents(5000)).is_ok());
        assert!(validate_expense_amount(Money::zero()).is_err());
    }

    #[test]
    fn test_date_range() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(validate_date_range(jan, feb).is_ok());
        assert!(validate_date_range(jan, jan).is_ok());
        assert!(validate_date_range(feb, jan).is_err());
    }
}
