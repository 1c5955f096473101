//! Amount checks shared by every service that stores money.
//!
//! All money columns are `DECIMAL(12, 2)`: at most two decimal places and
//! strictly below ten billion.

use crate::errors::ServiceError;
use rust_decimal::Decimal;

/// Largest scale a money column keeps
pub const MONEY_SCALE: u32 = 2;

/// Exclusive upper bound of a money column
pub fn money_ceiling() -> Decimal {
    Decimal::from(10_000_000_000_i64)
}

/// Validates a caller-supplied price or cost before it is stored
pub(crate) fn check_price(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(ServiceError::ValidationError(format!(
            "{} must have at most {} decimal places",
            field, MONEY_SCALE
        )));
    }
    if value >= money_ceiling() {
        return Err(ServiceError::ValidationError(format!(
            "{} must be less than {}",
            field,
            money_ceiling()
        )));
    }
    Ok(())
}

/// `unit_price * quantity`, refused when the result would not fit a money column
pub(crate) fn line_amount(unit_price: Decimal, quantity: i32) -> Result<Decimal, ServiceError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .and_then(fits_column)
        .ok_or_else(|| {
            ServiceError::BadRequest(format!(
                "{} x {} exceeds the largest storable amount",
                quantity, unit_price
            ))
        })
}

/// Sum of two stored amounts, refused on the same terms as `line_amount`
pub(crate) fn add_amounts(left: Decimal, right: Decimal) -> Result<Decimal, ServiceError> {
    left.checked_add(right)
        .and_then(fits_column)
        .ok_or_else(|| {
            ServiceError::BadRequest(format!(
                "{} + {} exceeds the largest storable amount",
                left, right
            ))
        })
}

fn fits_column(amount: Decimal) -> Option<Decimal> {
    (amount < money_ceiling()).then_some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn prices_follow_the_column_domain() {
        assert!(check_price("price_per_unit", dec!(0)).is_ok());
        assert!(check_price("price_per_unit", dec!(12.5)).is_ok());
        assert!(check_price("price_per_unit", dec!(12.500)).is_ok());
        assert!(check_price("price_per_unit", dec!(9999999999.99)).is_ok());

        assert_matches!(
            check_price("price_per_unit", dec!(-0.01)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            check_price("price_per_unit", dec!(0.125)),
            Err(ServiceError::ValidationError(msg)) if msg.contains("decimal places")
        );
        assert_matches!(
            check_price("unit_price", dec!(10000000000)),
            Err(ServiceError::ValidationError(msg)) if msg.starts_with("unit_price")
        );
        assert_matches!(
            check_price("unit_price", Decimal::MAX),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn amounts_that_overflow_are_bad_requests() {
        assert_eq!(line_amount(dec!(12.5), 2).ok(), Some(dec!(25.0)));
        assert_eq!(add_amounts(dec!(9), dec!(10)).ok(), Some(dec!(19)));

        assert_matches!(line_amount(Decimal::MAX, 10), Err(ServiceError::BadRequest(_)));
        assert_matches!(
            line_amount(dec!(9999999999.99), i32::MAX),
            Err(ServiceError::BadRequest(_))
        );
        assert_matches!(
            add_amounts(dec!(9999999999.99), dec!(0.01)),
            Err(ServiceError::BadRequest(_))
        );
        assert_matches!(add_amounts(Decimal::MAX, dec!(1)), Err(ServiceError::BadRequest(_)));
    }
}
