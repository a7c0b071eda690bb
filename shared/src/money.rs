//! Money arithmetic using rust_decimal for precision.
//!
//! All calculations are done using `Decimal` internally, then converted to
//! `f64` for storage/serialization. Never add raw `f64` amounts directly;
//! accumulate through this module.

use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: f64 = 0.01;

/// Convert an f64 amount to Decimal. Non-finite input collapses to zero.
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert a Decimal back to f64, rounded to 2 decimal places half-up.
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Round an f64 amount to 2 decimal places through Decimal.
pub fn round2(value: f64) -> f64 {
    to_f64(to_decimal(value))
}

/// Line subtotal: quantity × unit price snapshot.
pub fn line_subtotal(unit_price: f64, quantity: i32) -> f64 {
    to_f64(to_decimal(unit_price) * Decimal::from(quantity))
}

/// Order total: subtotal + delivery fee - discount.
///
/// This is the single place the totals invariant is computed; callers must
/// never adjust `total` independently.
pub fn order_total(subtotal: f64, delivery_fee: f64, discount: f64) -> f64 {
    to_f64(to_decimal(subtotal) + to_decimal(delivery_fee) - to_decimal(discount))
}

/// Change due on a cash payment: max(0, tendered - total).
pub fn change_due(amount_tendered: f64, total: f64) -> f64 {
    let change = to_decimal(amount_tendered) - to_decimal(total);
    to_f64(change.max(Decimal::ZERO))
}

/// Percentage of an amount (rate in 0..=100).
pub fn percentage_of(amount: f64, rate: f64) -> f64 {
    to_f64(to_decimal(amount) * to_decimal(rate) / Decimal::from(100))
}

/// Display helper for receipts and logs: `$1,234.50` without the thousands
/// separator ambiguity (plain `$1234.50`).
pub fn format_money(amount: f64) -> String {
    format!("${:.2}", round2(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_fixes_float_accumulation() {
        // Classic floating point problem: 0.1 + 0.2 != 0.3
        let sum_f64 = 0.1_f64 + 0.2_f64;
        assert_ne!(sum_f64, 0.3);
        assert_eq!(to_f64(to_decimal(0.1) + to_decimal(0.2)), 0.3);
    }

    #[test]
    fn accumulation_precision() {
        let mut total = Decimal::ZERO;
        for _ in 0..1000 {
            total += to_decimal(0.01);
        }
        assert_eq!(to_f64(total), 10.0);
    }

    #[test]
    fn line_subtotal_multiplies_snapshot_price() {
        assert_eq!(line_subtotal(10.99, 3), 32.97);
        assert_eq!(line_subtotal(85.0, 2), 170.0);
    }

    #[test]
    fn order_total_invariant() {
        // items 300 + fee 50 - discount 0
        assert_eq!(order_total(300.0, 50.0, 0.0), 350.0);
        assert_eq!(order_total(120.5, 35.0, 20.0), 135.5);
    }

    #[test]
    fn change_due_never_negative() {
        assert_eq!(change_due(400.0, 350.0), 50.0);
        assert_eq!(change_due(300.0, 350.0), 0.0);
        assert_eq!(change_due(350.0, 350.0), 0.0);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage_of(250.0, 10.0), 25.0);
        assert_eq!(percentage_of(99.99, 15.0), 15.0); // 14.9985 -> 15.00
    }

    #[test]
    fn format_money_two_places() {
        assert_eq!(format_money(350.0), "$350.00");
        assert_eq!(format_money(0.5), "$0.50");
    }
}
