//! Shift Model (turno)
//!
//! A shift is one cashier working period (matutino/vespertino) and the unit
//! of cash reconciliation. Its id is deterministic (`turno_<date>_<type>`),
//! so a given day can never grow a second morning shift under a different
//! key.

use serde::{Deserialize, Serialize};

use crate::models::order::PaymentMethod;
use crate::money;

/// Shift status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ShiftStatus {
    #[default]
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "CLOSED")]
    Closed,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Open => "OPEN",
            ShiftStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(ShiftStatus::Open),
            "CLOSED" => Some(ShiftStatus::Closed),
            _ => None,
        }
    }
}

/// Shift type: morning or evening period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    Matutino,
    Vespertino,
}

impl ShiftType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftType::Matutino => "matutino",
            ShiftType::Vespertino => "vespertino",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "matutino" => Some(ShiftType::Matutino),
            "vespertino" => Some(ShiftType::Vespertino),
            _ => None,
        }
    }
}

/// Deterministic shift id: `turno_2026-08-27_matutino`.
pub fn shift_id(date: chrono::NaiveDate, shift_type: ShiftType) -> String {
    format!("turno_{}_{}", date.format("%Y-%m-%d"), shift_type.as_str())
}

/// Running totals accumulated while the shift is open. All amounts in
/// currency units, accumulated through [`crate::money`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShiftSummary {
    pub total_orders: i64,
    /// Sales total for non-cancelled orders
    pub total_sales: f64,
    /// Cash bucket, the one reconciled against the drawer
    pub efectivo: f64,
    pub tarjeta: f64,
    pub transferencia: f64,
    pub plataforma: f64,
    pub total_delivery_fees: f64,
    pub total_discounts: f64,
    pub total_commissions: f64,
}

/// Close-out record stamped when the drawer is counted (corte de caja).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftCloseout {
    /// opening_float + summary.efectivo
    pub expected_cash: f64,
    pub counted_cash: f64,
    /// counted_cash - expected_cash
    pub variance: f64,
    pub notes: Option<String>,
    pub closed_by: String,
    pub closed_at: i64,
}

/// Shift record: one cashier working period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    /// Deterministic id, see [`shift_id`]
    pub id: String,
    /// Business date (YYYY-MM-DD)
    pub date: String,
    pub shift_type: ShiftType,
    pub cashier_id: String,
    pub cashier_name: String,
    pub supervisor_id: Option<String>,
    pub supervisor_name: Option<String>,
    pub status: ShiftStatus,
    pub opened_at: i64,
    pub closed_at: Option<i64>,
    /// Cash float in the drawer at open
    pub opening_float: f64,
    pub summary: ShiftSummary,
    pub closeout: Option<ShiftCloseout>,
}

impl Shift {
    /// Cash expected in the drawer right now.
    pub fn expected_cash(&self) -> f64 {
        money::to_f64(money::to_decimal(self.opening_float) + money::to_decimal(self.summary.efectivo))
    }
}

/// Monetary event recorded inside a shift, append-only and
/// timestamp-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftTransactionKind {
    Sale,
    Adjustment,
    Withdrawal,
    Deposit,
}

impl ShiftTransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftTransactionKind::Sale => "sale",
            ShiftTransactionKind::Adjustment => "adjustment",
            ShiftTransactionKind::Withdrawal => "withdrawal",
            ShiftTransactionKind::Deposit => "deposit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(ShiftTransactionKind::Sale),
            "adjustment" => Some(ShiftTransactionKind::Adjustment),
            "withdrawal" => Some(ShiftTransactionKind::Withdrawal),
            "deposit" => Some(ShiftTransactionKind::Deposit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftTransaction {
    pub id: i64,
    pub shift_id: String,
    pub kind: ShiftTransactionKind,
    pub method: Option<PaymentMethod>,
    pub amount: f64,
    pub detail: Option<String>,
    pub timestamp: i64,
}

// ========== API payloads ==========

/// Open shift payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftOpen {
    pub shift_type: ShiftType,
    pub cashier_id: String,
    pub cashier_name: String,
    #[serde(default)]
    pub opening_float: f64,
    pub supervisor_id: Option<String>,
    pub supervisor_name: Option<String>,
}

/// Close shift payload (corte de caja).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftClose {
    pub counted_cash: f64,
    pub notes: Option<String>,
    pub closed_by: String,
}

/// Manual drawer adjustment payload (withdrawal, deposit, correction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftAdjust {
    pub kind: ShiftTransactionKind,
    pub method: Option<PaymentMethod>,
    /// Signed amount; negative for money leaving the drawer
    pub amount: f64,
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn deterministic_shift_id() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        assert_eq!(shift_id(date, ShiftType::Matutino), "turno_2026-08-27_matutino");
        assert_eq!(
            shift_id(date, ShiftType::Vespertino),
            "turno_2026-08-27_vespertino"
        );
    }

    #[test]
    fn expected_cash_is_float_plus_cash_bucket() {
        let shift = Shift {
            id: "turno_2026-08-27_matutino".into(),
            date: "2026-08-27".into(),
            shift_type: ShiftType::Matutino,
            cashier_id: "emp_1".into(),
            cashier_name: "Luz".into(),
            supervisor_id: None,
            supervisor_name: None,
            status: ShiftStatus::Open,
            opened_at: 0,
            closed_at: None,
            opening_float: 500.0,
            summary: ShiftSummary {
                efectivo: 450.0,
                ..Default::default()
            },
            closeout: None,
        };
        assert_eq!(shift.expected_cash(), 950.0);
    }
}
