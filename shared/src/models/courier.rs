//! Courier Model (repartidor)

use serde::{Deserialize, Serialize};

use crate::money;

/// How the courier earns per delivered order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommissionModel {
    /// Flat amount per delivery
    Fixed { amount: f64 },
    /// Percentage of the order total, evaluated once at assignment
    Percentage { rate: f64 },
}

impl CommissionModel {
    /// Commission earned for one order total. Percentage is evaluated here
    /// exactly once; the result is stored on the assignment.
    pub fn commission_for(&self, order_total: f64) -> f64 {
        match self {
            CommissionModel::Fixed { amount } => money::round2(*amount),
            CommissionModel::Percentage { rate } => money::percentage_of(order_total, *rate),
        }
    }
}

/// Delivery person profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub active: bool,
    /// Currently available for assignment
    pub available: bool,
    pub commission: CommissionModel,
    /// Orders delivered (lifetime counter)
    pub delivered_count: i64,
    pub cancelled_count: i64,
    /// Accrued payout for delivered-but-unsettled orders; released by
    /// settlement
    pub pending_balance: f64,
    /// Optional linked login account
    pub account_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create courier payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierCreate {
    pub name: String,
    pub phone: Option<String>,
    pub commission: CommissionModel,
    pub account_id: Option<String>,
}

/// Update courier payload; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
    pub available: Option<bool>,
    pub commission: Option<CommissionModel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_commission_ignores_total() {
        let model = CommissionModel::Fixed { amount: 30.0 };
        assert_eq!(model.commission_for(250.0), 30.0);
        assert_eq!(model.commission_for(999.0), 30.0);
    }

    #[test]
    fn percentage_commission_evaluates_once_against_total() {
        let model = CommissionModel::Percentage { rate: 12.0 };
        assert_eq!(model.commission_for(250.0), 30.0);
        assert_eq!(model.commission_for(333.33), 40.0); // 39.9996 -> 40.00
    }
}
