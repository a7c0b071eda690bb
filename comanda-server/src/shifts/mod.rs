//! Shift ledger (turno): open, accumulate, close.
//!
//! The ledger tracks one cashier period's running totals and produces the
//! corte de caja at close. Order contributions are applied inside the same
//! transaction as the order write that caused them.

use shared::models::order::{Order, OrderState, PaymentMethod};
use shared::models::shift::shift_id;
use shared::money;
use shared::{Shift, ShiftAdjust, ShiftClose, ShiftOpen, ShiftStatus, ShiftTransactionKind};
use sqlx::Sqlite;

use crate::core::ServerState;
use crate::db::repository::shift::{self as shift_repo, ShiftContribution};
use crate::db::repository::RepoError;
use crate::utils::{AppError, AppResult, time};

const RESOURCE: &str = "shift";

/// Open a shift for today's date in the business timezone.
///
/// The id is deterministic (`turno_<date>_<type>`), so the same period can
/// only ever exist once. Re-opening it, or opening while any shift is
/// still open, is an explicit conflict, never a silent overwrite.
pub async fn open_shift(state: &ServerState, payload: ShiftOpen) -> AppResult<Shift> {
    if payload.opening_float < 0.0 {
        return Err(AppError::validation("Opening float cannot be negative"));
    }

    if let Some(open) = shift_repo::find_any_open(state.pool()).await? {
        return Err(AppError::conflict(format!(
            "A shift is already open: {}",
            open.id
        )));
    }

    let date = time::today(state.config.timezone);
    let id = shift_id(date, payload.shift_type);

    if shift_repo::find_by_id(state.pool(), &id).await?.is_some() {
        return Err(AppError::conflict(format!(
            "Shift {id} was already opened today"
        )));
    }

    let shift = Shift {
        id: id.clone(),
        date: date.format("%Y-%m-%d").to_string(),
        shift_type: payload.shift_type,
        cashier_id: payload.cashier_id,
        cashier_name: payload.cashier_name,
        supervisor_id: payload.supervisor_id,
        supervisor_name: payload.supervisor_name,
        status: ShiftStatus::Open,
        opened_at: shared::util::now_millis(),
        closed_at: None,
        opening_float: money::round2(payload.opening_float),
        summary: Default::default(),
        closeout: None,
    };

    // The unique index on OPEN status backstops the checks above against a
    // concurrent open racing between them.
    match shift_repo::create(state.pool(), &shift).await {
        Ok(()) => {}
        Err(RepoError::Duplicate(_)) => {
            return Err(AppError::conflict("A shift is already open"));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(shift = %shift.id, cashier = %shift.cashier_name, "Shift opened");
    state.broadcast_sync(RESOURCE, "created", &shift.id, Some(&shift));
    Ok(shift)
}

/// Build the summary increments one order contributes at intake.
///
/// Sales and the payment bucket only count for non-cancelled orders; the
/// order counter always moves. Courier commissions are unknown at intake
/// and accrue separately when the order is delivered.
pub fn contribution_for(order: &Order) -> ShiftContribution {
    let mut c = ShiftContribution {
        orders: 1,
        ..Default::default()
    };
    if order.state != OrderState::Cancelled {
        c.sales = order.total;
        match order.payment.method {
            PaymentMethod::Cash => c.efectivo = order.total,
            PaymentMethod::Card => c.tarjeta = order.total,
            PaymentMethod::Transfer => c.transferencia = order.total,
            PaymentMethod::Platform => c.plataforma = order.total,
        }
        c.delivery_fees = order.delivery_fee;
        c.discounts = order.discount;
    }
    c
}

/// Apply one order's contribution to the shift summary and sub-ledger.
///
/// Not idempotent: calling this twice for the same order double-counts.
/// Callers invoke it exactly once per qualifying event (order creation),
/// inside the transaction that writes the order.
pub async fn record_order_contribution(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    shift_id: &str,
    order: &Order,
) -> AppResult<()> {
    let contribution = contribution_for(order);
    shift_repo::apply_contribution(&mut **tx, shift_id, &contribution).await?;
    shift_repo::append_transaction(
        &mut **tx,
        shift_id,
        ShiftTransactionKind::Sale,
        Some(order.payment.method),
        order.total,
        Some(&format!("Pedido #{}", order.daily_number)),
        shared::util::now_millis(),
    )
    .await?;
    Ok(())
}

/// Close the shift (corte de caja). One-way; the repository's SQL guard
/// rejects a second close.
pub async fn close_shift(state: &ServerState, id: &str, payload: ShiftClose) -> AppResult<Shift> {
    let now = shared::util::now_millis();
    let shift = shift_repo::close(
        state.pool(),
        id,
        money::round2(payload.counted_cash),
        payload.notes.as_deref(),
        &payload.closed_by,
        now,
    )
    .await?;

    if let Some(closeout) = &shift.closeout {
        tracing::info!(
            shift = %shift.id,
            expected = closeout.expected_cash,
            counted = closeout.counted_cash,
            variance = closeout.variance,
            "Shift closed"
        );
    }
    state.broadcast_sync(RESOURCE, "updated", &shift.id, Some(&shift));
    Ok(shift)
}

/// Manual drawer movement (withdrawal, deposit, correction). Cash
/// movements also adjust the `efectivo` bucket so the corte stays honest.
pub async fn record_adjustment(
    state: &ServerState,
    shift_id: &str,
    payload: ShiftAdjust,
) -> AppResult<Shift> {
    if payload.kind == ShiftTransactionKind::Sale {
        return Err(AppError::validation(
            "Sales are recorded through orders, not manual adjustments",
        ));
    }
    let amount = money::round2(payload.amount);
    let now = shared::util::now_millis();

    let existing = shift_repo::find_by_id(state.pool(), shift_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Shift {shift_id} not found")))?;
    if existing.status != ShiftStatus::Open {
        return Err(AppError::business_rule(format!(
            "Shift {shift_id} is closed; the corte is final"
        )));
    }

    let mut tx = state.pool().begin().await.map_err(RepoError::from)?;
    if payload.method == Some(PaymentMethod::Cash) {
        let contribution = ShiftContribution {
            efectivo: amount,
            ..Default::default()
        };
        shift_repo::apply_contribution(&mut *tx, shift_id, &contribution).await?;
    }
    shift_repo::append_transaction(
        &mut *tx,
        shift_id,
        payload.kind,
        payload.method,
        amount,
        payload.detail.as_deref(),
        now,
    )
    .await?;
    tx.commit().await.map_err(RepoError::from)?;

    let shift = shift_repo::find_by_id(state.pool(), shift_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Shift {shift_id} not found")))?;
    state.broadcast_sync(RESOURCE, "updated", &shift.id, Some(&shift));
    Ok(shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServerState;
    use crate::db::testing::test_db;
    use shared::ShiftType;

    async fn open_test_shift(state: &ServerState, opening_float: f64) -> Shift {
        open_shift(
            state,
            ShiftOpen {
                shift_type: ShiftType::Matutino,
                cashier_id: "emp_1".into(),
                cashier_name: "Luz".into(),
                opening_float,
                supervisor_id: None,
                supervisor_name: None,
            },
        )
        .await
        .expect("open shift")
    }

    fn cash_order(total: f64) -> Order {
        use shared::models::order::*;
        let mut order = Order {
            id: shared::util::snowflake_id(),
            daily_number: 1,
            channel: Channel::Counter,
            customer: Customer {
                name: "Cliente".into(),
                ..Default::default()
            },
            items: vec![LineItem::new(1, "Item", total, 1)],
            subtotal: 0.0,
            delivery_fee: 0.0,
            discount: 0.0,
            total: 0.0,
            payment: Payment::new(PaymentMethod::Cash, total, total),
            state: OrderState::Pending,
            delivery: None,
            notes: None,
            shift_id: None,
            cancel_reason: None,
            created_at: shared::util::now_millis(),
            preparing_at: None,
            ready_at: None,
            delivered_at: None,
            cancelled_at: None,
        };
        order.recompute_totals();
        order
    }

    async fn contribute(state: &ServerState, shift_id: &str, order: &Order) {
        let mut tx = state.pool().begin().await.unwrap();
        record_order_contribution(&mut tx, shift_id, order)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn second_open_is_a_conflict() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        open_test_shift(&state, 500.0).await;

        let err = open_shift(
            &state,
            ShiftOpen {
                shift_type: ShiftType::Vespertino,
                cashier_id: "emp_2".into(),
                cashier_name: "Leo".into(),
                opening_float: 0.0,
                supervisor_id: None,
                supervisor_name: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn reopening_same_deterministic_id_is_a_conflict() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        let shift = open_test_shift(&state, 500.0).await;

        close_shift(
            &state,
            &shift.id,
            ShiftClose {
                counted_cash: 500.0,
                notes: None,
                closed_by: "emp_1".into(),
            },
        )
        .await
        .unwrap();

        // The morning turno for today already exists; opening it again
        // must not reset or merge it.
        let err = open_shift(
            &state,
            ShiftOpen {
                shift_type: ShiftType::Matutino,
                cashier_id: "emp_1".into(),
                cashier_name: "Luz".into(),
                opening_float: 100.0,
                supervisor_id: None,
                supervisor_name: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn corte_arithmetic_matches_cash_sales() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        let shift = open_test_shift(&state, 500.0).await;

        for amount in [100.0, 150.0, 200.0] {
            contribute(&state, &shift.id, &cash_order(amount)).await;
        }

        let current = shift_repo::find_by_id(state.pool(), &shift.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.summary.efectivo, 450.0);
        assert_eq!(current.summary.total_orders, 3);
        assert_eq!(current.expected_cash(), 950.0);

        let closed = close_shift(
            &state,
            &shift.id,
            ShiftClose {
                counted_cash: 950.0,
                notes: None,
                closed_by: "emp_1".into(),
            },
        )
        .await
        .unwrap();

        let closeout = closed.closeout.expect("closeout stamped");
        assert_eq!(closeout.expected_cash, 950.0);
        assert_eq!(closeout.variance, 0.0);
        assert_eq!(closed.status, ShiftStatus::Closed);
    }

    #[tokio::test]
    async fn variance_reflects_drawer_shortage() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        let shift = open_test_shift(&state, 500.0).await;
        contribute(&state, &shift.id, &cash_order(300.0)).await;

        let closed = close_shift(
            &state,
            &shift.id,
            ShiftClose {
                counted_cash: 780.0,
                notes: Some("faltante".into()),
                closed_by: "emp_1".into(),
            },
        )
        .await
        .unwrap();
        let closeout = closed.closeout.unwrap();
        assert_eq!(closeout.expected_cash, 800.0);
        assert_eq!(closeout.variance, -20.0);
    }

    #[tokio::test]
    async fn closing_twice_is_rejected() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        let shift = open_test_shift(&state, 0.0).await;
        let payload = ShiftClose {
            counted_cash: 0.0,
            notes: None,
            closed_by: "emp_1".into(),
        };
        close_shift(&state, &shift.id, payload.clone()).await.unwrap();
        let err = close_shift(&state, &shift.id, payload).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn double_contribution_double_counts() {
        // Documented limitation, pinned so a future fix is intentional:
        // the ledger has no de-duplication of contributions.
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        let shift = open_test_shift(&state, 0.0).await;
        let order = cash_order(120.0);

        contribute(&state, &shift.id, &order).await;
        contribute(&state, &shift.id, &order).await;

        let current = shift_repo::find_by_id(state.pool(), &shift.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.summary.total_orders, 2);
        assert_eq!(current.summary.efectivo, 240.0);
    }

    #[tokio::test]
    async fn cancelled_orders_count_but_do_not_sell() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        let shift = open_test_shift(&state, 0.0).await;

        let mut order = cash_order(99.0);
        order.state = OrderState::Cancelled;
        contribute(&state, &shift.id, &order).await;

        let current = shift_repo::find_by_id(state.pool(), &shift.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.summary.total_orders, 1);
        assert_eq!(current.summary.total_sales, 0.0);
        assert_eq!(current.summary.efectivo, 0.0);
    }

    #[tokio::test]
    async fn cash_withdrawal_adjusts_expected_cash() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        let shift = open_test_shift(&state, 500.0).await;

        let adjusted = record_adjustment(
            &state,
            &shift.id,
            ShiftAdjust {
                kind: ShiftTransactionKind::Withdrawal,
                method: Some(PaymentMethod::Cash),
                amount: -200.0,
                detail: Some("pago proveedor".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(adjusted.expected_cash(), 300.0);

        let transactions = shift_repo::find_transactions(state.pool(), &shift.id)
            .await
            .unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, ShiftTransactionKind::Withdrawal);
        assert_eq!(transactions[0].amount, -200.0);
    }
}
