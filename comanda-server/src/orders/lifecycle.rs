//! Order lifecycle service.
//!
//! The state machine itself lives in [`shared::OrderState`]; this module
//! enforces it against the database and wires in the side effects each
//! transition carries (audit history, outbox intents, shift contribution,
//! courier accrual).

use shared::models::order::HistoryAction;
use shared::money;
use shared::{
    DeliveryAssignment, DeliveryState, LineItem, Order, OrderAdvance, OrderAssignCourier,
    OrderCancel, OrderCreate, OrderState, Payment, PaymentMethod,
};

use crate::core::ServerState;
use crate::db::repository::RepoError;
use crate::db::repository::shift::{self as shift_repo, ShiftContribution};
use crate::db::repository::{courier as courier_repo, notification as outbox, order as order_repo};
use crate::notifications;
use crate::shifts;
use crate::utils::{AppError, AppResult, time};

const RESOURCE: &str = "order";

/// A transition the state machine does not define.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderState, to: OrderState },
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        AppError::BusinessRule(err.to_string())
    }
}

fn validate_create(payload: &OrderCreate) -> AppResult<()> {
    if payload.items.is_empty() {
        return Err(AppError::validation("Order must have at least one item"));
    }
    for item in &payload.items {
        if item.quantity < 1 {
            return Err(AppError::validation(format!(
                "Invalid quantity {} for {}",
                item.quantity, item.name
            )));
        }
        if item.unit_price < 0.0 {
            return Err(AppError::validation(format!(
                "Negative unit price for {}",
                item.name
            )));
        }
    }
    if payload.delivery_fee < 0.0 {
        return Err(AppError::validation("Delivery fee cannot be negative"));
    }
    if payload.discount < 0.0 {
        return Err(AppError::validation("Discount cannot be negative"));
    }
    Ok(())
}

/// Take a new order.
///
/// Requires an open shift, since every sale must land in a drawer. The order
/// row, its `created` history entry, the kitchen notification and the
/// shift contribution commit in one transaction.
pub async fn create_order(state: &ServerState, payload: OrderCreate) -> AppResult<Order> {
    validate_create(&payload)?;

    let shift = shift_repo::find_any_open(state.pool())
        .await?
        .ok_or_else(|| AppError::business_rule("No open shift; open a turno before selling"))?;

    let tz = state.config.timezone;
    let day_start = time::day_start_millis(time::today(tz), tz);
    let daily_number = order_repo::count_since(state.pool(), day_start).await? + 1;

    let now = shared::util::now_millis();
    let items: Vec<LineItem> = payload
        .items
        .into_iter()
        .map(|input| {
            let mut item = LineItem::new(input.product_id, input.name, input.unit_price, input.quantity);
            item.customizations = input.customizations;
            item.extra_attrs = input.extra_attrs;
            item.note = input.note;
            item
        })
        .collect();

    let mut order = Order {
        id: shared::util::snowflake_id(),
        daily_number,
        channel: payload.channel,
        customer: payload.customer,
        items,
        subtotal: 0.0,
        delivery_fee: money::round2(payload.delivery_fee),
        discount: money::round2(payload.discount),
        total: 0.0,
        payment: Payment::new(payload.payment.method, payload.payment.amount_tendered, 0.0),
        state: OrderState::Pending,
        delivery: None,
        notes: payload.notes,
        shift_id: Some(shift.id.clone()),
        cancel_reason: None,
        created_at: now,
        preparing_at: None,
        ready_at: None,
        delivered_at: None,
        cancelled_at: None,
    };
    order.recompute_totals();

    if order.payment.method == PaymentMethod::Cash
        && order.payment.amount_tendered < order.total - money::MONEY_TOLERANCE
    {
        return Err(AppError::validation(format!(
            "Cash tendered {} is less than the total {}",
            money::format_money(order.payment.amount_tendered),
            money::format_money(order.total)
        )));
    }

    let mut tx = state.pool().begin().await.map_err(RepoError::from)?;
    order_repo::create(&mut *tx, &order).await?;
    order_repo::append_history(
        &mut *tx,
        order.id,
        HistoryAction::Created,
        None,
        Some(OrderState::Pending),
        &payload.actor,
        None,
        now,
    )
    .await?;
    outbox::enqueue(&mut *tx, &notifications::new_order_intent(&order), now).await?;
    shifts::record_order_contribution(&mut tx, &shift.id, &order).await?;
    tx.commit().await.map_err(RepoError::from)?;

    tracing::info!(
        order = order.id,
        daily = order.daily_number,
        channel = %order.channel.as_str(),
        total = order.total,
        "Order created"
    );
    state.broadcast_sync(RESOURCE, "created", &order.id.to_string(), Some(&order));
    Ok(order)
}

/// Advance the order one step along the fixed sequence.
///
/// Cancellation goes through [`cancel_order`]: it needs a reason, so
/// `target = cancelado` is rejected here rather than silently accepted
/// without one.
pub async fn advance_order(state: &ServerState, id: i64, payload: OrderAdvance) -> AppResult<Order> {
    if payload.target == OrderState::Cancelled {
        return Err(AppError::validation(
            "Cancellation requires a reason; use the cancel operation",
        ));
    }

    let order = order_repo::get(state.pool(), id).await?;
    if !order.state.can_advance_to(payload.target) {
        return Err(LifecycleError::InvalidTransition {
            from: order.state,
            to: payload.target,
        }
        .into());
    }
    if payload.target == OrderState::OutForDelivery && order.delivery.is_none() {
        return Err(AppError::business_rule(
            "Assign a courier before sending the order out",
        ));
    }

    let now = shared::util::now_millis();
    let mut tx = state.pool().begin().await.map_err(RepoError::from)?;
    order_repo::set_state(&mut *tx, id, order.state, payload.target, now).await?;
    order_repo::append_history(
        &mut *tx,
        id,
        HistoryAction::StateChanged,
        Some(order.state),
        Some(payload.target),
        &payload.actor,
        None,
        now,
    )
    .await?;

    match payload.target {
        OrderState::Ready => {
            outbox::enqueue(&mut *tx, &notifications::order_ready_intent(&order), now).await?;
        }
        OrderState::OutForDelivery => {
            order_repo::set_delivery_state(&mut *tx, id, DeliveryState::InTransit).await?;
        }
        OrderState::Delivered => {
            if let Some(delivery) = &order.delivery {
                order_repo::set_delivery_state(&mut *tx, id, DeliveryState::Delivered).await?;
                // The courier collected the total and keeps the commission;
                // the difference is owed back at settlement.
                let payout = money::to_f64(
                    money::to_decimal(order.total) - money::to_decimal(delivery.commission),
                );
                courier_repo::accrue_delivery(&mut *tx, delivery.courier_id, payout, now).await?;

                // The commission only becomes real at delivery, so it
                // lands in the shift summary here rather than at intake.
                if let Some(shift_id) = &order.shift_id {
                    let commission = ShiftContribution {
                        commissions: delivery.commission,
                        ..Default::default()
                    };
                    match shift_repo::apply_contribution(&mut *tx, shift_id, &commission).await {
                        Ok(()) => {}
                        // Delivered after the corte: the shift is final and
                        // the commission stays on the courier ledger only.
                        Err(RepoError::NotFound(_)) => {
                            tracing::warn!(
                                order = id,
                                shift = %shift_id,
                                "Delivery commission landed after shift close"
                            );
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            outbox::enqueue(&mut *tx, &notifications::order_delivered_intent(&order), now).await?;
        }
        _ => {}
    }
    tx.commit().await.map_err(RepoError::from)?;

    let updated = order_repo::get(state.pool(), id).await?;
    tracing::info!(order = id, from = %order.state, to = %updated.state, "Order advanced");
    state.broadcast_sync(RESOURCE, "updated", &id.to_string(), Some(&updated));
    Ok(updated)
}

/// Cancel an open order, recording why.
pub async fn cancel_order(state: &ServerState, id: i64, payload: OrderCancel) -> AppResult<Order> {
    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(AppError::validation("Cancellation reason is required"));
    }

    let order = order_repo::get(state.pool(), id).await?;
    if !order.state.can_advance_to(OrderState::Cancelled) {
        return Err(LifecycleError::InvalidTransition {
            from: order.state,
            to: OrderState::Cancelled,
        }
        .into());
    }

    let now = shared::util::now_millis();
    let mut tx = state.pool().begin().await.map_err(RepoError::from)?;
    order_repo::set_state(&mut *tx, id, order.state, OrderState::Cancelled, now).await?;
    order_repo::set_cancel_reason(&mut *tx, id, reason).await?;
    order_repo::append_history(
        &mut *tx,
        id,
        HistoryAction::Cancelled,
        Some(order.state),
        Some(OrderState::Cancelled),
        &payload.actor,
        Some(reason),
        now,
    )
    .await?;
    if let Some(delivery) = &order.delivery {
        courier_repo::accrue_cancellation(&mut *tx, delivery.courier_id, now).await?;
    }
    tx.commit().await.map_err(RepoError::from)?;

    let updated = order_repo::get(state.pool(), id).await?;
    tracing::info!(order = id, reason, "Order cancelled");
    state.broadcast_sync(RESOURCE, "updated", &id.to_string(), Some(&updated));
    Ok(updated)
}

/// Put a courier on the order.
///
/// The commission is evaluated once against the current total and frozen
/// into the assignment; later commission-model edits on the courier never
/// touch existing orders.
pub async fn assign_courier(
    state: &ServerState,
    id: i64,
    payload: OrderAssignCourier,
) -> AppResult<Order> {
    let order = order_repo::get(state.pool(), id).await?;
    if order.is_terminal() {
        return Err(AppError::business_rule(format!(
            "Order {id} is {}; couriers can only take open orders",
            order.state
        )));
    }

    let courier = courier_repo::get(state.pool(), payload.courier_id).await?;
    if !courier.active {
        return Err(AppError::validation(format!(
            "Courier {} is inactive",
            courier.name
        )));
    }

    let now = shared::util::now_millis();
    let delivery = DeliveryAssignment {
        courier_id: courier.id,
        courier_name: courier.name.clone(),
        commission: courier.commission.commission_for(order.total),
        state: DeliveryState::Assigned,
        assigned_at: now,
        settled: false,
        settled_at: None,
    };

    let mut tx = state.pool().begin().await.map_err(RepoError::from)?;
    order_repo::set_delivery_assignment(&mut *tx, id, &delivery).await?;
    order_repo::append_history(
        &mut *tx,
        id,
        HistoryAction::CourierAssigned,
        None,
        None,
        &payload.actor,
        Some(&courier.name),
        now,
    )
    .await?;
    tx.commit().await.map_err(RepoError::from)?;

    let updated = order_repo::get(state.pool(), id).await?;
    tracing::info!(order = id, courier = %courier.name, commission = delivery.commission, "Courier assigned");
    state.broadcast_sync(RESOURCE, "updated", &id.to_string(), Some(&updated));
    Ok(updated)
}
