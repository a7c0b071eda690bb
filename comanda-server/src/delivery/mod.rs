//! Delivery settlement (liquidación).
//!
//! Couriers collect order totals on the street and keep their commission;
//! settlement is the moment they hand the rest over. A settlement batch is
//! atomic: every order flag, its audit entry and the courier balance move
//! in one transaction, so a failure mid-batch settles nothing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::order::HistoryAction;
use shared::money;
use shared::{Actor, Order};

use crate::core::ServerState;
use crate::db::repository::RepoError;
use crate::db::repository::{courier as courier_repo, order as order_repo};
use crate::utils::{AppError, AppResult};

/// Per-courier totals for a set of unsettled orders.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementSummary {
    pub courier_id: i64,
    pub courier_name: String,
    pub order_ids: Vec<i64>,
    /// Sum of order totals the courier collected
    pub total: f64,
    /// Commission the courier keeps
    pub commission: f64,
    /// total - commission, owed back to the restaurant
    pub payout: f64,
}

/// Settle request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementRequest {
    pub order_ids: Vec<i64>,
    pub actor: Actor,
}

/// Result of a committed settlement batch.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementResult {
    pub settled_orders: usize,
    pub couriers: Vec<SettlementSummary>,
    pub settled_at: i64,
}

/// Delivered-but-unsettled orders, optionally for one courier.
pub async fn list_unsettled(
    state: &ServerState,
    courier_id: Option<i64>,
) -> AppResult<Vec<Order>> {
    Ok(order_repo::find_unsettled(state.pool(), courier_id).await?)
}

fn summarize(orders: &[Order]) -> Vec<SettlementSummary> {
    let mut summaries: Vec<SettlementSummary> = Vec::new();
    for order in orders {
        let Some(delivery) = &order.delivery else {
            continue;
        };
        let idx = match summaries
            .iter()
            .position(|s| s.courier_id == delivery.courier_id)
        {
            Some(idx) => idx,
            None => {
                summaries.push(SettlementSummary {
                    courier_id: delivery.courier_id,
                    courier_name: delivery.courier_name.clone(),
                    order_ids: Vec::new(),
                    total: 0.0,
                    commission: 0.0,
                    payout: 0.0,
                });
                summaries.len() - 1
            }
        };
        let summary = &mut summaries[idx];
        summary.order_ids.push(order.id);
        summary.total = money::to_f64(
            money::to_decimal(summary.total) + money::to_decimal(order.total),
        );
        summary.commission = money::to_f64(
            money::to_decimal(summary.commission) + money::to_decimal(delivery.commission),
        );
    }
    for summary in &mut summaries {
        summary.payout = money::to_f64(
            money::to_decimal(summary.total) - money::to_decimal(summary.commission),
        );
    }
    summaries
}

/// What a settlement of the current unsettled orders would pay, grouped by
/// courier. Read-only.
pub async fn preview(
    state: &ServerState,
    courier_id: Option<i64>,
) -> AppResult<Vec<SettlementSummary>> {
    let orders = order_repo::find_unsettled(state.pool(), courier_id).await?;
    Ok(summarize(&orders))
}

/// Settle a batch of delivered orders.
///
/// Validates every order up front, then commits the whole batch in one
/// transaction: settlement flags, audit entries and courier balances
/// either all move or none do.
pub async fn settle(state: &ServerState, payload: SettlementRequest) -> AppResult<SettlementResult> {
    if payload.order_ids.is_empty() {
        return Err(AppError::validation("Nothing to settle"));
    }

    let mut orders = Vec::with_capacity(payload.order_ids.len());
    for id in &payload.order_ids {
        let order = order_repo::get(state.pool(), *id).await?;
        match &order.delivery {
            None => {
                return Err(AppError::validation(format!(
                    "Order {id} has no courier to settle"
                )));
            }
            Some(delivery) if delivery.settled => {
                return Err(AppError::validation(format!("Order {id} is already settled")));
            }
            Some(_) => {}
        }
        orders.push(order);
    }
    let summaries = summarize(&orders);

    let now = shared::util::now_millis();
    let mut tx = state.pool().begin().await.map_err(RepoError::from)?;
    for order in &orders {
        // Re-checked in SQL: only delivered, unsettled rows flip.
        order_repo::mark_settled(&mut *tx, order.id, now).await?;
        order_repo::append_history(
            &mut *tx,
            order.id,
            HistoryAction::Settled,
            None,
            None,
            &payload.actor,
            None,
            now,
        )
        .await?;
    }
    for summary in &summaries {
        courier_repo::reduce_pending_balance(&mut *tx, summary.courier_id, summary.payout, now)
            .await?;
    }
    tx.commit().await.map_err(RepoError::from)?;

    let total: Decimal = summaries.iter().map(|s| money::to_decimal(s.payout)).sum();
    tracing::info!(
        orders = orders.len(),
        couriers = summaries.len(),
        payout = %total,
        "Settlement committed"
    );
    for order in &orders {
        state.broadcast_sync("order", "updated", &order.id.to_string(), Some(order));
    }

    Ok(SettlementResult {
        settled_orders: orders.len(),
        couriers: summaries,
        settled_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServerState;
    use crate::db::testing::test_db;
    use crate::orders::{advance_order, assign_courier, create_order};
    use crate::shifts;
    use shared::models::order::{
        Actor, Channel, Customer, LineItemInput, OrderAdvance, OrderAssignCourier, OrderCreate,
        OrderState, PaymentInput, PaymentMethod,
    };
    use shared::{CommissionModel, CourierCreate, ShiftOpen, ShiftType};

    fn actor() -> Actor {
        Actor {
            id: "emp_1".into(),
            name: "Luz".into(),
        }
    }

    async fn setup() -> (ServerState, tempfile::TempDir) {
        let (db, dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        shifts::open_shift(
            &state,
            ShiftOpen {
                shift_type: ShiftType::Matutino,
                cashier_id: "emp_1".into(),
                cashier_name: "Luz".into(),
                opening_float: 0.0,
                supervisor_id: None,
                supervisor_name: None,
            },
        )
        .await
        .unwrap();
        (state, dir)
    }

    async fn delivered_order(state: &ServerState, courier_id: i64, amount: f64) -> Order {
        let order = create_order(
            state,
            OrderCreate {
                channel: Channel::Phone,
                customer: Customer {
                    name: "Ana".into(),
                    ..Default::default()
                },
                items: vec![LineItemInput {
                    product_id: 1,
                    name: "Torta".into(),
                    unit_price: amount,
                    quantity: 1,
                    customizations: Vec::new(),
                    extra_attrs: Default::default(),
                    note: None,
                }],
                delivery_fee: 0.0,
                discount: 0.0,
                payment: PaymentInput {
                    method: PaymentMethod::Cash,
                    amount_tendered: amount,
                },
                notes: None,
                actor: actor(),
            },
        )
        .await
        .unwrap();

        for target in [OrderState::Preparing, OrderState::Ready] {
            advance_order(state, order.id, OrderAdvance { target, actor: actor() })
                .await
                .unwrap();
        }
        assign_courier(
            state,
            order.id,
            OrderAssignCourier {
                courier_id,
                actor: actor(),
            },
        )
        .await
        .unwrap();
        for target in [OrderState::OutForDelivery, OrderState::Delivered] {
            advance_order(state, order.id, OrderAdvance { target, actor: actor() })
                .await
                .unwrap();
        }
        order
    }

    async fn fixed_courier(state: &ServerState, name: &str, amount: f64) -> i64 {
        crate::db::repository::courier::create(
            state.pool(),
            CourierCreate {
                name: name.into(),
                phone: None,
                commission: CommissionModel::Fixed { amount },
                account_id: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn preview_groups_by_courier() {
        let (state, _dir) = setup().await;
        let beto = fixed_courier(&state, "Beto", 30.0).await;
        let carla = fixed_courier(&state, "Carla", 25.0).await;

        delivered_order(&state, beto, 250.0).await;
        delivered_order(&state, beto, 100.0).await;
        delivered_order(&state, carla, 80.0).await;

        let summaries = preview(&state, None).await.unwrap();
        assert_eq!(summaries.len(), 2);

        let beto_summary = summaries.iter().find(|s| s.courier_id == beto).unwrap();
        assert_eq!(beto_summary.order_ids.len(), 2);
        assert_eq!(beto_summary.total, 350.0);
        assert_eq!(beto_summary.commission, 60.0);
        assert_eq!(beto_summary.payout, 290.0);

        let carla_summary = summaries.iter().find(|s| s.courier_id == carla).unwrap();
        assert_eq!(carla_summary.payout, 55.0);
    }

    #[tokio::test]
    async fn settle_flips_exactly_the_targeted_orders() {
        let (state, _dir) = setup().await;
        let beto = fixed_courier(&state, "Beto", 30.0).await;

        let first = delivered_order(&state, beto, 250.0).await;
        let second = delivered_order(&state, beto, 100.0).await;

        let result = settle(
            &state,
            SettlementRequest {
                order_ids: vec![first.id],
                actor: actor(),
            },
        )
        .await
        .unwrap();
        assert_eq!(result.settled_orders, 1);
        assert_eq!(result.couriers[0].payout, 220.0);

        let remaining = list_unsettled(&state, Some(beto)).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.id);

        // Partial batch only releases what it settled.
        let courier = crate::db::repository::courier::get(state.pool(), beto)
            .await
            .unwrap();
        assert_eq!(courier.pending_balance, 70.0);
    }

    #[tokio::test]
    async fn resettling_is_rejected_and_changes_nothing() {
        let (state, _dir) = setup().await;
        let beto = fixed_courier(&state, "Beto", 30.0).await;
        let order = delivered_order(&state, beto, 250.0).await;

        let request = SettlementRequest {
            order_ids: vec![order.id],
            actor: actor(),
        };
        settle(&state, request.clone()).await.unwrap();
        let err = settle(&state, request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let courier = crate::db::repository::courier::get(state.pool(), beto)
            .await
            .unwrap();
        assert_eq!(courier.pending_balance, 0.0);
    }

    #[tokio::test]
    async fn undelivered_orders_cannot_settle() {
        let (state, _dir) = setup().await;
        let beto = fixed_courier(&state, "Beto", 30.0).await;
        let order = create_order(
            &state,
            OrderCreate {
                channel: Channel::Counter,
                customer: Customer {
                    name: "Ana".into(),
                    ..Default::default()
                },
                items: vec![LineItemInput {
                    product_id: 1,
                    name: "Torta".into(),
                    unit_price: 50.0,
                    quantity: 1,
                    customizations: Vec::new(),
                    extra_attrs: Default::default(),
                    note: None,
                }],
                delivery_fee: 0.0,
                discount: 0.0,
                payment: PaymentInput {
                    method: PaymentMethod::Cash,
                    amount_tendered: 50.0,
                },
                notes: None,
                actor: actor(),
            },
        )
        .await
        .unwrap();
        assign_courier(
            &state,
            order.id,
            OrderAssignCourier {
                courier_id: beto,
                actor: actor(),
            },
        )
        .await
        .unwrap();

        let err = settle(
            &state,
            SettlementRequest {
                order_ids: vec![order.id],
                actor: actor(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
