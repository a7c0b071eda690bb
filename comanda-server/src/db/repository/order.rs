//! Order Repository
//!
//! Orders are stored as one row per order with line items embedded as a
//! JSON array (they are owned exclusively by the order and never queried
//! on their own). The history table is append-only.

use shared::models::order::HistoryAction;
use shared::{Actor, DeliveryAssignment, DeliveryState, Order, OrderHistoryEntry, OrderState};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};

use super::{RepoError, RepoResult};

fn order_from_row(row: &SqliteRow) -> RepoResult<Order> {
    let items_json: String = row.try_get("items")?;
    let items = serde_json::from_str(&items_json)
        .map_err(|e| RepoError::Database(format!("Corrupt items JSON: {e}")))?;

    let channel_str: String = row.try_get("channel")?;
    let channel = shared::Channel::parse(&channel_str)
        .ok_or_else(|| RepoError::Database(format!("Unknown channel: {channel_str}")))?;

    let state_str: String = row.try_get("state")?;
    let state = OrderState::parse(&state_str)
        .ok_or_else(|| RepoError::Database(format!("Unknown order state: {state_str}")))?;

    let method_str: String = row.try_get("payment_method")?;
    let method = shared::PaymentMethod::parse(&method_str)
        .ok_or_else(|| RepoError::Database(format!("Unknown payment method: {method_str}")))?;

    let courier_id: Option<i64> = row.try_get("courier_id")?;
    let delivery = match courier_id {
        Some(courier_id) => {
            let delivery_state_str: Option<String> = row.try_get("delivery_state")?;
            let delivery_state = delivery_state_str
                .as_deref()
                .and_then(DeliveryState::parse)
                .unwrap_or(DeliveryState::Assigned);
            Some(DeliveryAssignment {
                courier_id,
                courier_name: row.try_get::<Option<String>, _>("courier_name")?.unwrap_or_default(),
                commission: row.try_get::<Option<f64>, _>("commission")?.unwrap_or(0.0),
                state: delivery_state,
                assigned_at: row.try_get::<Option<i64>, _>("assigned_at")?.unwrap_or(0),
                settled: row.try_get("settled")?,
                settled_at: row.try_get("settled_at")?,
            })
        }
        None => None,
    };

    Ok(Order {
        id: row.try_get("id")?,
        daily_number: row.try_get("daily_number")?,
        channel,
        customer: shared::Customer {
            name: row.try_get("customer_name")?,
            phone: row.try_get("customer_phone")?,
            address: row.try_get("customer_address")?,
            neighborhood: row.try_get("customer_neighborhood")?,
            reference: row.try_get("customer_reference")?,
        },
        items,
        subtotal: row.try_get("subtotal")?,
        delivery_fee: row.try_get("delivery_fee")?,
        discount: row.try_get("discount")?,
        total: row.try_get("total")?,
        payment: shared::Payment {
            method,
            amount_tendered: row.try_get("amount_tendered")?,
            change_due: row.try_get("change_due")?,
            requires_change: row.try_get("requires_change")?,
        },
        state,
        delivery,
        notes: row.try_get("notes")?,
        shift_id: row.try_get("shift_id")?,
        cancel_reason: row.try_get("cancel_reason")?,
        created_at: row.try_get("created_at")?,
        preparing_at: row.try_get("preparing_at")?,
        ready_at: row.try_get("ready_at")?,
        delivered_at: row.try_get("delivered_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

fn history_from_row(row: &SqliteRow) -> RepoResult<OrderHistoryEntry> {
    let action_str: String = row.try_get("action")?;
    let action = HistoryAction::parse(&action_str)
        .ok_or_else(|| RepoError::Database(format!("Unknown history action: {action_str}")))?;
    let prev_state: Option<String> = row.try_get("prev_state")?;
    let new_state: Option<String> = row.try_get("new_state")?;
    Ok(OrderHistoryEntry {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        action,
        prev_state: prev_state.as_deref().and_then(OrderState::parse),
        new_state: new_state.as_deref().and_then(OrderState::parse),
        actor_id: row.try_get("actor_id")?,
        actor_name: row.try_get("actor_name")?,
        detail: row.try_get("detail")?,
        timestamp: row.try_get("timestamp")?,
    })
}

/// Insert a full order row. Composable into a transaction.
pub async fn create<'e, E>(ex: E, order: &Order) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let items_json = serde_json::to_string(&order.items)
        .map_err(|e| RepoError::Validation(format!("Unserializable items: {e}")))?;

    sqlx::query(
        r#"INSERT INTO orders (
            id, daily_number, channel,
            customer_name, customer_phone, customer_address, customer_neighborhood, customer_reference,
            items, subtotal, delivery_fee, discount, total,
            payment_method, amount_tendered, change_due, requires_change,
            state, notes, shift_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(order.id)
    .bind(order.daily_number)
    .bind(order.channel.as_str())
    .bind(&order.customer.name)
    .bind(&order.customer.phone)
    .bind(&order.customer.address)
    .bind(&order.customer.neighborhood)
    .bind(&order.customer.reference)
    .bind(items_json)
    .bind(order.subtotal)
    .bind(order.delivery_fee)
    .bind(order.discount)
    .bind(order.total)
    .bind(order.payment.method.as_str())
    .bind(order.payment.amount_tendered)
    .bind(order.payment.change_due)
    .bind(order.payment.requires_change)
    .bind(order.state.as_str())
    .bind(&order.notes)
    .bind(&order.shift_id)
    .bind(order.created_at)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Order>> {
    let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(order_from_row).transpose()
}

pub async fn get(pool: &SqlitePool, id: i64) -> RepoResult<Order> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Order {id} not found")))
}

/// Orders newest-first, optionally filtered to one lifecycle state.
pub async fn find_all(
    pool: &SqlitePool,
    state: Option<OrderState>,
    limit: i32,
    offset: i32,
) -> RepoResult<Vec<Order>> {
    let rows = match state {
        Some(state) => {
            sqlx::query(
                "SELECT * FROM orders WHERE state = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
            )
            .bind(state.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query("SELECT * FROM orders ORDER BY created_at DESC LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        }
    };
    rows.iter().map(order_from_row).collect()
}

/// Number of orders created since `start_millis`, used for the sequential
/// daily number.
pub async fn count_since(pool: &SqlitePool, start_millis: i64) -> RepoResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE created_at >= ?")
        .bind(start_millis)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Advance the state column and stamp the state-specific timestamp.
///
/// Guarded on the state the caller read: a writer holding a stale
/// snapshot matches zero rows instead of clobbering a concurrent change.
pub async fn set_state<'e, E>(
    ex: E,
    id: i64,
    from: OrderState,
    to: OrderState,
    now: i64,
) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    // One static statement per stamped column; no dynamic SQL.
    let query = match to {
        OrderState::Preparing => {
            sqlx::query("UPDATE orders SET state = ?, preparing_at = ? WHERE id = ? AND state = ?")
        }
        OrderState::Ready => {
            sqlx::query("UPDATE orders SET state = ?, ready_at = ? WHERE id = ? AND state = ?")
        }
        OrderState::Delivered => {
            sqlx::query("UPDATE orders SET state = ?, delivered_at = ? WHERE id = ? AND state = ?")
        }
        OrderState::Cancelled => {
            sqlx::query("UPDATE orders SET state = ?, cancelled_at = ? WHERE id = ? AND state = ?")
        }
        // pending/en_reparto have no dedicated timestamp column
        _ => sqlx::query("UPDATE orders SET state = ? WHERE id = ? AND state = ?"),
    };

    let result = match to {
        OrderState::Pending | OrderState::OutForDelivery => query
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .execute(ex)
            .await?,
        _ => query
            .bind(to.as_str())
            .bind(now)
            .bind(id)
            .bind(from.as_str())
            .execute(ex)
            .await?,
    };

    if result.rows_affected() == 0 {
        return Err(RepoError::Validation(format!(
            "Order {id} not found or no longer {from}"
        )));
    }
    Ok(())
}

pub async fn set_cancel_reason<'e, E>(ex: E, id: i64, reason: &str) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE orders SET cancel_reason = ? WHERE id = ?")
        .bind(reason)
        .bind(id)
        .execute(ex)
        .await?;
    Ok(())
}

/// Write the embedded delivery assignment created when a courier takes the
/// order.
pub async fn set_delivery_assignment<'e, E>(
    ex: E,
    id: i64,
    delivery: &DeliveryAssignment,
) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE orders SET courier_id = ?, courier_name = ?, commission = ?, delivery_state = ?, assigned_at = ?, settled = 0, settled_at = NULL WHERE id = ?",
    )
    .bind(delivery.courier_id)
    .bind(&delivery.courier_name)
    .bind(delivery.commission)
    .bind(delivery.state.as_str())
    .bind(delivery.assigned_at)
    .bind(id)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn set_delivery_state<'e, E>(ex: E, id: i64, state: DeliveryState) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE orders SET delivery_state = ? WHERE id = ? AND courier_id IS NOT NULL",
    )
    .bind(state.as_str())
    .bind(id)
    .execute(ex)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Order {id} has no courier assigned"
        )));
    }
    Ok(())
}

/// Flip the settlement flag. Guarded in SQL: only delivered, unsettled
/// orders match, so re-settling affects zero rows.
pub async fn mark_settled<'e, E>(ex: E, id: i64, now: i64) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE orders SET settled = 1, settled_at = ? WHERE id = ? AND state = 'entregado' AND settled = 0",
    )
    .bind(now)
    .bind(id)
    .execute(ex)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::Validation(format!(
            "Order {id} is not delivered or already settled"
        )));
    }
    Ok(())
}

/// Delivered-but-unsettled orders, optionally for one courier.
pub async fn find_unsettled(
    pool: &SqlitePool,
    courier_id: Option<i64>,
) -> RepoResult<Vec<Order>> {
    let rows = match courier_id {
        Some(courier_id) => {
            sqlx::query(
                "SELECT * FROM orders WHERE state = 'entregado' AND settled = 0 AND courier_id = ? ORDER BY delivered_at",
            )
            .bind(courier_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT * FROM orders WHERE state = 'entregado' AND settled = 0 AND courier_id IS NOT NULL ORDER BY delivered_at",
            )
            .fetch_all(pool)
            .await?
        }
    };
    rows.iter().map(order_from_row).collect()
}

/// Non-terminal orders created before `cutoff_millis`: the stale-order
/// sweep input.
pub async fn find_stale_open(pool: &SqlitePool, cutoff_millis: i64) -> RepoResult<Vec<Order>> {
    let rows = sqlx::query(
        "SELECT * FROM orders WHERE state NOT IN ('entregado', 'cancelado') AND created_at < ? ORDER BY created_at",
    )
    .bind(cutoff_millis)
    .fetch_all(pool)
    .await?;
    rows.iter().map(order_from_row).collect()
}

/// Append one audit row. Never updated or deleted afterwards.
#[allow(clippy::too_many_arguments)]
pub async fn append_history<'e, E>(
    ex: E,
    order_id: i64,
    action: HistoryAction,
    prev_state: Option<OrderState>,
    new_state: Option<OrderState>,
    actor: &Actor,
    detail: Option<&str>,
    now: i64,
) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO order_history (order_id, action, prev_state, new_state, actor_id, actor_name, detail, timestamp) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(action.as_str())
    .bind(prev_state.map(|s| s.as_str()))
    .bind(new_state.map(|s| s.as_str()))
    .bind(&actor.id)
    .bind(&actor.name)
    .bind(detail)
    .bind(now)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn find_history(pool: &SqlitePool, order_id: i64) -> RepoResult<Vec<OrderHistoryEntry>> {
    let rows = sqlx::query(
        "SELECT * FROM order_history WHERE order_id = ? ORDER BY timestamp, id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(history_from_row).collect()
}
