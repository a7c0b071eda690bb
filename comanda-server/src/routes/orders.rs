//! Order routes.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use shared::{
    Order, OrderAdvance, OrderAssignCourier, OrderCancel, OrderCreate, OrderHistoryEntry,
    OrderState,
};

use crate::core::ServerState;
use crate::db::repository::order as order_repo;
use crate::orders;
use crate::utils::error::{AppError, AppResponse, AppResult, ok};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/orders", post(create).get(list))
        .route("/api/orders/unsettled", get(list_unsettled))
        .route("/api/orders/{id}", get(get_one))
        .route("/api/orders/{id}/history", get(history))
        .route("/api/orders/{id}/advance", post(advance))
        .route("/api/orders/{id}/cancel", post(cancel))
        .route("/api/orders/{id}/assign", post(assign))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    state: Option<String>,
    limit: Option<i32>,
    offset: Option<i32>,
}

async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<OrderCreate>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = orders::create_order(&state, payload).await?;
    Ok(ok(order))
}

async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AppResponse<Vec<Order>>>> {
    let filter = match &query.state {
        Some(token) => Some(
            OrderState::parse(token)
                .ok_or_else(|| AppError::validation(format!("Unknown order state: {token}")))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    let orders = order_repo::find_all(state.pool(), filter, limit, offset).await?;
    Ok(ok(orders))
}

#[derive(Debug, Deserialize)]
struct UnsettledQuery {
    courier_id: Option<i64>,
}

async fn list_unsettled(
    State(state): State<ServerState>,
    Query(query): Query<UnsettledQuery>,
) -> AppResult<Json<AppResponse<Vec<Order>>>> {
    let orders = crate::delivery::list_unsettled(&state, query.courier_id).await?;
    Ok(ok(orders))
}

async fn get_one(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = order_repo::get(state.pool(), id).await?;
    Ok(ok(order))
}

async fn history(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<Vec<OrderHistoryEntry>>>> {
    // 404 for unknown orders rather than an empty history
    order_repo::get(state.pool(), id).await?;
    let entries = order_repo::find_history(state.pool(), id).await?;
    Ok(ok(entries))
}

async fn advance(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<OrderAdvance>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = orders::advance_order(&state, id, payload).await?;
    Ok(ok(order))
}

async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<OrderCancel>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = orders::cancel_order(&state, id, payload).await?;
    Ok(ok(order))
}

async fn assign(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<OrderAssignCourier>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = orders::assign_courier(&state, id, payload).await?;
    Ok(ok(order))
}
