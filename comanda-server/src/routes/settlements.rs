//! Settlement (liquidación) routes.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::core::ServerState;
use crate::delivery::{self, SettlementRequest, SettlementResult, SettlementSummary};
use crate::utils::error::{AppResponse, AppResult, ok, ok_with_message};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/settlements", post(settle))
        .route("/api/settlements/preview", get(preview))
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    courier_id: Option<i64>,
}

async fn preview(
    State(state): State<ServerState>,
    Query(query): Query<PreviewQuery>,
) -> AppResult<Json<AppResponse<Vec<SettlementSummary>>>> {
    let summaries = delivery::preview(&state, query.courier_id).await?;
    Ok(ok(summaries))
}

async fn settle(
    State(state): State<ServerState>,
    Json(payload): Json<SettlementRequest>,
) -> AppResult<Json<AppResponse<SettlementResult>>> {
    let result = delivery::settle(&state, payload).await?;
    let message = format!(
        "Liquidación registrada: {} pedidos, {} repartidores",
        result.settled_orders,
        result.couriers.len()
    );
    Ok(ok_with_message(result, message))
}
