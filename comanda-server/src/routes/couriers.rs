//! Courier roster routes.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use shared::{Courier, CourierCreate, CourierUpdate};

use crate::core::ServerState;
use crate::db::repository::courier as courier_repo;
use crate::utils::error::{AppResponse, AppResult, ok};

const RESOURCE: &str = "courier";

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/couriers", get(list).post(create))
        .route("/api/couriers/{id}", get(get_one).patch(update))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    active: bool,
}

async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AppResponse<Vec<Courier>>>> {
    let couriers = courier_repo::find_all(state.pool(), query.active).await?;
    Ok(ok(couriers))
}

async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CourierCreate>,
) -> AppResult<Json<AppResponse<Courier>>> {
    let courier = courier_repo::create(state.pool(), payload).await?;
    state.broadcast_sync(RESOURCE, "created", &courier.id.to_string(), Some(&courier));
    Ok(ok(courier))
}

async fn get_one(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<Courier>>> {
    let courier = courier_repo::get(state.pool(), id).await?;
    Ok(ok(courier))
}

async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<CourierUpdate>,
) -> AppResult<Json<AppResponse<Courier>>> {
    let courier = courier_repo::update(state.pool(), id, payload).await?;
    state.broadcast_sync(RESOURCE, "updated", &courier.id.to_string(), Some(&courier));
    Ok(ok(courier))
}
