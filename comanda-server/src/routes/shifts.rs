//! Shift (turno) routes.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use shared::{Shift, ShiftAdjust, ShiftClose, ShiftOpen, ShiftTransaction};

use crate::core::ServerState;
use crate::db::repository::shift as shift_repo;
use crate::shifts;
use crate::utils::error::{AppError, AppResponse, AppResult, ok};
use crate::utils::time;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/shifts", get(list))
        .route("/api/shifts/open", post(open))
        .route("/api/shifts/current", get(current))
        .route("/api/shifts/stale", get(stale))
        .route("/api/shifts/{id}", get(get_one))
        .route("/api/shifts/{id}/close", post(close))
        .route("/api/shifts/{id}/adjust", post(adjust))
        .route("/api/shifts/{id}/transactions", get(transactions))
}

async fn open(
    State(state): State<ServerState>,
    Json(payload): Json<ShiftOpen>,
) -> AppResult<Json<AppResponse<Shift>>> {
    let shift = shifts::open_shift(&state, payload).await?;
    Ok(ok(shift))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    /// Business date (YYYY-MM-DD); overrides paging when present
    date: Option<String>,
    limit: Option<i32>,
    offset: Option<i32>,
}

async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AppResponse<Vec<Shift>>>> {
    let shifts = match &query.date {
        Some(date) => {
            let date = time::parse_date(date)?;
            let tz = state.config.timezone;
            shift_repo::find_by_date_range(
                state.pool(),
                time::day_start_millis(date, tz),
                time::day_end_millis(date, tz),
            )
            .await?
        }
        None => {
            let limit = query.limit.unwrap_or(50).clamp(1, 200);
            let offset = query.offset.unwrap_or(0).max(0);
            shift_repo::find_all(state.pool(), limit, offset).await?
        }
    };
    Ok(ok(shifts))
}

async fn current(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Shift>>> {
    let shift = shift_repo::find_any_open(state.pool())
        .await?
        .ok_or_else(|| AppError::not_found("No open shift"))?;
    Ok(ok(shift))
}

/// Shifts still open from a previous business day, left behind without a
/// corte. Surfaces them so an operator can close them out.
async fn stale(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<Shift>>>> {
    let tz = state.config.timezone;
    let day_start = time::day_start_millis(time::today(tz), tz);
    let shifts = shift_repo::find_stale_open(state.pool(), day_start).await?;
    Ok(ok(shifts))
}

async fn get_one(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Shift>>> {
    let shift = shift_repo::find_by_id(state.pool(), &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Shift {id} not found")))?;
    Ok(ok(shift))
}

async fn close(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ShiftClose>,
) -> AppResult<Json<AppResponse<Shift>>> {
    let shift = shifts::close_shift(&state, &id, payload).await?;
    Ok(ok(shift))
}

async fn adjust(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ShiftAdjust>,
) -> AppResult<Json<AppResponse<Shift>>> {
    let shift = shifts::record_adjustment(&state, &id, payload).await?;
    Ok(ok(shift))
}

async fn transactions(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Vec<ShiftTransaction>>>> {
    shift_repo::find_by_id(state.pool(), &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Shift {id} not found")))?;
    let transactions = shift_repo::find_transactions(state.pool(), &id).await?;
    Ok(ok(transactions))
}
