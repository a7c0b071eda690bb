//! Notification catch-up routes.
//!
//! Live delivery rides the message bus; this endpoint lets a client that
//! just (re)connected backfill what it missed.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use shared::Notification;

use crate::core::ServerState;
use crate::db::repository::notification as notification_repo;
use crate::utils::error::{AppResponse, AppResult, ok};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/notifications", get(recent))
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    /// Unix millis; defaults to the last hour
    since: Option<i64>,
    limit: Option<i32>,
}

async fn recent(
    State(state): State<ServerState>,
    Query(query): Query<RecentQuery>,
) -> AppResult<Json<AppResponse<Vec<Notification>>>> {
    let since = query
        .since
        .unwrap_or_else(|| shared::util::now_millis() - 60 * 60 * 1000);
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let notifications = notification_repo::find_recent(state.pool(), since, limit).await?;
    Ok(ok(notifications))
}
