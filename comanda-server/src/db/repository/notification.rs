//! Notification outbox repository.

use shared::{
    Notification, NotificationKind, NotificationPriority, NotificationStatus, NotificationTarget,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};

use super::{RepoError, RepoResult};

/// Payload for a new outbox row; id/status/attempts come from the table.
#[derive(Debug, Clone)]
pub struct NotificationIntent {
    pub kind: NotificationKind,
    pub target: NotificationTarget,
    pub priority: NotificationPriority,
    pub title: String,
    pub body: String,
    pub order_id: Option<i64>,
}

fn notification_from_row(row: &SqliteRow) -> RepoResult<Notification> {
    let kind_str: String = row.try_get("kind")?;
    let kind = NotificationKind::parse(&kind_str)
        .ok_or_else(|| RepoError::Database(format!("Unknown notification kind: {kind_str}")))?;

    let target_role: Option<String> = row.try_get("target_role")?;
    let target_user: Option<String> = row.try_get("target_user")?;
    let target = match (target_role, target_user) {
        (Some(role), _) => NotificationTarget::role(role),
        (None, Some(user)) => NotificationTarget::user(user),
        (None, None) => {
            return Err(RepoError::Database(
                "Notification row has no target".to_string(),
            ));
        }
    };

    let priority_str: String = row.try_get("priority")?;
    let status_str: String = row.try_get("status")?;

    Ok(Notification {
        id: row.try_get("id")?,
        kind,
        target,
        priority: NotificationPriority::parse(&priority_str).unwrap_or_default(),
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        order_id: row.try_get("order_id")?,
        status: NotificationStatus::parse(&status_str).unwrap_or_default(),
        attempts: row.try_get("attempts")?,
        created_at: row.try_get("created_at")?,
        dispatched_at: row.try_get("dispatched_at")?,
    })
}

/// Insert a pending outbox row. Callers run this inside the same
/// transaction as the primary write so the intent is durable with it.
pub async fn enqueue<'e, E>(ex: E, intent: &NotificationIntent, now: i64) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (role, user) = match &intent.target {
        NotificationTarget::Role { role } => (Some(role.as_str()), None),
        NotificationTarget::User { user_id } => (None, Some(user_id.as_str())),
    };

    sqlx::query(
        "INSERT INTO notifications (kind, target_role, target_user, priority, title, body, order_id, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)",
    )
    .bind(intent.kind.as_str())
    .bind(role)
    .bind(user)
    .bind(intent.priority.as_str())
    .bind(&intent.title)
    .bind(&intent.body)
    .bind(intent.order_id)
    .bind(now)
    .execute(ex)
    .await?;
    Ok(())
}

/// Oldest pending rows, up to `limit`: the dispatcher's work queue.
pub async fn find_pending(pool: &SqlitePool, limit: i32) -> RepoResult<Vec<Notification>> {
    let rows = sqlx::query(
        "SELECT * FROM notifications WHERE status = 'pending' ORDER BY created_at, id LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(notification_from_row).collect()
}

/// Recent notifications, newest first (client catch-up poll).
pub async fn find_recent(pool: &SqlitePool, since_millis: i64, limit: i32) -> RepoResult<Vec<Notification>> {
    let rows = sqlx::query(
        "SELECT * FROM notifications WHERE created_at >= ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(since_millis)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(notification_from_row).collect()
}

pub async fn mark_sent(pool: &SqlitePool, id: i64, now: i64) -> RepoResult<()> {
    sqlx::query("UPDATE notifications SET status = 'sent', dispatched_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record a failed dispatch attempt; rows past `max_attempts` flip to
/// `failed` and leave the queue.
pub async fn record_failure(pool: &SqlitePool, id: i64, max_attempts: i32) -> RepoResult<()> {
    sqlx::query(
        "UPDATE notifications SET attempts = attempts + 1, status = CASE WHEN attempts + 1 >= ? THEN 'failed' ELSE 'pending' END WHERE id = ?",
    )
    .bind(max_attempts)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Whether an alert of `kind` for `order_id` was created after
/// `window_start_millis`; the stale-order de-duplication check.
pub async fn exists_recent_for_order(
    pool: &SqlitePool,
    order_id: i64,
    kind: NotificationKind,
    window_start_millis: i64,
) -> RepoResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE order_id = ? AND kind = ? AND created_at >= ?",
    )
    .bind(order_id)
    .bind(kind.as_str())
    .bind(window_start_millis)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}
