//! Outbox dispatcher.
//!
//! Polls the `notifications` table for pending rows and publishes them on
//! the message bus. The outbox write happens inside the transaction that
//! caused it, so a crash between commit and dispatch only delays delivery.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::db::repository::notification as outbox;
use crate::message::BusMessage;
use crate::utils::AppResult;

const BATCH_SIZE: i32 = 32;

pub struct OutboxDispatcher {
    state: ServerState,
    shutdown: CancellationToken,
}

impl OutboxDispatcher {
    pub fn new(state: ServerState, shutdown: CancellationToken) -> Self {
        Self { state, shutdown }
    }

    pub async fn run(self) {
        let interval = Duration::from_secs(self.state.config.dispatch_interval_secs.max(1));
        tracing::info!(interval_secs = interval.as_secs(), "Outbox dispatcher started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Outbox dispatcher stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = dispatch_batch(&self.state).await {
                        tracing::warn!(error = %e, "Outbox dispatch pass failed");
                    }
                }
            }
        }
    }
}

/// Publish one batch of pending rows, oldest first. Returns how many rows
/// were dispatched.
pub async fn dispatch_batch(state: &ServerState) -> AppResult<usize> {
    let pending = outbox::find_pending(state.pool(), BATCH_SIZE).await?;
    let mut sent = 0;

    for notification in pending {
        let id = notification.id;
        // Publishing to a bus with no subscribers still counts as sent;
        // clients catch up through the recent-notifications endpoint.
        state.bus.publish(BusMessage::Notification(notification));
        match outbox::mark_sent(state.pool(), id, shared::util::now_millis()).await {
            Ok(()) => sent += 1,
            Err(e) => {
                tracing::warn!(notification = id, error = %e, "Failed to mark notification sent");
                outbox::record_failure(state.pool(), id, state.config.dispatch_max_attempts)
                    .await?;
            }
        }
    }

    if sent > 0 {
        tracing::debug!(sent, "Dispatched outbox batch");
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServerState;
    use crate::db::repository::notification::NotificationIntent;
    use crate::db::testing::test_db;
    use shared::{NotificationKind, NotificationPriority, NotificationStatus, NotificationTarget};

    fn intent(title: &str) -> NotificationIntent {
        NotificationIntent {
            kind: NotificationKind::NewOrder,
            target: NotificationTarget::role("cocina"),
            priority: NotificationPriority::Normal,
            title: title.into(),
            body: "body".into(),
            order_id: None,
        }
    }

    #[tokio::test]
    async fn dispatch_publishes_and_marks_sent() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        let mut rx = state.bus.subscribe();

        outbox::enqueue(state.pool(), &intent("uno"), 1000).await.unwrap();
        outbox::enqueue(state.pool(), &intent("dos"), 2000).await.unwrap();

        let sent = dispatch_batch(&state).await.unwrap();
        assert_eq!(sent, 2);

        // Oldest first on the bus.
        match rx.recv().await.unwrap() {
            BusMessage::Notification(n) => assert_eq!(n.title, "uno"),
            other => panic!("unexpected message: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            BusMessage::Notification(n) => assert_eq!(n.title, "dos"),
            other => panic!("unexpected message: {other:?}"),
        }

        let remaining = outbox::find_pending(state.pool(), 10).await.unwrap();
        assert!(remaining.is_empty());
        let recent = outbox::find_recent(state.pool(), 0, 10).await.unwrap();
        assert!(recent.iter().all(|n| n.status == NotificationStatus::Sent));
    }

    #[tokio::test]
    async fn failures_leave_the_queue_only_at_the_attempt_cap() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        outbox::enqueue(state.pool(), &intent("uno"), 1000).await.unwrap();
        let id = outbox::find_pending(state.pool(), 1).await.unwrap()[0].id;

        let max_attempts = 3;
        for attempt in 1..max_attempts {
            outbox::record_failure(state.pool(), id, max_attempts).await.unwrap();
            let pending = outbox::find_pending(state.pool(), 10).await.unwrap();
            assert_eq!(pending.len(), 1, "attempt {attempt} stays queued");
            assert_eq!(pending[0].attempts, attempt);
        }

        // The capping attempt flips the row to failed and retires it.
        outbox::record_failure(state.pool(), id, max_attempts).await.unwrap();
        assert!(outbox::find_pending(state.pool(), 10).await.unwrap().is_empty());

        let rows = outbox::find_recent(state.pool(), 0, 10).await.unwrap();
        assert_eq!(rows[0].status, NotificationStatus::Failed);
        assert_eq!(rows[0].attempts, max_attempts);
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        assert_eq!(dispatch_batch(&state).await.unwrap(), 0);
    }
}
