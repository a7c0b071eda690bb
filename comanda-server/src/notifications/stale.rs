//! Stale-order sweep.
//!
//! Periodically flags non-terminal orders older than the configured
//! threshold. Alerts de-duplicate against the outbox itself: an order only
//! gets a new delay alert once the previous one has aged out of the
//! de-duplication window.

use std::time::Duration;

use shared::NotificationKind;
use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::db::repository::{notification as outbox, order as order_repo};
use crate::notifications::order_delayed_intent;
use crate::utils::AppResult;

pub struct StaleOrderSweep {
    state: ServerState,
    shutdown: CancellationToken,
}

impl StaleOrderSweep {
    pub fn new(state: ServerState, shutdown: CancellationToken) -> Self {
        Self { state, shutdown }
    }

    pub async fn run(self) {
        let interval = Duration::from_secs(self.state.config.sweep_interval_secs.max(1));
        tracing::info!(
            interval_secs = interval.as_secs(),
            threshold_minutes = self.state.config.stale_order_minutes,
            "Stale-order sweep started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Stale-order sweep stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = sweep_once(&self.state).await {
                        tracing::warn!(error = %e, "Stale-order sweep failed");
                    }
                }
            }
        }
    }
}

/// One sweep pass. Returns how many delay alerts were raised.
pub async fn sweep_once(state: &ServerState) -> AppResult<usize> {
    let now = shared::util::now_millis();
    let cutoff = now - state.config.stale_order_minutes * 60_000;
    let dedup_start = now - state.config.stale_dedup_minutes * 60_000;

    let stale = order_repo::find_stale_open(state.pool(), cutoff).await?;
    let mut raised = 0;

    for order in stale {
        let already_alerted = outbox::exists_recent_for_order(
            state.pool(),
            order.id,
            NotificationKind::OrderDelayed,
            dedup_start,
        )
        .await?;
        if already_alerted {
            continue;
        }

        let age_minutes = (now - order.created_at) / 60_000;
        outbox::enqueue(state.pool(), &order_delayed_intent(&order, age_minutes), now).await?;
        tracing::warn!(
            order = order.id,
            daily = order.daily_number,
            state = %order.state,
            age_minutes,
            "Order delayed"
        );
        raised += 1;
    }
    Ok(raised)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServerState;
    use crate::db::repository::order as order_repo;
    use crate::db::testing::test_db;
    use shared::models::order::*;

    fn aged_order(id: i64, age_minutes: i64, state: OrderState) -> Order {
        let created_at = shared::util::now_millis() - age_minutes * 60_000;
        let mut order = Order {
            id,
            daily_number: id,
            channel: Channel::Counter,
            customer: Customer {
                name: "Cliente".into(),
                ..Default::default()
            },
            items: vec![LineItem::new(1, "Item", 50.0, 1)],
            subtotal: 0.0,
            delivery_fee: 0.0,
            discount: 0.0,
            total: 0.0,
            payment: Payment::new(PaymentMethod::Cash, 50.0, 50.0),
            state,
            delivery: None,
            notes: None,
            shift_id: None,
            cancel_reason: None,
            created_at,
            preparing_at: None,
            ready_at: None,
            delivered_at: None,
            cancelled_at: None,
        };
        order.recompute_totals();
        order
    }

    #[tokio::test]
    async fn sweep_flags_only_old_open_orders() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;

        order_repo::create(state.pool(), &aged_order(1, 45, OrderState::Preparing))
            .await
            .unwrap();
        order_repo::create(state.pool(), &aged_order(2, 5, OrderState::Pending))
            .await
            .unwrap();
        order_repo::create(state.pool(), &aged_order(3, 90, OrderState::Delivered))
            .await
            .unwrap();

        let raised = sweep_once(&state).await.unwrap();
        assert_eq!(raised, 1);

        let pending = outbox::find_pending(state.pool(), 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, NotificationKind::OrderDelayed);
        assert_eq!(pending[0].order_id, Some(1));
    }

    #[tokio::test]
    async fn repeat_sweeps_do_not_spam() {
        let (db, _dir) = test_db().await;
        let state = ServerState::for_tests(db).await;
        order_repo::create(state.pool(), &aged_order(1, 45, OrderState::Pending))
            .await
            .unwrap();

        assert_eq!(sweep_once(&state).await.unwrap(), 1);
        assert_eq!(sweep_once(&state).await.unwrap(), 0);

        let pending = outbox::find_pending(state.pool(), 10).await.unwrap();
        assert_eq!(pending.len(), 1);
    }
}
