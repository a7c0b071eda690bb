//! Notification fan-out.
//!
//! Intents are written to the outbox table inside the same transaction as
//! the primary write; [`OutboxDispatcher`] delivers them to the bus
//! afterwards and [`StaleOrderSweep`] raises delay alerts for orders stuck
//! on the kitchen board.

pub mod dispatcher;
pub mod stale;

pub use dispatcher::OutboxDispatcher;
pub use stale::StaleOrderSweep;

use shared::models::order::Order;
use shared::money::format_money;
use shared::{NotificationKind, NotificationPriority, NotificationTarget};

use crate::db::repository::notification::NotificationIntent;

/// Role names used for fan-out targets.
pub mod roles {
    pub const KITCHEN: &str = "cocina";
    pub const COURIERS: &str = "repartidores";
    pub const CASHIER: &str = "caja";
    pub const ADMIN: &str = "admin";
}

/// New order placed; the kitchen board should pick it up.
pub fn new_order_intent(order: &Order) -> NotificationIntent {
    NotificationIntent {
        kind: NotificationKind::NewOrder,
        target: NotificationTarget::role(roles::KITCHEN),
        priority: NotificationPriority::Normal,
        title: format!("Nuevo pedido #{}", order.daily_number),
        body: format!(
            "{} · {} · {}",
            order.channel.as_str(),
            order.customer.name,
            format_money(order.total)
        ),
        order_id: Some(order.id),
    }
}

/// Order ready for pickup; couriers get pinged.
pub fn order_ready_intent(order: &Order) -> NotificationIntent {
    NotificationIntent {
        kind: NotificationKind::OrderReady,
        target: NotificationTarget::role(roles::COURIERS),
        priority: NotificationPriority::Normal,
        title: format!("Pedido #{} listo", order.daily_number),
        body: order
            .customer
            .neighborhood
            .clone()
            .unwrap_or_else(|| "mostrador".to_string()),
        order_id: Some(order.id),
    }
}

/// Order delivered; the cashier sees the settlement land.
pub fn order_delivered_intent(order: &Order) -> NotificationIntent {
    NotificationIntent {
        kind: NotificationKind::OrderDelivered,
        target: NotificationTarget::role(roles::CASHIER),
        priority: NotificationPriority::Normal,
        title: format!("Pedido #{} entregado", order.daily_number),
        body: format_money(order.total),
        order_id: Some(order.id),
    }
}

/// Order stuck past the delay threshold.
pub fn order_delayed_intent(order: &Order, age_minutes: i64) -> NotificationIntent {
    NotificationIntent {
        kind: NotificationKind::OrderDelayed,
        target: NotificationTarget::role(roles::ADMIN),
        priority: NotificationPriority::High,
        title: format!("Pedido #{} demorado", order.daily_number),
        body: format!("{} min en estado {}", age_minutes, order.state),
        order_id: Some(order.id),
    }
}
