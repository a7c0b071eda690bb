//! Notification outbox record.
//!
//! Notifications are never sent inline with a primary write. The mutation
//! that triggers one inserts a pending outbox row in the same transaction;
//! the dispatcher picks it up afterwards. A dispatch failure can therefore
//! never roll back or block an order/shift write.

use serde::{Deserialize, Serialize};

/// Lifecycle events that fan out to interested roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewOrder,
    OrderReady,
    OrderDelivered,
    Incident,
    OrderDelayed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewOrder => "new_order",
            NotificationKind::OrderReady => "order_ready",
            NotificationKind::OrderDelivered => "order_delivered",
            NotificationKind::Incident => "incident",
            NotificationKind::OrderDelayed => "order_delayed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new_order" => Some(NotificationKind::NewOrder),
            "order_ready" => Some(NotificationKind::OrderReady),
            "order_delivered" => Some(NotificationKind::OrderDelivered),
            "incident" => Some(NotificationKind::Incident),
            "order_delayed" => Some(NotificationKind::OrderDelayed),
            _ => None,
        }
    }
}

/// Who the message is for: a role fan-out or one specific user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum NotificationTarget {
    Role { role: String },
    User { user_id: String },
}

impl NotificationTarget {
    pub fn role(role: impl Into<String>) -> Self {
        NotificationTarget::Role { role: role.into() }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        NotificationTarget::User {
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    #[default]
    Normal,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(NotificationPriority::Normal),
            "high" => Some(NotificationPriority::High),
            _ => None,
        }
    }
}

/// Outbox row status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(NotificationStatus::Pending),
            "sent" => Some(NotificationStatus::Sent),
            "failed" => Some(NotificationStatus::Failed),
            _ => None,
        }
    }
}

/// One notification-intent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub kind: NotificationKind,
    pub target: NotificationTarget,
    pub priority: NotificationPriority,
    pub title: String,
    pub body: String,
    pub order_id: Option<i64>,
    pub status: NotificationStatus,
    pub attempts: i32,
    pub created_at: i64,
    pub dispatched_at: Option<i64>,
}
