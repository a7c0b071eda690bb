//! Order intake and lifecycle.
//!
//! Every state change runs as one transaction: the order row, the audit
//! history, the outbox intent and any shift/courier side effect commit
//! together or not at all.

pub mod lifecycle;

pub use lifecycle::{
    LifecycleError, advance_order, assign_courier, cancel_order, create_order,
};
