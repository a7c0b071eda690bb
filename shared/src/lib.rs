//! Shared domain types for the Comanda order-management service.
//!
//! Everything in this crate is plain data plus pure functions: order,
//! shift and courier models, payload structs for the HTTP API, and the
//! money/ID helpers both the server and its tests rely on.

pub mod models;
pub mod money;
pub mod util;

pub use models::courier::{CommissionModel, Courier, CourierCreate, CourierUpdate};
pub use models::notification::{
    Notification, NotificationKind, NotificationPriority, NotificationStatus, NotificationTarget,
};
pub use models::order::{
    Actor, Channel, Customer, DeliveryAssignment, DeliveryState, HistoryAction, LineCustomization,
    LineItem, LineItemInput, Order, OrderAdvance, OrderAssignCourier, OrderCancel, OrderCreate,
    OrderHistoryEntry, OrderState, Payment, PaymentInput, PaymentMethod,
};
pub use models::shift::{
    Shift, ShiftAdjust, ShiftClose, ShiftCloseout, ShiftOpen, ShiftStatus, ShiftSummary,
    ShiftTransaction, ShiftTransactionKind, ShiftType,
};
