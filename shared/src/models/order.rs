//! Order Model (pedido)
//!
//! An order moves through a fixed lifecycle:
//!
//! ```text
//! pending -> en_preparacion -> listo -> en_reparto -> entregado
//!     \___________\_____________\__________/
//!                  cancelado (from any non-terminal state)
//! ```
//!
//! No backward transitions are defined. Once `entregado` or `cancelado`
//! the order is immutable except for the delivery settlement flag.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::money;

/// Sales channel the order came in through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Counter,
    Phone,
    Web,
    Chat,
    Rappi,
    DidiFood,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Counter => "counter",
            Channel::Phone => "phone",
            Channel::Web => "web",
            Channel::Chat => "chat",
            Channel::Rappi => "rappi",
            Channel::DidiFood => "didi_food",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "counter" => Some(Channel::Counter),
            "phone" => Some(Channel::Phone),
            "web" => Some(Channel::Web),
            "chat" => Some(Channel::Chat),
            "rappi" => Some(Channel::Rappi),
            "didi_food" => Some(Channel::DidiFood),
            _ => None,
        }
    }

    /// Delivery-aggregator channels settle through the platform, not the
    /// cash drawer.
    pub fn is_aggregator(&self) -> bool {
        matches!(self, Channel::Rappi | Channel::DidiFood)
    }
}

/// Payment method. Maps 1:1 onto the shift summary buckets
/// (`efectivo` / `tarjeta` / `transferencia` / `plataforma`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Platform,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Platform => "platform",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "transfer" => Some(PaymentMethod::Transfer),
            "platform" => Some(PaymentMethod::Platform),
            _ => None,
        }
    }
}

/// Order lifecycle state. Wire tokens are the Spanish kitchen-board labels
/// the front-of-house clients already use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "en_preparacion")]
    Preparing,
    #[serde(rename = "listo")]
    Ready,
    #[serde(rename = "en_reparto")]
    OutForDelivery,
    #[serde(rename = "entregado")]
    Delivered,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "pending",
            OrderState::Preparing => "en_preparacion",
            OrderState::Ready => "listo",
            OrderState::OutForDelivery => "en_reparto",
            OrderState::Delivered => "entregado",
            OrderState::Cancelled => "cancelado",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderState::Pending),
            "en_preparacion" => Some(OrderState::Preparing),
            "listo" => Some(OrderState::Ready),
            "en_reparto" => Some(OrderState::OutForDelivery),
            "entregado" => Some(OrderState::Delivered),
            "cancelado" => Some(OrderState::Cancelled),
            _ => None,
        }
    }

    /// `entregado` and `cancelado` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Delivered | OrderState::Cancelled)
    }

    /// The single state that follows this one in the fixed sequence.
    pub fn next(&self) -> Option<OrderState> {
        match self {
            OrderState::Pending => Some(OrderState::Preparing),
            OrderState::Preparing => Some(OrderState::Ready),
            OrderState::Ready => Some(OrderState::OutForDelivery),
            OrderState::OutForDelivery => Some(OrderState::Delivered),
            OrderState::Delivered | OrderState::Cancelled => None,
        }
    }

    /// Whether `advance` may move from `self` to `target`.
    ///
    /// Cancellation is special-cased: reachable from any non-terminal
    /// state without successor validation.
    pub fn can_advance_to(&self, target: OrderState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if target == OrderState::Cancelled {
            return true;
        }
        self.next() == Some(target)
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer snapshot captured on the order, not a reference into a
/// customer table; edits to a profile never rewrite past orders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Neighborhood (colonia)
    pub neighborhood: Option<String>,
    /// Free-text landmark reference for the courier
    pub reference: Option<String>,
}

/// One customization on a line item. Closed set of known kinds; anything
/// the clients invent later travels in [`LineItem::extra_attrs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineCustomization {
    Sauce { name: String },
    Extra { name: String },
    Presentation { style: String },
    Note { text: String },
}

/// One product line within an order. Owned exclusively by its order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Product reference (snapshot; the product may change later)
    pub product_id: i64,
    pub name: String,
    /// Unit price snapshot at order time
    pub unit_price: f64,
    pub quantity: i32,
    /// quantity × unit_price, recomputed on every quantity change
    pub subtotal: f64,
    #[serde(default)]
    pub customizations: Vec<LineCustomization>,
    /// Forward-compatible string-keyed extension attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_attrs: BTreeMap<String, String>,
    pub note: Option<String>,
}

impl LineItem {
    pub fn new(product_id: i64, name: impl Into<String>, unit_price: f64, quantity: i32) -> Self {
        let mut item = Self {
            product_id,
            name: name.into(),
            unit_price,
            quantity,
            subtotal: 0.0,
            customizations: Vec::new(),
            extra_attrs: BTreeMap::new(),
            note: None,
        };
        item.recompute_subtotal();
        item
    }

    pub fn recompute_subtotal(&mut self) {
        self.subtotal = money::line_subtotal(self.unit_price, self.quantity);
    }

    pub fn set_quantity(&mut self, quantity: i32) {
        self.quantity = quantity;
        self.recompute_subtotal();
    }
}

/// Payment record on the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    /// Amount the customer handed over (cash) or the charged amount
    pub amount_tendered: f64,
    /// max(0, tendered - total); only meaningful for cash
    pub change_due: f64,
    /// Whether the courier/cashier must carry change
    pub requires_change: bool,
}

impl Payment {
    /// Build a payment for a known order total, computing change for cash.
    pub fn new(method: PaymentMethod, amount_tendered: f64, total: f64) -> Self {
        let change_due = match method {
            PaymentMethod::Cash => money::change_due(amount_tendered, total),
            _ => 0.0,
        };
        Self {
            method,
            amount_tendered,
            change_due,
            requires_change: method == PaymentMethod::Cash && change_due > 0.0,
        }
    }
}

/// Delivery sub-state once a courier is on the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Assigned,
    InTransit,
    Delivered,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Assigned => "assigned",
            DeliveryState::InTransit => "in_transit",
            DeliveryState::Delivered => "delivered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(DeliveryState::Assigned),
            "in_transit" => Some(DeliveryState::InTransit),
            "delivered" => Some(DeliveryState::Delivered),
            _ => None,
        }
    }
}

/// Courier assignment embedded in the order. The commission is fixed at
/// assignment time (fixed amount, or percentage evaluated once against the
/// order total) and never re-derived afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    pub courier_id: i64,
    pub courier_name: String,
    pub commission: f64,
    pub state: DeliveryState,
    pub assigned_at: i64,
    #[serde(default)]
    pub settled: bool,
    pub settled_at: Option<i64>,
}

/// Order entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Sequential number within the business day, for the kitchen board
    pub daily_number: i64,
    pub channel: Channel,
    pub customer: Customer,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub discount: f64,
    /// Always subtotal + delivery_fee - discount; recomputed, never set
    pub total: f64,
    pub payment: Payment,
    pub state: OrderState,
    pub delivery: Option<DeliveryAssignment>,
    pub notes: Option<String>,
    /// Shift (turno) that was open when the order was created
    pub shift_id: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: i64,
    pub preparing_at: Option<i64>,
    pub ready_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub cancelled_at: Option<i64>,
}

impl Order {
    /// Recompute item subtotals, the order subtotal, the total and the
    /// cash change. The only code path that writes `total`.
    pub fn recompute_totals(&mut self) {
        for item in &mut self.items {
            item.recompute_subtotal();
        }
        self.subtotal = money::to_f64(
            self.items
                .iter()
                .map(|i| money::to_decimal(i.subtotal))
                .sum(),
        );
        self.total = money::order_total(self.subtotal, self.delivery_fee, self.discount);
        if self.payment.method == PaymentMethod::Cash {
            self.payment.change_due = money::change_due(self.payment.amount_tendered, self.total);
            self.payment.requires_change = self.payment.change_due > 0.0;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Audit action recorded in the order history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    StateChanged,
    CourierAssigned,
    DeliveryStateChanged,
    Cancelled,
    Settled,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::StateChanged => "state_changed",
            HistoryAction::CourierAssigned => "courier_assigned",
            HistoryAction::DeliveryStateChanged => "delivery_state_changed",
            HistoryAction::Cancelled => "cancelled",
            HistoryAction::Settled => "settled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(HistoryAction::Created),
            "state_changed" => Some(HistoryAction::StateChanged),
            "courier_assigned" => Some(HistoryAction::CourierAssigned),
            "delivery_state_changed" => Some(HistoryAction::DeliveryStateChanged),
            "cancelled" => Some(HistoryAction::Cancelled),
            "settled" => Some(HistoryAction::Settled),
            _ => None,
        }
    }
}

/// Append-only audit record owned by an order. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHistoryEntry {
    pub id: i64,
    pub order_id: i64,
    pub action: HistoryAction,
    pub prev_state: Option<OrderState>,
    pub new_state: Option<OrderState>,
    pub actor_id: String,
    pub actor_name: String,
    pub detail: Option<String>,
    pub timestamp: i64,
}

/// Whoever is pressing the button: cashier, kitchen, admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

// ========== API payloads ==========

/// Line item input on order creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub product_id: i64,
    pub name: String,
    pub unit_price: f64,
    pub quantity: i32,
    #[serde(default)]
    pub customizations: Vec<LineCustomization>,
    #[serde(default)]
    pub extra_attrs: BTreeMap<String, String>,
    pub note: Option<String>,
}

/// Payment input on order creation; change is computed server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    pub amount_tendered: f64,
}

/// Create order payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub channel: Channel,
    pub customer: Customer,
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub delivery_fee: f64,
    #[serde(default)]
    pub discount: f64,
    pub payment: PaymentInput,
    pub notes: Option<String>,
    pub actor: Actor,
}

/// Advance order state payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAdvance {
    pub target: OrderState,
    pub actor: Actor,
}

/// Cancel order payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancel {
    pub reason: String,
    pub actor: Actor,
}

/// Assign courier payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAssignCourier {
    pub courier_id: i64,
    pub actor: Actor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_sequence_is_fixed() {
        assert_eq!(OrderState::Pending.next(), Some(OrderState::Preparing));
        assert_eq!(OrderState::Preparing.next(), Some(OrderState::Ready));
        assert_eq!(OrderState::Ready.next(), Some(OrderState::OutForDelivery));
        assert_eq!(
            OrderState::OutForDelivery.next(),
            Some(OrderState::Delivered)
        );
        assert_eq!(OrderState::Delivered.next(), None);
        assert_eq!(OrderState::Cancelled.next(), None);
    }

    #[test]
    fn no_skipping_states() {
        assert!(!OrderState::Pending.can_advance_to(OrderState::Delivered));
        assert!(!OrderState::Pending.can_advance_to(OrderState::Ready));
        assert!(OrderState::Pending.can_advance_to(OrderState::Preparing));
    }

    #[test]
    fn no_backward_transitions() {
        assert!(!OrderState::Ready.can_advance_to(OrderState::Preparing));
        assert!(!OrderState::OutForDelivery.can_advance_to(OrderState::Pending));
    }

    #[test]
    fn cancel_from_any_open_state_only() {
        for s in [
            OrderState::Pending,
            OrderState::Preparing,
            OrderState::Ready,
            OrderState::OutForDelivery,
        ] {
            assert!(s.can_advance_to(OrderState::Cancelled), "{s} should cancel");
        }
        assert!(!OrderState::Delivered.can_advance_to(OrderState::Cancelled));
        assert!(!OrderState::Cancelled.can_advance_to(OrderState::Cancelled));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for target in [
            OrderState::Pending,
            OrderState::Preparing,
            OrderState::Ready,
            OrderState::OutForDelivery,
            OrderState::Delivered,
            OrderState::Cancelled,
        ] {
            assert!(!OrderState::Delivered.can_advance_to(target));
            assert!(!OrderState::Cancelled.can_advance_to(target));
        }
    }

    #[test]
    fn wire_tokens_round_trip() {
        for s in [
            OrderState::Pending,
            OrderState::Preparing,
            OrderState::Ready,
            OrderState::OutForDelivery,
            OrderState::Delivered,
            OrderState::Cancelled,
        ] {
            assert_eq!(OrderState::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderState::parse("listo"), Some(OrderState::Ready));
        assert_eq!(OrderState::parse("LISTO"), None);
    }

    fn sample_order() -> Order {
        let mut order = Order {
            id: 1,
            daily_number: 1,
            channel: Channel::Phone,
            customer: Customer {
                name: "Ana".into(),
                ..Default::default()
            },
            items: vec![LineItem::new(10, "Torta", 100.0, 3)],
            subtotal: 0.0,
            delivery_fee: 50.0,
            discount: 0.0,
            total: 0.0,
            payment: Payment::new(PaymentMethod::Cash, 400.0, 0.0),
            state: OrderState::Pending,
            delivery: None,
            notes: None,
            shift_id: None,
            cancel_reason: None,
            created_at: 0,
            preparing_at: None,
            ready_at: None,
            delivered_at: None,
            cancelled_at: None,
        };
        order.recompute_totals();
        order
    }

    #[test]
    fn totals_invariant_after_recompute() {
        // items 300, fee 50, discount 0, cash 400 tendered
        let order = sample_order();
        assert_eq!(order.subtotal, 300.0);
        assert_eq!(order.total, 350.0);
        assert_eq!(order.payment.change_due, 50.0);
        assert!(order.payment.requires_change);
    }

    #[test]
    fn quantity_change_recomputes_line_and_order() {
        let mut order = sample_order();
        order.items[0].set_quantity(2);
        order.recompute_totals();
        assert_eq!(order.items[0].subtotal, 200.0);
        assert_eq!(order.subtotal, 200.0);
        assert_eq!(order.total, 250.0);
        assert_eq!(order.payment.change_due, 150.0);
    }

    #[test]
    fn customization_extension_map_survives_serde() {
        let mut item = LineItem::new(7, "Burrito", 85.0, 1);
        item.customizations.push(LineCustomization::Sauce {
            name: "verde".into(),
        });
        item.extra_attrs
            .insert("tortilla".into(), "harina".into());
        let json = serde_json::to_string(&item).unwrap();
        let back: LineItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back.customizations, item.customizations);
        assert_eq!(back.extra_attrs.get("tortilla").unwrap(), "harina");
    }
}
