use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::transitions;
use crate::error::AppError;

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    AssignedPicker,
    Picking,
    Picked,
    Packing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::AssignedPicker => "assigned_picker",
            OrderStatus::Picking => "picking",
            OrderStatus::Picked => "picked",
            OrderStatus::Packing => "packing",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Vendor,
    Picker,
    Rider,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Customer => "customer",
            ActorRole::Vendor => "vendor",
            ActorRole::Picker => "picker",
            ActorRole::Rider => "rider",
            ActorRole::System => "system",
        }
    }

    pub fn is_fulfillment_role(&self) -> bool {
        matches!(self, ActorRole::Picker | ActorRole::Rider)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(ActorRole::Customer),
            "vendor" => Ok(ActorRole::Vendor),
            "picker" => Ok(ActorRole::Picker),
            "rider" => Ok(ActorRole::Rider),
            "system" => Ok(ActorRole::System),
            other => Err(format!("unknown actor role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStyle {
    /// The vendor prepares the order itself.
    Direct,
    /// Dedicated pickers pick and pack the order.
    Staffed,
}

impl FromStr for FulfillmentStyle {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(FulfillmentStyle::Direct),
            "staffed" => Ok(FulfillmentStyle::Staffed),
            other => Err(format!("unknown fulfillment style: {other}")),
        }
    }
}

/// Prices are integer minor units (pence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: i64,
    pub quantity: u32,
    pub unit: String,
}

impl LineItem {
    /// `None` when the line overflows.
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub tax: i64,
    pub discount: i64,
    pub total: i64,
}

impl Pricing {
    /// `subtotal + deliveryFee + tax - discount`, or `None` on overflow.
    pub fn expected_total(&self) -> Option<i64> {
        self.subtotal
            .checked_add(self.delivery_fee)?
            .checked_add(self.tax)?
            .checked_sub(self.discount)
    }

    pub fn is_consistent(&self) -> bool {
        self.expected_total() == Some(self.total)
    }

    fn check_non_negative(&self) -> Result<(), AppError> {
        let amounts = [
            ("subtotal", self.subtotal),
            ("deliveryFee", self.delivery_fee),
            ("tax", self.tax),
            ("discount", self.discount),
            ("total", self.total),
        ];
        match amounts.iter().find(|(_, amount)| *amount < 0) {
            Some((field, amount)) => Err(AppError::BadRequest(format!(
                "{field} cannot be negative (got {amount})"
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub full_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub note: Option<String>,
}

/// Everything the placing client supplies; prices are already resolved upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub items: Vec<LineItem>,
    pub pricing: Pricing,
    pub delivery_address: DeliveryAddress,
    #[serde(default)]
    pub fulfillment_style: Option<FulfillmentStyle>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub payment_settled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub step: usize,
    pub total_steps: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub version: u64,
    pub status: OrderStatus,
    pub fulfillment_style: FulfillmentStyle,
    pub priority: Priority,
    pub items: Vec<LineItem>,
    pub pricing: Pricing,
    pub delivery_address: DeliveryAddress,
    pub payment_settled: bool,
    pub assigned_picker_id: Option<String>,
    pub assigned_rider_id: Option<String>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validates the placement and seeds the history with the `pending` entry at version 1.
    pub fn create(
        new_order: NewOrder,
        default_style: FulfillmentStyle,
        placed_by: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        validate_items(&new_order.items)?;
        new_order.pricing.check_non_negative()?;

        let item_sum = new_order
            .items
            .iter()
            .try_fold(0_i64, |sum, item| sum.checked_add(item.line_total()?))
            .ok_or_else(|| AppError::BadRequest("item total overflows".to_string()))?;
        if new_order.pricing.subtotal != item_sum {
            return Err(AppError::BadRequest(format!(
                "subtotal {} does not match item total {}",
                new_order.pricing.subtotal, item_sum
            )));
        }
        if !new_order.pricing.is_consistent() {
            return Err(AppError::BadRequest(
                "total must equal subtotal + deliveryFee + tax - discount".to_string(),
            ));
        }

        let address = &new_order.delivery_address;
        if address.full_name.trim().is_empty() || address.street.trim().is_empty() {
            return Err(AppError::BadRequest(
                "delivery address needs a name and street".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            version: 1,
            status: OrderStatus::Pending,
            fulfillment_style: new_order.fulfillment_style.unwrap_or(default_style),
            priority: new_order.priority,
            items: new_order.items,
            pricing: new_order.pricing,
            delivery_address: new_order.delivery_address,
            payment_settled: new_order.payment_settled,
            assigned_picker_id: None,
            assigned_rider_id: None,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Pending,
                version: 1,
                timestamp: at,
                actor_id: placed_by.id.clone(),
                actor_role: placed_by.role,
                note: Some("order placed".to_string()),
            }],
            cancellation_reason: None,
            created_at: at,
            updated_at: at,
        })
    }

    /// Returns the next version of the order with `new_status` applied; `self` is left untouched.
    pub fn apply_transition(
        &self,
        expected_version: u64,
        new_status: OrderStatus,
        actor: &Actor,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        if self.status.is_terminal() {
            return Err(AppError::TerminalState(self.status));
        }
        self.check_version(expected_version)?;

        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        transitions::validate(self, new_status, actor.role, note.as_deref())?;
        self.check_assigned_identity(new_status, actor)?;

        let mut next = self.next_version(at);
        next.status = new_status;
        if new_status == OrderStatus::Cancelled {
            next.cancellation_reason = note.clone();
        }
        if new_status == OrderStatus::OutForDelivery
            && actor.role == ActorRole::Rider
            && next.assigned_rider_id.is_none()
        {
            next.assigned_rider_id = Some(actor.id.clone());
        }
        next.status_history.push(StatusHistoryEntry {
            status: new_status,
            version: next.version,
            timestamp: at,
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            note,
        });

        Ok(next)
    }

    /// Records an assignment. A picker assignment also moves the order to `assigned_picker`.
    pub fn apply_assignment(
        &self,
        expected_version: u64,
        role: ActorRole,
        personnel_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        if self.status.is_terminal() {
            return Err(AppError::TerminalState(self.status));
        }
        self.check_version(expected_version)?;
        self.check_assignable(role)?;

        match role {
            ActorRole::Picker => {
                let mut next = self.apply_transition(
                    expected_version,
                    OrderStatus::AssignedPicker,
                    &Actor::system(),
                    Some(format!("assigned to picker {personnel_id}")),
                    at,
                )?;
                next.assigned_picker_id = Some(personnel_id.to_string());
                Ok(next)
            }
            _ => {
                let mut next = self.next_version(at);
                next.assigned_rider_id = Some(personnel_id.to_string());
                Ok(next)
            }
        }
    }

    /// Settling an already settled order returns it unchanged.
    pub fn mark_payment_settled(&self, at: DateTime<Utc>) -> Result<Self, AppError> {
        if self.status.is_terminal() {
            return Err(AppError::TerminalState(self.status));
        }
        if self.payment_settled {
            return Ok(self.clone());
        }
        let mut next = self.next_version(at);
        next.payment_settled = true;
        Ok(next)
    }

    /// Whether the order is currently in a state that can take an assignment for `role`.
    pub fn check_assignable(&self, role: ActorRole) -> Result<(), AppError> {
        let assignable = match role {
            ActorRole::Picker => {
                self.fulfillment_style == FulfillmentStyle::Staffed
                    && self.status == OrderStatus::Confirmed
                    && self.assigned_picker_id.is_none()
            }
            ActorRole::Rider => {
                self.assigned_rider_id.is_none()
                    && matches!(
                        self.status,
                        OrderStatus::Preparing
                            | OrderStatus::Ready
                            | OrderStatus::AssignedPicker
                            | OrderStatus::Picking
                            | OrderStatus::Picked
                            | OrderStatus::Packing
                            | OrderStatus::ReadyForPickup
                    )
            }
            _ => false,
        };

        if assignable {
            Ok(())
        } else {
            Err(AppError::NotAssignable {
                order_id: self.id,
                role,
                status: self.status,
            })
        }
    }

    pub fn current_progress(&self) -> Progress {
        let path = transitions::style_path(self.fulfillment_style);
        let effective = if self.status == OrderStatus::Cancelled {
            self.status_history
                .iter()
                .rev()
                .map(|entry| entry.status)
                .find(|status| *status != OrderStatus::Cancelled)
                .unwrap_or(OrderStatus::Pending)
        } else {
            self.status
        };

        let step = path
            .iter()
            .position(|status| *status == effective)
            .map(|index| index + 1)
            .unwrap_or(1);
        let total_steps = path.len();
        let percent = ((step * 100) / total_steps.max(1)) as u8;

        Progress {
            step,
            total_steps,
            percent,
        }
    }

    /// Time since placement; frozen at the closing entry once the order is terminal.
    pub fn elapsed_time(&self, now: DateTime<Utc>) -> Duration {
        let end = if self.status.is_terminal() {
            self.status_history
                .last()
                .map(|entry| entry.timestamp)
                .unwrap_or(now)
        } else {
            now
        };
        end - self.created_at
    }

    fn check_version(&self, expected_version: u64) -> Result<(), AppError> {
        if self.version != expected_version {
            return Err(AppError::VersionConflict {
                expected: expected_version,
                actual: self.version,
            });
        }
        Ok(())
    }

    fn check_assigned_identity(
        &self,
        new_status: OrderStatus,
        actor: &Actor,
    ) -> Result<(), AppError> {
        let assigned = match actor.role {
            ActorRole::Picker => self.assigned_picker_id.as_deref(),
            ActorRole::Rider => self.assigned_rider_id.as_deref(),
            _ => None,
        };

        match assigned {
            Some(id) if id != actor.id => Err(AppError::RoleNotPermitted {
                from: self.status,
                to: new_status,
                role: actor.role,
            }),
            _ => Ok(()),
        }
    }

    fn next_version(&self, at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.version += 1;
        next.updated_at = at;
        next
    }
}

fn validate_items(items: &[LineItem]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest("order must contain items".to_string()));
    }

    let mut seen = HashSet::new();
    for item in items {
        if item.quantity == 0 {
            return Err(AppError::BadRequest(format!(
                "item {} must have a positive quantity",
                item.product_id
            )));
        }
        if item.unit_price < 0 {
            return Err(AppError::BadRequest(format!(
                "item {} has a negative price",
                item.product_id
            )));
        }
        if !seen.insert(item.product_id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "duplicate item {}",
                item.product_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    pub(crate) fn item(product_id: &str, unit_price: i64, quantity: u32) -> LineItem {
        LineItem {
            product_id: product_id.to_string(),
            name: format!("product {product_id}"),
            unit_price,
            quantity,
            unit: "each".to_string(),
        }
    }

    pub(crate) fn new_order(style: FulfillmentStyle) -> NewOrder {
        // A: 2 x 7.50, B: 1 x 5.00, delivery 3.00, tax 2.00 => 25.00
        NewOrder {
            items: vec![item("A", 750, 2), item("B", 500, 1)],
            pricing: Pricing {
                subtotal: 2000,
                delivery_fee: 300,
                tax: 200,
                discount: 0,
                total: 2500,
            },
            delivery_address: DeliveryAddress {
                full_name: "Ada Lovelace".to_string(),
                phone: "07000000000".to_string(),
                street: "1 Analytical Row".to_string(),
                city: "London".to_string(),
                postal_code: "N1 1AA".to_string(),
                instructions: None,
            },
            fulfillment_style: Some(style),
            priority: Priority::Normal,
            payment_settled: true,
        }
    }

    pub(crate) fn placed(style: FulfillmentStyle) -> Order {
        Order::create(
            new_order(style),
            FulfillmentStyle::Staffed,
            &Actor::new("c1", ActorRole::Customer),
            Utc::now(),
        )
        .unwrap()
    }

    fn vendor() -> Actor {
        Actor::new("v1", ActorRole::Vendor)
    }

    fn create(input: NewOrder) -> Result<Order, AppError> {
        Order::create(input, FulfillmentStyle::Direct, &vendor(), Utc::now())
    }

    #[test]
    fn create_seeds_history_and_version() {
        let order = placed(FulfillmentStyle::Staffed);

        assert_eq!(order.version, 1);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.status_history[0].version, 1);
        assert_eq!(order.pricing.total, 2500);
    }

    #[test]
    fn create_rejects_inconsistent_total() {
        let mut input = new_order(FulfillmentStyle::Direct);
        input.pricing.total = 2400;

        let err = create(input).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn create_rejects_duplicate_and_empty_items() {
        let mut duplicated = new_order(FulfillmentStyle::Direct);
        duplicated.items.push(item("A", 750, 1));
        assert!(create(duplicated).is_err());

        let mut empty = new_order(FulfillmentStyle::Direct);
        empty.items.clear();
        assert!(create(empty).is_err());
    }

    #[test]
    fn apply_transition_returns_new_version_without_mutating_original() {
        let order = placed(FulfillmentStyle::Direct);
        let next = order
            .apply_transition(1, OrderStatus::Confirmed, &vendor(), None, Utc::now())
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.version, 1);
        assert_eq!(next.status, OrderStatus::Confirmed);
        assert_eq!(next.version, 2);
        assert_eq!(next.status_history.len(), 2);
        assert_eq!(next.status_history[1].actor_id, "v1");
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let order = placed(FulfillmentStyle::Direct);
        let err = order
            .apply_transition(7, OrderStatus::Confirmed, &vendor(), None, Utc::now())
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::VersionConflict {
                expected: 7,
                actual: 1
            }
        ));
    }

    #[test]
    fn cancellation_records_reason() {
        let order = placed(FulfillmentStyle::Direct);
        let cancelled = order
            .apply_transition(
                1,
                OrderStatus::Cancelled,
                &vendor(),
                Some("  out of stock ".to_string()),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("out of stock"));

        let err = cancelled
            .apply_transition(2, OrderStatus::Confirmed, &vendor(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::TerminalState(OrderStatus::Cancelled)));
    }

    #[test]
    fn picker_assignment_moves_to_assigned_picker() {
        let order = placed(FulfillmentStyle::Staffed);
        let confirmed = order
            .apply_transition(1, OrderStatus::Confirmed, &vendor(), None, Utc::now())
            .unwrap();
        let assigned = confirmed
            .apply_assignment(2, ActorRole::Picker, "p1", Utc::now())
            .unwrap();

        assert_eq!(assigned.status, OrderStatus::AssignedPicker);
        assert_eq!(assigned.assigned_picker_id.as_deref(), Some("p1"));
        assert_eq!(assigned.version, 3);
        assert_eq!(
            assigned.status_history.last().unwrap().actor_role,
            ActorRole::System
        );
    }

    #[test]
    fn only_the_assigned_picker_may_advance() {
        let order = placed(FulfillmentStyle::Staffed);
        let assigned = order
            .apply_transition(1, OrderStatus::Confirmed, &vendor(), None, Utc::now())
            .unwrap()
            .apply_assignment(2, ActorRole::Picker, "p1", Utc::now())
            .unwrap();

        let err = assigned
            .apply_transition(
                3,
                OrderStatus::Picking,
                &Actor::new("p2", ActorRole::Picker),
                None,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::RoleNotPermitted { .. }));

        assert!(assigned
            .apply_transition(
                3,
                OrderStatus::Picking,
                &Actor::new("p1", ActorRole::Picker),
                None,
                Utc::now(),
            )
            .is_ok());
    }

    #[test]
    fn direct_orders_are_not_picker_assignable() {
        let order = placed(FulfillmentStyle::Direct)
            .apply_transition(1, OrderStatus::Confirmed, &vendor(), None, Utc::now())
            .unwrap();

        assert!(matches!(
            order.check_assignable(ActorRole::Picker),
            Err(AppError::NotAssignable { .. })
        ));
    }

    #[test]
    fn progress_tracks_position_in_style_path() {
        let order = placed(FulfillmentStyle::Direct);
        assert_eq!(order.current_progress().step, 1);
        assert_eq!(order.current_progress().total_steps, 7);

        let confirmed = order
            .apply_transition(1, OrderStatus::Confirmed, &vendor(), None, Utc::now())
            .unwrap();
        assert_eq!(confirmed.current_progress().step, 2);

        let cancelled = confirmed
            .apply_transition(
                2,
                OrderStatus::Cancelled,
                &vendor(),
                Some("closed early".to_string()),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(cancelled.current_progress().step, 2);
    }

    #[test]
    fn elapsed_time_freezes_on_terminal_state() {
        let start = Utc::now();
        let order = Order::create(
            new_order(FulfillmentStyle::Direct),
            FulfillmentStyle::Direct,
            &vendor(),
            start,
        )
        .unwrap();
        let cancelled = order
            .apply_transition(
                1,
                OrderStatus::Cancelled,
                &vendor(),
                Some("duplicate".to_string()),
                start + Duration::minutes(5),
            )
            .unwrap();

        assert_eq!(
            cancelled.elapsed_time(start + Duration::hours(2)),
            Duration::minutes(5)
        );
        assert_eq!(
            order.elapsed_time(start + Duration::minutes(30)),
            Duration::minutes(30)
        );
    }

    #[test]
    fn overflowing_line_total_is_rejected() {
        let mut input = new_order(FulfillmentStyle::Direct);
        input.items = vec![item("A", i64::MAX, 2)];
        input.pricing.subtotal = 0;
        input.pricing.total = 500;

        let err = create(input).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("overflows")));
    }

    #[test]
    fn overflowing_item_sum_is_rejected() {
        let mut input = new_order(FulfillmentStyle::Direct);
        input.items = vec![item("A", i64::MAX, 1), item("B", 1, 1)];

        let err = create(input).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("overflows")));
    }

    #[test]
    fn overflowing_pricing_is_inconsistent() {
        let mut input = new_order(FulfillmentStyle::Direct);
        input.items = vec![item("A", i64::MAX, 1)];
        input.pricing.subtotal = i64::MAX;
        input.pricing.delivery_fee = 1;
        input.pricing.tax = 0;
        input.pricing.total = i64::MIN;

        assert_eq!(input.pricing.expected_total(), None);
        assert!(!input.pricing.is_consistent());
        assert!(matches!(create(input), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn negative_pricing_fields_are_rejected() {
        let cases: [fn(&mut Pricing); 5] = [
            |p| p.subtotal = -1,
            |p| p.delivery_fee = -1,
            |p| p.tax = -1,
            |p| p.discount = -1,
            |p| p.total = -1,
        ];

        for forge in cases {
            let mut input = new_order(FulfillmentStyle::Direct);
            forge(&mut input.pricing);
            let err = create(input).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("negative")));
        }
    }

    #[test]
    fn settling_twice_keeps_the_version() {
        let mut input = new_order(FulfillmentStyle::Direct);
        input.payment_settled = false;
        let order = create(input).unwrap();

        let settled = order.mark_payment_settled(Utc::now()).unwrap();
        assert!(settled.payment_settled);
        assert_eq!(settled.version, 2);

        let again = settled.mark_payment_settled(Utc::now()).unwrap();
        assert_eq!(again, settled);
    }
}
