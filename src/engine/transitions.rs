use crate::error::AppError;
use crate::models::order::{ActorRole, FulfillmentStyle, Order, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// `None` when the edge exists in both fulfillment styles.
    pub style: Option<FulfillmentStyle>,
    pub roles: &'static [ActorRole],
    pub requires_note: bool,
    pub requires_payment: bool,
}

const VENDOR: &[ActorRole] = &[ActorRole::Vendor];
const PICKER: &[ActorRole] = &[ActorRole::Picker];
const RIDER: &[ActorRole] = &[ActorRole::Rider];
const SYSTEM: &[ActorRole] = &[ActorRole::System];
const PICKER_OR_SYSTEM: &[ActorRole] = &[ActorRole::Picker, ActorRole::System];
const VENDOR_OR_SYSTEM: &[ActorRole] = &[ActorRole::Vendor, ActorRole::System];

const fn edge(
    from: OrderStatus,
    to: OrderStatus,
    style: Option<FulfillmentStyle>,
    roles: &'static [ActorRole],
) -> TransitionRule {
    TransitionRule {
        from,
        to,
        style,
        roles,
        requires_note: false,
        requires_payment: false,
    }
}

const fn cancel(from: OrderStatus) -> TransitionRule {
    TransitionRule {
        from,
        to: OrderStatus::Cancelled,
        style: None,
        roles: VENDOR,
        requires_note: true,
        requires_payment: false,
    }
}

const DIRECT: Option<FulfillmentStyle> = Some(FulfillmentStyle::Direct);
const STAFFED: Option<FulfillmentStyle> = Some(FulfillmentStyle::Staffed);

pub static TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        from: OrderStatus::Pending,
        to: OrderStatus::Confirmed,
        style: None,
        roles: VENDOR,
        requires_note: false,
        requires_payment: true,
    },
    cancel(OrderStatus::Pending),
    cancel(OrderStatus::Confirmed),
    // direct
    edge(OrderStatus::Confirmed, OrderStatus::Preparing, DIRECT, VENDOR),
    edge(OrderStatus::Preparing, OrderStatus::Ready, DIRECT, VENDOR),
    edge(OrderStatus::Ready, OrderStatus::OutForDelivery, DIRECT, RIDER),
    // staffed
    edge(OrderStatus::Confirmed, OrderStatus::AssignedPicker, STAFFED, SYSTEM),
    edge(OrderStatus::AssignedPicker, OrderStatus::Picking, STAFFED, PICKER),
    edge(OrderStatus::Picking, OrderStatus::Picked, STAFFED, PICKER),
    // every item packed while still picking
    edge(OrderStatus::Picking, OrderStatus::ReadyForPickup, STAFFED, SYSTEM),
    edge(OrderStatus::Picked, OrderStatus::Packing, STAFFED, PICKER_OR_SYSTEM),
    edge(OrderStatus::Packing, OrderStatus::ReadyForPickup, STAFFED, PICKER_OR_SYSTEM),
    edge(OrderStatus::ReadyForPickup, OrderStatus::OutForDelivery, STAFFED, RIDER),
    // shared tail
    edge(OrderStatus::OutForDelivery, OrderStatus::Delivered, None, RIDER),
    edge(OrderStatus::Delivered, OrderStatus::Completed, None, VENDOR_OR_SYSTEM),
];

const DIRECT_PATH: &[OrderStatus] = &[
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Preparing,
    OrderStatus::Ready,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
    OrderStatus::Completed,
];

const STAFFED_PATH: &[OrderStatus] = &[
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::AssignedPicker,
    OrderStatus::Picking,
    OrderStatus::Picked,
    OrderStatus::Packing,
    OrderStatus::ReadyForPickup,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
    OrderStatus::Completed,
];

/// The happy-path status sequence for a fulfillment style.
pub fn style_path(style: FulfillmentStyle) -> &'static [OrderStatus] {
    match style {
        FulfillmentStyle::Direct => DIRECT_PATH,
        FulfillmentStyle::Staffed => STAFFED_PATH,
    }
}

pub fn find_edge(
    from: OrderStatus,
    to: OrderStatus,
    style: FulfillmentStyle,
) -> Option<&'static TransitionRule> {
    TRANSITIONS.iter().find(|rule| {
        rule.from == from && rule.to == to && rule.style.is_none_or(|s| s == style)
    })
}

/// Checks a requested move against the table and its validation rules.
pub fn validate(
    order: &Order,
    to: OrderStatus,
    role: ActorRole,
    note: Option<&str>,
) -> Result<&'static TransitionRule, AppError> {
    let from = order.status;
    if from.is_terminal() {
        return Err(AppError::TerminalState(from));
    }

    let rule = find_edge(from, to, order.fulfillment_style)
        .ok_or(AppError::InvalidTransition { from, to, role })?;

    if !rule.roles.contains(&role) {
        return Err(AppError::RoleNotPermitted { from, to, role });
    }

    if rule.requires_note && note.is_none_or(|n| n.trim().is_empty()) {
        return Err(AppError::CancellationRequiresNote);
    }

    if rule.requires_payment && !order.payment_settled {
        return Err(AppError::PaymentNotSettled);
    }

    Ok(rule)
}

/// Statuses `role` may request next from the order's current status.
pub fn allowed_next(order: &Order, role: ActorRole) -> Vec<OrderStatus> {
    if order.status.is_terminal() {
        return Vec::new();
    }

    TRANSITIONS
        .iter()
        .filter(|rule| {
            rule.from == order.status
                && rule.style.is_none_or(|s| s == order.fulfillment_style)
                && rule.roles.contains(&role)
        })
        .map(|rule| rule.to)
        .collect()
}
