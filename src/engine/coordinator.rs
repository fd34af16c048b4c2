//! Fulfillment coordinator.
//!
//! Every accepted mutation follows the same sequence: one compare-and-swap
//! write of the order, then queue and packing bookkeeping, then published
//! events, then any assignment work the transition unlocked. Observers
//! therefore never see an event for a write that was not stored.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::FulfillmentConfig;
use crate::engine::packing::{is_fully_packed, shortfall_note, PackingTracker};
use crate::engine::publisher::EventPublisher;
use crate::engine::queue::{AssignmentQueue, QueuedOrder};
use crate::engine::transitions;
use crate::error::AppError;
use crate::models::assignment::AssignmentResult;
use crate::models::event::{EventType, FulfillmentEvent};
use crate::models::order::{Actor, ActorRole, FulfillmentStyle, NewOrder, Order, OrderStatus};
use crate::models::packing::PackingState;
use crate::models::personnel::{Availability, NewPersonnel, PerformanceStats, Personnel};
use crate::observability::metrics::Metrics;
use crate::store::FulfillmentStore;

const AUTO_ADVANCE_NOTE: &str = "all items packed";
const AUTO_PACKING_NOTE: &str = "packing started automatically";

pub struct FulfillmentCoordinator {
    pub(crate) store: Arc<dyn FulfillmentStore>,
    pub(crate) queue: AssignmentQueue,
    pub(crate) packing: PackingTracker,
    pub(crate) publisher: Arc<dyn EventPublisher>,
    pub(crate) config: FulfillmentConfig,
    pub(crate) metrics: Metrics,
}

impl FulfillmentCoordinator {
    pub fn new(
        store: Arc<dyn FulfillmentStore>,
        publisher: Arc<dyn EventPublisher>,
        config: FulfillmentConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            queue: AssignmentQueue::new(store.clone(), &config, metrics.clone()),
            packing: PackingTracker::new(store.clone()),
            store,
            publisher,
            config,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn queue(&self) -> &AssignmentQueue {
        &self.queue
    }

    pub fn place_order(&self, new_order: NewOrder, placed_by: &Actor) -> Result<Order, AppError> {
        let order = Order::create(
            new_order,
            self.config.default_fulfillment_style,
            placed_by,
            Utc::now(),
        )?;
        self.store.insert_order(order.clone())?;

        info!(order_id = %order.id, total = order.pricing.total, "order placed");
        self.publish(&order, EventType::StatusChanged, &placed_by.id, None, None, None);

        Ok(order)
    }

    pub fn get_order(&self, order_id: Uuid) -> Result<Order, AppError> {
        self.store.get_order(order_id)
    }

    pub fn list_orders(&self) -> Vec<Order> {
        self.store.list_orders()
    }

    pub fn allowed_transitions(
        &self,
        order_id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<OrderStatus>, AppError> {
        let order = self.store.get_order(order_id)?;
        Ok(transitions::allowed_next(&order, actor.role))
    }

    /// Records the payment-settled signal. Only the vendor (or `system`) may send it, and a
    /// repeat on a settled order returns the order unchanged.
    pub fn mark_payment_settled(
        &self,
        order_id: Uuid,
        expected_version: u64,
        actor: &Actor,
    ) -> Result<Order, AppError> {
        let order = self.store.get_order(order_id)?;
        if order.status.is_terminal() {
            return Err(AppError::TerminalState(order.status));
        }
        ensure_operator(&order, actor)?;
        if order.payment_settled {
            return Ok(order);
        }
        if order.version != expected_version {
            return Err(AppError::VersionConflict {
                expected: expected_version,
                actual: order.version,
            });
        }

        let next = order.mark_payment_settled(Utc::now())?;
        let stored = self.store.compare_and_swap_order(expected_version, next)?;
        info!(order_id = %order_id, "payment settled");
        Ok(stored)
    }

    /// Applies a status change under the optimistic-concurrency guard and returns the
    /// latest stored order, including any assignment the change triggered.
    pub fn request_transition(
        &self,
        order_id: Uuid,
        expected_version: u64,
        new_status: OrderStatus,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<Order, AppError> {
        let current = self.store.get_order(order_id)?;
        let note = self.annotate_short_pack(&current, new_status, note);

        let next = current
            .apply_transition(expected_version, new_status, actor, note, Utc::now())
            .inspect_err(|err| self.record_transition_failure(order_id, err))?;
        let stored = self
            .store
            .compare_and_swap_order(expected_version, next)
            .inspect_err(|err| self.record_transition_failure(order_id, err))?;

        self.metrics
            .transitions_total
            .with_label_values(&["accepted"])
            .inc();
        info!(
            order_id = %order_id,
            from = %current.status,
            to = %stored.status,
            version = stored.version,
            actor_id = %actor.id,
            role = %actor.role,
            "order transitioned"
        );

        let dispatch = self.after_transition(&current, &stored);
        let note = stored.status_history.last().and_then(|entry| entry.note.clone());
        self.publish(&stored, EventType::StatusChanged, &actor.id, None, None, note);

        for role in dispatch {
            self.dispatch_pending(role);
        }

        self.store.get_order(order_id)
    }

    /// Records picker progress on one line item; a full pack advances the order
    /// automatically with the `system` actor.
    pub fn request_packing_update(
        &self,
        order_id: Uuid,
        item_id: &str,
        picked_quantity: i64,
        packed: bool,
        note: Option<String>,
        actor: &Actor,
    ) -> Result<PackingState, AppError> {
        let order = self.store.get_order(order_id)?;
        if order.status.is_terminal() {
            return Err(AppError::TerminalState(order.status));
        }

        let picker_allowed = match actor.role {
            ActorRole::System => true,
            ActorRole::Picker => order
                .assigned_picker_id
                .as_deref()
                .is_none_or(|assigned| assigned == actor.id),
            _ => false,
        };
        if !picker_allowed {
            return Err(AppError::RoleNotPermitted {
                from: order.status,
                to: order.status,
                role: actor.role,
            });
        }

        if !matches!(
            order.status,
            OrderStatus::Picking | OrderStatus::Picked | OrderStatus::Packing
        ) {
            return Err(AppError::PackingNotActive(order_id));
        }

        let state = self
            .packing
            .update_item_progress(order_id, item_id, picked_quantity, packed, note)
            .inspect_err(|_| {
                self.metrics
                    .packing_updates_total
                    .with_label_values(&["rejected"])
                    .inc();
            })?;
        self.metrics
            .packing_updates_total
            .with_label_values(&["accepted"])
            .inc();

        self.publish(
            &order,
            EventType::PackingUpdated,
            &actor.id,
            None,
            Some(item_id.to_string()),
            None,
        );

        if is_fully_packed(&state) {
            self.auto_advance(order_id).inspect_err(|err| {
                warn!(order_id = %order_id, error = %err, "auto-advance after full pack failed");
            })?;
        }

        Ok(state)
    }

    pub fn packing_state(&self, order_id: Uuid) -> Result<PackingState, AppError> {
        self.packing
            .find(order_id)
            .ok_or_else(|| AppError::NotFound(format!("no packing state for order {order_id}")))
    }

    pub fn register_personnel(&self, request: NewPersonnel) -> Result<Personnel, AppError> {
        let personnel = self.queue.register_personnel(request)?;
        if personnel.availability == Availability::Available {
            self.dispatch_pending(personnel.role);
        }
        self.queue.personnel(&personnel.id)
    }

    /// Availability changes are the retry signal for queued orders.
    pub fn set_personnel_availability(
        &self,
        personnel_id: &str,
        availability: Availability,
    ) -> Result<Personnel, AppError> {
        let personnel = self.queue.set_availability(personnel_id, availability)?;
        info!(
            personnel_id = %personnel_id,
            availability = ?availability,
            "personnel availability changed"
        );
        if availability == Availability::Available {
            self.dispatch_pending(personnel.role);
        }
        self.queue.personnel(personnel_id)
    }

    pub fn update_personnel_stats(
        &self,
        personnel_id: &str,
        stats: PerformanceStats,
    ) -> Result<Personnel, AppError> {
        self.queue.update_stats(personnel_id, stats)
    }

    pub fn list_personnel(&self, role: Option<ActorRole>) -> Vec<Personnel> {
        self.queue.list_personnel(role)
    }

    pub fn pending(&self, role: ActorRole) -> Vec<QueuedOrder> {
        self.queue.pending(role)
    }

    pub fn assignments(&self) -> Vec<AssignmentResult> {
        self.store.list_assignments()
    }

    /// Walks a fully packed order to `ready_for_pickup`. Each step reloads the order;
    /// only version conflicts count against `auto_advance_max_attempts`.
    fn auto_advance(&self, order_id: Uuid) -> Result<(), AppError> {
        let system = Actor::system();
        let mut conflicts = 0;

        loop {
            let order = self.store.get_order(order_id)?;
            let (target, note) = match order.status {
                OrderStatus::Picking | OrderStatus::Packing => {
                    (OrderStatus::ReadyForPickup, AUTO_ADVANCE_NOTE)
                }
                OrderStatus::Picked => (OrderStatus::Packing, AUTO_PACKING_NOTE),
                _ => return Ok(()),
            };

            match self.request_transition(
                order_id,
                order.version,
                target,
                &system,
                Some(note.to_string()),
            ) {
                Ok(_) => {}
                Err(err @ AppError::VersionConflict { .. }) => {
                    conflicts += 1;
                    if conflicts >= self.config.auto_advance_max_attempts {
                        warn!(order_id = %order_id, conflicts, "auto-advance attempts exhausted");
                        return Err(err);
                    }
                    warn!(order_id = %order_id, "auto-advance raced another writer; reloading");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Queue, packing and personnel bookkeeping for a stored transition. Returns the
    /// roles whose queues should be dispatched afterwards.
    pub(crate) fn after_transition(&self, previous: &Order, next: &Order) -> Vec<ActorRole> {
        let mut dispatch = Vec::new();

        match next.status {
            OrderStatus::Confirmed if next.fulfillment_style == FulfillmentStyle::Staffed => {
                self.enqueue(next, ActorRole::Picker, &mut dispatch);
            }
            OrderStatus::AssignedPicker => {
                self.packing.begin_packing(next);
            }
            OrderStatus::Preparing | OrderStatus::Packing => {
                self.enqueue_rider_if_needed(next, &mut dispatch);
            }
            OrderStatus::ReadyForPickup => {
                self.packing.archive(next.id);
                self.release_personnel(next.assigned_picker_id.as_deref(), next, &mut dispatch);
                self.enqueue_rider_if_needed(next, &mut dispatch);
            }
            OrderStatus::OutForDelivery => {
                self.queue.remove(next.id);
                if previous.assigned_rider_id.is_none() {
                    if let Some(rider_id) = next.assigned_rider_id.as_deref() {
                        self.track_claim(rider_id, next);
                    }
                }
            }
            OrderStatus::Delivered => {
                self.release_personnel(next.assigned_rider_id.as_deref(), next, &mut dispatch);
            }
            OrderStatus::Cancelled => {
                self.queue.remove(next.id);
                self.packing.archive(next.id);
                self.release_personnel(next.assigned_picker_id.as_deref(), next, &mut dispatch);
                self.release_personnel(next.assigned_rider_id.as_deref(), next, &mut dispatch);
            }
            _ => {}
        }

        dispatch
    }

    fn enqueue(&self, order: &Order, role: ActorRole, dispatch: &mut Vec<ActorRole>) {
        match self.queue.enqueue(order, role) {
            Ok(()) => {
                if !dispatch.contains(&role) {
                    dispatch.push(role);
                }
            }
            Err(err) => warn!(order_id = %order.id, error = %err, "failed to enqueue order"),
        }
    }

    fn enqueue_rider_if_needed(&self, order: &Order, dispatch: &mut Vec<ActorRole>) {
        if order.assigned_rider_id.is_none()
            && self.queue.queued_role(order.id) != Some(ActorRole::Rider)
        {
            self.enqueue(order, ActorRole::Rider, dispatch);
        }
    }

    fn release_personnel(
        &self,
        personnel_id: Option<&str>,
        order: &Order,
        dispatch: &mut Vec<ActorRole>,
    ) {
        let Some(personnel_id) = personnel_id else {
            return;
        };

        match self.queue.release(personnel_id, order.id) {
            Ok(personnel) => {
                if !dispatch.contains(&personnel.role) {
                    dispatch.push(personnel.role);
                }
            }
            Err(err) => warn!(
                order_id = %order.id,
                personnel_id = %personnel_id,
                error = %err,
                "failed to release personnel slot"
            ),
        }
    }

    /// A rider who takes an unassigned order still occupies a slot for it.
    fn track_claim(&self, rider_id: &str, order: &Order) {
        let max_concurrency = self.queue.max_concurrency(ActorRole::Rider);
        if let Err(err) = self.store.try_reserve(rider_id, order.id, max_concurrency) {
            warn!(
                order_id = %order.id,
                rider_id = %rider_id,
                error = %err,
                "rider claimed order without a free slot"
            );
        }
    }

    fn annotate_short_pack(
        &self,
        order: &Order,
        new_status: OrderStatus,
        note: Option<String>,
    ) -> Option<String> {
        if new_status != OrderStatus::ReadyForPickup {
            return note;
        }

        let shortfall = self
            .packing
            .get(order.id)
            .and_then(|state| shortfall_note(&state));

        match (note, shortfall) {
            (Some(note), Some(shortfall)) if !note.trim().is_empty() => {
                Some(format!("{}; {shortfall}", note.trim()))
            }
            (_, Some(shortfall)) => Some(shortfall),
            (note, None) => note,
        }
    }

    fn record_transition_failure(&self, order_id: Uuid, err: &AppError) {
        let outcome = match err {
            AppError::VersionConflict { .. } => {
                warn!(order_id = %order_id, error = %err, "transition lost a version race");
                "conflict"
            }
            _ => "rejected",
        };
        self.metrics
            .transitions_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub(crate) fn publish(
        &self,
        order: &Order,
        event_type: EventType,
        actor_id: &str,
        personnel_id: Option<String>,
        item_id: Option<String>,
        note: Option<String>,
    ) {
        self.publisher.publish(FulfillmentEvent {
            event_type,
            order_id: order.id,
            status: order.status,
            version: order.version,
            actor_id: actor_id.to_string(),
            timestamp: Utc::now(),
            personnel_id,
            item_id,
            note,
        });
    }
}

/// Payment signals and manual assignment come from the store operator or the engine.
pub(crate) fn ensure_operator(order: &Order, actor: &Actor) -> Result<(), AppError> {
    match actor.role {
        ActorRole::Vendor | ActorRole::System => Ok(()),
        role => Err(AppError::RoleNotPermitted {
            from: order.status,
            to: order.status,
            role,
        }),
    }
}
