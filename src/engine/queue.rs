use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::FulfillmentConfig;
use crate::engine::scoring::{compute_score, select_best, utilization};
use crate::error::AppError;
use crate::models::assignment::AssignmentResult;
use crate::models::order::{ActorRole, Order, Priority};
use crate::models::personnel::{Availability, NewPersonnel, PerformanceStats, Personnel};
use crate::observability::metrics::Metrics;
use crate::store::FulfillmentStore;

const QUEUE_ROLES: [ActorRole; 2] = [ActorRole::Picker, ActorRole::Rider];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOrder {
    pub order_id: Uuid,
    pub priority: Priority,
}

/// FIFO within a priority tier; higher tiers drain first.
#[derive(Debug, Default, Clone)]
pub struct PendingQueue {
    tiers: BTreeMap<Priority, VecDeque<Uuid>>,
}

impl PendingQueue {
    pub fn push_back(&mut self, order_id: Uuid, priority: Priority) {
        if !self.contains(order_id) {
            self.tiers.entry(priority).or_default().push_back(order_id);
        }
    }

    pub fn push_front(&mut self, order_id: Uuid, priority: Priority) {
        if !self.contains(order_id) {
            self.tiers.entry(priority).or_default().push_front(order_id);
        }
    }

    pub fn pop_front(&mut self) -> Option<Uuid> {
        self.tiers
            .values_mut()
            .rev()
            .find_map(|tier| tier.pop_front())
    }

    pub fn remove(&mut self, order_id: Uuid) -> bool {
        for tier in self.tiers.values_mut() {
            if let Some(index) = tier.iter().position(|id| *id == order_id) {
                tier.remove(index);
                return true;
            }
        }
        false
    }

    pub fn contains(&self, order_id: Uuid) -> bool {
        self.tiers.values().any(|tier| tier.contains(&order_id))
    }

    pub fn len(&self) -> usize {
        self.tiers.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Orders in the sequence they would be dequeued.
    pub fn snapshot(&self) -> Vec<QueuedOrder> {
        self.tiers
            .iter()
            .rev()
            .flat_map(|(priority, tier)| {
                tier.iter().map(|order_id| QueuedOrder {
                    order_id: *order_id,
                    priority: *priority,
                })
            })
            .collect()
    }
}

/// Role-scoped work queues plus the personnel records they match against.
pub struct AssignmentQueue {
    store: Arc<dyn FulfillmentStore>,
    queues: DashMap<ActorRole, PendingQueue>,
    picker_max_concurrency: usize,
    rider_max_concurrency: usize,
    metrics: Metrics,
}

impl AssignmentQueue {
    pub fn new(
        store: Arc<dyn FulfillmentStore>,
        config: &FulfillmentConfig,
        metrics: Metrics,
    ) -> Self {
        let queues = DashMap::new();
        for role in QUEUE_ROLES {
            queues.insert(role, PendingQueue::default());
            metrics.orders_in_queue.with_label_values(&[role.as_str()]).set(0);
        }

        Self {
            store,
            queues,
            picker_max_concurrency: config.picker_max_concurrency,
            rider_max_concurrency: config.rider_max_concurrency,
            metrics,
        }
    }

    pub fn max_concurrency(&self, role: ActorRole) -> usize {
        match role {
            ActorRole::Picker => self.picker_max_concurrency,
            ActorRole::Rider => self.rider_max_concurrency,
            _ => 0,
        }
    }

    pub fn register_personnel(&self, request: NewPersonnel) -> Result<Personnel, AppError> {
        if request.id.trim().is_empty() || request.name.trim().is_empty() {
            return Err(AppError::BadRequest("id and name cannot be empty".to_string()));
        }
        ensure_queue_role(request.role)?;

        let mut stats = request.performance_stats.unwrap_or_default();
        stats.rating = stats.rating.clamp(0.0, 5.0);

        let personnel = Personnel {
            id: request.id,
            name: request.name,
            role: request.role,
            availability: request.availability.unwrap_or(Availability::Available),
            active_order_ids: BTreeSet::new(),
            performance_stats: stats,
            updated_at: Utc::now(),
        };

        self.store.insert_personnel(personnel.clone())?;
        info!(personnel_id = %personnel.id, role = %personnel.role, "personnel registered");
        Ok(personnel)
    }

    pub fn set_availability(
        &self,
        personnel_id: &str,
        availability: Availability,
    ) -> Result<Personnel, AppError> {
        self.store
            .update_personnel(personnel_id, &|personnel: &mut Personnel| {
                personnel.availability = availability;
            })
    }

    pub fn update_stats(
        &self,
        personnel_id: &str,
        stats: PerformanceStats,
    ) -> Result<Personnel, AppError> {
        let rating = stats.rating.clamp(0.0, 5.0);
        self.store
            .update_personnel(personnel_id, &|personnel: &mut Personnel| {
                personnel.performance_stats = PerformanceStats {
                    rating,
                    completed_count: stats.completed_count,
                };
            })
    }

    pub fn personnel(&self, personnel_id: &str) -> Result<Personnel, AppError> {
        self.store.get_personnel(personnel_id)
    }

    pub fn list_personnel(&self, role: Option<ActorRole>) -> Vec<Personnel> {
        self.store.list_personnel(role)
    }

    /// Adds the order to `role`'s queue, taking it out of any other role's queue.
    pub fn enqueue(&self, order: &Order, role: ActorRole) -> Result<(), AppError> {
        ensure_queue_role(role)?;

        for other in QUEUE_ROLES.iter().filter(|other| **other != role) {
            self.with_queue(*other, |queue| queue.remove(order.id));
        }
        self.with_queue(role, |queue| queue.push_back(order.id, order.priority));

        debug!(order_id = %order.id, role = %role, "order enqueued");
        Ok(())
    }

    /// Puts an order back at the head of its tier after a failed attempt.
    pub fn requeue(&self, order_id: Uuid, priority: Priority, role: ActorRole) {
        self.with_queue(role, |queue| queue.push_front(order_id, priority));
    }

    pub fn remove(&self, order_id: Uuid) -> Option<ActorRole> {
        QUEUE_ROLES
            .into_iter()
            .find(|role| self.with_queue(*role, |queue| queue.remove(order_id)))
    }

    pub fn pop_next(&self, role: ActorRole) -> Option<Uuid> {
        self.with_queue(role, PendingQueue::pop_front)
    }

    pub fn pending(&self, role: ActorRole) -> Vec<QueuedOrder> {
        self.queues
            .get(&role)
            .map(|queue| queue.snapshot())
            .unwrap_or_default()
    }

    pub fn queued_role(&self, order_id: Uuid) -> Option<ActorRole> {
        QUEUE_ROLES.into_iter().find(|role| {
            self.queues
                .get(role)
                .is_some_and(|queue| queue.contains(order_id))
        })
    }

    pub fn pending_count(&self) -> usize {
        QUEUE_ROLES
            .iter()
            .filter_map(|role| self.queues.get(role).map(|queue| queue.len()))
            .sum()
    }

    /// Best candidate for `role`, or `None` when nobody has a free slot.
    pub fn next_available_personnel(&self, role: ActorRole) -> Option<Personnel> {
        let max_concurrency = self.max_concurrency(role);
        let candidates: Vec<Personnel> = self
            .store
            .list_personnel(Some(role))
            .into_iter()
            .filter(|personnel| personnel.can_accept(max_concurrency))
            .collect();

        select_best(&candidates).cloned()
    }

    /// Reserves a slot on `personnel` for `order`. The reservation is a compare-and-swap
    /// on the personnel record, so racing callers cannot overfill it. The order stays
    /// queued until the caller [`record`](Self::record)s the result.
    pub fn assign(
        &self,
        order: &Order,
        personnel: &Personnel,
        attempts: u32,
    ) -> Result<AssignmentResult, AppError> {
        let role = personnel.role;
        let max_concurrency = self.max_concurrency(role);
        let score = compute_score(personnel, max_concurrency);

        let reserved = self
            .store
            .try_reserve(&personnel.id, order.id, max_concurrency)?;
        self.record_utilization(&reserved);

        Ok(AssignmentResult {
            id: Uuid::new_v4(),
            order_id: order.id,
            personnel_id: reserved.id,
            role,
            score,
            attempts,
            assigned_at: Utc::now(),
        })
    }

    pub fn record(&self, result: AssignmentResult) {
        self.with_queue(result.role, |queue| queue.remove(result.order_id));
        self.store.record_assignment(result);
    }

    pub fn release(&self, personnel_id: &str, order_id: Uuid) -> Result<Personnel, AppError> {
        let personnel = self.store.release(personnel_id, order_id)?;
        self.record_utilization(&personnel);
        Ok(personnel)
    }

    fn record_utilization(&self, personnel: &Personnel) {
        let ratio = utilization(personnel.load(), self.max_concurrency(personnel.role));
        self.metrics
            .personnel_utilization
            .with_label_values(&[&personnel.id])
            .set(ratio);
    }

    fn with_queue<T>(&self, role: ActorRole, f: impl FnOnce(&mut PendingQueue) -> T) -> T {
        let mut queue = self.queues.entry(role).or_default();
        let out = f(queue.value_mut());
        self.metrics
            .orders_in_queue
            .with_label_values(&[role.as_str()])
            .set(queue.len() as i64);
        out
    }
}

fn ensure_queue_role(role: ActorRole) -> Result<(), AppError> {
    if role.is_fulfillment_role() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "role {role} has no assignment queue"
        )))
    }
}
