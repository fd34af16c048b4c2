use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::coordinator::{ensure_operator, FulfillmentCoordinator};
use crate::error::AppError;
use crate::models::event::EventType;
use crate::models::order::{Actor, ActorRole, Order};
use crate::models::personnel::Personnel;

impl FulfillmentCoordinator {
    /// Assigns the best available picker or rider, or `personnel_id` when given.
    pub fn request_assignment(
        &self,
        order_id: Uuid,
        role: ActorRole,
        personnel_id: Option<&str>,
    ) -> Result<Order, AppError> {
        if !role.is_fulfillment_role() {
            return Err(AppError::BadRequest(format!(
                "role {role} cannot be assigned to orders"
            )));
        }

        let start = Instant::now();
        let result = match personnel_id {
            Some(personnel_id) => self.assign_to(order_id, role, personnel_id),
            None => self.assign_with_retry(order_id, role),
        };

        let outcome = if result.is_ok() { "success" } else { "error" };
        self.metrics
            .assignment_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .assignments_total
            .with_label_values(&[role.as_str(), outcome])
            .inc();

        result
    }

    /// Operator-initiated assignment; customers and personnel cannot assign orders.
    pub fn request_manual_assignment(
        &self,
        order_id: Uuid,
        role: ActorRole,
        personnel_id: Option<&str>,
        actor: &Actor,
    ) -> Result<Order, AppError> {
        let order = self.store.get_order(order_id)?;
        ensure_operator(&order, actor)?;
        self.request_assignment(order_id, role, personnel_id)
    }

    /// Assigns queued orders for `role` while anyone has a free slot. Returns how many
    /// orders were assigned.
    pub fn dispatch_pending(&self, role: ActorRole) -> usize {
        let mut assigned = 0;

        while self.queue.next_available_personnel(role).is_some() {
            let Some(order_id) = self.queue.pop_next(role) else {
                break;
            };

            match self.request_assignment(order_id, role, None) {
                Ok(_) => assigned += 1,
                Err(AppError::NoAvailablePersonnel(_))
                | Err(AppError::AssignmentRetryExhausted { .. }) => break,
                Err(err) => {
                    warn!(
                        order_id = %order_id,
                        role = %role,
                        error = %err,
                        "dropping stale queue entry"
                    );
                }
            }
        }

        assigned
    }

    fn assign_with_retry(&self, order_id: Uuid, role: ActorRole) -> Result<Order, AppError> {
        let max_attempts = self.config.assignment_max_attempts;
        let mut attempts = 0;
        let mut priority = None;

        while attempts < max_attempts {
            attempts += 1;

            let order = self.store.get_order(order_id)?;
            order.check_assignable(role)?;
            priority = Some(order.priority);

            let Some(candidate) = self.queue.next_available_personnel(role) else {
                self.queue.requeue(order.id, order.priority, role);
                warn!(
                    order_id = %order_id,
                    role = %role,
                    "no eligible personnel; order stays queued"
                );
                return Err(AppError::NoAvailablePersonnel(role));
            };

            match self.commit_assignment(&order, &candidate, attempts) {
                Ok(order) => return Ok(order),
                Err(AppError::PersonnelUnavailable(personnel_id)) => {
                    warn!(
                        order_id = %order_id,
                        personnel_id = %personnel_id,
                        attempt = attempts,
                        "candidate taken before commit; retrying selection"
                    );
                }
                Err(AppError::VersionConflict { .. }) => {
                    warn!(
                        order_id = %order_id,
                        attempt = attempts,
                        "order changed during assignment; retrying"
                    );
                }
                Err(err) => {
                    self.queue.requeue(order.id, order.priority, role);
                    return Err(err);
                }
            }
        }

        if let Some(priority) = priority {
            self.queue.requeue(order_id, priority, role);
        }
        Err(AppError::AssignmentRetryExhausted { order_id, attempts })
    }

    fn assign_to(
        &self,
        order_id: Uuid,
        role: ActorRole,
        personnel_id: &str,
    ) -> Result<Order, AppError> {
        let order = self.store.get_order(order_id)?;
        order.check_assignable(role)?;

        let personnel = self.queue.personnel(personnel_id)?;
        if personnel.role != role {
            return Err(AppError::BadRequest(format!(
                "personnel {personnel_id} is a {}, not a {role}",
                personnel.role
            )));
        }

        self.commit_assignment(&order, &personnel, 1)
            .inspect_err(|_| self.queue.requeue(order.id, order.priority, role))
    }

    /// Reserves the personnel slot, then writes the order. The reservation is rolled
    /// back if the order write loses a race.
    fn commit_assignment(
        &self,
        order: &Order,
        personnel: &Personnel,
        attempts: u32,
    ) -> Result<Order, AppError> {
        let role = personnel.role;
        let result = self.queue.assign(order, personnel, attempts)?;

        let stored = order
            .apply_assignment(order.version, role, &personnel.id, Utc::now())
            .and_then(|next| self.store.compare_and_swap_order(order.version, next));
        let stored = match stored {
            Ok(stored) => stored,
            Err(err) => {
                if let Err(release_err) = self.queue.release(&personnel.id, order.id) {
                    warn!(
                        order_id = %order.id,
                        personnel_id = %personnel.id,
                        error = %release_err,
                        "failed to roll back reservation"
                    );
                }
                return Err(err);
            }
        };

        self.queue.record(result);
        if role == ActorRole::Picker {
            self.after_transition(order, &stored);
        }

        info!(
            order_id = %stored.id,
            personnel_id = %personnel.id,
            role = %role,
            version = stored.version,
            "order assigned"
        );

        let system = "system";
        match role {
            ActorRole::Picker => {
                let note = stored
                    .status_history
                    .last()
                    .and_then(|entry| entry.note.clone());
                self.publish(&stored, EventType::StatusChanged, system, None, None, note);
                self.publish(
                    &stored,
                    EventType::PickerAssigned,
                    system,
                    Some(personnel.id.clone()),
                    None,
                    None,
                );
            }
            _ => {
                self.publish(
                    &stored,
                    EventType::RiderAssigned,
                    system,
                    Some(personnel.id.clone()),
                    None,
                    None,
                );
            }
        }

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::FulfillmentConfig;
    use crate::engine::coordinator::{ensure_operator, FulfillmentCoordinator};
    use crate::engine::publisher::BroadcastPublisher;
    use crate::error::AppError;
    use crate::models::order::tests::new_order;
    use crate::models::order::{Actor, ActorRole, FulfillmentStyle, OrderStatus};
    use crate::models::personnel::{Availability, NewPersonnel, PerformanceStats};
    use crate::observability::metrics::Metrics;
    use crate::store::MemoryStore;

    fn coordinator() -> FulfillmentCoordinator {
        FulfillmentCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(BroadcastPublisher::new(64)),
            FulfillmentConfig::default(),
            Metrics::new(),
        )
    }

    fn personnel(id: &str, role: ActorRole, rating: f64) -> NewPersonnel {
        NewPersonnel {
            id: id.to_string(),
            name: id.to_uppercase(),
            role,
            availability: None,
            performance_stats: Some(PerformanceStats {
                rating,
                completed_count: 10,
            }),
        }
    }

    fn confirmed_staffed(coordinator: &FulfillmentCoordinator) -> uuid::Uuid {
        let order = coordinator
            .place_order(
                new_order(FulfillmentStyle::Staffed),
                &Actor::new("c1", ActorRole::Customer),
            )
            .unwrap();
        coordinator
            .request_transition(
                order.id,
                1,
                OrderStatus::Confirmed,
                &Actor::new("v1", ActorRole::Vendor),
                None,
            )
            .unwrap();
        order.id
    }

    #[test]
    fn confirmed_order_waits_in_queue_without_pickers() {
        let coordinator = coordinator();
        let order_id = confirmed_staffed(&coordinator);

        assert_eq!(coordinator.pending(ActorRole::Picker).len(), 1);

        let err = coordinator
            .request_assignment(order_id, ActorRole::Picker, None)
            .unwrap_err();
        assert!(matches!(err, AppError::NoAvailablePersonnel(ActorRole::Picker)));
        assert_eq!(coordinator.pending(ActorRole::Picker).len(), 1);
    }

    #[test]
    fn personnel_arrival_drains_the_queue() {
        let coordinator = coordinator();
        let order_id = confirmed_staffed(&coordinator);

        coordinator
            .register_personnel(personnel("p1", ActorRole::Picker, 4.5))
            .unwrap();

        let order = coordinator.get_order(order_id).unwrap();
        assert_eq!(order.status, OrderStatus::AssignedPicker);
        assert_eq!(order.assigned_picker_id.as_deref(), Some("p1"));
        assert!(coordinator.pending(ActorRole::Picker).is_empty());
        assert_eq!(coordinator.assignments().len(), 1);
        assert!(coordinator.packing_state(order_id).is_ok());
    }

    #[test]
    fn availability_change_retries_queued_orders() {
        let coordinator = coordinator();
        let mut offline = personnel("p1", ActorRole::Picker, 4.5);
        offline.availability = Some(Availability::Offline);
        coordinator.register_personnel(offline).unwrap();

        let order_id = confirmed_staffed(&coordinator);
        assert_eq!(
            coordinator.get_order(order_id).unwrap().status,
            OrderStatus::Confirmed
        );

        coordinator
            .set_personnel_availability("p1", Availability::Available)
            .unwrap();
        assert_eq!(
            coordinator.get_order(order_id).unwrap().status,
            OrderStatus::AssignedPicker
        );
    }

    #[test]
    fn targeted_assignment_to_full_personnel_is_unavailable() {
        let coordinator = coordinator();
        coordinator
            .register_personnel(personnel("r1", ActorRole::Rider, 4.0))
            .unwrap();

        let mut direct = Vec::new();
        for _ in 0..2 {
            let order = coordinator
                .place_order(
                    new_order(FulfillmentStyle::Direct),
                    &Actor::new("c1", ActorRole::Customer),
                )
                .unwrap();
            let vendor = Actor::new("v1", ActorRole::Vendor);
            coordinator
                .request_transition(order.id, 1, OrderStatus::Confirmed, &vendor, None)
                .unwrap();
            coordinator
                .request_transition(order.id, 2, OrderStatus::Preparing, &vendor, None)
                .unwrap();
            direct.push(order.id);
        }

        // r1 took the first order when it entered preparing; the second is queued.
        assert_eq!(
            coordinator.get_order(direct[0]).unwrap().assigned_rider_id.as_deref(),
            Some("r1")
        );
        assert_eq!(coordinator.pending(ActorRole::Rider).len(), 1);

        let err = coordinator
            .request_assignment(direct[1], ActorRole::Rider, Some("r1"))
            .unwrap_err();
        assert!(matches!(err, AppError::PersonnelUnavailable(id) if id == "r1"));
        assert_eq!(coordinator.pending(ActorRole::Rider).len(), 1);
    }

    #[test]
    fn assignment_prefers_least_loaded_picker() {
        let coordinator = coordinator();
        for (id, rating) in [("p0", 3.0), ("p1", 4.0), ("p2", 5.0)] {
            coordinator
                .register_personnel(personnel(id, ActorRole::Picker, rating))
                .unwrap();
        }

        let picked: Vec<String> = (0..3)
            .map(|_| {
                let order_id = confirmed_staffed(&coordinator);
                coordinator
                    .get_order(order_id)
                    .unwrap()
                    .assigned_picker_id
                    .unwrap()
            })
            .collect();

        // equal loads fall back to rating, so each picker takes one order in rating order
        assert_eq!(picked, vec!["p2", "p1", "p0"]);
    }

    #[test]
    fn only_operators_assign_manually() {
        let coordinator = coordinator();
        let order_id = confirmed_staffed(&coordinator);

        for actor in [
            Actor::new("c1", ActorRole::Customer),
            Actor::new("p9", ActorRole::Picker),
        ] {
            let err = coordinator
                .request_manual_assignment(order_id, ActorRole::Picker, None, &actor)
                .unwrap_err();
            assert!(matches!(err, AppError::RoleNotPermitted { .. }));
        }

        let err = coordinator
            .request_manual_assignment(
                order_id,
                ActorRole::Picker,
                None,
                &Actor::new("v1", ActorRole::Vendor),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::NoAvailablePersonnel(ActorRole::Picker)));
    }

    #[test]
    fn vendor_cannot_be_assigned() {
        let coordinator = coordinator();
        let order_id = confirmed_staffed(&coordinator);

        assert!(matches!(
            coordinator.request_assignment(order_id, ActorRole::Vendor, None),
            Err(AppError::BadRequest(_))
        ));
    }
}
