use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::AssignmentResult;
use crate::models::order::{ActorRole, Order};
use crate::models::packing::PackingState;
use crate::models::personnel::Personnel;
use crate::store::{FulfillmentStore, PackingUpdate, PersonnelUpdate};

/// DashMap-backed store. Each CAS runs under the record's shard lock.
#[derive(Default)]
pub struct MemoryStore {
    orders: DashMap<Uuid, Order>,
    packing: DashMap<Uuid, PackingState>,
    archived_packing: DashMap<Uuid, PackingState>,
    personnel: DashMap<String, Personnel>,
    assignments: DashMap<Uuid, AssignmentResult>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FulfillmentStore for MemoryStore {
    fn insert_order(&self, order: Order) -> Result<(), AppError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "order {} already exists",
                order.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    fn get_order(&self, id: Uuid) -> Result<Order, AppError> {
        self.orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))
    }

    fn compare_and_swap_order(
        &self,
        expected_version: u64,
        order: Order,
    ) -> Result<Order, AppError> {
        let mut current = self
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order.id)))?;

        if current.version != expected_version {
            return Err(AppError::VersionConflict {
                expected: expected_version,
                actual: current.version,
            });
        }

        *current = order.clone();
        Ok(order)
    }

    fn list_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| order.created_at);
        orders
    }

    fn begin_packing(&self, state: PackingState) -> PackingState {
        self.packing
            .entry(state.order_id)
            .or_insert(state)
            .value()
            .clone()
    }

    fn get_packing(&self, order_id: Uuid) -> Option<PackingState> {
        self.packing.get(&order_id).map(|entry| entry.value().clone())
    }

    fn update_packing(
        &self,
        order_id: Uuid,
        update: PackingUpdate<'_>,
    ) -> Result<PackingState, AppError> {
        let mut current = self
            .packing
            .get_mut(&order_id)
            .ok_or(AppError::PackingNotActive(order_id))?;

        let next = update(current.value())?;
        *current = next.clone();
        Ok(next)
    }

    fn archive_packing(&self, order_id: Uuid) -> Option<PackingState> {
        let (_, state) = self.packing.remove(&order_id)?;
        self.archived_packing.insert(order_id, state.clone());
        Some(state)
    }

    fn get_archived_packing(&self, order_id: Uuid) -> Option<PackingState> {
        self.archived_packing
            .get(&order_id)
            .map(|entry| entry.value().clone())
    }

    fn insert_personnel(&self, personnel: Personnel) -> Result<(), AppError> {
        match self.personnel.entry(personnel.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "personnel {} already exists",
                personnel.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(personnel);
                Ok(())
            }
        }
    }

    fn get_personnel(&self, id: &str) -> Result<Personnel, AppError> {
        self.personnel
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("personnel {} not found", id)))
    }

    fn list_personnel(&self, role: Option<ActorRole>) -> Vec<Personnel> {
        let mut personnel: Vec<Personnel> = self
            .personnel
            .iter()
            .filter(|entry| role.is_none_or(|role| entry.value().role == role))
            .map(|entry| entry.value().clone())
            .collect();
        personnel.sort_by(|a, b| a.id.cmp(&b.id));
        personnel
    }

    fn try_reserve(
        &self,
        id: &str,
        order_id: Uuid,
        max_concurrency: usize,
    ) -> Result<Personnel, AppError> {
        let mut personnel = self
            .personnel
            .get_mut(id)
            .ok_or_else(|| AppError::PersonnelUnavailable(id.to_string()))?;

        if personnel.active_order_ids.contains(&order_id) {
            return Ok(personnel.clone());
        }
        if !personnel.can_accept(max_concurrency) {
            return Err(AppError::PersonnelUnavailable(id.to_string()));
        }

        personnel.active_order_ids.insert(order_id);
        personnel.updated_at = Utc::now();
        Ok(personnel.clone())
    }

    fn release(&self, id: &str, order_id: Uuid) -> Result<Personnel, AppError> {
        let mut personnel = self
            .personnel
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("personnel {} not found", id)))?;

        if personnel.active_order_ids.remove(&order_id) {
            personnel.updated_at = Utc::now();
        }
        Ok(personnel.clone())
    }

    fn update_personnel(
        &self,
        id: &str,
        update: PersonnelUpdate<'_>,
    ) -> Result<Personnel, AppError> {
        let mut personnel = self
            .personnel
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("personnel {} not found", id)))?;

        update(personnel.value_mut());
        personnel.updated_at = Utc::now();
        Ok(personnel.clone())
    }

    fn record_assignment(&self, assignment: AssignmentResult) {
        self.assignments.insert(assignment.id, assignment);
    }

    fn list_assignments(&self) -> Vec<AssignmentResult> {
        let mut assignments: Vec<AssignmentResult> = self
            .assignments
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        assignments.sort_by_key(|assignment| assignment.assigned_at);
        assignments
    }
}
