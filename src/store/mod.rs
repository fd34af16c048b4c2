//! Storage collaborator for the fulfillment engine.
//!
//! The engine only relies on the guarantees spelled out on each method; any
//! backend that provides per-record compare-and-swap can stand in for
//! [`MemoryStore`].

mod memory;

pub use memory::MemoryStore;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::AssignmentResult;
use crate::models::order::{ActorRole, Order};
use crate::models::packing::PackingState;
use crate::models::personnel::Personnel;

pub type PackingUpdate<'a> = &'a dyn Fn(&PackingState) -> Result<PackingState, AppError>;
pub type PersonnelUpdate<'a> = &'a dyn Fn(&mut Personnel);

pub trait FulfillmentStore: Send + Sync {
    /// Fails with `Conflict` if the id is already taken.
    fn insert_order(&self, order: Order) -> Result<(), AppError>;

    fn get_order(&self, id: Uuid) -> Result<Order, AppError>;

    /// Replaces the stored order only if its version still equals `expected_version`.
    fn compare_and_swap_order(&self, expected_version: u64, order: Order)
        -> Result<Order, AppError>;

    fn list_orders(&self) -> Vec<Order>;

    /// Inserts `state` unless a state already exists for the order; returns the stored one.
    fn begin_packing(&self, state: PackingState) -> PackingState;

    fn get_packing(&self, order_id: Uuid) -> Option<PackingState>;

    /// Atomic read-modify-write of the active packing state.
    fn update_packing(
        &self,
        order_id: Uuid,
        update: PackingUpdate<'_>,
    ) -> Result<PackingState, AppError>;

    /// Moves the active state to the archive.
    fn archive_packing(&self, order_id: Uuid) -> Option<PackingState>;

    fn get_archived_packing(&self, order_id: Uuid) -> Option<PackingState>;

    fn insert_personnel(&self, personnel: Personnel) -> Result<(), AppError>;

    fn get_personnel(&self, id: &str) -> Result<Personnel, AppError>;

    fn list_personnel(&self, role: Option<ActorRole>) -> Vec<Personnel>;

    /// Compare-and-swap on availability and active orders: adds `order_id` only if the
    /// record is still available and under `max_concurrency`, else `PersonnelUnavailable`.
    fn try_reserve(
        &self,
        id: &str,
        order_id: Uuid,
        max_concurrency: usize,
    ) -> Result<Personnel, AppError>;

    fn release(&self, id: &str, order_id: Uuid) -> Result<Personnel, AppError>;

    fn update_personnel(&self, id: &str, update: PersonnelUpdate<'_>)
        -> Result<Personnel, AppError>;

    fn record_assignment(&self, assignment: AssignmentResult);

    fn list_assignments(&self) -> Vec<AssignmentResult>;
}
