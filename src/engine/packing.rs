use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::Order;
use crate::models::packing::{ItemProgress, PackingState, Shortfall};
use crate::store::FulfillmentStore;

pub fn new_packing_state(order: &Order, at: DateTime<Utc>) -> PackingState {
    let item_progress = order
        .items
        .iter()
        .map(|item| {
            (
                item.product_id.clone(),
                ItemProgress {
                    ordered_quantity: item.quantity,
                    picked_quantity: 0,
                    packed: false,
                    note: None,
                },
            )
        })
        .collect();

    PackingState {
        order_id: order.id,
        item_progress,
        started_at: at,
        updated_at: at,
    }
}

/// Returns the updated state, or an error leaving `state` as it was.
pub fn update_item_progress(
    state: &PackingState,
    item_id: &str,
    picked_quantity: i64,
    packed: bool,
    note: Option<String>,
    at: DateTime<Utc>,
) -> Result<PackingState, AppError> {
    let current = state
        .item_progress
        .get(item_id)
        .ok_or_else(|| AppError::UnknownItem(item_id.to_string()))?;

    if picked_quantity < 0 || picked_quantity > i64::from(current.ordered_quantity) {
        return Err(AppError::QuantityOutOfRange {
            item_id: item_id.to_string(),
            requested: picked_quantity,
            ordered: current.ordered_quantity,
        });
    }

    let mut next = state.clone();
    if let Some(progress) = next.item_progress.get_mut(item_id) {
        progress.picked_quantity = picked_quantity as u32;
        progress.packed = packed;
        if note.is_some() {
            progress.note = note;
        }
    }
    next.updated_at = at;

    Ok(next)
}

pub fn is_fully_packed(state: &PackingState) -> bool {
    !state.item_progress.is_empty() && state.item_progress.values().all(|item| item.packed)
}

/// Items that are unpacked or picked below the ordered quantity.
pub fn shortfall(state: &PackingState) -> Vec<Shortfall> {
    state
        .item_progress
        .iter()
        .filter(|(_, item)| !item.packed || item.picked_quantity < item.ordered_quantity)
        .map(|(item_id, item)| Shortfall {
            item_id: item_id.clone(),
            ordered_quantity: item.ordered_quantity,
            picked_quantity: item.picked_quantity,
            packed: item.packed,
        })
        .collect()
}

pub fn shortfall_note(state: &PackingState) -> Option<String> {
    let missing = shortfall(state);
    if missing.is_empty() {
        return None;
    }

    let detail = missing
        .iter()
        .map(|item| {
            let packed = if item.packed { "packed" } else { "unpacked" };
            format!(
                "{} {}/{} {}",
                item.item_id, item.picked_quantity, item.ordered_quantity, packed
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    Some(format!("short-pack: {detail}"))
}

/// Store-backed packing progress for orders in the picking/packing phase.
#[derive(Clone)]
pub struct PackingTracker {
    store: Arc<dyn FulfillmentStore>,
}

impl PackingTracker {
    pub fn new(store: Arc<dyn FulfillmentStore>) -> Self {
        Self { store }
    }

    /// Idempotent: a second call returns the existing state untouched.
    pub fn begin_packing(&self, order: &Order) -> PackingState {
        self.store
            .begin_packing(new_packing_state(order, Utc::now()))
    }

    pub fn update_item_progress(
        &self,
        order_id: Uuid,
        item_id: &str,
        picked_quantity: i64,
        packed: bool,
        note: Option<String>,
    ) -> Result<PackingState, AppError> {
        let at = Utc::now();
        self.store.update_packing(order_id, &|state: &PackingState| {
            update_item_progress(state, item_id, picked_quantity, packed, note.clone(), at)
        })
    }

    pub fn get(&self, order_id: Uuid) -> Option<PackingState> {
        self.store.get_packing(order_id)
    }

    /// Active state first, then the archived copy kept for audit.
    pub fn find(&self, order_id: Uuid) -> Option<PackingState> {
        self.store
            .get_packing(order_id)
            .or_else(|| self.store.get_archived_packing(order_id))
    }

    pub fn archive(&self, order_id: Uuid) -> Option<PackingState> {
        self.store.archive_packing(order_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::models::order::tests::placed;
    use crate::models::order::FulfillmentStyle;
    use crate::store::MemoryStore;

    fn state() -> PackingState {
        new_packing_state(&placed(FulfillmentStyle::Staffed), Utc::now())
    }

    #[test]
    fn new_state_tracks_every_line_item() {
        let state = state();

        assert_eq!(state.item_progress.len(), 2);
        assert_eq!(state.item_progress["A"].ordered_quantity, 2);
        assert_eq!(state.item_progress["B"].ordered_quantity, 1);
        assert!(!is_fully_packed(&state));
    }

    #[test]
    fn out_of_range_quantity_is_rejected_and_state_unchanged() {
        let state = state();
        let before = state.clone();

        for bad in [-1, 3] {
            let err = update_item_progress(&state, "A", bad, false, None, Utc::now()).unwrap_err();
            assert!(matches!(err, AppError::QuantityOutOfRange { .. }));
        }
        assert_eq!(state, before);
    }

    #[test]
    fn bounds_are_inclusive() {
        let state = state();

        let zero = update_item_progress(&state, "A", 0, false, None, Utc::now()).unwrap();
        assert_eq!(zero.item_progress["A"].picked_quantity, 0);

        let full = update_item_progress(&state, "A", 2, true, None, Utc::now()).unwrap();
        assert_eq!(full.item_progress["A"].picked_quantity, 2);
        assert!(full.item_progress["A"].packed);
    }

    #[test]
    fn unknown_item_is_reported() {
        let err = update_item_progress(&state(), "Z", 1, true, None, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::UnknownItem(id) if id == "Z"));
    }

    #[test]
    fn fully_packed_once_every_item_is_packed() {
        let state = state();
        let one = update_item_progress(&state, "A", 2, true, None, Utc::now()).unwrap();
        assert!(!is_fully_packed(&one));

        let both = update_item_progress(&one, "B", 1, true, None, Utc::now()).unwrap();
        assert!(is_fully_packed(&both));
        assert!(shortfall_note(&both).is_none());
    }

    #[test]
    fn shortfall_note_lists_missing_items() {
        let state = state();
        let partial = update_item_progress(&state, "A", 1, true, None, Utc::now()).unwrap();

        let note = shortfall_note(&partial).unwrap();
        assert!(note.contains("A 1/2 packed"));
        assert!(note.contains("B 0/1 unpacked"));
    }

    #[test]
    fn begin_packing_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let tracker = PackingTracker::new(store);
        let order = placed(FulfillmentStyle::Staffed);

        let first = tracker.begin_packing(&order);
        tracker
            .update_item_progress(order.id, "A", 1, false, Some("bag 1".to_string()))
            .unwrap();
        let progressed = tracker.get(order.id).unwrap();
        let second = tracker.begin_packing(&order);

        assert_eq!(second, progressed);
        assert_eq!(second.item_progress.len(), first.item_progress.len());
        assert_eq!(second.item_progress["A"].picked_quantity, 1);
    }
}
