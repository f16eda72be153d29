/// Merging change-feed notifications into the pool and grid
///
/// Every handler keys off the selfie id and checks current membership
/// before acting, so replays and reordered deliveries are harmless:
/// an insert for a known id is an upsert, and an update or delete for an
/// unknown id only withdraws what is actually there.
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use super::pool::Upsert;
use super::RotationEngine;
use crate::feed::FeedNotification;
use crate::state::data::{SelfieId, SelfieRecord};

/// What a notification did to the wall
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// A newly eligible selfie went on screen, possibly evicting another
    Placed {
        slot: usize,
        evicted: Option<SelfieId>,
    },
    /// Metadata of a known selfie changed; `slot` is set when it is showing
    Refreshed { slot: Option<usize> },
    /// A selfie left the pool; its slot (if any) was cleared and maybe refilled
    Removed {
        slot: Option<usize>,
        backfilled: Option<SelfieId>,
    },
    /// Nothing to do (unknown id, ineligible record that was never pooled)
    Ignored,
}

impl<R: Rng> RotationEngine<R> {
    /// Apply one change-feed notification
    pub fn apply(&mut self, notification: FeedNotification) -> Reconciled {
        match notification {
            FeedNotification::Insert(record) => self.apply_insert(record),
            FeedNotification::Update(record) => self.apply_update(record),
            FeedNotification::Delete { id } => self.apply_delete(id),
        }
    }

    pub fn apply_insert(&mut self, record: SelfieRecord) -> Reconciled {
        let outcome = self.upsert(record);
        self.debug_check();
        outcome
    }

    /// Status transitions and metadata edits. A record that became approved
    /// is handled exactly like an insert.
    pub fn apply_update(&mut self, record: SelfieRecord) -> Reconciled {
        let outcome = self.upsert(record);
        self.debug_check();
        outcome
    }

    pub fn apply_delete(&mut self, id: SelfieId) -> Reconciled {
        let outcome = self.withdraw(id);
        self.debug_check();
        outcome
    }

    fn upsert(&mut self, record: SelfieRecord) -> Reconciled {
        let id = record.id;
        if !record.is_eligible() {
            return self.withdraw(id);
        }

        match self.pool.upsert(record) {
            Upsert::Replaced => {
                let slot = self.grid.position(&id);
                if let Some(slot) = slot {
                    self.grid.mark_changed(slot);
                }
                trace!(%id, ?slot, "refreshed selfie metadata");
                Reconciled::Refreshed { slot }
            }
            Upsert::Added => self.place_new(id),
        }
    }

    /// Put a freshly pooled selfie on screen right away. An empty slot is
    /// used when there is one; otherwise a random occupied slot is evicted
    /// unconditionally, since new content must never wait for a free slot.
    fn place_new(&mut self, id: SelfieId) -> Reconciled {
        let slot = match self.grid.first_empty() {
            Some(slot) => slot,
            None => {
                let occupied: Vec<usize> = self.grid.occupied().collect();
                match occupied.choose(&mut self.rng) {
                    Some(&slot) => slot,
                    None => return Reconciled::Ignored,
                }
            }
        };

        let evicted = self.grid.place(slot, id);
        debug!(%id, slot, ?evicted, pool = self.pool.len(), "placed new selfie");
        Reconciled::Placed { slot, evicted }
    }

    /// Take a selfie out of the pool and off the screen
    fn withdraw(&mut self, id: SelfieId) -> Reconciled {
        if self.pool.remove(&id).is_none() {
            debug!(%id, "no-op notification for selfie not in pool");
            return Reconciled::Ignored;
        }

        let slot = self.grid.clear_id(&id);
        let backfilled = slot.and_then(|slot| self.backfill(slot));
        debug!(%id, ?slot, ?backfilled, pool = self.pool.len(), "withdrew selfie");
        Reconciled::Removed { slot, backfilled }
    }

    /// Refill an emptied slot with a pool member that is not on screen
    fn backfill(&mut self, slot: usize) -> Option<SelfieId> {
        let grid = &self.grid;
        let id = self.pool.next_unshown(|id| grid.contains(id))?;
        self.grid.place(slot, id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::state::data::SelfieStatus;

    #[test]
    fn test_insert_fills_lowest_empty_slot() {
        // [a,b,c,_] + insert d
        let mut engine = engine(2, 7);
        engine.seed([approved(1), approved(2), approved(3)]);
        let outcome = engine.apply(FeedNotification::Insert(approved(4)));
        assert_eq!(outcome, Reconciled::Placed { slot: 3, evicted: None });
        assert_eq!(ids(&engine), vec![Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn test_insert_into_full_grid_evicts_random_slot() {
        let mut engine = engine(2, 7);
        engine.seed((1..=4).map(approved));
        let outcome = engine.apply_insert(approved(5));

        let Reconciled::Placed { slot, evicted } = outcome else {
            panic!("expected placement, got {outcome:?}");
        };
        assert_eq!(engine.grid().get(slot), Some(SelfieId(5)));
        assert_eq!(evicted, Some(SelfieId(slot as i64 + 1)));
        // Evicted selfie stays in the pool for later rotation
        assert!(engine.pool().contains(&SelfieId(slot as i64 + 1)));
        assert_eq!(engine.pool().len(), 5);
    }

    #[test]
    fn test_insert_of_pending_is_ignored() {
        let mut engine = engine(2, 7);
        engine.seed([approved(1)]);
        let outcome = engine.apply_insert(with_status(2, SelfieStatus::Pending));
        assert_eq!(outcome, Reconciled::Ignored);
        assert_eq!(ids(&engine), vec![Some(1), None, None, None]);
    }

    #[test]
    fn test_insert_without_image_waits_for_update() {
        let mut engine = engine(2, 7);
        engine.seed(Vec::new());
        let mut unresolved = approved(1);
        unresolved.image_ref = None;
        assert_eq!(engine.apply_insert(unresolved), Reconciled::Ignored);
        assert!(engine.pool().is_empty());

        let outcome = engine.apply_update(approved(1));
        assert_eq!(outcome, Reconciled::Placed { slot: 0, evicted: None });
    }

    #[test]
    fn test_duplicate_insert_is_upsert() {
        let mut engine = engine(2, 7);
        engine.seed([approved(1), approved(2)]);
        engine.apply_insert(approved(3));
        let once = ids(&engine);

        let outcome = engine.apply_insert(approved(3));
        assert_eq!(outcome, Reconciled::Refreshed { slot: Some(2) });
        assert_eq!(ids(&engine), once);
        assert_eq!(engine.pool().len(), 3);
    }

    #[test]
    fn test_metadata_update_changes_copy_in_place() {
        let mut engine = engine(2, 7);
        engine.seed([approved(1), approved(2)]);
        engine.take_changes();

        let mut renamed = approved(2);
        renamed.display_name = Some("Ben".into());
        assert_eq!(engine.apply_update(renamed), Reconciled::Refreshed { slot: Some(1) });
        assert_eq!(ids(&engine), vec![Some(1), Some(2), None, None]);
        assert_eq!(engine.frame().slots[1].as_ref().unwrap().display_name.as_deref(), Some("Ben"));
        assert_eq!(engine.take_changes(), vec![1]);
    }

    #[test]
    fn test_rejection_backfills_with_unshown_member() {
        // grid [a,b,c,d], pool [a,b,c,d,e], reject b -> e takes slot 1
        let mut engine = engine(2, 7);
        engine.seed((1..=5).map(approved));
        let outcome = engine.apply_update(with_status(2, SelfieStatus::Rejected));
        assert_eq!(
            outcome,
            Reconciled::Removed { slot: Some(1), backfilled: Some(SelfieId(5)) }
        );
        assert_eq!(ids(&engine), vec![Some(1), Some(5), Some(3), Some(4)]);
        assert!(!engine.pool().contains(&SelfieId(2)));
    }

    #[test]
    fn test_delete_of_last_member_leaves_slot_empty() {
        let mut engine = engine(2, 7);
        engine.seed([approved(1)]);
        let outcome = engine.apply(FeedNotification::Delete { id: SelfieId(1) });
        assert_eq!(outcome, Reconciled::Removed { slot: Some(0), backfilled: None });
        assert_eq!(ids(&engine), vec![None, None, None, None]);
        assert!(engine.pool().is_empty());
    }

    #[test]
    fn test_removal_of_unshown_member_leaves_grid() {
        let mut engine = engine(2, 7);
        engine.seed((1..=6).map(approved));
        let outcome = engine.apply_delete(SelfieId(6));
        assert_eq!(outcome, Reconciled::Removed { slot: None, backfilled: None });
        assert_eq!(ids(&engine), vec![Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn test_unknown_ids_are_no_ops() {
        let mut engine = engine(2, 7);
        engine.seed([approved(1)]);
        assert_eq!(engine.apply_delete(SelfieId(99)), Reconciled::Ignored);
        assert_eq!(
            engine.apply_update(with_status(99, SelfieStatus::Rejected)),
            Reconciled::Ignored
        );
        assert_eq!(ids(&engine), vec![Some(1), None, None, None]);
    }

    #[test]
    fn test_repeated_delete_is_idempotent() {
        let mut engine = engine(2, 7);
        engine.seed((1..=3).map(approved));
        engine.apply_delete(SelfieId(2));
        let once = ids(&engine);
        assert_eq!(engine.apply_delete(SelfieId(2)), Reconciled::Ignored);
        assert_eq!(ids(&engine), once);
    }

    #[test]
    fn test_rapid_deletes_clear_slots_without_backfill() {
        let mut engine = engine(2, 7);
        engine.seed((1..=4).map(approved));
        engine.apply_delete(SelfieId(1));
        engine.apply_delete(SelfieId(3));
        assert_eq!(ids(&engine), vec![None, Some(2), None, Some(4)]);

        // A larger pool fills the gaps again, lowest slot first
        engine.apply_insert(approved(5));
        assert_eq!(ids(&engine), vec![Some(5), Some(2), None, Some(4)]);
    }

    #[test]
    fn test_reapproval_returns_to_screen() {
        let mut engine = engine(2, 7);
        engine.seed([approved(1), approved(2)]);
        engine.apply_update(with_status(1, SelfieStatus::Pending));
        assert_eq!(ids(&engine), vec![None, Some(2), None, None]);

        engine.apply_update(approved(1));
        assert_eq!(ids(&engine), vec![Some(1), Some(2), None, None]);
    }
}
