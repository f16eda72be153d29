/// The slot grid: a fixed array of `columns²` screen positions
///
/// Slots hold ids, never records, so the pool stays the single owner of
/// selfie data. A reverse index makes "is this id on screen?" a map lookup.
use std::collections::HashMap;

use crate::state::data::SelfieId;

#[derive(Debug, Clone)]
pub struct SlotGrid {
    slots: Vec<Option<SelfieId>>,
    positions: HashMap<SelfieId, usize>,
    /// Slots whose content changed since the renderer last asked
    changed: Vec<bool>,
}

impl SlotGrid {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
            positions: HashMap::with_capacity(len),
            changed: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<SelfieId>] {
        &self.slots
    }

    pub fn get(&self, slot: usize) -> Option<SelfieId> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn contains(&self, id: &SelfieId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn position(&self, id: &SelfieId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Lowest-indexed empty slot
    pub fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, id)| id.map(|_| slot))
    }

    pub fn occupied_count(&self) -> usize {
        self.positions.len()
    }

    /// Put `id` into `slot`, returning whatever it replaced.
    ///
    /// `id` must not be showing in another slot.
    pub fn place(&mut self, slot: usize, id: SelfieId) -> Option<SelfieId> {
        debug_assert!(
            self.position(&id).map_or(true, |at| at == slot),
            "selfie {id} already shown in another slot"
        );

        let evicted = self.slots[slot].replace(id);
        if let Some(old) = evicted {
            self.positions.remove(&old);
        }
        self.positions.insert(id, slot);
        if evicted != Some(id) {
            self.changed[slot] = true;
        }
        evicted
    }

    /// Empty a slot, returning what it held
    pub fn clear(&mut self, slot: usize) -> Option<SelfieId> {
        let old = self.slots[slot].take()?;
        self.positions.remove(&old);
        self.changed[slot] = true;
        Some(old)
    }

    /// Take `id` off screen, returning the slot it was in
    pub fn clear_id(&mut self, id: &SelfieId) -> Option<usize> {
        let slot = self.position(id)?;
        self.clear(slot);
        Some(slot)
    }

    /// Flag a slot for redraw without changing its content
    pub fn mark_changed(&mut self, slot: usize) {
        if let Some(flag) = self.changed.get_mut(slot) {
            *flag = true;
        }
    }

    /// Indices of slots changed since the last call, resetting the flags
    pub fn take_changes(&mut self) -> Vec<usize> {
        let changes = self
            .changed
            .iter()
            .enumerate()
            .filter_map(|(slot, &changed)| changed.then_some(slot))
            .collect();
        self.changed.iter_mut().for_each(|flag| *flag = false);
        changes
    }
}
