/// The eligible pool: every approved, renderable selfie the display knows of
///
/// Members keep their insertion order, which is the order the swap cursor
/// walks. The cursor is stored unbounded and reduced modulo the current
/// pool size whenever it is read.
use indexmap::IndexMap;

use crate::state::data::{SelfieId, SelfieRecord};

#[derive(Debug, Clone, Default)]
pub struct EligiblePool {
    members: IndexMap<SelfieId, SelfieRecord>,
    cursor: usize,
}

/// What `upsert` did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Replaced,
}

impl EligiblePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &SelfieId) -> bool {
        self.members.contains_key(id)
    }

    pub fn get(&self, id: &SelfieId) -> Option<&SelfieRecord> {
        self.members.get(id)
    }

    /// Member at `index` in walk order
    pub fn get_index(&self, index: usize) -> Option<&SelfieRecord> {
        self.members.get_index(index).map(|(_, record)| record)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelfieRecord> {
        self.members.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = SelfieId> + '_ {
        self.members.keys().copied()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    /// Insert a new member at the end of the walk, or replace the stored
    /// copy of an existing one in place.
    pub fn upsert(&mut self, record: SelfieRecord) -> Upsert {
        debug_assert!(record.is_eligible(), "ineligible record {} offered to pool", record.id);
        match self.members.insert(record.id, record) {
            Some(_) => Upsert::Replaced,
            None => Upsert::Added,
        }
    }

    /// Remove a member, keeping the cursor on the same successor.
    pub fn remove(&mut self, id: &SelfieId) -> Option<SelfieRecord> {
        let len_before = self.members.len();
        let (index, _, record) = self.members.shift_remove_full(id)?;

        let position = self.cursor % len_before;
        self.cursor = if index < position { position - 1 } else { position };
        Some(record)
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.cursor = 0;
    }

    /// Draw `pool[cursor mod len]` and advance the cursor by one.
    pub fn next_candidate(&mut self) -> Option<SelfieId> {
        if self.members.is_empty() {
            return None;
        }
        let index = self.cursor % self.members.len();
        self.cursor = self.cursor.wrapping_add(1);
        self.members.get_index(index).map(|(id, _)| *id)
    }

    /// Walk at most one full lap from the cursor and return the first member
    /// for which `is_shown` is false. The cursor moves just past it; when
    /// every member is shown the cursor is left alone.
    pub fn next_unshown(&mut self, is_shown: impl Fn(&SelfieId) -> bool) -> Option<SelfieId> {
        let len = self.members.len();
        for step in 0..len {
            let index = self.cursor.wrapping_add(step) % len;
            let (id, _) = self.members.get_index(index)?;
            if !is_shown(id) {
                self.cursor = index + 1;
                return Some(*id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::SelfieStatus;

    fn record(id: i64) -> SelfieRecord {
        SelfieRecord {
            id: SelfieId(id),
            image_ref: Some(format!("{id}.jpg")),
            display_name: None,
            message: None,
            status: SelfieStatus::Approved,
            arrival_order: id as u64,
        }
    }

    fn pool_of(ids: &[i64]) -> EligiblePool {
        let mut pool = EligiblePool::new();
        for &id in ids {
            pool.upsert(record(id));
        }
        pool
    }

    #[test]
    fn test_upsert_is_idempotent_by_id() {
        let mut pool = EligiblePool::new();
        assert_eq!(pool.upsert(record(1)), Upsert::Added);

        let mut renamed = record(1);
        renamed.display_name = Some("Ana".into());
        assert_eq!(pool.upsert(renamed), Upsert::Replaced);

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(&SelfieId(1)).unwrap().display_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_candidate_walk_wraps_around() {
        let mut pool = pool_of(&[1, 2, 3]);
        let drawn: Vec<i64> = (0..5).map(|_| pool.next_candidate().unwrap().0).collect();
        assert_eq!(drawn, vec![1, 2, 3, 1, 2]);
        assert_eq!(pool.cursor(), 5);
    }

    #[test]
    fn test_empty_pool_has_no_candidate() {
        let mut pool = EligiblePool::new();
        assert_eq!(pool.next_candidate(), None);
        assert_eq!(pool.next_unshown(|_| false), None);
    }

    #[test]
    fn test_remove_before_cursor_keeps_successor() {
        let mut pool = pool_of(&[1, 2, 3, 4, 5]);
        pool.set_cursor(4);
        pool.remove(&SelfieId(2));
        // Member 5 was next and still is
        assert_eq!(pool.next_candidate(), Some(SelfieId(5)));
    }

    #[test]
    fn test_remove_after_cursor_leaves_position() {
        let mut pool = pool_of(&[1, 2, 3, 4]);
        pool.set_cursor(1);
        pool.remove(&SelfieId(4));
        assert_eq!(pool.next_candidate(), Some(SelfieId(2)));
        assert!(pool.remove(&SelfieId(4)).is_none());
    }

    #[test]
    fn test_next_unshown_skips_visible_members() {
        let mut pool = pool_of(&[1, 2, 3, 4]);
        pool.set_cursor(1);
        let shown = [SelfieId(2), SelfieId(3)];
        assert_eq!(pool.next_unshown(|id| shown.contains(id)), Some(SelfieId(4)));
        assert_eq!(pool.cursor(), 4);

        let all = [SelfieId(1), SelfieId(2), SelfieId(3), SelfieId(4)];
        assert_eq!(pool.next_unshown(|id| all.contains(id)), None);
        assert_eq!(pool.cursor(), 4);
    }
}
