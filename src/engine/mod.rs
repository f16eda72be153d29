/// Display rotation engine
///
/// This module decides what every slot of the wall shows:
/// - `pool.rs` - the eligible pool and its circular walk cursor
/// - `grid.rs` - the fixed slot array and its reverse index
/// - `reconcile.rs` - applying insert/update/delete notifications
/// - `swap.rs` - the periodic swap tick
///
/// The engine is a plain state machine. It never awaits, never locks and
/// never fails: every transition runs to completion on `&mut self`, so a
/// renderer reading between calls only ever sees a reconciled state.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;

use crate::state::data::{SelfieId, SelfieRecord};
use crate::state::display::MAX_GRID_COLUMNS;

pub mod grid;
pub mod pool;
mod reconcile;
mod swap;

pub use grid::SlotGrid;
pub use pool::EligiblePool;
pub use reconcile::Reconciled;
pub use swap::SwapOutcome;

/// What the renderer needs to draw one occupied slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub id: SelfieId,
    pub image_ref: String,
    pub display_name: Option<String>,
    pub message: Option<String>,
}

impl SlotView {
    fn from_record(record: &SelfieRecord) -> Option<Self> {
        Some(Self {
            id: record.id,
            image_ref: record.image_ref.clone()?,
            display_name: record.display_name.clone(),
            message: record.message.clone(),
        })
    }
}

/// The full wall at one instant: `columns²` entries, `None` for empty slots
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Frame {
    pub columns: usize,
    pub slots: Vec<Option<SlotView>>,
}

impl Frame {
    pub fn ids(&self) -> Vec<Option<SelfieId>> {
        self.slots.iter().map(|s| s.as_ref().map(|v| v.id)).collect()
    }

    pub fn is_blank(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// A broken engine invariant. These are bugs, never data problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("grid has {actual} slots, expected {expected}")]
    GridSize { expected: usize, actual: usize },

    #[error("selfie {id} shown in slots {first} and {second}")]
    Duplicate { id: SelfieId, first: usize, second: usize },

    #[error("slot {slot} shows selfie {id}, which is not in the pool")]
    NotInPool { slot: usize, id: SelfieId },

    #[error("pool member {id} is not eligible for display")]
    Ineligible { id: SelfieId },

    #[error("slot index disagrees with slot contents for selfie {id}")]
    IndexMismatch { id: SelfieId },

    #[error("slot index tracks {indexed} selfies but {shown} are shown")]
    StaleIndex { shown: usize, indexed: usize },
}

/// Owns the eligible pool and slot grid of one display
pub struct RotationEngine<R = StdRng> {
    columns: usize,
    pool: EligiblePool,
    grid: SlotGrid,
    rng: R,
}

impl RotationEngine<StdRng> {
    /// Engine with an entropy-seeded random source
    pub fn new(columns: usize) -> Self {
        Self::with_rng(columns, StdRng::from_entropy())
    }
}

impl<R: Rng> RotationEngine<R> {
    /// Engine with a caller-supplied random source (seeded in tests)
    pub fn with_rng(columns: usize, rng: R) -> Self {
        let columns = clamp_columns(columns);
        Self {
            columns,
            pool: EligiblePool::new(),
            grid: SlotGrid::new(columns * columns),
            rng,
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn slot_count(&self) -> usize {
        self.grid.len()
    }

    pub fn pool(&self) -> &EligiblePool {
        &self.pool
    }

    pub fn grid(&self) -> &SlotGrid {
        &self.grid
    }

    /// Replace all state with `snapshot` (in its given order) and fill the
    /// grid from the front of the pool.
    pub fn seed(&mut self, snapshot: impl IntoIterator<Item = SelfieRecord>) {
        self.pool.clear();
        for record in snapshot.into_iter().filter(SelfieRecord::is_eligible) {
            self.pool.upsert(record);
        }
        self.fill_from_pool();
        info!(
            pool = self.pool.len(),
            slots = self.grid.len(),
            "seeded display"
        );
    }

    /// Change the grid side length. A resize is a full reseed from the
    /// current pool.
    pub fn resize(&mut self, columns: usize) {
        let columns = clamp_columns(columns);
        if columns == self.columns {
            return;
        }
        self.columns = columns;
        self.fill_from_pool();
        info!(columns, slots = self.grid.len(), "resized display grid");
    }

    fn fill_from_pool(&mut self) {
        self.grid = SlotGrid::new(self.columns * self.columns);
        let shown = self.grid.len().min(self.pool.len());
        for slot in 0..shown {
            if let Some(record) = self.pool.get_index(slot) {
                self.grid.place(slot, record.id);
            }
        }
        self.pool.set_cursor(shown);
        self.debug_check();
    }

    /// Snapshot of every slot for the renderer
    pub fn frame(&self) -> Frame {
        let slots = self
            .grid
            .slots()
            .iter()
            .map(|slot| {
                slot.and_then(|id| self.pool.get(&id))
                    .and_then(SlotView::from_record)
            })
            .collect();
        Frame {
            columns: self.columns,
            slots,
        }
    }

    /// Slots that changed since the previous call (for cross-fades)
    pub fn take_changes(&mut self) -> Vec<usize> {
        self.grid.take_changes()
    }

    /// Verify the visibility invariants of the current state
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let expected = self.columns * self.columns;
        if self.grid.len() != expected {
            return Err(InvariantViolation::GridSize {
                expected,
                actual: self.grid.len(),
            });
        }

        for record in self.pool.iter() {
            if !record.is_eligible() {
                return Err(InvariantViolation::Ineligible { id: record.id });
            }
        }

        let mut seen: HashSet<SelfieId> = HashSet::new();
        for (slot, id) in self.grid.slots().iter().enumerate() {
            let Some(id) = *id else { continue };
            if !seen.insert(id) {
                let first = self.grid.slots().iter().position(|s| *s == Some(id)).unwrap_or(slot);
                return Err(InvariantViolation::Duplicate { id, first, second: slot });
            }
            if !self.pool.contains(&id) {
                return Err(InvariantViolation::NotInPool { slot, id });
            }
            if self.grid.position(&id) != Some(slot) {
                return Err(InvariantViolation::IndexMismatch { id });
            }
        }
        if seen.len() != self.grid.occupied_count() {
            return Err(InvariantViolation::StaleIndex {
                shown: seen.len(),
                indexed: self.grid.occupied_count(),
            });
        }
        Ok(())
    }

    /// Panic on a broken invariant in debug builds
    fn debug_check(&self) {
        #[cfg(debug_assertions)]
        if let Err(violation) = self.check_invariants() {
            panic!("rotation invariant violated: {violation}");
        }
    }
}

/// Keep a grid side length within what a display supports
fn clamp_columns(columns: usize) -> usize {
    columns.clamp(1, MAX_GRID_COLUMNS as usize)
}
