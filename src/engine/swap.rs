/// The periodic swap tick
///
/// Each tick replaces one random slot with the next pool member in
/// circular order. The walk guarantees every member eventually comes up;
/// a candidate that is already on screen is skipped for this tick rather
/// than shown twice.
use rand::Rng;
use tracing::trace;

use super::RotationEngine;
use crate::state::data::SelfieId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The pool fits on screen, there is nothing to rotate in
    Idle,
    /// The drawn candidate is already showing; the cursor still advanced
    Skipped { candidate: SelfieId },
    Swapped {
        slot: usize,
        evicted: Option<SelfieId>,
        placed: SelfieId,
    },
}

impl<R: Rng> RotationEngine<R> {
    /// One firing of the swap timer
    pub fn tick(&mut self) -> SwapOutcome {
        let slots = self.grid.len();
        if self.pool.len() <= slots {
            return SwapOutcome::Idle;
        }

        let target = self.rng.gen_range(0..slots);
        let Some(candidate) = self.pool.next_candidate() else {
            return SwapOutcome::Idle;
        };

        if self.grid.contains(&candidate) {
            trace!(%candidate, "swap candidate already on screen, skipping tick");
            return SwapOutcome::Skipped { candidate };
        }

        let evicted = self.grid.place(target, candidate);
        trace!(slot = target, ?evicted, placed = %candidate, "swapped slot");
        self.debug_check();
        SwapOutcome::Swapped {
            slot: target,
            evicted,
            placed: candidate,
        }
    }
}
