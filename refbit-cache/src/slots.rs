//  Copyright 2024 Foyer Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! The clock sweep: picking which slot to retire next.
//!
//! This is deliberately generic over a small [`ClockSlot`] view rather than
//! [`crate::cell::Cell`] directly, so the sweep logic can be exercised with
//! plain test fixtures instead of heap-allocated cells.

/// The outcome of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Victim {
    /// An unpinned slot with its reference bit already clear: the normal
    /// case, evicted outright.
    Slot(usize),
    /// No unpinned slot was found anywhere in the ring; this pinned slot is
    /// retired anyway (the cell survives, detached, until its handles drop).
    ForcedPinned(usize),
}

/// What the clock sweep needs to know about a slot.
pub trait ClockSlot {
    fn is_occupied(&self) -> bool;
    fn refcount(&self) -> usize;
    fn ref_bit(&self) -> bool;
    fn clear_ref_bit(&mut self);
}

/// Sweeps from `*hand`, advancing it in place, and returns the slot to
/// retire.
///
/// Occupied, unpinned slots get one second chance: a set reference bit is
/// cleared and the hand moves on; the same slot evicts on the sweep's next
/// pass if nothing referenced it meanwhile. Pinned slots are never evicted
/// on the first two passes; if the whole ring is pinned or empty of
/// candidates, the first pinned slot encountered is retired anyway so
/// admission can always make progress.
///
/// Returns `None` only when there are no occupied slots to sweep.
pub fn find_victim<S: ClockSlot>(slots: &mut [S], hand: &mut usize) -> Option<Victim> {
    let capacity = slots.len();
    if capacity == 0 {
        return None;
    }

    let mut forced_candidate = None;
    let mut any_occupied = false;
    let max_steps = capacity * 2;

    for _ in 0..max_steps {
        let i = *hand;
        *hand = (*hand + 1) % capacity;

        if !slots[i].is_occupied() {
            continue;
        }
        any_occupied = true;

        if slots[i].refcount() == 0 && !slots[i].ref_bit() {
            return Some(Victim::Slot(i));
        }
        // Either pinned or it just had its second chance: clear the bit and
        // move on. A pinned slot's bit is cleared too — the pin, not the
        // bit, is what protects it.
        slots[i].clear_ref_bit();
        if slots[i].refcount() > 0 && forced_candidate.is_none() {
            forced_candidate = Some(i);
        }
    }

    if !any_occupied {
        return None;
    }
    forced_candidate.map(Victim::ForcedPinned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct TestSlot {
        occupied: bool,
        refcount: usize,
        ref_bit: bool,
    }

    impl ClockSlot for TestSlot {
        fn is_occupied(&self) -> bool {
            self.occupied
        }
        fn refcount(&self) -> usize {
            self.refcount
        }
        fn ref_bit(&self) -> bool {
            self.ref_bit
        }
        fn clear_ref_bit(&mut self) {
            self.ref_bit = false;
        }
    }

    fn slot(occupied: bool, refcount: usize, ref_bit: bool) -> TestSlot {
        TestSlot {
            occupied,
            refcount,
            ref_bit,
        }
    }

    #[test_log::test]
    fn test_empty_ring_returns_none() {
        let mut slots: Vec<TestSlot> = vec![slot(false, 0, false); 4];
        let mut hand = 0;
        assert_eq!(find_victim(&mut slots, &mut hand), None);
    }

    #[test_log::test]
    fn test_picks_clear_bit_slot_immediately() {
        let mut slots = vec![slot(true, 0, false), slot(true, 0, true)];
        let mut hand = 0;
        assert_eq!(find_victim(&mut slots, &mut hand), Some(Victim::Slot(0)));
    }

    #[test_log::test]
    fn test_gives_second_chance_before_evicting() {
        let mut slots = vec![slot(true, 0, true)];
        let mut hand = 0;
        // First pass clears the bit instead of evicting.
        assert_eq!(find_victim(&mut slots, &mut hand), Some(Victim::Slot(0)));
        assert!(!slots[0].ref_bit);
    }

    #[test_log::test]
    fn test_skips_pinned_slots_when_unpinned_available() {
        let mut slots = vec![slot(true, 1, false), slot(true, 0, false)];
        let mut hand = 0;
        assert_eq!(find_victim(&mut slots, &mut hand), Some(Victim::Slot(1)));
    }

    #[test_log::test]
    fn test_forces_pinned_eviction_when_everything_pinned() {
        let mut slots = vec![slot(true, 2, true), slot(true, 1, false)];
        let mut hand = 0;
        assert_eq!(find_victim(&mut slots, &mut hand), Some(Victim::ForcedPinned(0)));
    }

    #[test_log::test]
    fn test_hand_advances_across_calls() {
        let mut slots = vec![slot(true, 0, false), slot(true, 0, false), slot(true, 0, false)];
        let mut hand = 0;
        assert_eq!(find_victim(&mut slots, &mut hand), Some(Victim::Slot(0)));
        assert_eq!(find_victim(&mut slots, &mut hand), Some(Victim::Slot(1)));
        assert_eq!(find_victim(&mut slots, &mut hand), Some(Victim::Slot(2)));
    }
}
