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

//! The open-addressed key → slot index.
//!
//! The index never owns key bytes: entries carry a cached hash and the slot
//! index, and every lookup is confirmed against the caller-supplied `keys`
//! array (the cache's own `Inner::keys`). This keeps the index free of a
//! second copy of every key and, more importantly, free of a self-referential
//! pointer back into the slot array.

use std::collections::TryReserveError;

use refbit_cache_common::hash::{fnv1a_bytes_seeded, next_prime, FNV_OFFSET_BASIS};

/// The rehash trigger threshold as a fraction `numerator / denominator`,
/// checked against `(used+1) * denominator >= H * numerator`. The spec's own
/// 0.7 max load factor is `{ numerator: 7, denominator: 10 }`, the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadFactor {
    pub numerator: u64,
    pub denominator: u64,
}

impl Default for LoadFactor {
    fn default() -> Self {
        Self {
            numerator: 7,
            denominator: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Empty,
    Occupied,
    Tombstone,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    state: EntryState,
    hash: u32,
    slot: usize,
}

impl Entry {
    const fn empty() -> Self {
        Self {
            state: EntryState::Empty,
            hash: 0,
            slot: 0,
        }
    }
}

/// An open-addressed table mapping key bytes to slot indices.
#[derive(Debug)]
pub struct KeyIndex {
    table: Vec<Entry>,
    occupied: usize,
    tombstones: usize,
    hash_seed: u32,
    load_factor: LoadFactor,
}

impl KeyIndex {
    /// Builds an index sized `H ≥ next_prime(2·capacity)` per Section 3,
    /// hashing with `hash_seed` and growing once occupancy crosses
    /// `load_factor`.
    pub fn try_with_capacity(capacity: usize, hash_seed: u32, load_factor: LoadFactor) -> Result<Self, TryReserveError> {
        let buckets = Self::bucket_count_for(capacity);
        let mut table = Vec::new();
        table.try_reserve_exact(buckets)?;
        table.resize(buckets, Entry::empty());
        Ok(Self {
            table,
            occupied: 0,
            tombstones: 0,
            hash_seed,
            load_factor,
        })
    }

    /// `next_prime(2 * capacity)` — Section 3's initial index sizing rule
    /// (e.g. capacity 4 → 11), independent of the configured load factor,
    /// which only governs when a later rehash fires.
    fn bucket_count_for(capacity: usize) -> usize {
        next_prime((capacity.max(1) as u64) * 2) as usize
    }

    fn hash(&self, key: &[u8]) -> u32 {
        fnv1a_bytes_seeded(key, self.hash_seed)
    }

    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Finds the slot holding `key`, confirming candidates against `keys`.
    pub fn lookup(&self, key: &[u8], keys: &[Option<Box<[u8]>>]) -> Option<usize> {
        let hash = self.hash(key);
        let len = self.table.len();
        let mut i = (hash as usize) % len;
        let mut probes = 0;
        while probes < len {
            let entry = &self.table[i];
            match entry.state {
                EntryState::Empty => return None,
                EntryState::Occupied => {
                    if entry.hash == hash && keys[entry.slot].as_deref() == Some(key) {
                        return Some(entry.slot);
                    }
                }
                EntryState::Tombstone => {}
            }
            i = (i + 1) % len;
            probes += 1;
        }
        None
    }

    /// Inserts `key` → `slot`. The caller must have already confirmed `key`
    /// is not already present (via [`lookup`](Self::lookup)).
    ///
    /// Returns `false` if the table is completely full of non-empty entries,
    /// which should not happen as long as callers grow before this point.
    pub fn insert(&mut self, key: &[u8], slot: usize) -> bool {
        let hash = self.hash(key);
        let len = self.table.len();
        let mut i = (hash as usize) % len;
        let mut first_tombstone = None;
        let mut probes = 0;
        while probes < len {
            match self.table[i].state {
                EntryState::Empty => {
                    let target = first_tombstone.unwrap_or(i);
                    if first_tombstone.is_some() {
                        self.tombstones -= 1;
                    }
                    self.table[target] = Entry {
                        state: EntryState::Occupied,
                        hash,
                        slot,
                    };
                    self.occupied += 1;
                    return true;
                }
                EntryState::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(i);
                    }
                }
                EntryState::Occupied => {}
            }
            i = (i + 1) % len;
            probes += 1;
        }
        if let Some(target) = first_tombstone {
            self.tombstones -= 1;
            self.table[target] = Entry {
                state: EntryState::Occupied,
                hash,
                slot,
            };
            self.occupied += 1;
            return true;
        }
        false
    }

    /// Removes `key`, if present. Returns the slot it mapped to.
    pub fn erase(&mut self, key: &[u8], keys: &[Option<Box<[u8]>>]) -> Option<usize> {
        let hash = self.hash(key);
        let len = self.table.len();
        let mut i = (hash as usize) % len;
        let mut probes = 0;
        while probes < len {
            let entry = self.table[i];
            match entry.state {
                EntryState::Empty => return None,
                EntryState::Occupied => {
                    if entry.hash == hash && keys[entry.slot].as_deref() == Some(key) {
                        self.table[i].state = EntryState::Tombstone;
                        self.occupied -= 1;
                        self.tombstones += 1;
                        return Some(entry.slot);
                    }
                }
                EntryState::Tombstone => {}
            }
            i = (i + 1) % len;
            probes += 1;
        }
        None
    }

    /// Whether a rehash should run before the next insert: Section 4.2's
    /// literal `(used+1)·10 ≥ H·7` (generalized to the configured
    /// `load_factor`), counting only OCCUPIED entries as `used` — tombstones
    /// don't count against the cache's own load factor, matching Section
    /// 3's "An occupancy counter `used` counts OCCUPIED entries only."
    pub fn should_grow(&self) -> bool {
        (self.occupied as u64 + 1) * self.load_factor.denominator >= (self.table.len() as u64) * self.load_factor.numerator
    }

    /// Rebuilds the table at (at least) double its current bucket count,
    /// re-probing every live `(hash, slot)` pair. Tombstones are dropped for
    /// free as part of the rebuild.
    ///
    /// Returns `false`, leaving `self` unchanged, if the larger table could
    /// not be allocated.
    pub fn rehash(&mut self) -> bool {
        let new_buckets = next_prime((self.table.len() as u64) * 2);
        let mut new_table = Vec::new();
        if new_table.try_reserve_exact(new_buckets as usize).is_err() {
            return false;
        }
        new_table.resize(new_buckets as usize, Entry::empty());

        for entry in self.table.iter().filter(|e| e.state == EntryState::Occupied) {
            let len = new_table.len();
            let mut i = (entry.hash as usize) % len;
            loop {
                if new_table[i].state == EntryState::Empty {
                    new_table[i] = Entry {
                        state: EntryState::Occupied,
                        hash: entry.hash,
                        slot: entry.slot,
                    };
                    break;
                }
                i = (i + 1) % len;
            }
        }

        self.table = new_table;
        self.tombstones = 0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_with(entries: &[(usize, &[u8])]) -> Vec<Option<Box<[u8]>>> {
        let max = entries.iter().map(|(slot, _)| *slot).max().unwrap_or(0);
        let mut keys = vec![None; max + 1];
        for (slot, key) in entries {
            keys[*slot] = Some((*key).into());
        }
        keys
    }

    fn index_with(capacity: usize) -> KeyIndex {
        KeyIndex::try_with_capacity(capacity, FNV_OFFSET_BASIS, LoadFactor::default()).unwrap()
    }

    #[test_log::test]
    fn test_initial_sizing_matches_next_prime_2c() {
        // Section 3's worked example: C=4 -> H=next_prime(8)=11.
        assert_eq!(KeyIndex::bucket_count_for(4), 11);
    }

    #[test_log::test]
    fn test_should_grow_fires_at_07_load_factor() {
        // H = next_prime(8) = 11. (used+1)*10 >= 11*7=77 once used >= 6.7,
        // i.e. at used=7 (7+1=8, 80>=77) but not at used=6 (6+1=7,70<77).
        let mut index = index_with(4);
        for i in 0..6u32 {
            index.insert(&i.to_be_bytes(), i as usize);
        }
        assert!(!index.should_grow(), "used=6 of H=11 must stay under 0.7");
        index.insert(&6u32.to_be_bytes(), 6);
        assert!(index.should_grow(), "used=7 of H=11 must cross 0.7");
    }

    #[test_log::test]
    fn test_insert_and_lookup() {
        let mut index = index_with(8);
        let keys = keys_with(&[(0, b"a"), (1, b"b"), (2, b"c")]);
        assert!(index.insert(b"a", 0));
        assert!(index.insert(b"b", 1));
        assert!(index.insert(b"c", 2));
        assert_eq!(index.lookup(b"a", &keys), Some(0));
        assert_eq!(index.lookup(b"b", &keys), Some(1));
        assert_eq!(index.lookup(b"c", &keys), Some(2));
        assert_eq!(index.lookup(b"missing", &keys), None);
    }

    #[test_log::test]
    fn test_erase_then_lookup_through_tombstone() {
        let mut index = index_with(8);
        let keys = keys_with(&[(0, b"a"), (1, b"b")]);
        index.insert(b"a", 0);
        index.insert(b"b", 1);
        assert_eq!(index.erase(b"a", &keys), Some(0));
        assert_eq!(index.lookup(b"a", &keys), None);
        assert_eq!(index.lookup(b"b", &keys), Some(1));
    }

    #[test_log::test]
    fn test_rehash_preserves_lookups() {
        let mut index = index_with(4);
        let entries: Vec<(usize, Vec<u8>)> = (0..6).map(|i| (i, format!("key-{i}").into_bytes())).collect();
        let boxed: Vec<(usize, &[u8])> = entries.iter().map(|(s, k)| (*s, k.as_slice())).collect();
        let keys = keys_with(&boxed);
        for (slot, key) in &boxed {
            while index.should_grow() {
                assert!(index.rehash());
            }
            index.insert(key, *slot);
        }
        for (slot, key) in &boxed {
            assert_eq!(index.lookup(key, &keys), Some(*slot));
        }
    }

    #[test_log::test]
    fn test_reinsert_after_erase_reuses_tombstone() {
        let mut index = index_with(8);
        let keys = keys_with(&[(0, b"a")]);
        index.insert(b"a", 0);
        index.erase(b"a", &keys);
        assert_eq!(index.len(), 0);
        let keys2 = keys_with(&[(5, b"a")]);
        assert!(index.insert(b"a", 5));
        assert_eq!(index.lookup(b"a", &keys2), Some(5));
    }
}
