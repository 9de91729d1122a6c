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

//! The cache facade: ties the slot arrays, the key index, and the clock
//! sweep together behind a single mutex.

use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use refbit_cache_common::metrics::MetricsSnapshot;
use refbit_cache_common::{CacheCreateError, CacheEventListener, DefaultCacheEventListener, Metrics};

use crate::cell::{free_cell, try_alloc_cell, Cell, Home};
use crate::config::CacheConfig;
use crate::index::KeyIndex;
use crate::slots::{find_victim, ClockSlot, Victim};

impl ClockSlot for Option<NonNull<Cell>> {
    fn is_occupied(&self) -> bool {
        self.is_some()
    }

    fn refcount(&self) -> usize {
        match self {
            // SAFETY: every live entry in `cells` points at a cell this
            // `Inner` allocated and has not yet freed; the mutex is held for
            // the duration of any call into `find_victim`.
            Some(ptr) => unsafe { ptr.as_ref().refcount },
            None => 0,
        }
    }

    fn ref_bit(&self) -> bool {
        match self {
            Some(ptr) => unsafe { ptr.as_ref().ref_bit },
            None => false,
        }
    }

    fn clear_ref_bit(&mut self) {
        if let Some(ptr) = *self {
            // SAFETY: see `refcount` above.
            unsafe { (*ptr.as_ptr()).ref_bit = false };
        }
    }
}

struct Inner<L> {
    keys: Vec<Option<Box<[u8]>>>,
    cells: Vec<Option<NonNull<Cell>>>,
    hand: usize,
    capacity: usize,
    occupied: usize,
    index: KeyIndex,
    listener: L,
    destroyed: bool,
}

// SAFETY: `Inner` is only ever reached through a `Mutex`, so its raw
// `NonNull<Cell>` fields are never touched by more than one thread at a
// time. `Cell`'s payload (`Bytes`) is itself `Send`.
unsafe impl<L: Send> Send for Inner<L> {}

impl<L: CacheEventListener> Inner<L> {
    fn find_free_slot(&self) -> Option<usize> {
        if self.occupied >= self.capacity {
            return None;
        }
        self.cells.iter().position(|c| c.is_none())
    }

    /// Takes the key and cell pointer out of slot `slot`, if any, updating
    /// `occupied`. Pure bookkeeping shared by every way a slot empties out.
    fn take_slot(&mut self, slot: usize) -> (Option<Box<[u8]>>, Option<NonNull<Cell>>) {
        let key = self.keys[slot].take();
        let ptr = self.cells[slot].take();
        if ptr.is_some() {
            self.occupied -= 1;
        }
        (key, ptr)
    }

    /// Frees `ptr`'s cell if nothing still references it, or marks it
    /// detached so it survives its outstanding handles. Returns `true` if
    /// the cell was freed immediately.
    fn release_or_detach(&mut self, ptr: NonNull<Cell>) -> bool {
        // SAFETY: `ptr` came from `self.cells` and the mutex is held.
        let refcount = unsafe { ptr.as_ref().refcount };
        if refcount == 0 {
            // SAFETY: refcount zero means no `CacheHandle` can reach this
            // cell; it is safe to free outright.
            let value = unsafe { ptr.as_ref().data.clone() };
            unsafe { free_cell(ptr) };
            self.listener.on_release(&value);
            true
        } else {
            // SAFETY: `ptr` stays valid; outstanding handles keep pointing
            // at it until they release it themselves.
            unsafe { (*ptr.as_ptr()).home = Home::Detached };
            false
        }
    }

    /// Vacates `slot` to make room for a key being re-admitted in its place.
    fn retire_existing(&mut self, slot: usize, metrics: &Metrics) {
        let (key, ptr) = self.take_slot(slot);
        if let Some(key) = &key {
            self.listener.on_evict(key);
        }
        if let Some(ptr) = ptr {
            if self.release_or_detach(ptr) {
                metrics.record_evict();
            } else {
                metrics.record_evict_detached();
            }
        }
    }

    /// Vacates an unpinned slot the clock sweep picked as a victim.
    fn evict_idle(&mut self, slot: usize, metrics: &Metrics) {
        let (key, ptr) = self.take_slot(slot);
        if let Some(key) = &key {
            self.listener.on_evict(key);
        }
        if let Some(ptr) = ptr {
            let freed = self.release_or_detach(ptr);
            debug_assert!(freed, "find_victim only returns Victim::Slot for an unpinned cell");
            metrics.record_evict();
        }
    }

    /// Vacates a still-pinned slot because the sweep found no unpinned
    /// candidate anywhere in the ring. The cell survives, detached, until
    /// its outstanding handles release it.
    fn evict_forced_pinned(&mut self, slot: usize, metrics: &Metrics) {
        let (key, ptr) = self.take_slot(slot);
        if let Some(key) = &key {
            self.listener.on_evict(key);
        }
        if let Some(ptr) = ptr {
            self.release_or_detach(ptr);
        }
        tracing::warn!(slot, "forced eviction of a pinned slot to admit a new entry");
        metrics.record_evict_forced_pinned();
    }
}

impl<L> Drop for Inner<L> {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        // A `CacheHandle` holds an `Arc<CacheState<L>>`, so `Inner` cannot
        // drop while one is outstanding; every remaining cell therefore has
        // refcount zero and can be freed unconditionally.
        for slot in self.cells.iter_mut() {
            if let Some(ptr) = slot.take() {
                // SAFETY: see above; no handle references this cell.
                unsafe { free_cell(ptr) };
            }
        }
    }
}

struct CacheState<L> {
    inner: Mutex<Inner<L>>,
    metrics: Metrics,
}

impl<L: CacheEventListener> CacheState<L> {
    fn release(&self, ptr: NonNull<Cell>) {
        let mut guard = self.inner.lock();
        if guard.destroyed {
            return;
        }
        // SAFETY: mutex held, `ptr` came from a `CacheHandle` this state
        // issued and has not been freed (checked via `destroyed` above).
        unsafe {
            let cell = ptr.as_ptr();
            (*cell).refcount -= 1;
            if (*cell).refcount == 0 && (*cell).home == Home::Detached {
                let value = (*cell).data.clone();
                free_cell(ptr);
                guard.listener.on_release(&value);
            }
        }
    }
}

/// A fixed-capacity, thread-safe associative cache with
/// clock-with-reference-bit eviction and reference-count pinning.
///
/// Cloning a `Cache` is cheap and shares the same underlying slots; the
/// cache itself is dropped once every clone and every outstanding
/// [`CacheHandle`] has gone away.
pub struct Cache<L = DefaultCacheEventListener> {
    state: Arc<CacheState<L>>,
}

impl<L> Clone for Cache<L> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<L: CacheEventListener> Cache<L> {
    /// Builds a cache per `config`.
    ///
    /// Fails only if `capacity` is zero or the host allocator refuses the
    /// slot arrays or key index table; every other allocation refusal
    /// during the cache's lifetime (admission, rehashing) is non-fatal.
    pub fn try_new(config: CacheConfig<L>) -> Result<Self, CacheCreateError> {
        let capacity = config.capacity;
        if capacity == 0 {
            return Err(CacheCreateError::ZeroCapacity);
        }

        let mut keys = Vec::new();
        keys.try_reserve_exact(capacity)
            .map_err(|source| CacheCreateError::OutOfMemory { capacity, source })?;
        keys.resize(capacity, None);

        let mut cells = Vec::new();
        cells
            .try_reserve_exact(capacity)
            .map_err(|source| CacheCreateError::OutOfMemory { capacity, source })?;
        cells.resize(capacity, None);

        let index = KeyIndex::try_with_capacity(capacity, config.hash_seed, config.load_factor)
            .map_err(|source| CacheCreateError::OutOfMemory { capacity, source })?;

        let inner = Inner {
            keys,
            cells,
            hand: 0,
            capacity,
            occupied: 0,
            index,
            listener: config.event_listener,
            destroyed: false,
        };

        tracing::debug!(capacity, "refbit-cache: created");

        Ok(Self {
            state: Arc::new(CacheState {
                inner: Mutex::new(inner),
                metrics: Metrics::default(),
            }),
        })
    }

    /// Number of slots the cache was built with.
    pub fn capacity(&self) -> usize {
        self.state.inner.lock().capacity
    }

    /// Number of slots currently holding a live key.
    pub fn len(&self) -> usize {
        self.state.inner.lock().occupied
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of this cache's operation counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.state.metrics.snapshot()
    }

    /// Looks up `key`, pinning its cell and setting its reference bit on a
    /// hit.
    ///
    /// The returned handle must be dropped to release the pin; holding it
    /// indefinitely prevents that slot's cell from ever being freed (though
    /// a full clock sweep may still detach it from the key index under
    /// memory pressure).
    pub fn access(&self, key: impl AsRef<[u8]>) -> Option<CacheHandle<L>> {
        let key = key.as_ref();
        let mut guard = self.state.inner.lock();
        if guard.destroyed {
            drop(guard);
            self.state.metrics.record_miss();
            return None;
        }

        let slot = guard.index.lookup(key, &guard.keys);
        let slot = match slot {
            Some(slot) => slot,
            None => {
                drop(guard);
                self.state.metrics.record_miss();
                return None;
            }
        };

        // SAFETY: the index never points at an empty slot.
        let ptr = guard.cells[slot].expect("key index entry with no cell");
        // SAFETY: mutex held, ptr is a live cell.
        unsafe {
            let cell = ptr.as_ptr();
            (*cell).refcount += 1;
            (*cell).ref_bit = true;
        }
        drop(guard);
        self.state.metrics.record_hit();
        Some(CacheHandle {
            state: self.state.clone(),
            ptr,
        })
    }

    /// Inserts `value` under `key`, evicting per the clock sweep if the
    /// cache is full. Replaces any existing entry under `key`.
    ///
    /// Returns `None` if the host allocator refused to size a new key
    /// buffer or value cell; the cache is left exactly as it was except
    /// for any eviction that already ran to make room.
    pub fn admit(&self, key: impl AsRef<[u8]>, value: Bytes) -> Option<CacheHandle<L>> {
        let key = key.as_ref();
        let mut guard = self.state.inner.lock();
        if guard.destroyed {
            return None;
        }

        if let Some(existing) = guard.index.erase(key, &guard.keys) {
            guard.retire_existing(existing, &self.state.metrics);
        }

        if guard.index.should_grow() {
            if guard.index.rehash() {
                self.state.metrics.record_rehash();
            } else {
                self.state.metrics.record_rehash_failed();
                tracing::warn!("refbit-cache: rehash allocation failed, continuing at current load factor");
            }
        }

        let slot = match guard.find_free_slot() {
            Some(slot) => slot,
            None => match find_victim(&mut guard.cells, &mut guard.hand) {
                Some(Victim::Slot(slot)) => {
                    guard.evict_idle(slot, &self.state.metrics);
                    slot
                }
                Some(Victim::ForcedPinned(slot)) => {
                    guard.evict_forced_pinned(slot, &self.state.metrics);
                    slot
                }
                None => unreachable!("a cache with nonzero capacity always has an occupied or free slot"),
            },
        };

        let key_box = match try_box_key(key) {
            Some(key_box) => key_box,
            None => {
                self.state.metrics.record_admission_failed();
                tracing::warn!("refbit-cache: admission failed, could not allocate key buffer");
                return None;
            }
        };

        let ptr = match try_alloc_cell(value, slot) {
            Some(ptr) => ptr,
            None => {
                self.state.metrics.record_admission_failed();
                tracing::warn!("refbit-cache: admission failed, could not allocate value cell");
                return None;
            }
        };

        guard.keys[slot] = Some(key_box);
        guard.cells[slot] = Some(ptr);
        guard.occupied += 1;
        guard.index.insert(key, slot);
        self.state.metrics.record_admit();
        drop(guard);

        Some(CacheHandle {
            state: self.state.clone(),
            ptr,
        })
    }

    /// Logs a diagnostic snapshot of every occupied slot plus the current
    /// clock hand, in the `[i: key, ref=R, bit=B]` form the state dump uses.
    ///
    /// Advisory only: the format is not part of this crate's API contract.
    pub fn print_state(&self) {
        use std::fmt::Write;

        let guard = self.state.inner.lock();
        if guard.destroyed {
            tracing::debug!("refbit-cache: state: destroyed");
            return;
        }

        let mut line = String::new();
        for i in 0..guard.capacity {
            if let (Some(key), Some(ptr)) = (&guard.keys[i], guard.cells[i]) {
                // SAFETY: mutex held, ptr came from guard.cells and is live.
                let (refcount, ref_bit) = unsafe { (ptr.as_ref().refcount, ptr.as_ref().ref_bit) };
                let _ = write!(
                    line,
                    "[{i}: {}, ref={refcount}, bit={}] ",
                    String::from_utf8_lossy(key),
                    ref_bit as u8,
                );
            }
        }
        tracing::debug!(hand = guard.hand, "refbit-cache: state: {}", line.trim_end());
    }

    /// Tears the cache down immediately, freeing every cell regardless of
    /// outstanding pins.
    ///
    /// Any [`CacheHandle`] still alive at that point becomes dangling:
    /// dereferencing it afterward is undefined behavior. This mirrors the
    /// documented destroy-while-pinned hazard; it is the caller's
    /// responsibility to release every handle before calling this. Dropping
    /// those handles afterward is safe and a no-op.
    pub fn destroy(&self) {
        let mut guard = self.state.inner.lock();
        if guard.destroyed {
            return;
        }

        let mut pinned = 0usize;
        for slot in 0..guard.capacity {
            if let Some(ptr) = guard.cells[slot].take() {
                // SAFETY: mutex held; this is the one place the crate frees
                // a cell that may still be pinned, per the documented
                // destroy contract.
                let refcount = unsafe { ptr.as_ref().refcount };
                if refcount > 0 {
                    pinned += 1;
                }
                unsafe { free_cell(ptr) };
            }
            guard.keys[slot] = None;
        }
        guard.occupied = 0;
        guard.destroyed = true;
        drop(guard);

        if pinned > 0 {
            tracing::warn!(pinned, "refbit-cache: destroyed with outstanding handles; those handles are now dangling");
            self.state.metrics.record_destroy_with_pins();
        }
        tracing::debug!("refbit-cache: destroyed");
    }
}

fn try_box_key(key: &[u8]) -> Option<Box<[u8]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(key.len()).ok()?;
    buf.extend_from_slice(key);
    Some(buf.into_boxed_slice())
}

/// A pinned reference to a cached payload.
///
/// Holding a handle guarantees the payload stays alive and reachable even
/// if the cache evicts or replaces its key in the meantime; it just detaches
/// from the key index rather than freeing. Dropping the handle releases the
/// pin; the last handle to drop frees the payload if it was already
/// detached.
pub struct CacheHandle<L: CacheEventListener> {
    state: Arc<CacheState<L>>,
    ptr: NonNull<Cell>,
}

// SAFETY: the payload (`Bytes`) is `Send + Sync`, and all field access goes
// through the cache's mutex.
unsafe impl<L: CacheEventListener> Send for CacheHandle<L> {}
unsafe impl<L: CacheEventListener> Sync for CacheHandle<L> {}

impl<L: CacheEventListener> CacheHandle<L> {
    pub fn value(&self) -> &Bytes {
        // SAFETY: this handle holds a reference, keeping the cell alive
        // even if it has been detached from the key index.
        unsafe { &self.ptr.as_ref().data }
    }
}

impl<L: CacheEventListener> Deref for CacheHandle<L> {
    type Target = Bytes;

    fn deref(&self) -> &Bytes {
        self.value()
    }
}

impl<L: CacheEventListener> Clone for CacheHandle<L> {
    fn clone(&self) -> Self {
        let mut guard = self.state.inner.lock();
        if !guard.destroyed {
            // SAFETY: mutex held, ptr is a live cell referenced by `self`.
            unsafe { (*self.ptr.as_ptr()).refcount += 1 };
        }
        drop(guard);
        Self {
            state: self.state.clone(),
            ptr: self.ptr,
        }
    }
}

impl<L: CacheEventListener> Drop for CacheHandle<L> {
    fn drop(&mut self) {
        self.state.release(self.ptr);
    }
}
