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

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache-wide operation counters.
///
/// Each counter is a plain [`AtomicU64`] read back locally via
/// [`Cache::metrics`](../../refbit_cache/struct.Cache.html#method.metrics),
/// and additionally forwarded to the process-wide `metrics` recorder so the
/// numbers show up next to everything else the host exports. The split
/// mirrors `foyer-memory`'s shard-local `Metrics` struct, which is read
/// directly in tests and also wired into the ambient `metrics` facade.
#[derive(Debug, Default)]
pub struct Metrics {
    pub hit: AtomicU64,
    pub miss: AtomicU64,
    pub admit: AtomicU64,
    pub evict: AtomicU64,
    pub evict_detached: AtomicU64,
    pub evict_forced_pinned: AtomicU64,
    pub rehash: AtomicU64,
    pub rehash_failed: AtomicU64,
    pub admission_failed: AtomicU64,
    pub destroy_with_pins: AtomicU64,
}

macro_rules! record {
    ($self:ident, $field:ident, $name:literal) => {{
        $self.$field.fetch_add(1, Ordering::Relaxed);
        metrics::counter!($name).increment(1);
    }};
}

impl Metrics {
    pub fn record_hit(&self) {
        record!(self, hit, "refbit_cache_hit_total");
    }

    pub fn record_miss(&self) {
        record!(self, miss, "refbit_cache_miss_total");
    }

    pub fn record_admit(&self) {
        record!(self, admit, "refbit_cache_admit_total");
    }

    pub fn record_evict(&self) {
        record!(self, evict, "refbit_cache_evict_total");
    }

    pub fn record_evict_detached(&self) {
        record!(self, evict_detached, "refbit_cache_evict_detached_total");
    }

    pub fn record_evict_forced_pinned(&self) {
        record!(self, evict_forced_pinned, "refbit_cache_evict_forced_pinned_total");
    }

    pub fn record_rehash(&self) {
        record!(self, rehash, "refbit_cache_rehash_total");
    }

    pub fn record_rehash_failed(&self) {
        record!(self, rehash_failed, "refbit_cache_rehash_failed_total");
    }

    pub fn record_admission_failed(&self) {
        record!(self, admission_failed, "refbit_cache_admission_failed_total");
    }

    pub fn record_destroy_with_pins(&self) {
        record!(self, destroy_with_pins, "refbit_cache_destroy_with_pins_total");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hit: self.hit.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
            admit: self.admit.load(Ordering::Relaxed),
            evict: self.evict.load(Ordering::Relaxed),
            evict_detached: self.evict_detached.load(Ordering::Relaxed),
            evict_forced_pinned: self.evict_forced_pinned.load(Ordering::Relaxed),
            rehash: self.rehash.load(Ordering::Relaxed),
            rehash_failed: self.rehash_failed.load(Ordering::Relaxed),
            admission_failed: self.admission_failed.load(Ordering::Relaxed),
            destroy_with_pins: self.destroy_with_pins.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time, non-atomic copy of [`Metrics`] for display/assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hit: u64,
    pub miss: u64,
    pub admit: u64,
    pub evict: u64,
    pub evict_detached: u64,
    pub evict_forced_pinned: u64,
    pub rehash: u64,
    pub rehash_failed: u64,
    pub admission_failed: u64,
    pub destroy_with_pins: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = Metrics::default();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hit, 2);
        assert_eq!(snapshot.miss, 1);
        assert_eq!(snapshot.admit, 0);
    }
}
