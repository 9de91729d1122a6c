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

use refbit_cache_common::hash::FNV_OFFSET_BASIS;
use refbit_cache_common::DefaultCacheEventListener;

use crate::index::LoadFactor;

/// Construction parameters for a [`crate::Cache`].
#[derive(Debug, Clone)]
pub struct CacheConfig<L = DefaultCacheEventListener> {
    /// Number of slots in the cache. Fixed for the cache's lifetime.
    pub capacity: usize,
    /// Observes evict/release lifecycle events. Defaults to a no-op.
    pub event_listener: L,
    /// FNV-1a seed the key index hashes with, in place of the spec's default
    /// offset basis. Two caches must agree on this to agree on bucket
    /// placement; there's no reason to change it outside of hash-flooding
    /// mitigation or testing collision behavior.
    pub hash_seed: u32,
    /// The key index's rehash trigger, overriding the spec's default 0.7
    /// max load factor (`{ numerator: 7, denominator: 10 }`).
    pub load_factor: LoadFactor,
}

impl Default for CacheConfig<DefaultCacheEventListener> {
    fn default() -> Self {
        Self {
            capacity: 256,
            event_listener: DefaultCacheEventListener,
            hash_seed: FNV_OFFSET_BASIS,
            load_factor: LoadFactor::default(),
        }
    }
}

impl CacheConfig<DefaultCacheEventListener> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            event_listener: DefaultCacheEventListener,
            hash_seed: FNV_OFFSET_BASIS,
            load_factor: LoadFactor::default(),
        }
    }
}

impl<L> CacheConfig<L> {
    pub fn with_event_listener<L2>(self, event_listener: L2) -> CacheConfig<L2> {
        CacheConfig {
            capacity: self.capacity,
            event_listener,
            hash_seed: self.hash_seed,
            load_factor: self.load_factor,
        }
    }

    pub fn with_hash_seed(mut self, hash_seed: u32) -> Self {
        self.hash_seed = hash_seed;
        self
    }

    pub fn with_load_factor(mut self, load_factor: LoadFactor) -> Self {
        self.load_factor = load_factor;
        self
    }
}
