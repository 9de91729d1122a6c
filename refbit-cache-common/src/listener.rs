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

use std::sync::Arc;

use bytes::Bytes;

/// Trait for observing a cached payload's lifecycle.
///
/// This is the Rust counterpart of a `value_free` function pointer supplied
/// at construction time: [`on_release`](CacheEventListener::on_release) is
/// called exactly once per payload, at the moment its last reference —
/// whichever of the cache-owned slot or a caller-owned handle outlives the
/// other — goes away.
pub trait CacheEventListener: Send + Sync + 'static {
    /// Called when a still-pinned slot is retired: the payload survives
    /// (kept alive by outstanding handles) but is no longer reachable by key.
    #[allow(unused_variables)]
    fn on_evict(&self, key: &[u8]) {}

    /// Called exactly once per payload, when its last reference is released.
    #[allow(unused_variables)]
    fn on_release(&self, value: &Bytes) {}
}

/// A [`CacheEventListener`] that does nothing, used when the caller doesn't
/// need to observe payload lifecycle events.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCacheEventListener;

impl CacheEventListener for DefaultCacheEventListener {}

impl<T: CacheEventListener> CacheEventListener for Arc<T> {
    fn on_evict(&self, key: &[u8]) {
        (**self).on_evict(key);
    }

    fn on_release(&self, value: &Bytes) {
        (**self).on_release(value);
    }
}
