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

//! A fixed-capacity, thread-safe, in-memory associative cache built on
//! clock-with-reference-bit eviction and reference-count pinning.
//!
//! Keys are raw bytes and values are [`bytes::Bytes`]. The whole cache is
//! guarded by a single mutex: there is no sharding, so [`Cache::access`]
//! and [`Cache::admit`] serialize against each other, the same way the
//! system this crate is modeled on serializes every operation behind one
//! lock.
//!
//! ```
//! use bytes::Bytes;
//! use refbit_cache::{Cache, CacheConfig};
//!
//! let cache: Cache = Cache::try_new(CacheConfig::new(16)).unwrap();
//! let handle = cache.admit(b"greeting", Bytes::from_static(b"hello")).unwrap();
//! assert_eq!(handle.value().as_ref(), b"hello");
//! drop(handle);
//!
//! let hit = cache.access(b"greeting").unwrap();
//! assert_eq!(hit.value().as_ref(), b"hello");
//! ```

mod cache;
mod cell;
mod config;
mod index;
mod slots;

pub mod prelude;

pub use cache::{Cache, CacheHandle};
pub use config::CacheConfig;
pub use index::LoadFactor;
pub use refbit_cache_common::{CacheCreateError, CacheEventListener, DefaultCacheEventListener, Metrics};
