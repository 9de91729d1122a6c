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

//! Components shared by `refbit-cache` that don't belong to any single part
//! of the core engine: the fallible-construction error type, the event
//! listener trait callers configure in place of a `value_free` function
//! pointer, the hash/prime helpers the key index is built on, and the
//! metrics counters the cache facade threads through every operation.

pub mod error;
pub mod hash;
pub mod listener;
pub mod metrics;

pub use error::CacheCreateError;
pub use listener::{CacheEventListener, DefaultCacheEventListener};
pub use metrics::Metrics;
