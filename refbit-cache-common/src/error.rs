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

use std::collections::TryReserveError;

use thiserror::Error;

/// Failure constructing a cache.
///
/// This is the only fallible path that escapes the facade as a typed error
/// rather than a log line plus a `None`/silently-retried fallback: every
/// other allocator refusal (admission, rehash) is non-fatal and handled in
/// place, per the error handling design.
#[derive(Debug, Error)]
pub enum CacheCreateError {
    /// `capacity` must be a positive number of slots.
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,

    /// The allocator refused to size the slot array or the key index table.
    #[error("failed to allocate cache storage for capacity {capacity}: {source}")]
    OutOfMemory {
        capacity: usize,
        #[source]
        source: TryReserveError,
    },
}
