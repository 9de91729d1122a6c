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

//! Byte-exact hashing and table sizing for the key index.
//!
//! The index hashes raw key bytes directly rather than delegating to
//! `std::hash::Hash`, so that two callers on different platforms (or two
//! revisions of a key's logical type) agree on the same bucket as long as
//! the bytes match.

/// The spec's default seed; also the default of `CacheConfig`'s hash-seed
/// override, so a cache built with no override hashes exactly as specified.
pub const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a over raw bytes, seeded with the spec's default offset basis.
pub fn fnv1a_bytes(bytes: &[u8]) -> u32 {
    fnv1a_bytes_seeded(bytes, FNV_OFFSET_BASIS)
}

/// FNV-1a over raw bytes with a caller-supplied seed in place of the default
/// offset basis, backing `CacheConfig`'s hash-seed override.
pub fn fnv1a_bytes_seeded(bytes: &[u8], seed: u32) -> u32 {
    let mut hash = seed;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Smallest prime greater than or equal to `n`.
///
/// The key index always sizes its table to a prime bucket count: it keeps
/// linear probing from cycling through the same short sub-sequence of slots
/// that a power-of-two table would expose whenever a key's hash shares
/// factors with the table size.
pub fn next_prime(mut n: u64) -> u64 {
    if n <= 2 {
        return 2;
    }
    if n % 2 == 0 {
        n += 1;
    }
    while !is_prime(n) {
        n += 2;
    }
    n
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut divisor = 3u64;
    while divisor.saturating_mul(divisor) <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_stable_across_calls() {
        let a = fnv1a_bytes(b"hello world");
        let b = fnv1a_bytes(b"hello world");
        assert_eq!(a, b);
        assert_ne!(a, fnv1a_bytes(b"hello worlD"));
    }

    #[test]
    fn test_fnv1a_empty() {
        assert_eq!(fnv1a_bytes(b""), FNV_OFFSET_BASIS);
    }

    #[test]
    fn test_fnv1a_seeded_diverges_from_default_seed() {
        assert_eq!(fnv1a_bytes(b"hello"), fnv1a_bytes_seeded(b"hello", FNV_OFFSET_BASIS));
        assert_ne!(fnv1a_bytes(b"hello"), fnv1a_bytes_seeded(b"hello", 0));
    }

    #[test]
    fn test_next_prime_basic() {
        assert_eq!(next_prime(0), 2);
        assert_eq!(next_prime(1), 2);
        assert_eq!(next_prime(2), 2);
        assert_eq!(next_prime(3), 3);
        assert_eq!(next_prime(4), 5);
        assert_eq!(next_prime(8), 11);
        assert_eq!(next_prime(17), 17);
    }

    #[test]
    fn test_next_prime_large() {
        let p = next_prime(1_000_000);
        assert!(p >= 1_000_000);
        assert!(is_prime(p));
    }
}
