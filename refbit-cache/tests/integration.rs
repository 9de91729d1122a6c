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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use refbit_cache::{Cache, CacheConfig, CacheEventListener};

#[derive(Default)]
struct CountingListener {
    evicted: AtomicUsize,
    released: AtomicUsize,
}

impl CacheEventListener for CountingListener {
    fn on_evict(&self, _key: &[u8]) {
        self.evicted.fetch_add(1, Ordering::SeqCst);
    }

    fn on_release(&self, _value: &Bytes) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[test_log::test]
fn test_event_listener_observes_eviction_and_release() {
    let listener = Arc::new(CountingListener::default());
    let cache = Cache::try_new(
        CacheConfig::new(1).with_event_listener(listener.clone()),
    )
    .unwrap();

    drop(cache.admit(b"a", Bytes::from_static(b"1")).unwrap());
    drop(cache.admit(b"b", Bytes::from_static(b"2")).unwrap());

    assert_eq!(listener.evicted.load(Ordering::SeqCst), 1);
    assert_eq!(listener.released.load(Ordering::SeqCst), 1);
}

#[test_log::test]
fn test_concurrent_access_and_admit_from_many_threads() {
    let cache: Cache = Cache::try_new(CacheConfig::new(64)).unwrap();
    let cache = Arc::new(cache);

    let mut handles = Vec::new();
    for t in 0..8 {
        let cache = cache.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..200 {
                let key = format!("t{t}-{}", i % 32);
                if let Some(handle) = cache.admit(key.as_bytes(), Bytes::from(key.clone())) {
                    assert_eq!(handle.value().as_ref(), key.as_bytes());
                }
                let _ = cache.access(key.as_bytes());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.len() <= cache.capacity());
}

#[test_log::test]
fn test_destroy_is_idempotent() {
    let cache: Cache = Cache::try_new(CacheConfig::new(4)).unwrap();
    cache.admit(b"a", Bytes::from_static(b"1"));
    cache.destroy();
    cache.destroy();
    assert!(cache.access(b"a").is_none());
}
