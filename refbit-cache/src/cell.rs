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

//! The value cell: the unit of storage the clock hand sweeps over.
//!
//! A cell never stores its own key. The key lives in the parallel `keys`
//! array back in [`crate::cache::Inner`], addressed by the same slot index,
//! so that renaming a slot during eviction never requires touching the
//! cell's payload.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use bytes::Bytes;

/// Where a cell currently lives.
///
/// A cell starts life `InSlot`. Retiring a still-pinned cell moves it to
/// `Detached`: the slot it used to occupy is free for reuse, but the cell
/// itself survives until its last handle drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Home {
    InSlot(usize),
    Detached,
}

/// A resident payload plus the bookkeeping the eviction sweep and the
/// handle refcounting protocol both need.
///
/// `refcount` and `ref_bit` are read and written only while the cache's
/// single mutex is held, so they are plain fields rather than atomics:
/// there is never a moment where two threads touch a cell concurrently.
#[derive(Debug)]
pub struct Cell {
    pub data: Bytes,
    pub refcount: usize,
    pub ref_bit: bool,
    pub home: Home,
}

impl Cell {
    fn new(data: Bytes, slot: usize) -> Self {
        Self {
            data,
            refcount: 1,
            ref_bit: true,
            home: Home::InSlot(slot),
        }
    }
}

/// Allocates a [`Cell`] on the heap via the raw global allocator so that an
/// allocator refusal surfaces as `None` instead of aborting the process.
///
/// `Box::new` has no fallible counterpart on stable Rust, so admission goes
/// through `alloc::alloc` directly, mirroring the allocate-or-roll-back
/// contract the rest of admission already follows for its `Vec` buffers.
pub fn try_alloc_cell(data: Bytes, slot: usize) -> Option<NonNull<Cell>> {
    let layout = Layout::new::<Cell>();
    // SAFETY: `layout` is non-zero-sized and well-formed for `Cell`.
    let raw = unsafe { alloc::alloc(layout) } as *mut Cell;
    let ptr = NonNull::new(raw)?;
    // SAFETY: `ptr` was just allocated with the layout of `Cell` and is
    // still uninitialized; writing a fully-formed `Cell` into it is valid.
    unsafe { ptr.as_ptr().write(Cell::new(data, slot)) };
    Some(ptr)
}

/// Frees a cell previously returned by [`try_alloc_cell`].
///
/// # Safety
///
/// `ptr` must not be dereferenced, by this thread or any other, after this
/// call returns.
pub unsafe fn free_cell(ptr: NonNull<Cell>) {
    std::ptr::drop_in_place(ptr.as_ptr());
    alloc::dealloc(ptr.as_ptr() as *mut u8, Layout::new::<Cell>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_alloc_and_free_roundtrip() {
        let ptr = try_alloc_cell(Bytes::from_static(b"payload"), 3).expect("alloc");
        // SAFETY: ptr was just allocated and not yet freed.
        unsafe {
            let cell = ptr.as_ref();
            assert_eq!(cell.data.as_ref(), b"payload");
            assert_eq!(cell.refcount, 1);
            assert!(cell.ref_bit);
            assert_eq!(cell.home, Home::InSlot(3));
        }
        // SAFETY: ptr is not accessed again after this call.
        unsafe { free_cell(ptr) };
    }
}
