//! An mmap backed replacement for the process allocator.
//!
//! Memory is carved out of page aligned anonymous mappings (regions). Every
//! region is tracked as a run of blocks on one global, address ordered
//! list; allocation picks a free block with a configurable fit strategy and
//! splits it to size, release merges free neighbors back together and
//! returns fully free regions to the kernel.
//!
//! The four entry points mirror the classic allocation interface:
//! [`MapAlloc::allocate`], [`MapAlloc::allocate_zeroed`],
//! [`MapAlloc::reallocate`] and [`MapAlloc::deallocate`]. All of them share
//! one process wide lock, so the type can be installed as the process
//! allocator:
//!
//! ```no_run
//! use mapalloc::MapAlloc;
//!
//! #[global_allocator]
//! static ALLOCATOR: MapAlloc = MapAlloc::new();
//!
//! let years = Box::new(2026);
//! assert_eq!(*years, 2026);
//! ```
//!
//! Two environment variables steer the allocator, both read fresh on every
//! call: `ALLOCATOR_ALGORITHM` picks the fit strategy (`first_fit`,
//! `best_fit` or `worst_fit`) and `ALLOCATOR_SCRIBBLE=1` poisons fresh
//! payloads with `0xAA` to surface reads of uninitialized memory.

use std::{
    alloc::{GlobalAlloc, Layout},
    io::{self, Write},
    ptr,
    sync::{Mutex, MutexGuard, PoisonError},
};

mod block;
mod config;
mod heap;
mod kernel;
mod list;
mod strategy;
mod utils;

use crate::{block::ALIGNMENT, config::Config, heap::Heap};

/// The allocator. One global lock guards all of its metadata; merges can
/// touch blocks anywhere in a region, so anything finer would need a
/// different data model.
pub struct MapAlloc {
    heap: Mutex<Heap>,
}

impl MapAlloc {
    pub const fn new() -> Self {
        Self {
            heap: Mutex::new(Heap::new()),
        }
    }

    /// Takes the global lock. The heap holds no invariant across a panic
    /// (entry points restore consistency before returning), so a poisoned
    /// lock is simply recovered.
    fn heap(&self) -> MutexGuard<'_, Heap> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates `size` usable bytes, aligned to 8. Returns null only when
    /// the kernel refuses to map more memory.
    ///
    /// **SAFETY**: the returned pointer must be released through this same
    /// allocator and not used beyond `size` bytes.
    pub unsafe fn allocate(&self, size: usize) -> *mut u8 {
        // Configuration is read before the lock: an env lookup that
        // allocated while we hold it would deadlock the global allocator.
        let config = Config::read();

        unsafe { self.heap().allocate(size, &config) }
    }

    /// Allocates room for `count` elements of `size` bytes each, all
    /// zeroed. An overflowing product yields null.
    ///
    /// **SAFETY**: same contract as [`MapAlloc::allocate`].
    pub unsafe fn allocate_zeroed(&self, count: usize, size: usize) -> *mut u8 {
        let config = Config::read();

        unsafe { self.heap().allocate_zeroed(count, size, &config) }
    }

    /// Resizes the allocation behind `ptr` to `size` bytes, preserving the
    /// surviving prefix. Null `ptr` allocates, zero `size` releases and
    /// returns null. On failure the original allocation stays valid.
    ///
    /// **SAFETY**: `ptr` must be null or a live pointer returned by this
    /// allocator.
    pub unsafe fn reallocate(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        let config = Config::read();

        unsafe { self.heap().reallocate(ptr, size, &config) }
    }

    /// Releases the allocation behind `ptr`. Null is a no-op.
    ///
    /// **SAFETY**: `ptr` must be null or a live pointer returned by this
    /// allocator, and must not be used afterwards.
    pub unsafe fn deallocate(&self, ptr: *mut u8) {
        unsafe { self.heap().deallocate(ptr) }
    }

    /// Prints the current memory state to standard output: every region in
    /// list order with its identifier and base address, then each of its
    /// blocks with address range, name, size and state.
    pub fn print_memory(&self) {
        // Acquire stdout before the heap lock: creating its buffer later
        // would re-enter the allocator while we hold the lock.
        let stdout = io::stdout();
        let mut out = stdout.lock();

        let heap = self.heap();
        let _ = heap.write_report(&mut out);
        drop(heap);

        let _ = out.flush();
    }
}

impl Default for MapAlloc {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for MapAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // Blocks only guarantee the 8 byte quantum; stricter layouts are
        // refused rather than handed back misaligned.
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }

        unsafe { self.allocate(layout.size()) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        unsafe { self.deallocate(ptr) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }

        unsafe { self.allocate_zeroed(1, layout.size()) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }

        unsafe { self.reallocate(ptr, new_size) }
    }
}
