use std::{
    cmp, io,
    ptr::{self, NonNull},
};

use crate::{
    block::{ALIGNMENT, BLOCK_HEADER_SIZE, Block, MIN_BLOCK_SIZE},
    config::Config,
    kernel,
    list::{List, Node},
    utils::align,
};

/// Byte pattern written over fresh payloads when scribbling is enabled.
pub(crate) const SCRIBBLE_BYTE: u8 = 0xAA;

/// The allocator context: the global block list plus the counters that tag
/// new blocks. One instance of this lives behind the [`crate::MapAlloc`]
/// lock; nothing here synchronizes on its own.
///
/// All the memory this structure tracks comes from page aligned anonymous
/// mappings (regions). A region starts as a single free block spanning the
/// whole mapping and is carved up by splits and stitched back together by
/// merges, so at any point every byte of every region belongs to exactly
/// one block:
///
/// ```text
///  region 0 (one mapping)                 region 1 (another mapping)
/// +------------------------------------+ +------------------------+
/// | Block used | Block free | Block .. | | Block used | Block free |
/// +------------------------------------+ +------------------------+
///        |            ^ |                      ^ |
///        +------------+ +----------------------+ +--> ...
///              next              next
/// ```
///
/// Within a region the list follows ascending addresses; regions appear in
/// the order they were mapped and are not assumed adjacent in the address
/// space.
pub(crate) struct Heap {
    /// Every block of every live region, in one list.
    blocks: List<Block>,
    /// Identifier handed to the next mapped region.
    next_region: u64,
    /// Allocation counter, tags each new block with its `name`.
    next_name: u64,
    /// Page size reported by the kernel, captured on first use.
    page_size: usize,
}

// The embedded NonNull links only ever reference memory owned by this heap.
unsafe impl Send for Heap {}

impl Heap {
    pub const fn new() -> Self {
        Self {
            blocks: List::new(),
            next_region: 0,
            next_name: 0,
            page_size: 0,
        }
    }

    /// Allocates `size` usable bytes and returns the payload pointer, or
    /// null if the kernel refuses to map a new region.
    ///
    /// The request is padded with the header and rounded up to the
    /// alignment quantum, then served from an existing free block if the
    /// configured strategy finds one, and from a freshly mapped region
    /// otherwise. Either way the chosen block is split down to the exact
    /// size when the leftover is worth keeping.
    ///
    /// **SAFETY**: caller must not use more than `size` bytes of the
    /// returned payload.
    pub unsafe fn allocate(&mut self, size: usize, config: &Config) -> *mut u8 {
        // No mapping can back a request this large; bailing out here also
        // keeps the padding arithmetic below from overflowing.
        if size > isize::MAX as usize / 2 {
            return ptr::null_mut();
        }

        // The floor keeps every block, split heads included, at least
        // MIN_BLOCK_SIZE bytes.
        let needed = cmp::max(align(size + BLOCK_HEADER_SIZE, ALIGNMENT), MIN_BLOCK_SIZE);

        let mut node = match config.strategy.find(&self.blocks, needed) {
            Some(node) => node,
            None => match self.map_region(needed) {
                Some(node) => node,
                None => return ptr::null_mut(),
            },
        };

        self.split(node, needed);

        unsafe {
            node.as_mut().data.free = false;

            let payload = Block::payload(node);
            if config.scribble {
                ptr::write_bytes(payload, SCRIBBLE_BYTE, node.as_ref().data.payload_size());
            }

            payload
        }
    }

    /// Allocates room for `count` elements of `size` bytes and zeroes the
    /// whole payload. A product that overflows `usize` is refused with a
    /// null result rather than silently wrapping to a tiny block.
    pub unsafe fn allocate_zeroed(&mut self, count: usize, size: usize, config: &Config) -> *mut u8 {
        let Some(total) = count.checked_mul(size) else {
            return ptr::null_mut();
        };

        unsafe {
            let payload = self.allocate(total, config);

            if !payload.is_null() {
                let node = Block::from_payload(payload);
                ptr::write_bytes(payload, 0, node.as_ref().data.payload_size());
            }

            payload
        }
    }

    /// Releases the block behind `ptr`: marks it free, merges it with free
    /// same-region neighbors and, if the result spans its whole region,
    /// hands the mapping back to the kernel. Null pointers are a no-op.
    ///
    /// **SAFETY**: `ptr` must be null or a live payload pointer produced by
    /// this heap.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }

        unsafe {
            let mut node = Block::from_payload(ptr);
            debug_assert!(self.owns(node), "pointer does not belong to this allocator");
            debug_assert!(!node.as_ref().data.free, "double free");

            node.as_mut().data.free = true;
            let node = self.coalesce(node);

            // A free block with no same-region neighbor on either side
            // spans its entire mapping (the coverage invariant leaves no
            // other block to account for those bytes), so the region goes
            // back to the kernel.
            let region_id = node.as_ref().data.region_id;
            let prev_same = node
                .as_ref()
                .prev
                .is_some_and(|prev| prev.as_ref().data.region_id == region_id);
            let next_same = node
                .as_ref()
                .next
                .is_some_and(|next| next.as_ref().data.region_id == region_id);

            if !prev_same && !next_same {
                let size = node.as_ref().data.size;
                self.blocks.remove(node);
                kernel::return_memory(node.cast::<u8>(), size);
            }
        }
    }

    /// Resizes the allocation behind `ptr` to `size` usable bytes. Null
    /// behaves as an allocation, zero as a release. The general path
    /// allocates a new block, copies the surviving prefix and releases the
    /// old block; on allocation failure the old block is left untouched and
    /// null is returned.
    ///
    /// **SAFETY**: same contract as [`Heap::deallocate`] for `ptr`.
    pub unsafe fn reallocate(&mut self, ptr: *mut u8, size: usize, config: &Config) -> *mut u8 {
        unsafe {
            if ptr.is_null() {
                return self.allocate(size, config);
            }

            if size == 0 {
                self.deallocate(ptr);
                return ptr::null_mut();
            }

            let old_payload = Block::from_payload(ptr).as_ref().data.payload_size();

            let new = self.allocate(size, config);
            if new.is_null() {
                return ptr::null_mut();
            }

            ptr::copy_nonoverlapping(ptr, new, cmp::min(old_payload, size));
            self.deallocate(ptr);

            new
        }
    }

    /// Maps a fresh region big enough for `needed` bytes and registers it
    /// as one free block at the tail of the list.
    fn map_region(&mut self, needed: usize) -> Option<NonNull<Node<Block>>> {
        if self.page_size == 0 {
            self.page_size = kernel::page_size();
        }

        let region_size = align(needed, self.page_size);

        unsafe {
            let addr = kernel::request_memory(region_size)?;

            let block = Block {
                size: region_size,
                free: true,
                region_id: self.fresh_region_id(),
                name: self.fresh_name(),
            };

            Some(self.blocks.append(block, addr))
        }
    }

    /// Splits `node` into a head of exactly `target` bytes and a free tail
    /// holding the remainder. Skipped when the block is not free, is
    /// already near the minimum size, or the remainder would drop below it;
    /// the caller then keeps the whole block and eats the internal
    /// fragmentation.
    fn split(&mut self, mut node: NonNull<Node<Block>>, target: usize) {
        unsafe {
            let size = node.as_ref().data.size;

            if !node.as_ref().data.free || size < MIN_BLOCK_SIZE {
                return;
            }

            let Some(remainder) = size.checked_sub(target) else {
                return;
            };
            if remainder < MIN_BLOCK_SIZE {
                return;
            }

            let region_id = node.as_ref().data.region_id;
            let name = self.fresh_name();
            let tail_addr = NonNull::new_unchecked(node.as_ptr().cast::<u8>().add(target));

            self.blocks.insert_after(
                node,
                Block {
                    size: remainder,
                    free: true,
                    region_id,
                    name,
                },
                tail_addr,
            );

            node.as_mut().data.size = target;
        }
    }

    /// Absorbs the free same-region predecessor and successor of `node`
    /// into it and returns the surviving block. One pass on each side is
    /// enough: the neighbors of a block that just became free were already
    /// maximal free runs within the region.
    fn coalesce(&mut self, mut node: NonNull<Node<Block>>) -> NonNull<Node<Block>> {
        unsafe {
            if let Some(mut prev) = node.as_ref().prev {
                if prev.as_ref().data.free
                    && prev.as_ref().data.region_id == node.as_ref().data.region_id
                {
                    prev.as_mut().data.size += node.as_ref().data.size;
                    self.blocks.remove(node);
                    node = prev;
                }
            }

            if let Some(next) = node.as_ref().next {
                if next.as_ref().data.free
                    && next.as_ref().data.region_id == node.as_ref().data.region_id
                {
                    node.as_mut().data.size += next.as_ref().data.size;
                    self.blocks.remove(next);
                }
            }
        }

        node
    }

    /// Writes the current memory state, regions in list order with their
    /// blocks. Read-only; the caller is responsible for holding the global
    /// lock while the list is walked.
    pub fn write_report(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let mut current_region = None;

        for node in self.blocks.nodes() {
            unsafe {
                let block = &node.as_ref().data;
                let start = node.as_ptr().cast::<u8>().cast_const();

                if current_region != Some(block.region_id) {
                    current_region = Some(block.region_id);
                    writeln!(out, "[REGION {}] {:p}", block.region_id, start)?;
                }

                writeln!(
                    out,
                    "  [BLOCK] {:p}-{:p} 'Allocation {}' {} [{}]",
                    start,
                    start.add(block.size),
                    block.name,
                    block.size,
                    if block.free { "FREE" } else { "USED" },
                )?;
            }
        }

        Ok(())
    }

    fn fresh_region_id(&mut self) -> u64 {
        let id = self.next_region;
        self.next_region += 1;
        id
    }

    fn fresh_name(&mut self) -> u64 {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    /// Whether `node` is currently linked into this heap's block list.
    /// Only used by debug assertions, so the O(n) walk never runs in
    /// release builds.
    fn owns(&self, node: NonNull<Node<Block>>) -> bool {
        self.blocks.nodes().any(|candidate| candidate == node)
    }
}
