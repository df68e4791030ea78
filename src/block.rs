use std::{mem, ptr::NonNull};

use crate::list::Node;

/// Every block size is a multiple of this quantum, and every payload pointer
/// we hand out is aligned to it.
pub(crate) const ALIGNMENT: usize = 8;

/// Header size of a block. This includes the overhead introduced by the
/// [`Node`] structure since every `Block` lives inside a node of the global
/// block list.
pub(crate) const BLOCK_HEADER_SIZE: usize = mem::size_of::<Node<Block>>();

/// Smallest block the split engine is allowed to produce. Splitting below
/// this floor would leave blocks whose header outweighs their payload, so a
/// request whose leftover falls under it keeps the whole block instead.
/// Derived from the real header size rather than hardcoded.
pub(crate) const MIN_BLOCK_SIZE: usize = BLOCK_HEADER_SIZE + 2 * ALIGNMENT;

// The header must not break the payload alignment it promises.
const _: () = assert!(BLOCK_HEADER_SIZE % ALIGNMENT == 0);

/// Metadata of one block. The header precedes the usable payload, so the
/// pointer handed to the caller sits exactly [`BLOCK_HEADER_SIZE`] bytes
/// past the start of the block.
///
/// ```text
/// +---------------------+ <------+
/// |     prev / next     |        |
/// +---------------------+        |
/// |        size         |        |
/// +---------------------+        | -> Header (Node<Block>)
/// |      free (1b)      |        |
/// +---------------------+        |
/// | region_id  |  name  |        |
/// +---------------------+ <------+
/// |       Payload       |        |
/// |         ...         |        | -> Addressable content
/// +---------------------+ <------+
/// ```
///
/// A region has no header of its own: it is exactly the run of blocks that
/// share a `region_id`, and it always begins life as one free block spanning
/// the whole mapping.
pub(crate) struct Block {
    /// Total bytes spanned by this block, header included. Always a
    /// multiple of [`ALIGNMENT`].
    pub size: usize,
    /// Whether the block is currently unallocated.
    pub free: bool,
    /// Mapping this block belongs to. Merging never crosses a `region_id`
    /// boundary, and a region whose blocks are all gone is unmapped.
    pub region_id: u64,
    /// Monotonic allocation number, purely diagnostic. Rendered as
    /// `Allocation N` by the memory report.
    pub name: u64,
}

impl Block {
    /// Payload pointer of `node`, the address the caller receives.
    ///
    /// **SAFETY**: `node` must point to a live block header.
    pub(crate) unsafe fn payload(node: NonNull<Node<Block>>) -> *mut u8 {
        unsafe { node.as_ptr().cast::<u8>().add(BLOCK_HEADER_SIZE) }
    }

    /// Recovers the block header behind a payload pointer previously
    /// returned by [`Block::payload`].
    ///
    /// **SAFETY**: `ptr` must be a payload pointer produced by this
    /// allocator and still live.
    pub(crate) unsafe fn from_payload(ptr: *mut u8) -> NonNull<Node<Block>> {
        unsafe { NonNull::new_unchecked(ptr.sub(BLOCK_HEADER_SIZE).cast::<Node<Block>>()) }
    }

    /// Usable bytes of the block, header excluded.
    pub(crate) fn payload_size(&self) -> usize {
        self.size - BLOCK_HEADER_SIZE
    }
}
