//! Helper functions that don't belong to any concrete module of the allocator.

/// Rounds `size` up to the next multiple of `alignment`.
///
/// Used in two places: request sizes are rounded up to the allocator's
/// alignment quantum, and region sizes are rounded up to the page size
/// reported by the kernel. `alignment` must be a power of two.
pub(crate) fn align(size: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());

    (size + alignment - 1) & !(alignment - 1)
}
