//! Drives the four entry points by hand on a standalone allocator
//! instance, without installing it as the global allocator.

use mapalloc::MapAlloc;

fn main() {
    let allocator = MapAlloc::new();

    unsafe {
        let a = allocator.allocate(64);
        println!("allocate(64)          -> {a:?}");

        let b = allocator.allocate_zeroed(10, 4);
        println!("allocate_zeroed(10,4) -> {b:?} (first byte = {})", *b);

        let c = allocator.reallocate(a, 256);
        println!("reallocate(a, 256)    -> {c:?}");

        println!("\nmemory state before releasing:");
        allocator.print_memory();

        allocator.deallocate(b);
        allocator.deallocate(c);

        println!("\nmemory state after releasing everything:");
        allocator.print_memory();
    }
}
