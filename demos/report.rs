//! Shows the memory report while blocks come and go. Try it with the
//! configuration variables, for example:
//!
//! ```text
//! ALLOCATOR_ALGORITHM=worst_fit ALLOCATOR_SCRIBBLE=1 cargo run --example report
//! ```

use mapalloc::MapAlloc;

fn main() {
    let allocator = MapAlloc::new();

    unsafe {
        let small: Vec<*mut u8> = (0..4).map(|_| allocator.allocate(48)).collect();
        let big = allocator.allocate(8192);

        println!("four small blocks and one spanning a second region:");
        allocator.print_memory();

        allocator.deallocate(small[1]);
        allocator.deallocate(small[2]);

        println!("\nafter releasing two neighbors (they coalesce):");
        allocator.print_memory();

        allocator.deallocate(big);

        println!("\nafter releasing the big block (its region is unmapped):");
        allocator.print_memory();

        allocator.deallocate(small[0]);
        allocator.deallocate(small[3]);
    }
}
