//! Installs the allocator as the process allocator and lets ordinary std
//! code exercise it: boxes, vectors, strings and threads all end up going
//! through `MapAlloc`.

use mapalloc::MapAlloc;
use std::thread;

#[global_allocator]
static ALLOCATOR: MapAlloc = MapAlloc::new();

fn main() {
    let boxed = Box::new(22);
    println!("Box value: {}, at: {:p}", boxed, boxed);

    let mut numbers = Vec::new();
    for i in 0..5 {
        numbers.push(i * 10);
        println!(
            "pushed {}; capacity: {}; buffer at: {:p}",
            numbers[i],
            numbers.capacity(),
            numbers.as_ptr()
        );
    }

    let msg = String::from("heap testing");
    println!("string '{}' at: {:p}", msg, msg.as_ptr());

    // Released space should be found again by the fit strategy.
    let a = Box::new([0u8; 64]);
    let b = Box::new([0u8; 64]);
    let addr_a = a.as_ptr();

    drop(a);
    drop(b);

    let c = Box::new([0u8; 64]);
    if addr_a == c.as_ptr() {
        println!("correctly reused at {:p}", c.as_ptr());
    } else {
        println!("not reused: a was at {:p}, c is at {:p}", addr_a, c.as_ptr());
    }

    let workers: Vec<_> = (0..2)
        .map(|worker| {
            thread::spawn(move || {
                let _ = Box::new(worker);
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    println!("\nfinal memory state:");
    ALLOCATOR.print_memory();
}
