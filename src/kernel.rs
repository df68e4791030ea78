use std::ptr::NonNull;

/// Abstraction over the low level memory services of the operating system.
/// The allocator only needs three things from the platform: page aligned
/// anonymous mappings, a way to hand them back, and the page size used to
/// round region sizes.
trait PlatformMemory {
    /// Requests a private anonymous mapping of `len` bytes. Returns `None`
    /// if the kernel refuses, which the allocator surfaces as a null result
    /// instead of aborting.
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;

    /// Returns the mapping of `len` bytes starting at `addr` to the kernel.
    unsafe fn return_memory(addr: NonNull<u8>, len: usize);

    /// Virtual memory page size of the machine in bytes.
    fn page_size() -> usize;
}

/// Platform-dependent entry point. One implementation per supported OS
/// below, everything above this module talks through the wrappers.
pub(crate) struct Kernel;

#[inline]
pub(crate) unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
    unsafe { Kernel::request_memory(len) }
}

#[inline]
pub(crate) unsafe fn return_memory(addr: NonNull<u8>, len: usize) {
    unsafe { Kernel::return_memory(addr, len) }
}

#[inline]
pub(crate) fn page_size() -> usize {
    Kernel::page_size()
}

#[cfg(unix)]
mod unix {
    use std::{
        os::raw::{c_int, c_void},
        ptr::NonNull,
    };

    use libc::{mmap, munmap, off_t, size_t};

    use super::{Kernel, PlatformMemory};

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-write, process private, not backed by any file.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                let addr = mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET);

                if addr == libc::MAP_FAILED {
                    None
                } else {
                    Some(NonNull::new_unchecked(addr).cast::<u8>())
                }
            }
        }

        unsafe fn return_memory(addr: NonNull<u8>, len: usize) {
            unsafe {
                munmap(addr.as_ptr() as *mut c_void, len as size_t);
            }
        }

        fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{mem::MaybeUninit, os::raw::c_void, ptr::NonNull};

    use windows::Win32::System::{Memory, SystemInformation};

    use super::{Kernel, PlatformMemory};

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            let protection = Memory::PAGE_READWRITE;
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast())
            }
        }

        unsafe fn return_memory(addr: NonNull<u8>, _len: usize) {
            // MEM_RELEASE frees the whole reservation, the size must be 0.
            unsafe {
                let _ = Memory::VirtualFree(
                    addr.as_ptr() as *mut c_void,
                    0,
                    Memory::MEM_RELEASE,
                );
            }
        }

        fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }
}
