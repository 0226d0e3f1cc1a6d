//! Unix stack implementation using mmap

use super::{round_to_pages, Stack};
use nix::errno::Errno;
use uthreads_core::constants::GUARD_SIZE;
use uthreads_core::error::SystemError;

/// System page size
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        GUARD_SIZE
    } else {
        size as usize
    }
}

#[cfg(target_os = "linux")]
const STACK_FLAGS: libc::c_int =
    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE | libc::MAP_STACK;

#[cfg(not(target_os = "linux"))]
const STACK_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

impl Stack {
    /// Map a stack with at least `size` usable bytes
    ///
    /// Usable size is rounded up to whole pages. The guard page below it stays
    /// PROT_NONE so an overflow faults instead of corrupting a neighbour.
    pub fn new(size: usize) -> Result<Self, SystemError> {
        let guard = page_size();
        let mapped = round_to_pages(size) + guard;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                STACK_FLAGS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(SystemError::StackMap(Errno::last() as i32));
        }

        let ret = unsafe { libc::mprotect(base, guard, libc::PROT_NONE) };
        if ret != 0 {
            let errno = Errno::last() as i32;
            unsafe {
                libc::munmap(base, mapped);
            }
            return Err(SystemError::StackProtect(errno));
        }

        Ok(Self {
            base: base as *mut u8,
            mapped,
            guard,
        })
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // munmap only fails for bad arguments, which we never construct
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.mapped);
        }
    }
}
