//! Stack mappings for spawned threads
//!
//! Each spawned thread owns exactly one `Stack`: an anonymous mapping with a
//! guard page at its low end. The mapping is released when the `Stack` is
//! dropped, which happens once, on slot reuse or at teardown.
//!
//! ```text
//! base                                                    base + mapped
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ guard (NONE) │ usable stack (RW), grows down ◄──────────    │ top
//! └──────────────┴──────────────────────────────────────────────┘
//! ```

mod unix;

pub use unix::page_size;

/// An owned, fixed-size thread stack
pub struct Stack {
    /// Start of the mapping (guard page)
    base: *mut u8,

    /// Total mapped length including the guard
    mapped: usize,

    /// Guard length, one page
    guard: usize,
}

impl Stack {
    /// Highest address + 1; initial stack pointers are derived from this
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.mapped) }
    }

    /// Lowest usable address (just above the guard page)
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        unsafe { self.base.add(self.guard) }
    }

    /// Usable bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.mapped - self.guard
    }

    /// Check whether `addr` lies in the usable part of this stack
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.bottom() as usize && addr < self.top() as usize
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.bottom())
            .field("top", &self.top())
            .field("size", &self.size())
            .finish()
    }
}

/// Round up to a whole number of pages
#[inline]
pub fn round_to_pages(size: usize) -> usize {
    let page = page_size();
    size.div_ceil(page) * page
}
