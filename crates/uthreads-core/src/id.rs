//! Thread identifier type

use core::fmt;

/// Identifier of a logical thread
///
/// This is a 32-bit value that indexes into the thread table. Ids are
/// stable for the life of a logical thread and only handed out again after
/// the thread that held them terminated.
/// The maximum value (u32::MAX) is reserved as a sentinel for "no thread".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    /// Sentinel value indicating no thread
    pub const NONE: ThreadId = ThreadId(u32::MAX);

    /// The thread that called `init`; lives as long as the library does
    pub const MAIN: ThreadId = ThreadId(0);

    /// Create a new ThreadId from a raw value
    #[inline]
    pub const fn new(id: u32) -> Self {
        ThreadId(id)
    }

    /// Get the raw u32 value
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get as usize for indexing
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Check if this is the NONE sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// Check if this is thread 0
    #[inline]
    pub const fn is_main(self) -> bool {
        self.0 == 0
    }

    /// Convert to Option
    #[inline]
    pub const fn to_option(self) -> Option<ThreadId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u32> for ThreadId {
    #[inline]
    fn from(id: u32) -> Self {
        ThreadId(id)
    }
}

impl From<ThreadId> for u32 {
    #[inline]
    fn from(id: ThreadId) -> Self {
        id.0
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "ThreadId(NONE)")
        } else {
            write!(f, "ThreadId({})", self.0)
        }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        ThreadId::NONE
    }
}
