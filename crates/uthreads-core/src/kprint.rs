//! Kernel-style print macros for uthreads
//!
//! Leveled diagnostics on stderr. Once the runtime is up every leveled line
//! carries the id of the logical thread that was running when it was
//! written, e.g. `[DEBUG] [T3] thread 3 finished`.
//!
//! # Environment Variables
//!
//! - `UTHREADS_LOG_LEVEL=<level>` - off/error/warn/info/debug/trace or 0-5 (default info)
//! - `UTHREADS_FLUSH_EPRINT=1` - Flush stderr after each line
//!
//! # Usage
//!
//! ```ignore
//! use uthreads_core::{kdebug, kerror, kprintln};
//!
//! kprintln!("quantum table: {:?}", table);
//! kdebug!("spawned {} at priority {}", id, priority);
//! kerror!("{}", err);
//! ```
//!
//! The environment is read once, by [`init`].
//!
//! While a thread id is set, i.e. while the runtime is up, output never goes
//! through `std::io::stderr()`. Its lock is reentrant on the one OS thread
//! and guards a `RefCell`, so a write from the SIGVTALRM handler, or from a
//! thread switched in while another was suspended mid-write, would panic on
//! the second borrow. Each macro call is instead formatted into a buffer on
//! the stack and handed to `write(2)` on fd 2, which takes no lock and does
//! not allocate. Lines from different threads may interleave but never
//! abort the process.

use std::fmt;
use std::io::{self, Write};
#[cfg(unix)]
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::constants::THREAD_NONE;
use crate::env::{env_get_bool, env_get_opt};

/// Verbosity, ordered from quietest to loudest
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    const ALL: [LogLevel; 6] = [
        LogLevel::Off,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Numeric level; anything above 5 saturates to `Trace`
    pub fn from_u8(v: u8) -> Self {
        Self::ALL[usize::from(v.min(5))]
    }

    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse a level name or digit; unknown strings give `None`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return (n <= 5).then(|| Self::from_u8(n));
        }
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
    }

    fn tag(self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        LogLevel::parse(s).ok_or(())
    }
}

static LOADED: AtomicBool = AtomicBool::new(false);
static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static FLUSH: AtomicBool = AtomicBool::new(false);

// Running logical thread, THREAD_NONE outside the runtime
static THREAD_ID: AtomicU32 = AtomicU32::new(THREAD_NONE);

/// Load `UTHREADS_LOG_LEVEL` and `UTHREADS_FLUSH_EPRINT`
///
/// Runs at most once. The first log line triggers it too, but the runtime
/// calls it from `init` so the signal handler never reads the environment.
pub fn init() {
    if LOADED.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Some(level) = env_get_opt::<LogLevel>("UTHREADS_LOG_LEVEL") {
        LEVEL.store(level as u8, Ordering::Relaxed);
    }
    FLUSH.store(env_get_bool("UTHREADS_FLUSH_EPRINT", false), Ordering::Relaxed);
}

#[inline]
fn loaded() {
    if !LOADED.load(Ordering::Relaxed) {
        init();
    }
}

#[inline]
pub fn log_level() -> LogLevel {
    loaded();
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

/// Override the level; wins over the environment only after `init`
pub fn set_log_level(level: LogLevel) {
    loaded();
    LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn set_flush_enabled(enabled: bool) {
    loaded();
    FLUSH.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn flush_enabled() -> bool {
    loaded();
    FLUSH.load(Ordering::Relaxed)
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

/// Tag subsequent lines with `id`; the dispatcher calls this on every switch
#[inline]
pub fn set_thread_id(id: u32) {
    THREAD_ID.store(id, Ordering::Relaxed);
}

/// Stop tagging lines (runtime torn down)
#[inline]
pub fn clear_thread_id() {
    THREAD_ID.store(THREAD_NONE, Ordering::Relaxed);
}

/// Bytes formatted on the stack before each `write(2)`
const CHUNK: usize = 512;

/// Stack-buffered writer handing full chunks to `sink`
///
/// A line shorter than `CHUNK` reaches the sink in one piece.
struct ChunkWriter<F: FnMut(&[u8]) -> io::Result<()>> {
    buf: [u8; CHUNK],
    len: usize,
    sink: F,
}

impl<F: FnMut(&[u8]) -> io::Result<()>> ChunkWriter<F> {
    fn new(sink: F) -> Self {
        Self { buf: [0; CHUNK], len: 0, sink }
    }
}

impl<F: FnMut(&[u8]) -> io::Result<()>> Write for ChunkWriter<F> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.len == CHUNK {
            self.flush()?;
        }
        let n = data.len().min(CHUNK - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&data[..n]);
        self.len += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.len > 0 {
            let len = std::mem::replace(&mut self.len, 0);
            (self.sink)(&self.buf[..len])?;
        }
        Ok(())
    }
}

/// Unlocked, unbuffered write to fd 2
#[cfg(unix)]
fn write_fd2(bytes: &[u8]) -> io::Result<()> {
    use std::os::fd::FromRawFd;
    // Borrowed, never closed
    let mut stderr = ManuallyDrop::new(unsafe { std::fs::File::from_raw_fd(2) });
    stderr.write_all(bytes)
}

#[cfg(not(unix))]
fn write_fd2(bytes: &[u8]) -> io::Result<()> {
    io::stderr().write_all(bytes)
}

/// Format one leveled line into `out`
fn write_line(
    out: &mut dyn Write,
    level: LogLevel,
    thread: u32,
    args: fmt::Arguments<'_>,
) -> io::Result<()> {
    if thread == THREAD_NONE {
        write!(out, "{} ", level.tag())?;
    } else {
        write!(out, "{} [T{}] ", level.tag(), thread)?;
    }
    out.write_fmt(args)?;
    out.write_all(b"\n")
}

fn emit(body: impl FnOnce(&mut dyn Write) -> io::Result<()>) {
    if THREAD_ID.load(Ordering::Relaxed) != THREAD_NONE {
        let mut out = ChunkWriter::new(write_fd2);
        let _ = body(&mut out);
        let _ = out.flush();
        return;
    }
    let mut handle = io::stderr().lock();
    let _ = body(&mut handle);
    if flush_enabled() {
        let _ = handle.flush();
    }
}

#[doc(hidden)]
pub fn _kprint_impl(args: fmt::Arguments<'_>) {
    emit(|out| out.write_fmt(args));
}

#[doc(hidden)]
pub fn _kprintln_impl(args: fmt::Arguments<'_>) {
    emit(|out| {
        out.write_fmt(args)?;
        out.write_all(b"\n")
    });
}

#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let thread = THREAD_ID.load(Ordering::Relaxed);
    emit(|out| write_line(out, level, thread, args));
}

// ============================================================================
// Public Macros
// ============================================================================

/// Print to stderr (no newline, no level)
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::kprint::_kprint_impl(format_args!($($arg)*))
    };
}

/// Print a line to stderr regardless of level
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint::_kprintln_impl(format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::kprint::_kprintln_impl(format_args!($($arg)*))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __klog {
    ($level:ident, $($arg:tt)*) => {
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::$level, format_args!($($arg)*))
    };
}

/// Shown unless logging is off
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => { $crate::__klog!(Error, $($arg)*) };
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::__klog!(Warn, $($arg)*) };
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::__klog!(Info, $($arg)*) };
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::__klog!(Debug, $($arg)*) };
}

/// Per-dispatch detail
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::__klog!(Trace, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(level: LogLevel, thread: u32, args: fmt::Arguments<'_>) -> String {
        let mut buf = Vec::new();
        write_line(&mut buf, level, thread, args).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_from_u8_saturates() {
        assert_eq!(LogLevel::from_u8(0), LogLevel::Off);
        assert_eq!(LogLevel::from_u8(4), LogLevel::Debug);
        assert_eq!(LogLevel::from_u8(200), LogLevel::Trace);
    }

    #[test]
    fn test_parse_names_and_digits() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" warn "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("2"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("9"), None);
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!("trace".parse::<LogLevel>(), Ok(LogLevel::Trace));
    }

    #[test]
    fn test_line_tagging() {
        assert_eq!(
            line(LogLevel::Error, THREAD_NONE, format_args!("no runtime")),
            "[ERROR] no runtime\n"
        );
        assert_eq!(
            line(LogLevel::Debug, 3, format_args!("spawned {}", 4)),
            "[DEBUG] [T3] spawned 4\n"
        );
    }

    #[test]
    fn test_chunk_writer_keeps_short_lines_whole() {
        let mut writes: Vec<Vec<u8>> = Vec::new();
        {
            let mut out = ChunkWriter::new(|b: &[u8]| {
                writes.push(b.to_vec());
                Ok(())
            });
            write_line(&mut out, LogLevel::Trace, 1, format_args!("dispatch {} -> {}", 1, 2))
                .unwrap();
            out.flush().unwrap();
        }
        assert_eq!(writes, vec![b"[TRACE] [T1] dispatch 1 -> 2\n".to_vec()]);
    }

    #[test]
    fn test_chunk_writer_splits_long_output() {
        let mut written = Vec::new();
        let mut pieces = 0;
        {
            let mut out = ChunkWriter::new(|b: &[u8]| {
                assert!(b.len() <= CHUNK);
                written.extend_from_slice(b);
                pieces += 1;
                Ok(())
            });
            let long = "x".repeat(CHUNK * 2 + 10);
            write!(out, "{}", long).unwrap();
            out.flush().unwrap();
        }
        assert_eq!(written.len(), CHUNK * 2 + 10);
        assert_eq!(pieces, 3);
    }

    #[test]
    fn test_off_is_never_enabled() {
        assert!(!level_enabled(LogLevel::Off));
    }

    #[test]
    fn test_macros_expand() {
        set_log_level(LogLevel::Off);
        set_thread_id(3);
        kprint!("");
        kerror!("error {}", "msg");
        kwarn!("warn");
        kinfo!("info");
        kdebug!("debug");
        ktrace!("trace {}", 1);
        clear_thread_id();
    }
}
