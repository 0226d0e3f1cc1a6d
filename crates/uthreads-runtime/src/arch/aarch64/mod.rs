//! aarch64 context capture/restore
//!
//! AAPCS64: x19-x28, the frame pointer, the link register, sp and the low
//! halves of v8-v15 are callee-saved.

use std::arch::naked_asm;
use uthreads_core::constants::STACK_ALIGN;

/// Saved execution state
///
/// Field offsets are hard-coded in the assembly below.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub sp: u64,      // 0x00
    pub pc: u64,      // 0x08, loaded into x30 and returned through
    pub x19_x28: [u64; 10], // 0x10..0x60
    pub fp: u64,      // 0x60
    pub d8_d15: [u64; 8], // 0x68..0xA8
}

impl Registers {
    /// A context that has not been captured yet
    pub const fn new() -> Self {
        Self {
            sp: 0,
            pc: 0,
            x19_x28: [0; 10],
            fp: 0,
            d8_d15: [0; 8],
        }
    }
}

/// Prepare a context that runs `entry` on a fresh stack
///
/// # Safety
///
/// `stack_top` must be the exclusive upper end of a writable stack that
/// outlives every use of `regs`.
#[inline]
pub unsafe fn init_context(regs: &mut Registers, stack_top: *mut u8, entry: extern "C" fn()) {
    *regs = Registers::new();
    regs.sp = ((stack_top as usize) & !(STACK_ALIGN - 1)) as u64;
    regs.pc = thread_trampoline as usize as u64;
    regs.x19_x28[0] = entry as usize as u64;
}

/// First code a fresh context executes
#[unsafe(naked)]
unsafe extern "C" fn thread_trampoline() {
    naked_asm!(
        "blr x19",
        // Entry functions terminate their thread and never come back
        "brk #0x1",
    );
}

/// Capture the caller's context
///
/// Returns `CAPTURED` (0) now and `RESUMED` (1) when restored.
///
/// # Safety
///
/// `regs` must be valid for writes. See the module docs of `arch` for the
/// frame lifetime rule.
#[unsafe(naked)]
pub unsafe extern "C" fn capture(_regs: *mut Registers) -> u32 {
    naked_asm!(
        "mov x9, sp",
        "str x9, [x0, #0x00]",
        "str x30, [x0, #0x08]",
        "stp x19, x20, [x0, #0x10]",
        "stp x21, x22, [x0, #0x20]",
        "stp x23, x24, [x0, #0x30]",
        "stp x25, x26, [x0, #0x40]",
        "stp x27, x28, [x0, #0x50]",
        "str x29, [x0, #0x60]",
        "stp d8, d9, [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        "mov w0, #0",
        "ret",
    );
}

/// Transfer control to a captured or initialized context
///
/// # Safety
///
/// `regs` must come from `capture` whose calling frame is still live, or
/// from `init_context` whose stack is still mapped.
#[unsafe(naked)]
pub unsafe extern "C" fn restore(_regs: *const Registers) -> ! {
    naked_asm!(
        "ldp x19, x20, [x0, #0x10]",
        "ldp x21, x22, [x0, #0x20]",
        "ldp x23, x24, [x0, #0x30]",
        "ldp x25, x26, [x0, #0x40]",
        "ldp x27, x28, [x0, #0x50]",
        "ldr x29, [x0, #0x60]",
        "ldp d8, d9, [x0, #0x68]",
        "ldp d10, d11, [x0, #0x78]",
        "ldp d12, d13, [x0, #0x88]",
        "ldp d14, d15, [x0, #0x98]",
        "ldr x30, [x0, #0x08]",
        "ldr x9, [x0, #0x00]",
        "mov sp, x9",
        "mov w0, #1",
        "ret",
    );
}
