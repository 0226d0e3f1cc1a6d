//! x86_64 context capture/restore
//!
//! Naked functions following the System V AMD64 ABI: only callee-saved
//! registers, the stack pointer, the resume address and the SSE/x87 control
//! words survive a switch. Everything else is dead across a call anyway.

use std::arch::naked_asm;
use uthreads_core::constants::STACK_ALIGN;

/// MXCSR power-on value: all exceptions masked, round to nearest
const DEFAULT_MXCSR: u32 = 0x1F80;

/// x87 control word power-on value
const DEFAULT_FPCW: u16 = 0x037F;

/// Saved execution state
///
/// Field offsets are hard-coded in the assembly below.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub rsp: u64,   // 0x00
    pub rip: u64,   // 0x08
    pub rbx: u64,   // 0x10
    pub rbp: u64,   // 0x18
    pub r12: u64,   // 0x20
    pub r13: u64,   // 0x28
    pub r14: u64,   // 0x30
    pub r15: u64,   // 0x38
    pub mxcsr: u32, // 0x40
    pub fpcw: u16,  // 0x44
    _pad: u16,
}

impl Registers {
    /// A context that has not been captured yet
    pub const fn new() -> Self {
        Self {
            rsp: 0,
            rip: 0,
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            mxcsr: DEFAULT_MXCSR,
            fpcw: DEFAULT_FPCW,
            _pad: 0,
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepare a context that runs `entry` on a fresh stack
///
/// `restore` enters the trampoline with a 16-byte aligned stack; the
/// trampoline's `call` then gives `entry` the ABI-mandated `rsp % 16 == 8`.
///
/// # Safety
///
/// `stack_top` must be the exclusive upper end of a writable stack that
/// outlives every use of `regs`.
#[inline]
pub unsafe fn init_context(regs: &mut Registers, stack_top: *mut u8, entry: extern "C" fn()) {
    let sp = (stack_top as usize) & !(STACK_ALIGN - 1);

    *regs = Registers::new();
    regs.rsp = sp as u64;
    regs.rip = thread_trampoline as usize as u64;
    regs.r12 = entry as usize as u64;
}

/// First code a fresh context executes
///
/// `rbp` is zero, which terminates frame-pointer walks here.
#[unsafe(naked)]
unsafe extern "C" fn thread_trampoline() {
    naked_asm!(
        "call r12",
        // Entry functions terminate their thread and never come back
        "ud2",
    );
}

/// Capture the caller's context
///
/// Returns `CAPTURED` (0) now. When `restore` is later called with the same
/// `regs`, execution continues as if this call returned `RESUMED` (1).
///
/// # Safety
///
/// `regs` must be valid for writes. See the module docs of `arch` for the
/// frame lifetime rule.
#[unsafe(naked)]
pub unsafe extern "C" fn capture(_regs: *mut Registers) -> u32 {
    naked_asm!(
        // Resume address is our return address
        "mov rax, [rsp]",
        "mov [rdi + 0x08], rax",
        // Stack pointer as the caller will see it after we return
        "lea rax, [rsp + 8]",
        "mov [rdi + 0x00], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        "stmxcsr dword ptr [rdi + 0x40]",
        "fnstcw word ptr [rdi + 0x44]",
        "xor eax, eax",
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
        "mov rbx, [rdi + 0x10]",
        "mov rbp, [rdi + 0x18]",
        "mov r12, [rdi + 0x20]",
        "mov r13, [rdi + 0x28]",
        "mov r14, [rdi + 0x30]",
        "mov r15, [rdi + 0x38]",
        "ldmxcsr dword ptr [rdi + 0x40]",
        "fldcw word ptr [rdi + 0x44]",
        "mov rsp, [rdi + 0x00]",
        "mov eax, 1",
        "jmp qword ptr [rdi + 0x08]",
    );
}
