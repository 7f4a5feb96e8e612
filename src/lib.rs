#![cfg_attr(debug_assertions, allow(dead_code))]

//! Instruction-accurate RISC-V simulator core.
//!
//! The crate models the complete architectural state transition of a single
//! hart per retired instruction, at 32- or 64-bit register width. Program
//! loading, command-line handling and the memory subsystem proper are the
//! embedding front-end's business; see [`mem::Memory`] for the consumed
//! memory contract.

pub mod cpu;
pub mod fpu;
pub mod isa;
pub mod logging;
pub mod mem;
pub mod stats;
pub mod trace;
pub mod utils;

use std::sync::atomic::{AtomicBool, Ordering};

pub use isa::riscv::csr_reg::{csr_index, PrivilegeMode};
pub use isa::riscv::hart::Hart;
pub use isa::riscv::trap::StopReason;
pub use isa::riscv::triggers::{NullTriggers, TriggerUnit};
pub use mem::{Memory, SimpleMemory};
pub use utils::Word;

/// Process-wide run-permission flag, checked by the run loops at step
/// boundaries. The front-end's SIGINT handler calls
/// [`request_user_stop`] to stop all harts gracefully.
static USER_OK: AtomicBool = AtomicBool::new(true);

pub fn request_user_stop() {
    USER_OK.store(false, Ordering::Relaxed);
}

pub(crate) fn set_user_ok(value: bool) {
    USER_OK.store(value, Ordering::Relaxed);
}

pub(crate) fn user_ok() -> bool {
    USER_OK.load(Ordering::Relaxed)
}
