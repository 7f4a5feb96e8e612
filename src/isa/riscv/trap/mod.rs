pub mod trap_controller;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::utils::Word;

/// Synchronous exception causes (MCAUSE values).
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum ExceptionCause {
    InstAddrMisaligned = 0,
    InstAccessFault = 1,
    IllegalInst = 2,
    Breakpoint = 3,
    LoadAddrMisaligned = 4,
    LoadAccessFault = 5,
    StoreAddrMisaligned = 6,
    StoreAccessFault = 7,
    UserEnvCall = 8,
    SupervisorEnvCall = 9,
    MachineEnvCall = 11,
}

/// Asynchronous interrupt causes (MCAUSE values with the sign bit set).
///
/// The two internal timers and the local interrupt use the
/// implementation-defined high MIE/MIP bits; a different SoC wiring is a
/// one-line change here.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum InterruptCause {
    SupervisorSoftware = 1,
    MachineSoftware = 3,
    SupervisorTimer = 5,
    MachineTimer = 7,
    SupervisorExternal = 9,
    MachineExternal = 11,
    MachineIntTimer0 = 28,
    MachineIntTimer1 = 29,
    MachineLocal = 30,
}

/// Non-maskable-interrupt causes latched into MCAUSE on NMI entry. The bus
/// error causes come from the load/store speculation machinery.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive)]
pub enum NmiCause {
    Unknown = 0,
    StoreException = 0xF000_0000,
    LoadException = 0xF000_0001,
}

/// Why a run loop stopped (other than reaching its own limits).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Non-zero store to the to-host address. A value of 1 means the target
    /// program passed; anything else is a failure code.
    ToHost(u64),
    /// Target program exited (newlib exit emulation) with the given code.
    Exit(u64),
    /// More than 64 consecutive illegal instructions.
    IllegalStall,
}

impl StopReason {
    pub fn is_success(&self) -> bool {
        match self {
            StopReason::ToHost(v) => *v == 1,
            StopReason::Exit(code) => *code == 0,
            StopReason::IllegalStall => false,
        }
    }
}

/// Result of one instruction's semantic routine. Architectural exceptions
/// are dispatched inline (they mutate the hart through the trap controller);
/// only run-terminating conditions propagate, as ordinary values rather than
/// unwinding.
pub type ExecResult = Result<(), StopReason>;

/// MCAUSE encoding of an interrupt at the given register width.
pub fn interrupt_cause_value<W: Word>(cause: InterruptCause) -> W {
    let nr: u32 = cause.into();
    W::from_u64(nr as u64) | (W::ONE.shl(W::XLEN - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_numbers() {
        assert_eq!(u32::from(ExceptionCause::LoadAddrMisaligned), 4);
        assert_eq!(u32::from(ExceptionCause::MachineEnvCall), 11);
        assert_eq!(u32::from(InterruptCause::MachineTimer), 7);
        assert_eq!(u32::from(InterruptCause::MachineIntTimer0), 28);
        assert!(ExceptionCause::try_from(10u32).is_err());
    }

    #[test]
    fn test_interrupt_cause_value() {
        assert_eq!(
            interrupt_cause_value::<u32>(InterruptCause::MachineExternal),
            0x8000_000B
        );
        assert_eq!(
            interrupt_cause_value::<u64>(InterruptCause::MachineTimer),
            0x8000_0000_0000_0007
        );
    }

    #[test]
    fn test_stop_reason_success() {
        assert!(StopReason::ToHost(1).is_success());
        assert!(!StopReason::ToHost(3).is_success());
        assert!(StopReason::Exit(0).is_success());
        assert!(!StopReason::IllegalStall.is_success());
    }
}
