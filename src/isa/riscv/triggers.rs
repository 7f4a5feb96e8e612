//! Interface to the external debug-trigger engine.
//!
//! The address/opcode/data match logic lives outside this crate; the core
//! only consumes hit signals, forwards TDATA CSR traffic, and reads trigger
//! words back for trace encoding.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
}

pub trait TriggerUnit: Send {
    /// Any trigger armed at all (load/store or instruction)?
    fn has_active_trigger(&self) -> bool {
        false
    }

    /// Any instruction (address/opcode) trigger armed?
    fn has_active_inst_trigger(&self) -> bool {
        false
    }

    fn inst_addr_trigger_hit(&mut self, _addr: u64, _timing: TriggerTiming, _ie: bool) -> bool {
        false
    }

    fn inst_opcode_trigger_hit(&mut self, _inst: u32, _timing: TriggerTiming, _ie: bool) -> bool {
        false
    }

    fn ld_st_addr_trigger_hit(
        &mut self,
        _addr: u64,
        _timing: TriggerTiming,
        _is_load: bool,
        _ie: bool,
    ) -> bool {
        false
    }

    fn ld_st_data_trigger_hit(
        &mut self,
        _value: u64,
        _timing: TriggerTiming,
        _is_load: bool,
        _ie: bool,
    ) -> bool {
        false
    }

    /// Instruction-count trigger; polled after execution.
    fn icount_trigger_hit(&mut self) -> bool {
        false
    }

    /// Did the tripped trigger request debug-mode entry (vs a breakpoint
    /// exception)?
    fn has_enter_debug_mode_tripped(&self) -> bool {
        false
    }

    /// TDATA1..3 words of the given trigger, for trace emission.
    fn peek(&self, _trigger_ix: u32) -> Option<(u64, u64, u64)> {
        None
    }

    /// Forwarded write of TDATA1..3 (`which` is 1..=3). Returns false when
    /// the trigger does not exist or the word is not writable.
    fn write_tdata(&mut self, _trigger_ix: u32, _which: u32, _value: u64) -> bool {
        false
    }

    fn read_tdata(&self, _trigger_ix: u32, _which: u32) -> Option<u64> {
        None
    }

    fn count(&self) -> usize {
        0
    }
}

/// Default collaborator: no triggers defined.
pub struct NullTriggers;

impl TriggerUnit for NullTriggers {}
