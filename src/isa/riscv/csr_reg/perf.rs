//! Machine-mode performance counters (MHPMCOUNTER3..31) and their
//! event-number assignments (MHPMEVENT3..31).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Countable events. Writing an event number into an MHPMEVENT CSR makes
/// the corresponding counter increment on that event.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
pub enum EventNumber {
    None = 0,
    Ecall = 1,
    Ebreak = 2,
    Fence = 3,
    Fencei = 4,
    Mret = 5,
    Alu = 6,
    Mul = 7,
    Div = 8,
    Load = 9,
    MisalignLoad = 10,
    Store = 11,
    MisalignStore = 12,
    Lr = 13,
    Sc = 14,
    Atomic = 15,
    CsrRead = 16,
    CsrWrite = 17,
    CsrReadWrite = 18,
    Branch = 19,
    BranchTaken = 20,
    InstCommitted = 21,
    Inst16Committed = 22,
    Inst32Committed = 23,
    InstAligned = 24,
    Exception = 25,
    ExternalInterrupt = 26,
    TimerInterrupt = 27,
}

pub const PERF_COUNTER_COUNT: usize = 29; // mhpmcounter3..31

/// Counter storage plus the event-to-counter wiring. Counter words are
/// shared with the CSR file through `Arc<AtomicU64>` so that CSR reads see
/// live increments.
pub struct PerfRegs {
    counters: Vec<Arc<AtomicU64>>,
    /// Event currently assigned to each counter (raw MHPMEVENT value).
    assigned: Vec<u32>,
    /// Event number -> indices of counters incrementing on it.
    event_counters: HashMap<u32, Vec<usize>>,
}

impl PerfRegs {
    pub fn new() -> Self {
        Self {
            counters: (0..PERF_COUNTER_COUNT)
                .map(|_| Arc::new(AtomicU64::new(0)))
                .collect(),
            assigned: vec![0; PERF_COUNTER_COUNT],
            event_counters: HashMap::new(),
        }
    }

    pub fn counter_cell(&self, ix: usize) -> Arc<AtomicU64> {
        self.counters[ix].clone()
    }

    /// Rewire counter `ix` to count `event` (raw MHPMEVENT value; unknown
    /// events simply never fire).
    pub fn assign_event_to_counter(&mut self, event: u32, ix: usize) {
        let old = self.assigned[ix];
        if let Some(list) = self.event_counters.get_mut(&old) {
            list.retain(|c| *c != ix);
        }
        self.assigned[ix] = event;
        self.event_counters.entry(event).or_default().push(ix);
    }

    pub fn update_counters(&self, event: EventNumber) {
        let number: u32 = event.into();
        if let Some(list) = self.event_counters.get(&number) {
            for ix in list {
                self.counters[*ix].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn reset(&mut self) {
        for c in &self.counters {
            c.store(0, Ordering::Relaxed);
        }
        self.assigned = vec![0; PERF_COUNTER_COUNT];
        self.event_counters.clear();
    }
}

impl Default for PerfRegs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_and_update() {
        let mut pregs = PerfRegs::new();
        pregs.assign_event_to_counter(EventNumber::Load.into(), 0);
        pregs.assign_event_to_counter(EventNumber::Load.into(), 5);
        pregs.assign_event_to_counter(EventNumber::Store.into(), 1);

        pregs.update_counters(EventNumber::Load);
        pregs.update_counters(EventNumber::Load);
        pregs.update_counters(EventNumber::Store);

        assert_eq!(pregs.counter_cell(0).load(Ordering::Relaxed), 2);
        assert_eq!(pregs.counter_cell(5).load(Ordering::Relaxed), 2);
        assert_eq!(pregs.counter_cell(1).load(Ordering::Relaxed), 1);
        assert_eq!(pregs.counter_cell(2).load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_reassignment_unwires_old_event() {
        let mut pregs = PerfRegs::new();
        pregs.assign_event_to_counter(EventNumber::Branch.into(), 3);
        pregs.update_counters(EventNumber::Branch);
        pregs.assign_event_to_counter(EventNumber::Div.into(), 3);
        pregs.update_counters(EventNumber::Branch);
        pregs.update_counters(EventNumber::Div);
        assert_eq!(pregs.counter_cell(3).load(Ordering::Relaxed), 2);
    }
}
