//! Per-opcode retirement frequencies and operand-value histograms.

use std::io::{self, Write};

use crate::isa::riscv::instruction::{instr_info, InstrId, INSTR_COUNT};

const SIGNED_BUCKETS: usize = 13;
const UNSIGNED_BUCKETS: usize = 7;

fn signed_bucket(val: i64) -> usize {
    if val < 0 {
        if val <= -64 * 1024 {
            0
        } else if val <= -1024 {
            1
        } else if val <= -16 {
            2
        } else if val < -2 {
            3
        } else if val == -2 {
            4
        } else {
            5
        }
    } else if val == 0 {
        6
    } else if val == 1 {
        7
    } else if val == 2 {
        8
    } else if val <= 16 {
        9
    } else if val <= 1024 {
        10
    } else if val <= 64 * 1024 {
        11
    } else {
        12
    }
}

fn unsigned_bucket(val: u64) -> usize {
    if val == 0 {
        0
    } else if val == 1 {
        1
    } else if val == 2 {
        2
    } else if val <= 16 {
        3
    } else if val <= 1024 {
        4
    } else if val <= 64 * 1024 {
        5
    } else {
        6
    }
}

const SIGNED_LABELS: [&str; SIGNED_BUCKETS] = [
    "<= -64k", "<= -1k", "<= -16", "< -2", "-2", "-1", "0", "1", "2", "<= 16", "<= 1k", "<= 64k",
    "> 64k",
];

const UNSIGNED_LABELS: [&str; UNSIGNED_BUCKETS] = ["0", "1", "2", "<= 16", "<= 1k", "<= 64k", "> 64k"];

/// One instruction's profile: retirement count plus histograms of its first
/// and second source-operand values.
#[derive(Clone)]
struct InstrProfile {
    freq: u64,
    src1: Vec<u64>,
    src2: Vec<u64>,
}

impl InstrProfile {
    fn new() -> Self {
        Self {
            freq: 0,
            src1: Vec::new(),
            src2: Vec::new(),
        }
    }
}

pub struct InstrStats {
    profiles: Vec<InstrProfile>,
}

impl InstrStats {
    pub fn new() -> Self {
        Self {
            profiles: vec![InstrProfile::new(); INSTR_COUNT],
        }
    }

    /// Record one retirement. Operand values are the register/immediate
    /// read-values at execution; bucketing signedness comes from the
    /// instruction-info table.
    pub fn record(&mut self, id: InstrId, src1: Option<u64>, src2: Option<u64>) {
        let unsigned = instr_info(id).is_unsigned;
        let profile = &mut self.profiles[id as usize];
        profile.freq += 1;
        for (val, histo) in [(src1, &mut profile.src1), (src2, &mut profile.src2)] {
            let Some(val) = val else { continue };
            if unsigned {
                if histo.is_empty() {
                    histo.resize(UNSIGNED_BUCKETS, 0);
                }
                histo[unsigned_bucket(val)] += 1;
            } else {
                if histo.is_empty() {
                    histo.resize(SIGNED_BUCKETS, 0);
                }
                histo[signed_bucket(val as i64)] += 1;
            }
        }
    }

    pub fn frequency(&self, id: InstrId) -> u64 {
        self.profiles[id as usize].freq
    }

    pub fn clear(&mut self) {
        self.profiles = vec![InstrProfile::new(); INSTR_COUNT];
    }

    /// Report non-zero opcode frequencies (descending) and their operand
    /// histograms.
    pub fn report(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut order: Vec<usize> = (0..INSTR_COUNT).collect();
        order.sort_by_key(|ix| std::cmp::Reverse(self.profiles[*ix].freq));

        for ix in order {
            let profile = &self.profiles[ix];
            if profile.freq == 0 {
                continue;
            }
            let name = self.name_of(ix);
            writeln!(out, "{} {}", name, profile.freq)?;
            for (tag, histo) in [("+hist1", &profile.src1), ("+hist2", &profile.src2)] {
                if histo.iter().all(|c| *c == 0) {
                    continue;
                }
                let labels: &[&str] = if histo.len() == UNSIGNED_BUCKETS {
                    &UNSIGNED_LABELS
                } else {
                    &SIGNED_LABELS
                };
                for (label, count) in labels.iter().zip(histo.iter()) {
                    if *count != 0 {
                        writeln!(out, "  {} {} {}", tag, label, count)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn name_of(&self, ix: usize) -> &'static str {
        // The profiles vector is index-aligned with the instruction table.
        crate::isa::riscv::instruction::instr_name_by_index(ix)
    }
}

impl Default for InstrStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(signed_bucket(-64 * 1024), 0);
        assert_eq!(signed_bucket(-1), 5);
        assert_eq!(signed_bucket(0), 6);
        assert_eq!(signed_bucket(2), 8);
        assert_eq!(signed_bucket(100_000), 12);
        assert_eq!(unsigned_bucket(0), 0);
        assert_eq!(unsigned_bucket(16), 3);
        assert_eq!(unsigned_bucket(100_000), 6);
    }

    #[test]
    fn test_record_and_report() {
        let mut stats = InstrStats::new();
        stats.record(InstrId::ADD, Some(5), Some(u64::MAX)); // -1 signed
        stats.record(InstrId::ADD, Some(0), None);
        stats.record(InstrId::SLTU, Some(3), Some(3));
        assert_eq!(stats.frequency(InstrId::ADD), 2);
        assert_eq!(stats.frequency(InstrId::SLTU), 1);

        let mut out = Vec::new();
        stats.report(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("add 2"));
        assert!(text.contains("sltu 1"));
        // -1 landed in the signed "-1" bucket for ADD's second operand.
        assert!(text.contains("+hist2 -1 1"));
    }
}
