use crate::utils::FP_REG_COUNT;

/// Canonical single-precision quiet NaN, produced when a register that does
/// not hold a properly NaN-boxed single is read as single.
pub const CANONICAL_NAN_F32: u32 = 0x7FC0_0000;

const NAN_BOX: u64 = 0xFFFF_FFFF_0000_0000;

/// Floating-point register file: 32 64-bit registers. Single-precision
/// values are NaN-boxed (upper 32 bits all ones).
pub struct FloatRegFile {
    data: [u64; FP_REG_COUNT],
    last_written: Option<u8>,
    prev_value: u64,
}

impl FloatRegFile {
    pub fn new() -> Self {
        Self {
            data: [0; FP_REG_COUNT],
            last_written: None,
            prev_value: 0,
        }
    }

    /// Bit pattern of the register seen as a single. A register whose upper
    /// half is not all-ones yields the canonical NaN.
    pub fn read_single(&self, ix: u8) -> u32 {
        let bits = self.data[ix as usize];
        if bits & NAN_BOX != NAN_BOX {
            CANONICAL_NAN_F32
        } else {
            bits as u32
        }
    }

    pub fn write_single(&mut self, ix: u8, bits: u32) {
        self.record(ix);
        self.data[ix as usize] = NAN_BOX | bits as u64;
    }

    pub fn read_double(&self, ix: u8) -> u64 {
        self.data[ix as usize]
    }

    pub fn write_double(&mut self, ix: u8, bits: u64) {
        self.record(ix);
        self.data[ix as usize] = bits;
    }

    /// Raw 64-bit storage, NaN boxing and all.
    pub fn read_bits(&self, ix: u8) -> u64 {
        self.data[ix as usize]
    }

    /// Like a write but does not record a change.
    pub fn poke_bits(&mut self, ix: u8, bits: u64) {
        self.data[ix as usize] = bits;
    }

    fn record(&mut self, ix: u8) {
        self.prev_value = self.data[ix as usize];
        self.last_written = Some(ix);
    }

    pub fn last_written(&self) -> Option<u8> {
        self.last_written
    }

    pub fn last_written_with_prev(&self) -> Option<(u8, u64)> {
        self.last_written.map(|ix| (ix, self.prev_value))
    }

    pub fn clear_last_written(&mut self) {
        self.last_written = None;
    }

    pub fn reset(&mut self) {
        self.data = [0; FP_REG_COUNT];
        self.clear_last_written();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_boxing() {
        let mut reg = FloatRegFile::new();
        reg.write_single(1, 1.5f32.to_bits());
        assert_eq!(reg.read_single(1), 1.5f32.to_bits());
        assert_eq!(reg.read_bits(1) >> 32, 0xFFFF_FFFF);

        // A double write destroys the boxing: single read sees the
        // canonical NaN.
        reg.write_double(1, 1.5f64.to_bits());
        assert_eq!(reg.read_single(1), CANONICAL_NAN_F32);
        assert_eq!(reg.read_double(1), 1.5f64.to_bits());
    }

    #[test]
    fn test_fresh_register_reads_as_nan() {
        let reg = FloatRegFile::new();
        assert_eq!(reg.read_single(7), CANONICAL_NAN_F32);
        assert_eq!(reg.read_double(7), 0);
    }

    #[test]
    fn test_last_written() {
        let mut reg = FloatRegFile::new();
        reg.write_double(2, 100);
        reg.write_double(2, 200);
        assert_eq!(reg.last_written_with_prev(), Some((2, 100)));
        reg.poke_bits(2, 300);
        assert_eq!(reg.read_bits(2), 300);
        assert_eq!(reg.last_written_with_prev(), Some((2, 100)));
    }
}
