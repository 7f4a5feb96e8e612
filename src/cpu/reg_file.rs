use std::fmt::Debug;

use crate::utils::{Word, INT_REG_COUNT, INT_REG_NAME};

/// Integer register file. `x0` reads as zero and ignores writes. The index
/// and pre-write value of the most recent write are kept until
/// [`RegFile::clear_last_written`] so that tracing and speculative rollback
/// can observe them.
pub struct RegFile<W: Word> {
    data: [W; INT_REG_COUNT],
    last_written: Option<u8>,
    prev_value: W,
}

impl<W: Word> RegFile<W> {
    pub fn new() -> Self {
        Self {
            data: [W::ZERO; INT_REG_COUNT],
            last_written: None,
            prev_value: W::ZERO,
        }
    }

    pub fn read(&self, ix: u8) -> W {
        self.data[ix as usize]
    }

    pub fn write(&mut self, ix: u8, value: W) {
        if ix == 0 {
            return;
        }
        self.prev_value = self.data[ix as usize];
        self.data[ix as usize] = value;
        self.last_written = Some(ix);
    }

    /// Like write but does not record a change.
    pub fn poke(&mut self, ix: u8, value: W) {
        if ix == 0 {
            return;
        }
        self.data[ix as usize] = value;
    }

    pub fn last_written(&self) -> Option<u8> {
        self.last_written
    }

    pub fn last_written_with_prev(&self) -> Option<(u8, W)> {
        self.last_written.map(|ix| (ix, self.prev_value))
    }

    pub fn clear_last_written(&mut self) {
        self.last_written = None;
    }

    pub fn reset(&mut self) {
        self.data = [W::ZERO; INT_REG_COUNT];
        self.clear_last_written();
    }
}

impl<W: Word> Debug for RegFile<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "reg_file {{")?;
        for (i, val) in self.data.iter().enumerate() {
            if *val == W::ZERO {
                continue;
            }
            writeln!(f, "  {}: {:#x}", INT_REG_NAME[i], val)?;
        }
        write!(f, "}}")
    }
}
