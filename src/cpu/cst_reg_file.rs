use crate::utils::{Word, CST_REG_COUNT};

/// Auxiliary 4-entry custom register file (`q0`..`q3`), targeted by the
/// custom `getq`/`setq` opcodes. Unlike the integer file there is no
/// hard-wired zero register.
pub struct CstRegFile<W: Word> {
    data: [W; CST_REG_COUNT],
    last_written: Option<u8>,
    prev_value: W,
}

impl<W: Word> CstRegFile<W> {
    pub fn new() -> Self {
        Self {
            data: [W::ZERO; CST_REG_COUNT],
            last_written: None,
            prev_value: W::ZERO,
        }
    }

    pub fn read(&self, ix: u8) -> W {
        self.data[ix as usize]
    }

    pub fn write(&mut self, ix: u8, value: W) {
        self.prev_value = self.data[ix as usize];
        self.data[ix as usize] = value;
        self.last_written = Some(ix);
    }

    pub fn poke(&mut self, ix: u8, value: W) {
        self.data[ix as usize] = value;
    }

    pub fn last_written_with_prev(&self) -> Option<(u8, W)> {
        self.last_written.map(|ix| (ix, self.prev_value))
    }

    pub fn clear_last_written(&mut self) {
        self.last_written = None;
    }

    pub fn reset(&mut self) {
        self.data = [W::ZERO; CST_REG_COUNT];
        self.clear_last_written();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rw() {
        let mut q = CstRegFile::<u32>::new();
        q.write(0, 7);
        q.write(3, 9);
        assert_eq!(q.read(0), 7);
        assert_eq!(q.read(3), 9);
        assert_eq!(q.last_written_with_prev(), Some((3, 0)));
    }
}
