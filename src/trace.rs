//! Trace-record formatting: one text line per modified resource per retired
//! instruction, serialized process-wide so multi-hart output never
//! interleaves within a line.

use std::io::Write;
use std::sync::Mutex;

use lazy_static::lazy_static;
use smallvec::SmallVec;

lazy_static! {
    /// Serializes trace and stderr reporting across harts.
    pub static ref OUTPUT_MUTEX: Mutex<()> = Mutex::new(());
}

/// One architectural-resource change: `r` integer register, `f` FP register,
/// `c` CSR, `m` memory.
#[derive(Debug, Clone, Copy)]
pub struct TraceRecord {
    pub resource: char,
    pub addr: u64,
    pub value: u64,
}

pub type TraceRecords = SmallVec<[TraceRecord; 4]>;

/// Emit the records of one retired instruction. Records after the first are
/// joined with `  +` continuation lines. An empty record set emits the
/// synthetic `r 00 0` line.
#[allow(clippy::too_many_arguments)]
pub fn write_trace_records(
    out: &mut dyn Write,
    tag: u64,
    hart_id: u32,
    pc: u64,
    inst: u32,
    xlen: u32,
    records: &[TraceRecord],
    disasm: &str,
) {
    let _guard = OUTPUT_MUTEX.lock().unwrap();

    let width = (xlen / 4) as usize;
    let inst_str = if inst & 3 == 3 {
        format!("{:08x}", inst)
    } else {
        format!("{:04x}", inst as u16)
    };

    let mut emit = |record: &TraceRecord, first: bool| {
        if !first {
            let _ = writeln!(out, "  +");
        }
        let addr_str = match record.resource {
            'r' | 'f' => format!("{:02x}", record.addr),
            _ => format!("{:x}", record.addr),
        };
        let _ = write!(
            out,
            "#{} {} {:0width$x} {} {} {} {:0width$x}  {}",
            tag,
            hart_id,
            pc,
            inst_str,
            record.resource,
            addr_str,
            record.value,
            disasm,
            width = width
        );
    };

    if records.is_empty() {
        emit(
            &TraceRecord {
                resource: 'r',
                addr: 0,
                value: 0,
            },
            true,
        );
    } else {
        for (i, record) in records.iter().enumerate() {
            emit(record, i == 0);
        }
    }
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_record_line() {
        let mut out = Vec::new();
        let records = [TraceRecord {
            resource: 'r',
            addr: 1,
            value: 5,
        }];
        write_trace_records(&mut out, 1, 0, 0x8000_0000, 0x0050_0093, 32, &records, "addi");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#1 0 80000000 00500093 r 01 00000005  addi\n"
        );
    }

    #[test]
    fn test_continuation_lines() {
        let mut out = Vec::new();
        let records = [
            TraceRecord {
                resource: 'r',
                addr: 3,
                value: 7,
            },
            TraceRecord {
                resource: 'm',
                addr: 0x8000_1000,
                value: 0xAB,
            },
        ];
        write_trace_records(&mut out, 9, 1, 0x8000_0004, 0x2000, 32, &records, "sw");
        let text = String::from_utf8(out).unwrap();
        // Compressed instruction: 4 hex digits; the continued line ends in +.
        assert!(text.starts_with("#9 1 80000004 2000 r 03 00000007  sw  +\n"));
        assert!(text.ends_with("#9 1 80000004 2000 m 80001000 000000ab  sw\n"));
    }

    #[test]
    fn test_no_diff_synthesizes_x0_record() {
        let mut out = Vec::new();
        write_trace_records(&mut out, 2, 0, 0x10, 0x13, 32, &[], "addi");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#2 0 00000010 00000013 r 00 00000000  addi\n"
        );
    }
}
