pub mod exec_atomic_function;
pub mod exec_bitmanip_function;
pub mod exec_float_function;
pub mod exec_function;
pub mod exec_mapping;

use lazy_static::lazy_static;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    None,
    IntReg,
    FpReg,
    CstReg,
    CsReg,
    Imm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandMode {
    None,
    Read,
    Write,
    ReadWrite,
}

impl OperandMode {
    pub fn is_read(self) -> bool {
        matches!(self, OperandMode::Read | OperandMode::ReadWrite)
    }

    pub fn is_write(self) -> bool {
        matches!(self, OperandMode::Write | OperandMode::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandInfo {
    pub kind: OperandKind,
    pub mode: OperandMode,
}

/// Semantic category driving statistics and performance-counter events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrCategory {
    Int,
    Load,
    Store,
    Branch,
    Mul,
    Div,
    Atomic,
    Csr,
    Fp,
    System,
    Custom,
}

/// Per-opcode descriptor: operand kinds and access modes, semantic category,
/// and the signedness used when bucketing operand-value histograms.
#[derive(Debug, Clone)]
pub struct InstrInfo {
    pub id: InstrId,
    pub name: &'static str,
    pub category: InstrCategory,
    pub is_unsigned: bool,
    pub operands: [OperandInfo; 4],
}

impl InstrInfo {
    pub fn is_load(&self) -> bool {
        self.category == InstrCategory::Load
    }

    pub fn is_ith_operand_int_reg_source(&self, i: usize) -> bool {
        self.operands[i].kind == OperandKind::IntReg && self.operands[i].mode.is_read()
    }

    pub fn is_ith_operand_int_reg_dest(&self, i: usize) -> bool {
        self.operands[i].kind == OperandKind::IntReg && self.operands[i].mode.is_write()
    }
}

mod op {
    use super::{OperandInfo, OperandKind, OperandMode};

    const fn oi(kind: OperandKind, mode: OperandMode) -> OperandInfo {
        OperandInfo { kind, mode }
    }

    pub const NONE: OperandInfo = oi(OperandKind::None, OperandMode::None);
    pub const XW: OperandInfo = oi(OperandKind::IntReg, OperandMode::Write);
    pub const XR: OperandInfo = oi(OperandKind::IntReg, OperandMode::Read);
    pub const FW: OperandInfo = oi(OperandKind::FpReg, OperandMode::Write);
    pub const FR: OperandInfo = oi(OperandKind::FpReg, OperandMode::Read);
    pub const QW: OperandInfo = oi(OperandKind::CstReg, OperandMode::Write);
    pub const QR: OperandInfo = oi(OperandKind::CstReg, OperandMode::Read);
    pub const CSR: OperandInfo = oi(OperandKind::CsReg, OperandMode::ReadWrite);
    pub const IMM: OperandInfo = oi(OperandKind::Imm, OperandMode::Read);
}

const fn pad_operands<const N: usize>(given: [OperandInfo; N]) -> [OperandInfo; 4] {
    let mut out = [op::NONE; 4];
    let mut i = 0;
    while i < N {
        out[i] = given[i];
        i += 1;
    }
    out
}

macro_rules! define_instr_table {
    ( $( $variant:ident => { $name:literal, $cat:ident, unsigned: $uns:literal, ops: [$($opi:ident),*] } ),* $(,)? ) => {
        #[allow(non_camel_case_types)]
        #[repr(u16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum InstrId { $( $variant ),* }

        pub const INSTR_COUNT: usize = [$( InstrId::$variant ),*].len();

        fn build_instr_table() -> Vec<InstrInfo> {
            vec![ $( InstrInfo {
                id: InstrId::$variant,
                name: $name,
                category: InstrCategory::$cat,
                is_unsigned: $uns,
                operands: pad_operands([$( op::$opi ),*]),
            } ),* ]
        }
    };
}

define_instr_table! {
    ILLEGAL => { "illegal", System, unsigned: false, ops: [] },

    // RV32I
    LUI => { "lui", Int, unsigned: false, ops: [XW, IMM] },
    AUIPC => { "auipc", Int, unsigned: false, ops: [XW, IMM] },
    JAL => { "jal", Int, unsigned: false, ops: [XW, IMM] },
    JALR => { "jalr", Int, unsigned: false, ops: [XW, XR, IMM] },
    BEQ => { "beq", Branch, unsigned: false, ops: [XR, XR, IMM] },
    BNE => { "bne", Branch, unsigned: false, ops: [XR, XR, IMM] },
    BLT => { "blt", Branch, unsigned: false, ops: [XR, XR, IMM] },
    BGE => { "bge", Branch, unsigned: false, ops: [XR, XR, IMM] },
    BLTU => { "bltu", Branch, unsigned: true, ops: [XR, XR, IMM] },
    BGEU => { "bgeu", Branch, unsigned: true, ops: [XR, XR, IMM] },
    LB => { "lb", Load, unsigned: false, ops: [XW, XR, IMM] },
    LH => { "lh", Load, unsigned: false, ops: [XW, XR, IMM] },
    LW => { "lw", Load, unsigned: false, ops: [XW, XR, IMM] },
    LBU => { "lbu", Load, unsigned: true, ops: [XW, XR, IMM] },
    LHU => { "lhu", Load, unsigned: true, ops: [XW, XR, IMM] },
    SB => { "sb", Store, unsigned: false, ops: [XR, XR, IMM] },
    SH => { "sh", Store, unsigned: false, ops: [XR, XR, IMM] },
    SW => { "sw", Store, unsigned: false, ops: [XR, XR, IMM] },
    ADDI => { "addi", Int, unsigned: false, ops: [XW, XR, IMM] },
    SLTI => { "slti", Int, unsigned: false, ops: [XW, XR, IMM] },
    SLTIU => { "sltiu", Int, unsigned: true, ops: [XW, XR, IMM] },
    XORI => { "xori", Int, unsigned: true, ops: [XW, XR, IMM] },
    ORI => { "ori", Int, unsigned: true, ops: [XW, XR, IMM] },
    ANDI => { "andi", Int, unsigned: true, ops: [XW, XR, IMM] },
    SLLI => { "slli", Int, unsigned: true, ops: [XW, XR, IMM] },
    SRLI => { "srli", Int, unsigned: true, ops: [XW, XR, IMM] },
    SRAI => { "srai", Int, unsigned: false, ops: [XW, XR, IMM] },
    ADD => { "add", Int, unsigned: false, ops: [XW, XR, XR] },
    SUB => { "sub", Int, unsigned: false, ops: [XW, XR, XR] },
    SLL => { "sll", Int, unsigned: true, ops: [XW, XR, XR] },
    SLT => { "slt", Int, unsigned: false, ops: [XW, XR, XR] },
    SLTU => { "sltu", Int, unsigned: true, ops: [XW, XR, XR] },
    XOR => { "xor", Int, unsigned: true, ops: [XW, XR, XR] },
    SRL => { "srl", Int, unsigned: true, ops: [XW, XR, XR] },
    SRA => { "sra", Int, unsigned: false, ops: [XW, XR, XR] },
    OR => { "or", Int, unsigned: true, ops: [XW, XR, XR] },
    AND => { "and", Int, unsigned: true, ops: [XW, XR, XR] },
    FENCE => { "fence", System, unsigned: false, ops: [] },
    FENCE_I => { "fence.i", System, unsigned: false, ops: [] },
    ECALL => { "ecall", System, unsigned: false, ops: [] },
    EBREAK => { "ebreak", System, unsigned: false, ops: [] },

    // RV64I
    LWU => { "lwu", Load, unsigned: true, ops: [XW, XR, IMM] },
    LD => { "ld", Load, unsigned: false, ops: [XW, XR, IMM] },
    SD => { "sd", Store, unsigned: false, ops: [XR, XR, IMM] },
    ADDIW => { "addiw", Int, unsigned: false, ops: [XW, XR, IMM] },
    SLLIW => { "slliw", Int, unsigned: true, ops: [XW, XR, IMM] },
    SRLIW => { "srliw", Int, unsigned: true, ops: [XW, XR, IMM] },
    SRAIW => { "sraiw", Int, unsigned: false, ops: [XW, XR, IMM] },
    ADDW => { "addw", Int, unsigned: false, ops: [XW, XR, XR] },
    SUBW => { "subw", Int, unsigned: false, ops: [XW, XR, XR] },
    SLLW => { "sllw", Int, unsigned: true, ops: [XW, XR, XR] },
    SRLW => { "srlw", Int, unsigned: true, ops: [XW, XR, XR] },
    SRAW => { "sraw", Int, unsigned: false, ops: [XW, XR, XR] },

    // Zicsr
    CSRRW => { "csrrw", Csr, unsigned: true, ops: [XW, XR, CSR] },
    CSRRS => { "csrrs", Csr, unsigned: true, ops: [XW, XR, CSR] },
    CSRRC => { "csrrc", Csr, unsigned: true, ops: [XW, XR, CSR] },
    CSRRWI => { "csrrwi", Csr, unsigned: true, ops: [XW, IMM, CSR] },
    CSRRSI => { "csrrsi", Csr, unsigned: true, ops: [XW, IMM, CSR] },
    CSRRCI => { "csrrci", Csr, unsigned: true, ops: [XW, IMM, CSR] },

    // Privileged
    MRET => { "mret", System, unsigned: false, ops: [] },
    SRET => { "sret", System, unsigned: false, ops: [] },
    URET => { "uret", System, unsigned: false, ops: [] },
    WFI => { "wfi", System, unsigned: false, ops: [] },

    // M
    MUL => { "mul", Mul, unsigned: false, ops: [XW, XR, XR] },
    MULH => { "mulh", Mul, unsigned: false, ops: [XW, XR, XR] },
    MULHSU => { "mulhsu", Mul, unsigned: false, ops: [XW, XR, XR] },
    MULHU => { "mulhu", Mul, unsigned: true, ops: [XW, XR, XR] },
    DIV => { "div", Div, unsigned: false, ops: [XW, XR, XR] },
    DIVU => { "divu", Div, unsigned: true, ops: [XW, XR, XR] },
    REM => { "rem", Div, unsigned: false, ops: [XW, XR, XR] },
    REMU => { "remu", Div, unsigned: true, ops: [XW, XR, XR] },
    MULW => { "mulw", Mul, unsigned: false, ops: [XW, XR, XR] },
    DIVW => { "divw", Div, unsigned: false, ops: [XW, XR, XR] },
    DIVUW => { "divuw", Div, unsigned: true, ops: [XW, XR, XR] },
    REMW => { "remw", Div, unsigned: false, ops: [XW, XR, XR] },
    REMUW => { "remuw", Div, unsigned: true, ops: [XW, XR, XR] },

    // A
    LR_W => { "lr.w", Atomic, unsigned: false, ops: [XW, XR] },
    SC_W => { "sc.w", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOSWAP_W => { "amoswap.w", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOADD_W => { "amoadd.w", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOXOR_W => { "amoxor.w", Atomic, unsigned: true, ops: [XW, XR, XR] },
    AMOAND_W => { "amoand.w", Atomic, unsigned: true, ops: [XW, XR, XR] },
    AMOOR_W => { "amoor.w", Atomic, unsigned: true, ops: [XW, XR, XR] },
    AMOMIN_W => { "amomin.w", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOMAX_W => { "amomax.w", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOMINU_W => { "amominu.w", Atomic, unsigned: true, ops: [XW, XR, XR] },
    AMOMAXU_W => { "amomaxu.w", Atomic, unsigned: true, ops: [XW, XR, XR] },
    LR_D => { "lr.d", Atomic, unsigned: false, ops: [XW, XR] },
    SC_D => { "sc.d", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOSWAP_D => { "amoswap.d", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOADD_D => { "amoadd.d", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOXOR_D => { "amoxor.d", Atomic, unsigned: true, ops: [XW, XR, XR] },
    AMOAND_D => { "amoand.d", Atomic, unsigned: true, ops: [XW, XR, XR] },
    AMOOR_D => { "amoor.d", Atomic, unsigned: true, ops: [XW, XR, XR] },
    AMOMIN_D => { "amomin.d", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOMAX_D => { "amomax.d", Atomic, unsigned: false, ops: [XW, XR, XR] },
    AMOMINU_D => { "amominu.d", Atomic, unsigned: true, ops: [XW, XR, XR] },
    AMOMAXU_D => { "amomaxu.d", Atomic, unsigned: true, ops: [XW, XR, XR] },

    // F
    FLW => { "flw", Load, unsigned: false, ops: [FW, XR, IMM] },
    FSW => { "fsw", Store, unsigned: false, ops: [XR, FR, IMM] },
    FMADD_S => { "fmadd.s", Fp, unsigned: false, ops: [FW, FR, FR, FR] },
    FMSUB_S => { "fmsub.s", Fp, unsigned: false, ops: [FW, FR, FR, FR] },
    FNMSUB_S => { "fnmsub.s", Fp, unsigned: false, ops: [FW, FR, FR, FR] },
    FNMADD_S => { "fnmadd.s", Fp, unsigned: false, ops: [FW, FR, FR, FR] },
    FADD_S => { "fadd.s", Fp, unsigned: false, ops: [FW, FR, FR] },
    FSUB_S => { "fsub.s", Fp, unsigned: false, ops: [FW, FR, FR] },
    FMUL_S => { "fmul.s", Fp, unsigned: false, ops: [FW, FR, FR] },
    FDIV_S => { "fdiv.s", Fp, unsigned: false, ops: [FW, FR, FR] },
    FSQRT_S => { "fsqrt.s", Fp, unsigned: false, ops: [FW, FR] },
    FSGNJ_S => { "fsgnj.s", Fp, unsigned: false, ops: [FW, FR, FR] },
    FSGNJN_S => { "fsgnjn.s", Fp, unsigned: false, ops: [FW, FR, FR] },
    FSGNJX_S => { "fsgnjx.s", Fp, unsigned: false, ops: [FW, FR, FR] },
    FMIN_S => { "fmin.s", Fp, unsigned: false, ops: [FW, FR, FR] },
    FMAX_S => { "fmax.s", Fp, unsigned: false, ops: [FW, FR, FR] },
    FCVT_W_S => { "fcvt.w.s", Fp, unsigned: false, ops: [XW, FR] },
    FCVT_WU_S => { "fcvt.wu.s", Fp, unsigned: true, ops: [XW, FR] },
    FMV_X_W => { "fmv.x.w", Fp, unsigned: false, ops: [XW, FR] },
    FEQ_S => { "feq.s", Fp, unsigned: false, ops: [XW, FR, FR] },
    FLT_S => { "flt.s", Fp, unsigned: false, ops: [XW, FR, FR] },
    FLE_S => { "fle.s", Fp, unsigned: false, ops: [XW, FR, FR] },
    FCLASS_S => { "fclass.s", Fp, unsigned: false, ops: [XW, FR] },
    FCVT_S_W => { "fcvt.s.w", Fp, unsigned: false, ops: [FW, XR] },
    FCVT_S_WU => { "fcvt.s.wu", Fp, unsigned: true, ops: [FW, XR] },
    FMV_W_X => { "fmv.w.x", Fp, unsigned: false, ops: [FW, XR] },
    FCVT_L_S => { "fcvt.l.s", Fp, unsigned: false, ops: [XW, FR] },
    FCVT_LU_S => { "fcvt.lu.s", Fp, unsigned: true, ops: [XW, FR] },
    FCVT_S_L => { "fcvt.s.l", Fp, unsigned: false, ops: [FW, XR] },
    FCVT_S_LU => { "fcvt.s.lu", Fp, unsigned: true, ops: [FW, XR] },

    // D
    FLD => { "fld", Load, unsigned: false, ops: [FW, XR, IMM] },
    FSD => { "fsd", Store, unsigned: false, ops: [XR, FR, IMM] },
    FMADD_D => { "fmadd.d", Fp, unsigned: false, ops: [FW, FR, FR, FR] },
    FMSUB_D => { "fmsub.d", Fp, unsigned: false, ops: [FW, FR, FR, FR] },
    FNMSUB_D => { "fnmsub.d", Fp, unsigned: false, ops: [FW, FR, FR, FR] },
    FNMADD_D => { "fnmadd.d", Fp, unsigned: false, ops: [FW, FR, FR, FR] },
    FADD_D => { "fadd.d", Fp, unsigned: false, ops: [FW, FR, FR] },
    FSUB_D => { "fsub.d", Fp, unsigned: false, ops: [FW, FR, FR] },
    FMUL_D => { "fmul.d", Fp, unsigned: false, ops: [FW, FR, FR] },
    FDIV_D => { "fdiv.d", Fp, unsigned: false, ops: [FW, FR, FR] },
    FSQRT_D => { "fsqrt.d", Fp, unsigned: false, ops: [FW, FR] },
    FSGNJ_D => { "fsgnj.d", Fp, unsigned: false, ops: [FW, FR, FR] },
    FSGNJN_D => { "fsgnjn.d", Fp, unsigned: false, ops: [FW, FR, FR] },
    FSGNJX_D => { "fsgnjx.d", Fp, unsigned: false, ops: [FW, FR, FR] },
    FMIN_D => { "fmin.d", Fp, unsigned: false, ops: [FW, FR, FR] },
    FMAX_D => { "fmax.d", Fp, unsigned: false, ops: [FW, FR, FR] },
    FCVT_S_D => { "fcvt.s.d", Fp, unsigned: false, ops: [FW, FR] },
    FCVT_D_S => { "fcvt.d.s", Fp, unsigned: false, ops: [FW, FR] },
    FEQ_D => { "feq.d", Fp, unsigned: false, ops: [XW, FR, FR] },
    FLT_D => { "flt.d", Fp, unsigned: false, ops: [XW, FR, FR] },
    FLE_D => { "fle.d", Fp, unsigned: false, ops: [XW, FR, FR] },
    FCLASS_D => { "fclass.d", Fp, unsigned: false, ops: [XW, FR] },
    FCVT_W_D => { "fcvt.w.d", Fp, unsigned: false, ops: [XW, FR] },
    FCVT_WU_D => { "fcvt.wu.d", Fp, unsigned: true, ops: [XW, FR] },
    FCVT_D_W => { "fcvt.d.w", Fp, unsigned: false, ops: [FW, XR] },
    FCVT_D_WU => { "fcvt.d.wu", Fp, unsigned: true, ops: [FW, XR] },
    FCVT_L_D => { "fcvt.l.d", Fp, unsigned: false, ops: [XW, FR] },
    FCVT_LU_D => { "fcvt.lu.d", Fp, unsigned: true, ops: [XW, FR] },
    FMV_X_D => { "fmv.x.d", Fp, unsigned: false, ops: [XW, FR] },
    FCVT_D_L => { "fcvt.d.l", Fp, unsigned: false, ops: [FW, XR] },
    FCVT_D_LU => { "fcvt.d.lu", Fp, unsigned: true, ops: [FW, XR] },
    FMV_D_X => { "fmv.d.x", Fp, unsigned: false, ops: [FW, XR] },

    // Minor bit-manip extension
    CLZ => { "clz", Int, unsigned: true, ops: [XW, XR] },
    CTZ => { "ctz", Int, unsigned: true, ops: [XW, XR] },
    PCNT => { "pcnt", Int, unsigned: true, ops: [XW, XR] },
    ANDC => { "andc", Int, unsigned: true, ops: [XW, XR, XR] },
    SLO => { "slo", Int, unsigned: true, ops: [XW, XR, XR] },
    SRO => { "sro", Int, unsigned: true, ops: [XW, XR, XR] },
    SLOI => { "sloi", Int, unsigned: true, ops: [XW, XR, IMM] },
    SROI => { "sroi", Int, unsigned: true, ops: [XW, XR, IMM] },
    MIN => { "min", Int, unsigned: false, ops: [XW, XR, XR] },
    MINU => { "minu", Int, unsigned: true, ops: [XW, XR, XR] },
    MAX => { "max", Int, unsigned: false, ops: [XW, XR, XR] },
    MAXU => { "maxu", Int, unsigned: true, ops: [XW, XR, XR] },
    ROL => { "rol", Int, unsigned: true, ops: [XW, XR, XR] },
    ROR => { "ror", Int, unsigned: true, ops: [XW, XR, XR] },
    RORI => { "rori", Int, unsigned: true, ops: [XW, XR, IMM] },
    PACK => { "pack", Int, unsigned: true, ops: [XW, XR, XR] },

    // Custom q-register moves
    GETQ => { "getq", Custom, unsigned: true, ops: [XW, QR] },
    SETQ => { "setq", Custom, unsigned: true, ops: [QW, XR] },
}

lazy_static! {
    /// Process-wide immutable instruction-info table, shared across harts.
    static ref INSTR_TABLE: Vec<InstrInfo> = build_instr_table();
}

pub fn instr_info(id: InstrId) -> &'static InstrInfo {
    &INSTR_TABLE[id as usize]
}

pub fn instr_name_by_index(ix: usize) -> &'static str {
    INSTR_TABLE[ix].name
}

impl InstrId {
    pub fn name(self) -> &'static str {
        instr_info(self).name
    }

    pub fn info(self) -> &'static InstrInfo {
        instr_info(self)
    }
}

/// Operand values of a decoded instruction. Immediates are sign-extended at
/// decode; for CSR instructions `imm` carries the CSR number and, in the
/// immediate forms, `rs1` carries the 5-bit unsigned immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    R { rd: u8, rs1: u8, rs2: u8 },
    RRm { rd: u8, rs1: u8, rs2: u8, rm: u8 },
    R4Rm { rd: u8, rs1: u8, rs2: u8, rs3: u8, rm: u8 },
    I { rd: u8, rs1: u8, imm: i32 },
    S { rs1: u8, rs2: u8, imm: i32 },
    B { rs1: u8, rs2: u8, imm: i32 },
    U { rd: u8, imm: i32 },
    J { rd: u8, imm: i32 },
    A { rd: u8, rs1: u8, rs2: u8, aq: bool, rl: bool },
}

impl Operands {
    /// Value of the i-th operand slot, following the op0..op3 convention of
    /// the instruction-info table.
    pub fn slot(&self, i: usize) -> i64 {
        match *self {
            Operands::None => 0,
            Operands::R { rd, rs1, rs2 } | Operands::RRm { rd, rs1, rs2, .. } => {
                [rd as i64, rs1 as i64, rs2 as i64, 0][i]
            }
            Operands::R4Rm { rd, rs1, rs2, rs3, .. } => {
                [rd as i64, rs1 as i64, rs2 as i64, rs3 as i64][i]
            }
            Operands::I { rd, rs1, imm } => [rd as i64, rs1 as i64, imm as i64, 0][i],
            Operands::S { rs1, rs2, imm } | Operands::B { rs1, rs2, imm } => {
                [rs1 as i64, rs2 as i64, imm as i64, 0][i]
            }
            Operands::U { rd, imm } | Operands::J { rd, imm } => {
                [rd as i64, imm as i64, 0, 0][i]
            }
            Operands::A { rd, rs1, rs2, .. } => [rd as i64, rs1 as i64, rs2 as i64, 0][i],
        }
    }

    /// Integer registers this instruction reads, per the info table.
    pub fn int_reg_sources(&self, info: &InstrInfo) -> SmallVec<[u8; 3]> {
        let mut regs = SmallVec::new();
        for i in 0..4 {
            if info.is_ith_operand_int_reg_source(i) {
                regs.push(self.slot(i) as u8);
            }
        }
        regs
    }

    /// Integer destination register, if any.
    pub fn int_reg_dest(&self, info: &InstrInfo) -> Option<u8> {
        (0..4)
            .find(|&i| info.is_ith_operand_int_reg_dest(i))
            .map(|i| self.slot(i) as u8)
    }
}

/// A decoded instruction: opcode identity plus operand values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInst {
    pub id: InstrId,
    pub ops: Operands,
}

impl DecodedInst {
    pub fn illegal() -> Self {
        Self {
            id: InstrId::ILLEGAL,
            ops: Operands::None,
        }
    }

    pub fn info(&self) -> &'static InstrInfo {
        instr_info(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        for (i, info) in INSTR_TABLE.iter().enumerate() {
            assert_eq!(info.id as usize, i, "table order broken at {}", info.name);
        }
        assert_eq!(INSTR_TABLE.len(), INSTR_COUNT);
    }

    #[test]
    fn test_operand_metadata() {
        let info = instr_info(InstrId::SW);
        assert!(info.is_ith_operand_int_reg_source(0));
        assert!(info.is_ith_operand_int_reg_source(1));
        assert!(!info.is_ith_operand_int_reg_dest(0));

        let info = instr_info(InstrId::ADDI);
        assert!(info.is_ith_operand_int_reg_dest(0));
        assert!(info.is_ith_operand_int_reg_source(1));
        assert_eq!(info.operands[2].kind, OperandKind::Imm);

        let info = instr_info(InstrId::FMADD_S);
        assert_eq!(info.operands[3].kind, OperandKind::FpReg);
    }

    #[test]
    fn test_sources_and_dest() {
        let ops = Operands::R { rd: 5, rs1: 6, rs2: 7 };
        let info = instr_info(InstrId::ADD);
        assert_eq!(ops.int_reg_sources(info).as_slice(), &[6, 7]);
        assert_eq!(ops.int_reg_dest(info), Some(5));

        let ops = Operands::S { rs1: 2, rs2: 3, imm: -8 };
        let info = instr_info(InstrId::SW);
        assert_eq!(ops.int_reg_sources(info).as_slice(), &[2, 3]);
        assert_eq!(ops.int_reg_dest(info), None);

        // FP load: base register is a source, destination is an FP reg.
        let ops = Operands::I { rd: 4, rs1: 9, imm: 0 };
        let info = instr_info(InstrId::FLW);
        assert_eq!(ops.int_reg_sources(info).as_slice(), &[9]);
        assert_eq!(ops.int_reg_dest(info), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(InstrId::FCVT_WU_S.name(), "fcvt.wu.s");
        assert_eq!(InstrId::AMOMAXU_D.name(), "amomaxu.d");
    }
}
