pub mod soft_float;

use bitflags::bitflags;
use num_enum::TryFromPrimitive;

/// Rounding mode as encoded in an instruction's `rm` field or FCSR.FRM.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
pub enum Round {
    NearestEven = 0,
    Zero = 1,
    Down = 2,
    Up = 3,
    NearestMax = 4,
    Invalid1 = 5,
    Invalid2 = 6,
    Dynamic = 7,
}

bitflags! {
    /// Accrued exception flags, laid out exactly as FCSR/FFLAGS bits 4:0.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct FpFlags: u32 {
        const INEXACT    = 1 << 0;
        const UNDERFLOW  = 1 << 1;
        const OVERFLOW   = 1 << 2;
        const DIV_BY_ZERO = 1 << 3;
        const INVALID    = 1 << 4;
    }
}

/// FCLASS result categories; the discriminant is the result bit position.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FpClass {
    NegInfinity = 0,
    NegNormal = 1,
    NegSubnormal = 2,
    NegZero = 3,
    PosZero = 4,
    PosSubnormal = 5,
    PosNormal = 6,
    PosInfinity = 7,
    SignalingNan = 8,
    QuietNan = 9,
}

impl FpClass {
    pub fn to_mask(self) -> u32 {
        1 << (self as u32)
    }
}
