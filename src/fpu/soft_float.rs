//! Soft-float operations on top of `rustc_apfloat`.
//!
//! Every arithmetic operation returns a [`StatusAnd`]; the raised status bits
//! play the role the host FP exception flags play in a hardware-float
//! implementation and are OR-ed into FCSR's accrued flags by the executor.

use rustc_apfloat::ieee::{Double, Single};
use rustc_apfloat::{Float, FloatConvert, Round as ApRound, Status, StatusAnd};

use crate::fpu::{FpClass, FpFlags, Round};

impl From<Round> for ApRound {
    fn from(value: Round) -> ApRound {
        match value {
            Round::NearestEven => ApRound::NearestTiesToEven,
            Round::Zero => ApRound::TowardZero,
            Round::Down => ApRound::TowardNegative,
            Round::Up => ApRound::TowardPositive,
            Round::NearestMax => ApRound::NearestTiesToAway,
            // Reserved/dynamic encodings are resolved or rejected before any
            // operation runs.
            Round::Invalid1 | Round::Invalid2 | Round::Dynamic => ApRound::NearestTiesToEven,
        }
    }
}

pub fn status_to_flags(status: Status) -> FpFlags {
    let mut flags = FpFlags::empty();
    if status.contains(Status::INEXACT) {
        flags |= FpFlags::INEXACT;
    }
    if status.contains(Status::UNDERFLOW) {
        flags |= FpFlags::UNDERFLOW;
    }
    if status.contains(Status::OVERFLOW) {
        flags |= FpFlags::OVERFLOW;
    }
    if status.contains(Status::DIV_BY_ZERO) {
        flags |= FpFlags::DIV_BY_ZERO;
    }
    if status.contains(Status::INVALID_OP) {
        flags |= FpFlags::INVALID;
    }
    flags
}

pub trait BinaryOpR<F: Float> {
    fn apply(a: F, b: F, round: Round) -> StatusAnd<F>;
}

pub trait TernaryOpR<F: Float> {
    fn apply(a: F, b: F, c: F, round: Round) -> StatusAnd<F>;
}

pub trait CmpOp<F: Float> {
    fn apply(a: F, b: F) -> StatusAnd<bool>;
}

macro_rules! define_binary_op_r {
    ($struct_name:ident, $method_name:ident) => {
        pub struct $struct_name;
        impl<F: Float> BinaryOpR<F> for $struct_name {
            fn apply(a: F, b: F, round: Round) -> StatusAnd<F> {
                a.$method_name(b, round.into())
            }
        }
    };
}

define_binary_op_r!(AddOp, add_r);
define_binary_op_r!(SubOp, sub_r);
define_binary_op_r!(MulOp, mul_r);
define_binary_op_r!(DivOp, div_r);

pub struct MulAddOp;
impl<F: Float> TernaryOpR<F> for MulAddOp {
    fn apply(a: F, b: F, c: F, round: Round) -> StatusAnd<F> {
        a.mul_add_r(b, c, round.into())
    }
}

pub struct MulSubOp;
impl<F: Float> TernaryOpR<F> for MulSubOp {
    fn apply(a: F, b: F, c: F, round: Round) -> StatusAnd<F> {
        a.mul_add_r(b, -c, round.into())
    }
}

pub struct NegMulAddOp;
impl<F: Float> TernaryOpR<F> for NegMulAddOp {
    fn apply(a: F, b: F, c: F, round: Round) -> StatusAnd<F> {
        (-a).mul_add_r(b, c, round.into())
    }
}

pub struct NegMulSubOp;
impl<F: Float> TernaryOpR<F> for NegMulSubOp {
    fn apply(a: F, b: F, c: F, round: Round) -> StatusAnd<F> {
        (-a).mul_add_r(b, -c, round.into())
    }
}

// Compare

pub struct EqOp;
impl<F: Float> CmpOp<F> for EqOp {
    fn apply(a: F, b: F) -> StatusAnd<bool> {
        // feq is a "quiet comparison": invalid only on a signaling NaN.
        if a.is_signaling() || b.is_signaling() {
            Status::INVALID_OP.and(false)
        } else {
            Status::OK.and(a == b)
        }
    }
}

pub struct LtOp;
impl<F: Float> CmpOp<F> for LtOp {
    fn apply(a: F, b: F) -> StatusAnd<bool> {
        // flt/fle are "signaling comparisons": invalid on any NaN input.
        if a.is_nan() || b.is_nan() {
            Status::INVALID_OP.and(false)
        } else {
            Status::OK.and(a < b)
        }
    }
}

pub struct LeOp;
impl<F: Float> CmpOp<F> for LeOp {
    fn apply(a: F, b: F) -> StatusAnd<bool> {
        if a.is_nan() || b.is_nan() {
            Status::INVALID_OP.and(false)
        } else {
            Status::OK.and(a <= b)
        }
    }
}

// Min/max with the RISC-V NaN and signed-zero rules.

pub fn fmin<F: Float>(a: F, b: F) -> StatusAnd<F> {
    let status = if a.is_signaling() || b.is_signaling() {
        Status::INVALID_OP
    } else {
        Status::OK
    };
    let value = if a.is_nan() && b.is_nan() {
        F::qnan(None)
    } else if a.is_nan() {
        b
    } else if b.is_nan() {
        a
    } else if a.is_zero() && b.is_zero() {
        // min(-0, +0) is -0 regardless of operand order.
        if a.is_negative() {
            a
        } else {
            b
        }
    } else if a < b {
        a
    } else {
        b
    };
    status.and(value)
}

pub fn fmax<F: Float>(a: F, b: F) -> StatusAnd<F> {
    let status = if a.is_signaling() || b.is_signaling() {
        Status::INVALID_OP
    } else {
        Status::OK
    };
    let value = if a.is_nan() && b.is_nan() {
        F::qnan(None)
    } else if a.is_nan() {
        b
    } else if b.is_nan() {
        a
    } else if a.is_zero() && b.is_zero() {
        if a.is_negative() {
            b
        } else {
            a
        }
    } else if a < b {
        b
    } else {
        a
    };
    status.and(value)
}

// Sign injection: magnitude from a, sign derived from b.

pub fn sign_inject<F: Float>(a: F, b: F) -> F {
    a.copy_sign(b)
}

pub fn sign_inject_neg<F: Float>(a: F, b: F) -> F {
    a.copy_sign(-b)
}

pub fn sign_inject_xor<F: Float>(a: F, b: F) -> F {
    if a.is_negative() != b.is_negative() {
        -a.abs()
    } else {
        a.abs()
    }
}

pub fn classify<F: Float>(f: F) -> FpClass {
    if f.is_normal() {
        if f.is_negative() {
            FpClass::NegNormal
        } else {
            FpClass::PosNormal
        }
    } else if f.is_denormal() {
        if f.is_negative() {
            FpClass::NegSubnormal
        } else {
            FpClass::PosSubnormal
        }
    } else if f.is_zero() {
        if f.is_negative() {
            FpClass::NegZero
        } else {
            FpClass::PosZero
        }
    } else if f.is_infinite() {
        if f.is_negative() {
            FpClass::NegInfinity
        } else {
            FpClass::PosInfinity
        }
    } else if f.is_signaling() {
        FpClass::SignalingNan
    } else {
        FpClass::QuietNan
    }
}

// Integer conversions. Saturation on out-of-range and NaN follows the
// apfloat convert-to-integer contract, which matches the RISC-V F tables.

pub fn to_signed<F: Float>(f: F, width: usize, round: Round) -> StatusAnd<i128> {
    let mut exact = false;
    let StatusAnd { mut status, value } = f.to_i128_r(width, round.into(), &mut exact);
    if !exact && !status.contains(Status::INVALID_OP) {
        status |= Status::INEXACT;
    }
    status.and(value)
}

pub fn to_unsigned<F: Float>(f: F, width: usize, round: Round) -> StatusAnd<u128> {
    let mut exact = false;
    let StatusAnd { mut status, value } = f.to_u128_r(width, round.into(), &mut exact);
    if !exact && !status.contains(Status::INVALID_OP) {
        status |= Status::INEXACT;
    }
    status.and(value)
}

pub fn from_signed<F: Float>(v: i128, round: Round) -> StatusAnd<F> {
    F::from_i128_r(v, round.into())
}

pub fn from_unsigned<F: Float>(v: u128, round: Round) -> StatusAnd<F> {
    F::from_u128_r(v, round.into())
}

pub fn convert<F: FloatConvert<T>, T: Float>(f: F, round: Round) -> StatusAnd<T> {
    let mut loses_info = false;
    f.convert_r(round.into(), &mut loses_info)
}

/// Square root through the host libm.
// TODO: replace with a correctly-rounded soft-float sqrt; rustc_apfloat has
// none and the host result is only exact under round-to-nearest-even.
pub trait HostSqrt: Float + Sized {
    fn sqrt(self) -> StatusAnd<Self>;
}

impl HostSqrt for Single {
    fn sqrt(self) -> StatusAnd<Self> {
        if self.is_nan() || (self.is_negative() && !self.is_zero()) {
            let status = if self.is_signaling() || !self.is_nan() {
                Status::INVALID_OP
            } else {
                Status::OK
            };
            return status.and(Single::qnan(None));
        }
        let host = f32::from_bits(self.to_bits() as u32);
        let root = host.sqrt();
        let status = if root * root == host {
            Status::OK
        } else {
            Status::INEXACT
        };
        status.and(Single::from_bits(root.to_bits() as u128))
    }
}

impl HostSqrt for Double {
    fn sqrt(self) -> StatusAnd<Self> {
        if self.is_nan() || (self.is_negative() && !self.is_zero()) {
            let status = if self.is_signaling() || !self.is_nan() {
                Status::INVALID_OP
            } else {
                Status::OK
            };
            return status.and(Double::qnan(None));
        }
        let host = f64::from_bits(self.to_bits() as u64);
        let root = host.sqrt();
        let status = if root * root == host {
            Status::OK
        } else {
            Status::INEXACT
        };
        status.and(Double::from_bits(root.to_bits() as u128))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: f32) -> Single {
        Single::from_bits(v.to_bits() as u128)
    }

    fn d(v: f64) -> Double {
        Double::from_bits(v.to_bits() as u128)
    }

    #[test]
    fn test_simple_arith() {
        let r = AddOp::apply(s(2.0), s(3.0), Round::NearestEven);
        assert_eq!(r.value.to_bits(), 5.0f32.to_bits() as u128);
        assert_eq!(r.status, Status::OK);

        let r = DivOp::apply(s(1.0), s(3.0), Round::NearestEven);
        assert!(r.status.contains(Status::INEXACT));

        let r = SubOp::apply(s(f32::INFINITY), s(f32::INFINITY), Round::NearestEven);
        assert!(r.status.contains(Status::INVALID_OP));
    }

    #[test]
    fn test_mul_add() {
        let r = MulAddOp::apply(d(1.5), d(2.0), d(0.5), Round::NearestEven);
        assert_eq!(r.value.to_bits(), (1.5f64 * 2.0 + 0.5).to_bits() as u128);
        let r = MulSubOp::apply(d(1.5), d(2.0), d(0.5), Round::NearestEven);
        assert_eq!(r.value.to_bits(), (1.5f64 * 2.0 - 0.5).to_bits() as u128);
    }

    #[test]
    fn test_compare() {
        assert!(EqOp::apply(s(3.0), s(3.0)).value);
        assert_eq!(EqOp::apply(s(f32::NAN), s(3.0)).status, Status::OK);
        assert_eq!(
            EqOp::apply(Single::snan(None), s(3.0)).status,
            Status::INVALID_OP
        );
        assert_eq!(LtOp::apply(s(f32::NAN), s(3.0)).status, Status::INVALID_OP);
        assert!(LeOp::apply(s(1.0), s(1.0)).value);
    }

    #[test]
    fn test_min_max_zeroes_and_nans() {
        let r = fmin(s(-0.0), s(0.0));
        assert!(r.value.is_negative() && r.value.is_zero());
        let r = fmax(s(-0.0), s(0.0));
        assert!(!r.value.is_negative() && r.value.is_zero());

        let r = fmin(s(f32::NAN), s(2.0));
        assert_eq!(r.value.to_bits(), 2.0f32.to_bits() as u128);
        assert_eq!(r.status, Status::OK);

        let r = fmin(Single::snan(None), s(2.0));
        assert_eq!(r.status, Status::INVALID_OP);

        let r = fmax(s(f32::NAN), s(f32::NAN));
        assert!(r.value.is_nan());
    }

    #[test]
    fn test_sign_inject() {
        assert_eq!(
            sign_inject(s(1.5), s(-2.0)).to_bits(),
            (-1.5f32).to_bits() as u128
        );
        assert_eq!(
            sign_inject_neg(s(1.5), s(-2.0)).to_bits(),
            1.5f32.to_bits() as u128
        );
        assert_eq!(
            sign_inject_xor(s(-1.5), s(-2.0)).to_bits(),
            1.5f32.to_bits() as u128
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(s(0.0)), FpClass::PosZero);
        assert_eq!(classify(s(-0.0)), FpClass::NegZero);
        assert_eq!(classify(s(f32::INFINITY)), FpClass::PosInfinity);
        assert_eq!(classify(s(f32::from_bits(1))), FpClass::PosSubnormal);
        assert_eq!(classify(Single::snan(None)), FpClass::SignalingNan);
        assert_eq!(classify(Single::qnan(None)), FpClass::QuietNan);
        assert_eq!(classify(d(-1.0)), FpClass::NegNormal);
    }

    #[test]
    fn test_convert_saturation() {
        // -3e9 is out of i32 range: saturates to INT_MIN with invalid-op.
        let r = to_signed(s(-3e9), 32, Round::Zero);
        assert_eq!(r.value, i32::MIN as i128);
        assert!(r.status.contains(Status::INVALID_OP));

        let r = to_signed(s(-1.1), 32, Round::Zero);
        assert_eq!(r.value, -1);
        assert!(r.status.contains(Status::INEXACT));

        let r = to_signed(s(-1.0), 32, Round::Zero);
        assert_eq!(r.value, -1);
        assert_eq!(r.status, Status::OK);
    }

    #[test]
    fn test_widening_convert() {
        let r: StatusAnd<Double> = convert(s(1.5), Round::NearestEven);
        assert_eq!(r.value.to_bits(), (1.5f64).to_bits() as u128);
        assert_eq!(r.status, Status::OK);
    }

    #[test]
    fn test_sqrt() {
        let r = s(4.0).sqrt();
        assert_eq!(r.value.to_bits(), 2.0f32.to_bits() as u128);
        assert_eq!(r.status, Status::OK);

        let r = s(-1.0).sqrt();
        assert!(r.value.is_nan());
        assert!(r.status.contains(Status::INVALID_OP));

        let r = s(2.0).sqrt();
        assert!(r.status.contains(Status::INEXACT));
    }
}
