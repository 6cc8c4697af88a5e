//! Numeric kernels
//!
//! The dispatcher points the generic pop/apply/push helpers at these
//! operators. Semantics follow the execution section of the reference
//! specification exactly: shifts and rotations masked to the operand width,
//! division faults, IEEE-754 ordered comparisons, NaN-propagating min/max,
//! ties-to-even rounding, and trapping float-to-integer truncation.

use super::Interpreter;
use crate::error::{TrapReason, TrapResult};
use crate::state::ExecuteState;
use crate::value::Value;

impl Interpreter<'_> {
    /// Pop two operands of one type, push the operator's result, fall
    /// through.
    pub(crate) fn binop<T, R>(&mut self, f: impl FnOnce(T, T) -> R) -> TrapResult<ExecuteState>
    where
        T: TryFrom<Value, Error = TrapReason>,
        R: Into<Value>,
    {
        let b = T::try_from(self.pop()?)?;
        let a = T::try_from(self.pop()?)?;
        self.push(f(a, b).into());
        Ok(ExecuteState::Proceed)
    }

    /// Like [`Self::binop`] for operators that can trap.
    pub(crate) fn try_binop<T, R>(
        &mut self,
        f: impl FnOnce(T, T) -> TrapResult<R>,
    ) -> TrapResult<ExecuteState>
    where
        T: TryFrom<Value, Error = TrapReason>,
        R: Into<Value>,
    {
        let b = T::try_from(self.pop()?)?;
        let a = T::try_from(self.pop()?)?;
        self.push(f(a, b)?.into());
        Ok(ExecuteState::Proceed)
    }

    /// Pop one operand, push the operator's result, fall through.
    pub(crate) fn unop<T, R>(&mut self, f: impl FnOnce(T) -> R) -> TrapResult<ExecuteState>
    where
        T: TryFrom<Value, Error = TrapReason>,
        R: Into<Value>,
    {
        let a = T::try_from(self.pop()?)?;
        self.push(f(a).into());
        Ok(ExecuteState::Proceed)
    }

    /// Like [`Self::unop`] for operators that can trap.
    pub(crate) fn try_unop<T, R>(
        &mut self,
        f: impl FnOnce(T) -> TrapResult<R>,
    ) -> TrapResult<ExecuteState>
    where
        T: TryFrom<Value, Error = TrapReason>,
        R: Into<Value>,
    {
        let a = T::try_from(self.pop()?)?;
        self.push(f(a)?.into());
        Ok(ExecuteState::Proceed)
    }
}

/* INTEGER DIVISION */

pub(crate) fn i32_div_s(a: i32, b: i32) -> TrapResult<i32> {
    if b == 0 {
        return Err(TrapReason::DivisionByZero);
    }
    a.checked_div(b).ok_or(TrapReason::IntegerOverflow)
}

pub(crate) fn i32_rem_s(a: i32, b: i32) -> TrapResult<i32> {
    if b == 0 {
        return Err(TrapReason::DivisionByZero);
    }
    // MIN rem -1 is 0, not an overflow: remainder takes the dividend's sign.
    Ok(a.wrapping_rem(b))
}

pub(crate) fn i32_div_u(a: u32, b: u32) -> TrapResult<u32> {
    a.checked_div(b).ok_or(TrapReason::DivisionByZero)
}

pub(crate) fn i32_rem_u(a: u32, b: u32) -> TrapResult<u32> {
    a.checked_rem(b).ok_or(TrapReason::DivisionByZero)
}

pub(crate) fn i64_div_s(a: i64, b: i64) -> TrapResult<i64> {
    if b == 0 {
        return Err(TrapReason::DivisionByZero);
    }
    a.checked_div(b).ok_or(TrapReason::IntegerOverflow)
}

pub(crate) fn i64_rem_s(a: i64, b: i64) -> TrapResult<i64> {
    if b == 0 {
        return Err(TrapReason::DivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

pub(crate) fn i64_div_u(a: u64, b: u64) -> TrapResult<u64> {
    a.checked_div(b).ok_or(TrapReason::DivisionByZero)
}

pub(crate) fn i64_rem_u(a: u64, b: u64) -> TrapResult<u64> {
    a.checked_rem(b).ok_or(TrapReason::DivisionByZero)
}

/* FLOAT MIN/MAX/NEAREST */

pub(crate) fn f32_min(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    // Negative zero orders below positive zero.
    if a == b {
        return if a.is_sign_negative() { a } else { b };
    }
    if a < b {
        a
    } else {
        b
    }
}

pub(crate) fn f32_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    if a == b {
        return if a.is_sign_positive() { a } else { b };
    }
    if a > b {
        a
    } else {
        b
    }
}

pub(crate) fn f64_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == b {
        return if a.is_sign_negative() { a } else { b };
    }
    if a < b {
        a
    } else {
        b
    }
}

pub(crate) fn f64_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == b {
        return if a.is_sign_positive() { a } else { b };
    }
    if a > b {
        a
    } else {
        b
    }
}

pub(crate) fn f32_nearest(x: f32) -> f32 {
    let round = x.round();
    if (x - round).abs() != 0.5 {
        return round;
    }
    // Halfway case: round to the even neighbor.
    if round % 2.0 == 1.0 {
        x.floor()
    } else if round % 2.0 == -1.0 {
        x.ceil()
    } else {
        round
    }
}

pub(crate) fn f64_nearest(x: f64) -> f64 {
    let round = x.round();
    if (x - round).abs() != 0.5 {
        return round;
    }
    if round % 2.0 == 1.0 {
        x.floor()
    } else if round % 2.0 == -1.0 {
        x.ceil()
    } else {
        round
    }
}

/* TRAPPING TRUNCATION */

fn truncate_checked(x: f64, lo: f64, hi: f64) -> TrapResult<f64> {
    if x.is_nan() {
        return Err(TrapReason::InvalidConversionToInteger);
    }
    let t = x.trunc();
    if t < lo || t > hi {
        return Err(TrapReason::IntegerOverflow);
    }
    Ok(t)
}

pub(crate) fn i32_trunc_f32_s(x: f32) -> TrapResult<i32> {
    truncate_checked(f64::from(x), -2_147_483_648.0, 2_147_483_647.0).map(|t| t as i32)
}

pub(crate) fn i32_trunc_f32_u(x: f32) -> TrapResult<u32> {
    truncate_checked(f64::from(x), 0.0, 4_294_967_295.0).map(|t| t as u32)
}

pub(crate) fn i32_trunc_f64_s(x: f64) -> TrapResult<i32> {
    truncate_checked(x, -2_147_483_648.0, 2_147_483_647.0).map(|t| t as i32)
}

pub(crate) fn i32_trunc_f64_u(x: f64) -> TrapResult<u32> {
    truncate_checked(x, 0.0, 4_294_967_295.0).map(|t| t as u32)
}

pub(crate) fn i64_trunc_f32_s(x: f32) -> TrapResult<i64> {
    i64_trunc_f64_s(f64::from(x))
}

pub(crate) fn i64_trunc_f32_u(x: f32) -> TrapResult<u64> {
    i64_trunc_f64_u(f64::from(x))
}

pub(crate) fn i64_trunc_f64_s(x: f64) -> TrapResult<i64> {
    if x.is_nan() {
        return Err(TrapReason::InvalidConversionToInteger);
    }
    let t = x.trunc();
    // i64::MAX is not exactly representable; compare against the exclusive
    // upper bound instead.
    if t < -9_223_372_036_854_775_808.0 || t >= 9_223_372_036_854_775_808.0 {
        return Err(TrapReason::IntegerOverflow);
    }
    Ok(t as i64)
}

pub(crate) fn i64_trunc_f64_u(x: f64) -> TrapResult<u64> {
    if x.is_nan() {
        return Err(TrapReason::InvalidConversionToInteger);
    }
    let t = x.trunc();
    if t < 0.0 || t >= 18_446_744_073_709_551_616.0 {
        return Err(TrapReason::IntegerOverflow);
    }
    Ok(t as u64)
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn division_faults() {
        assert_eq!(i32_div_s(1, 0), Err(TrapReason::DivisionByZero));
        assert_eq!(i32_div_s(i32::MIN, -1), Err(TrapReason::IntegerOverflow));
        assert_eq!(i32_rem_s(i32::MIN, -1), Ok(0));
        assert_eq!(i64_div_u(10, 3), Ok(3));
        assert_eq!(i64_rem_u(10, 0), Err(TrapReason::DivisionByZero));
    }

    #[test]
    fn signed_remainder_takes_the_dividend_sign() {
        assert_eq!(i32_rem_s(-7, 3), Ok(-1));
        assert_eq!(i32_rem_s(7, -3), Ok(1));
        assert_eq!(i64_rem_s(-9, 4), Ok(-1));
    }

    #[test]
    fn min_max_propagate_nan_and_order_zeroes() {
        assert!(f32_min(f32::NAN, 1.0).is_nan());
        assert!(f64_max(1.0, f64::NAN).is_nan());
        assert!(f32_min(0.0, -0.0).is_sign_negative());
        assert!(f32_max(0.0, -0.0).is_sign_positive());
        assert_eq!(f64_min(2.1, 3.5), 2.1);
        assert_eq!(f64_max(2.1, 3.5), 3.5);
    }

    #[test]
    fn nearest_rounds_ties_to_even() {
        assert_eq!(f32_nearest(2.5), 2.0);
        assert_eq!(f32_nearest(3.5), 4.0);
        assert_eq!(f32_nearest(-2.5), -2.0);
        assert_eq!(f64_nearest(0.5), 0.0);
        assert_eq!(f64_nearest(1.5), 2.0);
        assert_eq!(f64_nearest(4.2), 4.0);
    }

    #[test]
    fn truncation_faults_on_nan_and_overflow() {
        assert_eq!(
            i32_trunc_f32_s(f32::NAN),
            Err(TrapReason::InvalidConversionToInteger)
        );
        assert_eq!(i32_trunc_f32_s(2.9e9), Err(TrapReason::IntegerOverflow));
        assert_eq!(i32_trunc_f32_u(-0.5), Ok(0));
        assert_eq!(i32_trunc_f64_u(-1.0), Err(TrapReason::IntegerOverflow));
        assert_eq!(i32_trunc_f64_s(-42.7), Ok(-42));
        assert_eq!(i64_trunc_f64_s(1e18), Ok(1_000_000_000_000_000_000));
    }

    #[test]
    fn bit_counts_of_zero_are_the_width() {
        assert_eq!(0u32.leading_zeros(), 32);
        assert_eq!(0u32.trailing_zeros(), 32);
        assert_eq!(0u32.count_ones(), 0);
        assert_eq!(0u64.leading_zeros(), 64);
        assert_eq!(0u64.trailing_zeros(), 64);
    }

    #[quickcheck]
    fn set_bits_lie_between_the_zero_spans(x: u32) -> bool {
        if x == 0 {
            return true;
        }
        // The window between the leading and trailing zero runs holds every
        // set bit, with equality exactly for single-bit values.
        let window = 32 - x.leading_zeros() - x.trailing_zeros();
        window >= x.count_ones() && (x.count_ones() != 1 || window == 1)
    }

    #[quickcheck]
    fn rotations_complement_each_other(x: u32, k: u32) -> bool {
        x.rotate_left(k % 32) == x.rotate_right(32 - (k % 32))
    }
}
