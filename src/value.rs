//! Runtime value representation
//!
//! The discriminant is the authoritative representation tag; arithmetic is
//! always performed on the projection it selects. Reinterpretation between
//! integer and float of the same width goes through the explicit bit-cast
//! helpers instead of type punning.

use crate::error::TrapReason;
use crate::types::ValType;

/// A single slot of the value stack, a local, or a global.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// 32-bit integer, sign-agnostic.
    I32(i32),
    /// 64-bit integer, sign-agnostic.
    I64(i64),
    /// 32-bit IEEE-754 float.
    F32(f32),
    /// 64-bit IEEE-754 float.
    F64(f64),
}

impl Value {
    /// Representation tag of this value.
    pub const fn ty(&self) -> ValType {
        match self {
            Self::I32(_) => ValType::I32,
            Self::I64(_) => ValType::I64,
            Self::F32(_) => ValType::F32,
            Self::F64(_) => ValType::F64,
        }
    }

    /// Zero value of the given type, used for local initialization.
    pub const fn zero(ty: ValType) -> Self {
        match ty {
            ValType::I32 => Self::I32(0),
            ValType::I64 => Self::I64(0),
            ValType::F32 => Self::F32(0.0),
            ValType::F64 => Self::F64(0.0),
        }
    }

    /// Canonical 64-bit pattern of the payload, zero-extended for 32-bit
    /// representations.
    pub fn to_bits(self) -> u64 {
        match self {
            Self::I32(v) => v as u32 as u64,
            Self::I64(v) => v as u64,
            Self::F32(v) => u64::from(v.to_bits()),
            Self::F64(v) => v.to_bits(),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::I32(v as i32)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::I64(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::I32(v as i32)
    }
}

impl TryFrom<Value> for i32 {
    type Error = TrapReason;

    fn try_from(value: Value) -> Result<Self, TrapReason> {
        match value {
            Value::I32(v) => Ok(v),
            _ => Err(TrapReason::TypeMismatch),
        }
    }
}

impl TryFrom<Value> for u32 {
    type Error = TrapReason;

    fn try_from(value: Value) -> Result<Self, TrapReason> {
        i32::try_from(value).map(|v| v as u32)
    }
}

impl TryFrom<Value> for i64 {
    type Error = TrapReason;

    fn try_from(value: Value) -> Result<Self, TrapReason> {
        match value {
            Value::I64(v) => Ok(v),
            _ => Err(TrapReason::TypeMismatch),
        }
    }
}

impl TryFrom<Value> for u64 {
    type Error = TrapReason;

    fn try_from(value: Value) -> Result<Self, TrapReason> {
        i64::try_from(value).map(|v| v as u64)
    }
}

impl TryFrom<Value> for f32 {
    type Error = TrapReason;

    fn try_from(value: Value) -> Result<Self, TrapReason> {
        match value {
            Value::F32(v) => Ok(v),
            _ => Err(TrapReason::TypeMismatch),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = TrapReason;

    fn try_from(value: Value) -> Result<Self, TrapReason> {
        match value {
            Value::F64(v) => Ok(v),
            _ => Err(TrapReason::TypeMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn zero_values_carry_their_declared_tag() {
        for ty in [ValType::I32, ValType::I64, ValType::F32, ValType::F64] {
            assert_eq!(Value::zero(ty).ty(), ty);
        }
    }

    #[test]
    fn projection_requires_the_matching_tag() {
        assert_eq!(i32::try_from(Value::I32(-1)), Ok(-1));
        assert_eq!(i32::try_from(Value::F32(1.0)), Err(TrapReason::TypeMismatch));
        assert_eq!(f64::try_from(Value::I64(0)), Err(TrapReason::TypeMismatch));
    }

    #[quickcheck]
    fn f32_reinterpret_is_an_involution(bits: u32) -> bool {
        let through_float = f32::from_bits(bits).to_bits();
        through_float == bits
    }

    #[quickcheck]
    fn f64_reinterpret_is_an_involution(bits: u64) -> bool {
        f64::from_bits(bits).to_bits() == bits
    }

    #[quickcheck]
    fn canonical_bits_zero_extend_narrow_values(v: i32) -> bool {
        Value::I32(v).to_bits() == u64::from(v as u32)
    }
}
