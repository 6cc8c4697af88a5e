//! Module image types shared between the decoder and the runtime
//!
//! Encoding bytes follow the
//! [binary specification](https://webassembly.github.io/spec/core/binary/types.html).

use std::fmt;

use crate::error::DecodeError;

/// Value type of a stack slot, local, global or memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ValType {
    /// 32-bit integer, sign-agnostic.
    I32 = 0x7F,
    /// 64-bit integer, sign-agnostic.
    I64 = 0x7E,
    /// 32-bit IEEE-754 float.
    F32 = 0x7D,
    /// 64-bit IEEE-754 float.
    F64 = 0x7C,
}

impl ValType {
    /// Decode a value-type byte.
    pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0x7F => Ok(Self::I32),
            0x7E => Ok(Self::I64),
            0x7D => Ok(Self::F32),
            0x7C => Ok(Self::F64),
            other => Err(DecodeError::UnsupportedValueType(other)),
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Optional result type of a structured control construct.
///
/// Only `void` and `i32` are accepted by this core; the engine itself is
/// agnostic since branch targets are resolved at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// Block without a result value.
    Empty,
    /// Block leaving a single value on the stack.
    Value(ValType),
}

/// Function signature: ordered parameters and at most one result.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    /// Parameter value types, in declaration order.
    pub params: Vec<ValType>,
    /// Result value type, when the function returns one.
    pub result: Option<ValType>,
}

impl FuncType {
    /// Number of values the function leaves on the stack.
    pub fn result_arity(&self) -> usize {
        usize::from(self.result.is_some())
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, ty) in self.params.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        f.write_str(")")?;
        match self.result {
            Some(ty) => write!(f, " -> {ty}"),
            None => Ok(()),
        }
    }
}

/// Minimum and optional maximum of a table or memory, in elements or pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Initial size.
    pub min: u32,
    /// Declared upper bound, when present.
    pub max: Option<u32>,
}

/// Kind tag of an import or export descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ExternalKind {
    /// Function index space.
    Func = 0x00,
    /// Table index space.
    Table = 0x01,
    /// Memory index space.
    Mem = 0x02,
    /// Global index space.
    Global = 0x03,
    /// Tag index space (exception handling proposal).
    Tag = 0x04,
}

impl ExternalKind {
    /// Decode a kind byte.
    pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0x00 => Ok(Self::Func),
            0x01 => Ok(Self::Table),
            0x02 => Ok(Self::Mem),
            0x03 => Ok(Self::Global),
            0x04 => Ok(Self::Tag),
            other => Err(DecodeError::UnknownExportKind(other)),
        }
    }
}

/// Named external function consumed by the module.
///
/// Only function imports are supported; their count offsets every function
/// index used by `call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Module namespace, e.g. `wasi_snapshot_preview1`.
    pub module: String,
    /// Field name within the namespace, e.g. `fd_write`.
    pub field: String,
    /// Index into the type section describing the signature.
    pub type_index: u32,
}

/// Named module entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Export {
    /// Export name, looked up by [`crate::interpreter::Interpreter::run`].
    pub name: String,
    /// Index space the export lives in.
    pub kind: ExternalKind,
    /// Index into that space.
    pub index: u32,
}

/// Typed global declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    /// Value type of the global.
    pub content: ValType,
    /// Whether `global.set` is permitted.
    pub mutable: bool,
}
