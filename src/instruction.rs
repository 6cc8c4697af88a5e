//! Instruction representation for the interpreter
//!
//! One decoded instruction is an opcode plus its typed immediates. The
//! structured-expression reader lowers a body into a flat sequence in which
//! `end` and `else` are retained as sentinels, and every `block`/`if`/`else`
//! carries the absolute index of its matching sentinels, resolved while
//! decoding so that branches never rescan the stream at run time.

use crate::consts::{BLOCK_TYPE_EMPTY, OPCODE_PREFIX_MISC};
use crate::decode::Decoder;
use crate::error::DecodeError;
use crate::types::{BlockType, ValType};

/// Alignment hint and offset immediate attached to every memory instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemArg {
    /// Alignment exponent; a hint only, never enforced.
    pub align: u32,
    /// Constant added to the popped base address.
    pub offset: u32,
}

impl MemArg {
    fn decode(d: &mut Decoder) -> Result<Self, DecodeError> {
        let align = d.var_u32()?;
        let offset = d.var_u32()?;
        Ok(Self { align, offset })
    }
}

/// A decoded instruction with its immediates.
///
/// Structured control instructions carry the absolute expression indices of
/// their matching sentinels (`end`, and `else` for two-armed `if`s), filled
/// in by [`read_expression`].
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Trap unconditionally.
    Unreachable,
    /// Do nothing.
    Nop,
    /// Structured block; branching to it jumps to `end`.
    Block {
        /// Result type of the block.
        ty: BlockType,
        /// Index of the matching `end`.
        end: usize,
    },
    /// Structured loop; branching to it re-enters the body.
    Loop {
        /// Result type of the loop.
        ty: BlockType,
    },
    /// Two-way conditional on a popped i32.
    If {
        /// Result type of the construct.
        ty: BlockType,
        /// Index of the matching `else`, when the false arm exists.
        else_target: Option<usize>,
        /// Index of the matching `end`.
        end: usize,
    },
    /// Sentinel separating the arms of an `if`; reaching it from the true
    /// arm jumps to `end`.
    Else {
        /// Index of the matching `end`.
        end: usize,
    },
    /// Sentinel closing a structured construct (or the whole expression).
    End,
    /// Unconditional branch to the `depth`-th enclosing construct.
    Br {
        /// Relative label: 0 is the innermost construct.
        depth: u32,
    },
    /// Branch when the popped i32 is non-zero.
    BrIf {
        /// Relative label: 0 is the innermost construct.
        depth: u32,
    },
    /// Indexed branch: the popped selector picks from `targets`, saturating
    /// into `default`.
    BrTable {
        /// Branch targets selected by index.
        targets: Vec<u32>,
        /// Target used when the selector is out of range.
        default: u32,
    },
    /// Abandon the remainder of the current frame.
    Return,
    /// Direct call by function index (imports first).
    Call(u32),
    /// Call through the funcref table.
    CallIndirect {
        /// Declared signature, checked against the callee.
        type_index: u32,
        /// Table holding the function indices.
        table: u32,
    },
    /// Pop and discard.
    Drop,
    /// Pop `c`, `v2`, `v1`; push `v1` if `c != 0`, else `v2`.
    Select,
    /// Typed `select` (same semantics, explicit type list).
    SelectT(Vec<ValType>),
    /// Push a local or parameter.
    LocalGet(u32),
    /// Pop into a local or parameter.
    LocalSet(u32),
    /// Like `local.set`, leaving the value on the stack.
    LocalTee(u32),
    /// Push a global.
    GlobalGet(u32),
    /// Pop into a mutable global.
    GlobalSet(u32),

    /// Load a 32-bit integer.
    I32Load(MemArg),
    /// Load a 64-bit integer.
    I64Load(MemArg),
    /// Load a 32-bit float.
    F32Load(MemArg),
    /// Load a 64-bit float.
    F64Load(MemArg),
    /// Load a byte, sign-extended to i32.
    I32Load8S(MemArg),
    /// Load a byte, zero-extended to i32.
    I32Load8U(MemArg),
    /// Load 16 bits, sign-extended to i32.
    I32Load16S(MemArg),
    /// Load 16 bits, zero-extended to i32.
    I32Load16U(MemArg),
    /// Load a byte, sign-extended to i64.
    I64Load8S(MemArg),
    /// Load a byte, zero-extended to i64.
    I64Load8U(MemArg),
    /// Load 16 bits, sign-extended to i64.
    I64Load16S(MemArg),
    /// Load 16 bits, zero-extended to i64.
    I64Load16U(MemArg),
    /// Load 32 bits, sign-extended to i64.
    I64Load32S(MemArg),
    /// Load 32 bits, zero-extended to i64.
    I64Load32U(MemArg),
    /// Store a 32-bit integer.
    I32Store(MemArg),
    /// Store a 64-bit integer.
    I64Store(MemArg),
    /// Store a 32-bit float.
    F32Store(MemArg),
    /// Store a 64-bit float.
    F64Store(MemArg),
    /// Store the low byte of an i32.
    I32Store8(MemArg),
    /// Store the low 16 bits of an i32.
    I32Store16(MemArg),
    /// Store the low byte of an i64.
    I64Store8(MemArg),
    /// Store the low 16 bits of an i64.
    I64Store16(MemArg),
    /// Store the low 32 bits of an i64.
    I64Store32(MemArg),
    /// Push the current page count.
    MemorySize,
    /// Grow memory by the popped page delta; push the old page count, or
    /// -1 when a declared maximum would be exceeded.
    MemoryGrow,

    /// Push a constant i32.
    I32Const(i32),
    /// Push a constant i64.
    I64Const(i64),
    /// Push a constant f32.
    F32Const(f32),
    /// Push a constant f64.
    F64Const(f64),

    /// `i32.eqz`
    I32Eqz,
    /// `i32.eq`
    I32Eq,
    /// `i32.ne`
    I32Ne,
    /// `i32.lt_s`
    I32LtS,
    /// `i32.lt_u`
    I32LtU,
    /// `i32.gt_s`
    I32GtS,
    /// `i32.gt_u`
    I32GtU,
    /// `i32.le_s`
    I32LeS,
    /// `i32.le_u`
    I32LeU,
    /// `i32.ge_s`
    I32GeS,
    /// `i32.ge_u`
    I32GeU,
    /// `i64.eqz`
    I64Eqz,
    /// `i64.eq`
    I64Eq,
    /// `i64.ne`
    I64Ne,
    /// `i64.lt_s`
    I64LtS,
    /// `i64.lt_u`
    I64LtU,
    /// `i64.gt_s`
    I64GtS,
    /// `i64.gt_u`
    I64GtU,
    /// `i64.le_s`
    I64LeS,
    /// `i64.le_u`
    I64LeU,
    /// `i64.ge_s`
    I64GeS,
    /// `i64.ge_u`
    I64GeU,
    /// `f32.eq`
    F32Eq,
    /// `f32.ne`
    F32Ne,
    /// `f32.lt`
    F32Lt,
    /// `f32.gt`
    F32Gt,
    /// `f32.le`
    F32Le,
    /// `f32.ge`
    F32Ge,
    /// `f64.eq`
    F64Eq,
    /// `f64.ne`
    F64Ne,
    /// `f64.lt`
    F64Lt,
    /// `f64.gt`
    F64Gt,
    /// `f64.le`
    F64Le,
    /// `f64.ge`
    F64Ge,

    /// `i32.clz`
    I32Clz,
    /// `i32.ctz`
    I32Ctz,
    /// `i32.popcnt`
    I32Popcnt,
    /// `i32.add`
    I32Add,
    /// `i32.sub`
    I32Sub,
    /// `i32.mul`
    I32Mul,
    /// `i32.div_s`
    I32DivS,
    /// `i32.div_u`
    I32DivU,
    /// `i32.rem_s`
    I32RemS,
    /// `i32.rem_u`
    I32RemU,
    /// `i32.and`
    I32And,
    /// `i32.or`
    I32Or,
    /// `i32.xor`
    I32Xor,
    /// `i32.shl`
    I32Shl,
    /// `i32.shr_s`
    I32ShrS,
    /// `i32.shr_u`
    I32ShrU,
    /// `i32.rotl`
    I32Rotl,
    /// `i32.rotr`
    I32Rotr,
    /// `i64.clz`
    I64Clz,
    /// `i64.ctz`
    I64Ctz,
    /// `i64.popcnt`
    I64Popcnt,
    /// `i64.add`
    I64Add,
    /// `i64.sub`
    I64Sub,
    /// `i64.mul`
    I64Mul,
    /// `i64.div_s`
    I64DivS,
    /// `i64.div_u`
    I64DivU,
    /// `i64.rem_s`
    I64RemS,
    /// `i64.rem_u`
    I64RemU,
    /// `i64.and`
    I64And,
    /// `i64.or`
    I64Or,
    /// `i64.xor`
    I64Xor,
    /// `i64.shl`
    I64Shl,
    /// `i64.shr_s`
    I64ShrS,
    /// `i64.shr_u`
    I64ShrU,
    /// `i64.rotl`
    I64Rotl,
    /// `i64.rotr`
    I64Rotr,

    /// `f32.abs`
    F32Abs,
    /// `f32.neg`
    F32Neg,
    /// `f32.ceil`
    F32Ceil,
    /// `f32.floor`
    F32Floor,
    /// `f32.trunc`
    F32Trunc,
    /// `f32.nearest`
    F32Nearest,
    /// `f32.sqrt`
    F32Sqrt,
    /// `f32.add`
    F32Add,
    /// `f32.sub`
    F32Sub,
    /// `f32.mul`
    F32Mul,
    /// `f32.div`
    F32Div,
    /// `f32.min`
    F32Min,
    /// `f32.max`
    F32Max,
    /// `f32.copysign`
    F32Copysign,
    /// `f64.abs`
    F64Abs,
    /// `f64.neg`
    F64Neg,
    /// `f64.ceil`
    F64Ceil,
    /// `f64.floor`
    F64Floor,
    /// `f64.trunc`
    F64Trunc,
    /// `f64.nearest`
    F64Nearest,
    /// `f64.sqrt`
    F64Sqrt,
    /// `f64.add`
    F64Add,
    /// `f64.sub`
    F64Sub,
    /// `f64.mul`
    F64Mul,
    /// `f64.div`
    F64Div,
    /// `f64.min`
    F64Min,
    /// `f64.max`
    F64Max,
    /// `f64.copysign`
    F64Copysign,

    /// `i32.wrap_i64`
    I32WrapI64,
    /// `i32.trunc_f32_s`
    I32TruncF32S,
    /// `i32.trunc_f32_u`
    I32TruncF32U,
    /// `i32.trunc_f64_s`
    I32TruncF64S,
    /// `i32.trunc_f64_u`
    I32TruncF64U,
    /// `i64.extend_i32_s`
    I64ExtendI32S,
    /// `i64.extend_i32_u`
    I64ExtendI32U,
    /// `i64.trunc_f32_s`
    I64TruncF32S,
    /// `i64.trunc_f32_u`
    I64TruncF32U,
    /// `i64.trunc_f64_s`
    I64TruncF64S,
    /// `i64.trunc_f64_u`
    I64TruncF64U,
    /// `f32.convert_i32_s`
    F32ConvertI32S,
    /// `f32.convert_i32_u`
    F32ConvertI32U,
    /// `f32.convert_i64_s`
    F32ConvertI64S,
    /// `f32.convert_i64_u`
    F32ConvertI64U,
    /// `f32.demote_f64`
    F32DemoteF64,
    /// `f64.convert_i32_s`
    F64ConvertI32S,
    /// `f64.convert_i32_u`
    F64ConvertI32U,
    /// `f64.convert_i64_s`
    F64ConvertI64S,
    /// `f64.convert_i64_u`
    F64ConvertI64U,
    /// `f64.promote_f32`
    F64PromoteF32,
    /// `i32.reinterpret_f32`
    I32ReinterpretF32,
    /// `i64.reinterpret_f64`
    I64ReinterpretF64,
    /// `f32.reinterpret_i32`
    F32ReinterpretI32,
    /// `f64.reinterpret_i64`
    F64ReinterpretI64,

    /// `i32.extend8_s` (decoded, not implemented by this core).
    I32Extend8S,
    /// `i32.extend16_s` (decoded, not implemented by this core).
    I32Extend16S,
    /// `i64.extend8_s` (decoded, not implemented by this core).
    I64Extend8S,
    /// `i64.extend16_s` (decoded, not implemented by this core).
    I64Extend16S,
    /// `i64.extend32_s` (decoded, not implemented by this core).
    I64Extend32S,
    /// Saturating truncation family (decoded, not implemented by this
    /// core); the payload is the 0xFC-prefixed sub-opcode.
    TruncSat(u32),

    /// Copy bytes from a passive-style data segment into memory.
    MemoryInit {
        /// Data segment supplying the bytes.
        segment: u32,
    },
    /// Clear a data segment's bytes; further `memory.init` traps.
    DataDrop {
        /// Data segment to drop.
        segment: u32,
    },
    /// Copy within linear memory, overlap-correct.
    MemoryCopy,
    /// Fill linear memory with a popped byte value.
    MemoryFill,
}

impl Instruction {
    /// Decode one instruction (opcode byte plus immediates).
    ///
    /// Matching-sentinel indices of structured instructions are left at
    /// their placeholder values; [`read_expression`] patches them.
    pub fn decode(d: &mut Decoder) -> Result<Self, DecodeError> {
        let op = d.u8()?;
        let instr = match op {
            0x00 => Self::Unreachable,
            0x01 => Self::Nop,
            0x02 => Self::Block {
                ty: decode_block_type(d)?,
                end: 0,
            },
            0x03 => Self::Loop {
                ty: decode_block_type(d)?,
            },
            0x04 => Self::If {
                ty: decode_block_type(d)?,
                else_target: None,
                end: 0,
            },
            0x05 => Self::Else { end: 0 },
            0x0B => Self::End,
            0x0C => Self::Br {
                depth: d.var_u32()?,
            },
            0x0D => Self::BrIf {
                depth: d.var_u32()?,
            },
            0x0E => {
                let count = d.var_u32()?;
                let targets = (0..count)
                    .map(|_| d.var_u32())
                    .collect::<Result<Vec<_>, _>>()?;
                let default = d.var_u32()?;
                Self::BrTable { targets, default }
            }
            0x0F => Self::Return,
            0x10 => Self::Call(d.var_u32()?),
            0x11 => {
                let type_index = d.var_u32()?;
                let table = d.var_u32()?;
                Self::CallIndirect { type_index, table }
            }
            0x1A => Self::Drop,
            0x1B => Self::Select,
            0x1C => {
                let count = d.var_u32()?;
                let types = (0..count)
                    .map(|_| ValType::from_byte(d.u8()?))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::SelectT(types)
            }
            0x20 => Self::LocalGet(d.var_u32()?),
            0x21 => Self::LocalSet(d.var_u32()?),
            0x22 => Self::LocalTee(d.var_u32()?),
            0x23 => Self::GlobalGet(d.var_u32()?),
            0x24 => Self::GlobalSet(d.var_u32()?),

            0x28 => Self::I32Load(MemArg::decode(d)?),
            0x29 => Self::I64Load(MemArg::decode(d)?),
            0x2A => Self::F32Load(MemArg::decode(d)?),
            0x2B => Self::F64Load(MemArg::decode(d)?),
            0x2C => Self::I32Load8S(MemArg::decode(d)?),
            0x2D => Self::I32Load8U(MemArg::decode(d)?),
            0x2E => Self::I32Load16S(MemArg::decode(d)?),
            0x2F => Self::I32Load16U(MemArg::decode(d)?),
            0x30 => Self::I64Load8S(MemArg::decode(d)?),
            0x31 => Self::I64Load8U(MemArg::decode(d)?),
            0x32 => Self::I64Load16S(MemArg::decode(d)?),
            0x33 => Self::I64Load16U(MemArg::decode(d)?),
            0x34 => Self::I64Load32S(MemArg::decode(d)?),
            0x35 => Self::I64Load32U(MemArg::decode(d)?),
            0x36 => Self::I32Store(MemArg::decode(d)?),
            0x37 => Self::I64Store(MemArg::decode(d)?),
            0x38 => Self::F32Store(MemArg::decode(d)?),
            0x39 => Self::F64Store(MemArg::decode(d)?),
            0x3A => Self::I32Store8(MemArg::decode(d)?),
            0x3B => Self::I32Store16(MemArg::decode(d)?),
            0x3C => Self::I64Store8(MemArg::decode(d)?),
            0x3D => Self::I64Store16(MemArg::decode(d)?),
            0x3E => Self::I64Store32(MemArg::decode(d)?),
            0x3F => {
                d.var_u32()?; // memory index, single memory only
                Self::MemorySize
            }
            0x40 => {
                d.var_u32()?; // memory index, single memory only
                Self::MemoryGrow
            }

            0x41 => Self::I32Const(d.var_s32()?),
            0x42 => Self::I64Const(d.var_s64()?),
            0x43 => Self::F32Const(d.f32()?),
            0x44 => Self::F64Const(d.f64()?),

            0x45 => Self::I32Eqz,
            0x46 => Self::I32Eq,
            0x47 => Self::I32Ne,
            0x48 => Self::I32LtS,
            0x49 => Self::I32LtU,
            0x4A => Self::I32GtS,
            0x4B => Self::I32GtU,
            0x4C => Self::I32LeS,
            0x4D => Self::I32LeU,
            0x4E => Self::I32GeS,
            0x4F => Self::I32GeU,
            0x50 => Self::I64Eqz,
            0x51 => Self::I64Eq,
            0x52 => Self::I64Ne,
            0x53 => Self::I64LtS,
            0x54 => Self::I64LtU,
            0x55 => Self::I64GtS,
            0x56 => Self::I64GtU,
            0x57 => Self::I64LeS,
            0x58 => Self::I64LeU,
            0x59 => Self::I64GeS,
            0x5A => Self::I64GeU,
            0x5B => Self::F32Eq,
            0x5C => Self::F32Ne,
            0x5D => Self::F32Lt,
            0x5E => Self::F32Gt,
            0x5F => Self::F32Le,
            0x60 => Self::F32Ge,
            0x61 => Self::F64Eq,
            0x62 => Self::F64Ne,
            0x63 => Self::F64Lt,
            0x64 => Self::F64Gt,
            0x65 => Self::F64Le,
            0x66 => Self::F64Ge,

            0x67 => Self::I32Clz,
            0x68 => Self::I32Ctz,
            0x69 => Self::I32Popcnt,
            0x6A => Self::I32Add,
            0x6B => Self::I32Sub,
            0x6C => Self::I32Mul,
            0x6D => Self::I32DivS,
            0x6E => Self::I32DivU,
            0x6F => Self::I32RemS,
            0x70 => Self::I32RemU,
            0x71 => Self::I32And,
            0x72 => Self::I32Or,
            0x73 => Self::I32Xor,
            0x74 => Self::I32Shl,
            0x75 => Self::I32ShrS,
            0x76 => Self::I32ShrU,
            0x77 => Self::I32Rotl,
            0x78 => Self::I32Rotr,
            0x79 => Self::I64Clz,
            0x7A => Self::I64Ctz,
            0x7B => Self::I64Popcnt,
            0x7C => Self::I64Add,
            0x7D => Self::I64Sub,
            0x7E => Self::I64Mul,
            0x7F => Self::I64DivS,
            0x80 => Self::I64DivU,
            0x81 => Self::I64RemS,
            0x82 => Self::I64RemU,
            0x83 => Self::I64And,
            0x84 => Self::I64Or,
            0x85 => Self::I64Xor,
            0x86 => Self::I64Shl,
            0x87 => Self::I64ShrS,
            0x88 => Self::I64ShrU,
            0x89 => Self::I64Rotl,
            0x8A => Self::I64Rotr,

            0x8B => Self::F32Abs,
            0x8C => Self::F32Neg,
            0x8D => Self::F32Ceil,
            0x8E => Self::F32Floor,
            0x8F => Self::F32Trunc,
            0x90 => Self::F32Nearest,
            0x91 => Self::F32Sqrt,
            0x92 => Self::F32Add,
            0x93 => Self::F32Sub,
            0x94 => Self::F32Mul,
            0x95 => Self::F32Div,
            0x96 => Self::F32Min,
            0x97 => Self::F32Max,
            0x98 => Self::F32Copysign,
            0x99 => Self::F64Abs,
            0x9A => Self::F64Neg,
            0x9B => Self::F64Ceil,
            0x9C => Self::F64Floor,
            0x9D => Self::F64Trunc,
            0x9E => Self::F64Nearest,
            0x9F => Self::F64Sqrt,
            0xA0 => Self::F64Add,
            0xA1 => Self::F64Sub,
            0xA2 => Self::F64Mul,
            0xA3 => Self::F64Div,
            0xA4 => Self::F64Min,
            0xA5 => Self::F64Max,
            0xA6 => Self::F64Copysign,

            0xA7 => Self::I32WrapI64,
            0xA8 => Self::I32TruncF32S,
            0xA9 => Self::I32TruncF32U,
            0xAA => Self::I32TruncF64S,
            0xAB => Self::I32TruncF64U,
            0xAC => Self::I64ExtendI32S,
            0xAD => Self::I64ExtendI32U,
            0xAE => Self::I64TruncF32S,
            0xAF => Self::I64TruncF32U,
            0xB0 => Self::I64TruncF64S,
            0xB1 => Self::I64TruncF64U,
            0xB2 => Self::F32ConvertI32S,
            0xB3 => Self::F32ConvertI32U,
            0xB4 => Self::F32ConvertI64S,
            0xB5 => Self::F32ConvertI64U,
            0xB6 => Self::F32DemoteF64,
            0xB7 => Self::F64ConvertI32S,
            0xB8 => Self::F64ConvertI32U,
            0xB9 => Self::F64ConvertI64S,
            0xBA => Self::F64ConvertI64U,
            0xBB => Self::F64PromoteF32,
            0xBC => Self::I32ReinterpretF32,
            0xBD => Self::I64ReinterpretF64,
            0xBE => Self::F32ReinterpretI32,
            0xBF => Self::F64ReinterpretI64,

            0xC0 => Self::I32Extend8S,
            0xC1 => Self::I32Extend16S,
            0xC2 => Self::I64Extend8S,
            0xC3 => Self::I64Extend16S,
            0xC4 => Self::I64Extend32S,

            OPCODE_PREFIX_MISC => Self::decode_misc(d)?,

            other => return Err(DecodeError::UnknownOpcode(other)),
        };
        Ok(instr)
    }

    fn decode_misc(d: &mut Decoder) -> Result<Self, DecodeError> {
        let op = d.var_u32()?;
        let instr = match op {
            0..=7 => Self::TruncSat(op),
            8 => {
                let segment = d.var_u32()?;
                d.u8()?; // memory index, single memory only
                Self::MemoryInit { segment }
            }
            9 => Self::DataDrop {
                segment: d.var_u32()?,
            },
            10 => {
                d.u8()?; // destination memory index
                d.u8()?; // source memory index
                Self::MemoryCopy
            }
            11 => {
                d.u8()?; // memory index
                Self::MemoryFill
            }
            other => return Err(DecodeError::UnknownMiscOpcode(other)),
        };
        Ok(instr)
    }
}

fn decode_block_type(d: &mut Decoder) -> Result<BlockType, DecodeError> {
    let byte = d.u8()?;
    match byte {
        BLOCK_TYPE_EMPTY => Ok(BlockType::Empty),
        0x7F => Ok(BlockType::Value(ValType::I32)),
        other => Err(DecodeError::UnsupportedBlockType(other)),
    }
}

/// A terminated, flat list of instructions.
pub type Expression = Vec<Instruction>;

/// Decode a structured expression up to (and including) the `end` that
/// closes the outermost construct.
///
/// Nesting is tracked through a stack of open constructs; when an `end`
/// closes one, the construct (and its `else`, for a two-armed `if`) is
/// patched with the sentinel's index, making branch resolution O(1) during
/// execution.
pub fn read_expression(d: &mut Decoder) -> Result<Expression, DecodeError> {
    let mut expr = Expression::new();
    let mut open: Vec<usize> = Vec::new();

    loop {
        let index = expr.len();
        let instr = Instruction::decode(d)?;
        // An end with no open construct closes the whole expression.
        let terminal = matches!(instr, Instruction::End) && open.is_empty();
        match &instr {
            Instruction::Block { .. } | Instruction::Loop { .. } | Instruction::If { .. } => {
                open.push(index);
            }
            Instruction::Else { .. } => {
                let head = *open.last().ok_or(DecodeError::UnbalancedExpression)?;
                match &mut expr[head] {
                    Instruction::If { else_target, .. } => *else_target = Some(index),
                    _ => return Err(DecodeError::UnbalancedExpression),
                }
            }
            Instruction::End => {
                if let Some(head) = open.pop() {
                    let else_target = match &mut expr[head] {
                        Instruction::Block { end, .. } => {
                            *end = index;
                            None
                        }
                        Instruction::If {
                            end, else_target, ..
                        } => {
                            *end = index;
                            *else_target
                        }
                        Instruction::Loop { .. } => None,
                        _ => return Err(DecodeError::UnbalancedExpression),
                    };
                    if let Some(else_index) = else_target {
                        if let Instruction::Else { end } = &mut expr[else_index] {
                            *end = index;
                        }
                    }
                }
            }
            _ => {}
        }
        expr.push(instr);
        if terminal {
            return Ok(expr);
        }
    }
}
