//! Runtime interpreter error implementation

use thiserror::Error;

/// Execution fault representation for the interpreter.
///
/// Any of these reasons aborts the current run; there is no trap-to-guest
/// mechanism, so the reason surfaces unchanged through [`InterpreterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum TrapReason {
    /// An instruction popped from an empty value stack.
    #[error("value stack underflow")]
    StackUnderflow,
    /// A popped value carried a representation tag the instruction cannot
    /// operate on.
    #[error("mismatched value type on the stack")]
    TypeMismatch,
    /// Found `unreachable` instruction.
    #[error("unreachable executed")]
    Unreachable,
    /// Integer division or remainder by zero.
    #[error("integer divide by zero")]
    DivisionByZero,
    /// Signed division overflow (`MIN / -1`) or a float-to-integer
    /// truncation outside the target range.
    #[error("integer overflow")]
    IntegerOverflow,
    /// Float-to-integer truncation of a NaN.
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    /// Attempt to access linear memory outside its current size.
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    /// Attempt to access the function table outside its limits.
    #[error("out of bounds table access")]
    TableOutOfBounds,
    /// `call_indirect` through a table slot that was never populated.
    #[error("uninitialized table element")]
    UninitializedElement,
    /// `call_indirect` callee signature differs from the declared type.
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    /// A branch named a label deeper than the enclosing construct count.
    #[error("branch label out of bounds")]
    LabelOutOfBounds,
    /// A function index has no matching import or code entry.
    #[error("function index out of bounds")]
    FunctionIndexOutOfBounds,
    /// A type index has no matching entry in the type section.
    #[error("type index out of bounds")]
    TypeIndexOutOfBounds,
    /// `local.get`/`local.set`/`local.tee` past the frame's local count.
    #[error("local index out of bounds")]
    LocalIndexOutOfBounds,
    /// `global.get`/`global.set` past the declared globals.
    #[error("global index out of bounds")]
    GlobalIndexOutOfBounds,
    /// `global.set` on an immutable global.
    #[error("write to immutable global")]
    ImmutableGlobal,
    /// `memory.init` or `data.drop` against a segment index that does not
    /// exist, or an init range outside the segment bytes.
    #[error("out of bounds data segment access")]
    DataSegmentOutOfBounds,
    /// `memory.init` against a segment previously dropped.
    #[error("data segment was dropped")]
    DataSegmentDropped,
    /// The import index has no handler in the host bridge.
    #[error("unknown host function")]
    UnknownHostFunction,
    /// Opcode recognized by the decoder but outside this core.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

/// Errors raised while decoding a binary module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The input ended in the middle of a structure.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof {
        /// Cursor position when the read was attempted.
        offset: usize,
    },
    /// A LEB128 integer used more bits than its target width.
    #[error("integer representation too long at offset {offset}")]
    IntegerTooLarge {
        /// Cursor position of the offending integer.
        offset: usize,
    },
    /// The first four bytes are not `\0asm`.
    #[error("not a WebAssembly binary (bad magic)")]
    BadMagic,
    /// The version field is not 1.
    #[error("unsupported binary version {0:?}")]
    UnsupportedVersion([u8; 4]),
    /// Section id outside the recognized 0..=13 range.
    #[error("unknown section id {0}")]
    UnknownSection(u8),
    /// A section payload was shorter or longer than its declared size.
    #[error("section {name} size mismatch")]
    SectionSizeMismatch {
        /// Human-readable section name.
        name: &'static str,
    },
    /// Opcode byte (or 0xFC-prefixed pair) with no known instruction.
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
    /// 0xFC-prefixed opcode with no known instruction.
    #[error("unknown misc opcode 0xFC 0x{0:02X}")]
    UnknownMiscOpcode(u32),
    /// Value-type byte outside i32/i64/f32/f64.
    #[error("unsupported value type 0x{0:02X}")]
    UnsupportedValueType(u8),
    /// Function type without the 0x60 tag.
    #[error("malformed function type (tag 0x{0:02X})")]
    InvalidFuncType(u8),
    /// A signature declared more than one result.
    #[error("multi-value results are not supported")]
    MultipleResults,
    /// Limits flag byte outside the recognized set.
    #[error("malformed limits flag 0x{0:02X}")]
    InvalidLimits(u8),
    /// Mutability byte other than 0 or 1.
    #[error("malformed global mutability 0x{0:02X}")]
    InvalidMutability(u8),
    /// Data segment encoding outside the recognized forms.
    #[error("unsupported data segment kind {0}")]
    UnsupportedDataKind(u32),
    /// Block-type byte other than void or i32.
    #[error("unsupported block type 0x{0:02X}")]
    UnsupportedBlockType(u8),
    /// Table element type other than funcref.
    #[error("unsupported table element type 0x{0:02X}")]
    UnsupportedTableType(u8),
    /// Element segment encoding other than the MVP active form.
    #[error("unsupported element segment kind {0}")]
    UnsupportedElementKind(u32),
    /// Import descriptor kind other than a function.
    #[error("unsupported import kind 0x{0:02X}")]
    UnsupportedImportKind(u8),
    /// Export kind byte outside func/table/mem/global/tag.
    #[error("unknown export kind 0x{0:02X}")]
    UnknownExportKind(u8),
    /// An `else` or `end` appeared with no construct to close.
    #[error("mismatched block nesting in expression")]
    UnbalancedExpression,
    /// A name was not valid UTF-8.
    #[error("malformed UTF-8 name at offset {offset}")]
    InvalidName {
        /// Cursor position of the name payload.
        offset: usize,
    },
}

/// Top-level interpreter error variants.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// The module bytes could not be decoded.
    #[error("malformed module: {0}")]
    Decode(#[from] DecodeError),
    /// Execution aborted with the given reason.
    #[error("trap: {0}")]
    Trap(#[from] TrapReason),
    /// The requested entry point is not among the module's exports.
    #[error("export not found: {0}")]
    ExportNotFound(String),
    /// The requested export exists but is not a function.
    #[error("export is not a function: {0}")]
    NotAFunction(String),
}

impl InterpreterError {
    /// Return the trap reason that caused this error, if applicable.
    pub const fn trap_reason(&self) -> Option<TrapReason> {
        match self {
            Self::Trap(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl PartialEq for InterpreterError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Decode(a), Self::Decode(b)) => a == b,
            (Self::Trap(a), Self::Trap(b)) => a == b,
            (Self::ExportNotFound(a), Self::ExportNotFound(b)) => a == b,
            (Self::NotAFunction(a), Self::NotAFunction(b)) => a == b,
            _ => false,
        }
    }
}

/// Result alias for execution paths that can only trap.
pub type TrapResult<T> = Result<T, TrapReason>;

/// Result alias for the public interpreter surface.
pub type RuntimeResult<T> = Result<T, InterpreterError>;
