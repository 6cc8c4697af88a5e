//! Interpreter parameters and binary-format constants

/// Size of a linear memory page in bytes.
///
/// <https://webassembly.github.io/spec/core/exec/runtime.html#memory-instances>
pub const PAGE_SIZE: usize = 65536;

/// Magic bytes at the start of every binary module: `\0asm`.
pub const MODULE_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];

/// The only supported binary format version, little-endian.
pub const MODULE_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/* SECTION IDS */

/// Custom section. Skipped entirely.
pub const SECTION_CUSTOM: u8 = 0;

/// Type section: function signatures.
pub const SECTION_TYPE: u8 = 1;

/// Import section: host functions consumed by the module.
pub const SECTION_IMPORT: u8 = 2;

/// Function section: type indices of the defined functions.
pub const SECTION_FUNCTION: u8 = 3;

/// Table section: funcref table limits.
pub const SECTION_TABLE: u8 = 4;

/// Memory section: linear memory limits.
pub const SECTION_MEMORY: u8 = 5;

/// Global section: typed globals with initializer expressions.
pub const SECTION_GLOBAL: u8 = 6;

/// Export section: named module entry points.
pub const SECTION_EXPORT: u8 = 7;

/// Start section: function to run at instantiation.
pub const SECTION_START: u8 = 8;

/// Element section: funcref table initializers.
pub const SECTION_ELEMENT: u8 = 9;

/// Code section: bodies of the defined functions.
pub const SECTION_CODE: u8 = 10;

/// Data section: linear memory initializers.
pub const SECTION_DATA: u8 = 11;

/// Data-count section: segment count duplicated ahead of the code section.
pub const SECTION_DATA_COUNT: u8 = 12;

/// Tag section (exception handling proposal). Recognized, never populated.
pub const SECTION_TAG: u8 = 13;

/* OPCODE SPACE */

/// Prefix byte of the bulk-memory (and saturating-truncation) opcode space.
pub const OPCODE_PREFIX_MISC: u8 = 0xFC;

/// Block-type byte for a block without a result value.
pub const BLOCK_TYPE_EMPTY: u8 = 0x40;

/// Returns the name corresponding to the section id.
pub const fn section_name(id: u8) -> &'static str {
    match id {
        SECTION_CUSTOM => "custom",
        SECTION_TYPE => "type",
        SECTION_IMPORT => "import",
        SECTION_FUNCTION => "function",
        SECTION_TABLE => "table",
        SECTION_MEMORY => "memory",
        SECTION_GLOBAL => "global",
        SECTION_EXPORT => "export",
        SECTION_START => "start",
        SECTION_ELEMENT => "element",
        SECTION_CODE => "code",
        SECTION_DATA => "data",
        SECTION_DATA_COUNT => "data count",
        SECTION_TAG => "tag",
        _ => "unknown",
    }
}
