//! Decoded module image
//!
//! The image is immutable after [`Module::decode`]; the runtime borrows it
//! for the duration of execution and clones only what it mutates (data
//! segment bytes).

use tracing::debug;

use crate::consts::*;
use crate::decode::Decoder;
use crate::error::{DecodeError, TrapReason};
use crate::instruction::{read_expression, Expression};
use crate::types::{Export, ExternalKind, FuncType, GlobalType, Import, Limits, ValType};

/// Body of a defined function: flattened locals plus its expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    /// Local declarations with the run-length encoding expanded.
    pub locals: Vec<ValType>,
    /// Instruction sequence, terminated by `end`.
    pub expr: Expression,
}

/// Global declaration with its constant initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
    /// Content type and mutability.
    pub ty: GlobalType,
    /// Constant initializer expression.
    pub init: Expression,
}

/// Funcref-table initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    /// Constant expression yielding the i32 start offset in the table.
    pub offset: Expression,
    /// Function indices written consecutively from the offset.
    pub functions: Vec<u32>,
}

/// Linear-memory initializer, addressable by index for `memory.init`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    /// Target memory index (single memory in practice).
    pub memory: u32,
    /// Constant expression yielding the i32 destination; `None` for
    /// passive segments, which are only reachable through `memory.init`.
    pub offset: Option<Expression>,
    /// Raw payload bytes.
    pub bytes: Vec<u8>,
}

/// The decoded in-memory representation of a binary module.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Module {
    /// Function signatures referenced by index.
    pub types: Vec<FuncType>,
    /// Imported host functions; their count offsets defined-function
    /// indices.
    pub imports: Vec<Import>,
    /// Type index of each defined function.
    pub functions: Vec<u32>,
    /// Funcref table limits.
    pub tables: Vec<Limits>,
    /// Linear memory limits, in pages.
    pub memories: Vec<Limits>,
    /// Typed globals with initializers.
    pub globals: Vec<GlobalDecl>,
    /// Named entry points.
    pub exports: Vec<Export>,
    /// Function to run once at instantiation.
    pub start: Option<u32>,
    /// Funcref-table initializers.
    pub elements: Vec<ElementSegment>,
    /// Bodies of the defined functions, parallel to `functions`.
    pub codes: Vec<FuncBody>,
    /// Linear-memory initializers.
    pub data: Vec<DataSegment>,
}

impl Module {
    /// Decode a binary module: header check, then one pass over the
    /// section records.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut d = Decoder::new(bytes);

        if d.bytes(4).map_err(|_| DecodeError::BadMagic)? != MODULE_MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(d.bytes(4).map_err(|_| DecodeError::BadMagic)?);
        if version != MODULE_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let mut module = Self::default();
        while !d.is_empty() {
            let id = d.u8()?;
            let size = d.var_u32()? as usize;
            let payload = d.bytes(size)?;
            debug!(section = section_name(id), size, "decoding section");
            module.decode_section(id, payload)?;
        }
        Ok(module)
    }

    fn decode_section(&mut self, id: u8, payload: &[u8]) -> Result<(), DecodeError> {
        let mut d = Decoder::new(payload);
        match id {
            SECTION_CUSTOM | SECTION_TAG => return Ok(()),
            SECTION_TYPE => self.decode_types(&mut d)?,
            SECTION_IMPORT => self.decode_imports(&mut d)?,
            SECTION_FUNCTION => {
                let count = d.var_u32()?;
                self.functions = (0..count)
                    .map(|_| d.var_u32())
                    .collect::<Result<_, _>>()?;
            }
            SECTION_TABLE => {
                let count = d.var_u32()?;
                self.tables = (0..count)
                    .map(|_| {
                        let elem_type = d.u8()?;
                        if elem_type != 0x70 {
                            return Err(DecodeError::UnsupportedTableType(elem_type));
                        }
                        decode_limits(&mut d)
                    })
                    .collect::<Result<_, _>>()?;
            }
            SECTION_MEMORY => {
                let count = d.var_u32()?;
                self.memories = (0..count)
                    .map(|_| decode_limits(&mut d))
                    .collect::<Result<_, _>>()?;
            }
            SECTION_GLOBAL => self.decode_globals(&mut d)?,
            SECTION_EXPORT => self.decode_exports(&mut d)?,
            SECTION_START => self.start = Some(d.var_u32()?),
            SECTION_ELEMENT => self.decode_elements(&mut d)?,
            SECTION_CODE => self.decode_codes(&mut d)?,
            SECTION_DATA => self.decode_data(&mut d)?,
            SECTION_DATA_COUNT => {
                // Duplicated count ahead of the code section; the data
                // section itself is authoritative here.
                d.var_u32()?;
            }
            other => return Err(DecodeError::UnknownSection(other)),
        }
        if !d.is_empty() {
            return Err(DecodeError::SectionSizeMismatch {
                name: section_name(id),
            });
        }
        Ok(())
    }

    fn decode_types(&mut self, d: &mut Decoder) -> Result<(), DecodeError> {
        let count = d.var_u32()?;
        self.types = (0..count)
            .map(|_| {
                let tag = d.u8()?;
                if tag != 0x60 {
                    return Err(DecodeError::InvalidFuncType(tag));
                }
                let param_count = d.var_u32()?;
                let params = (0..param_count)
                    .map(|_| ValType::from_byte(d.u8()?))
                    .collect::<Result<Vec<_>, _>>()?;
                let result_count = d.var_u32()?;
                let result = match result_count {
                    0 => None,
                    1 => Some(ValType::from_byte(d.u8()?)?),
                    _ => return Err(DecodeError::MultipleResults),
                };
                Ok(FuncType { params, result })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn decode_imports(&mut self, d: &mut Decoder) -> Result<(), DecodeError> {
        let count = d.var_u32()?;
        self.imports = (0..count)
            .map(|_| {
                let module = d.name()?;
                let field = d.name()?;
                let kind = d.u8()?;
                if kind != ExternalKind::Func as u8 {
                    return Err(DecodeError::UnsupportedImportKind(kind));
                }
                let type_index = d.var_u32()?;
                Ok(Import {
                    module,
                    field,
                    type_index,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn decode_globals(&mut self, d: &mut Decoder) -> Result<(), DecodeError> {
        let count = d.var_u32()?;
        self.globals = (0..count)
            .map(|_| {
                let content = ValType::from_byte(d.u8()?)?;
                let mutable = match d.u8()? {
                    0 => false,
                    1 => true,
                    other => return Err(DecodeError::InvalidMutability(other)),
                };
                let init = read_expression(d)?;
                Ok(GlobalDecl {
                    ty: GlobalType { content, mutable },
                    init,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn decode_exports(&mut self, d: &mut Decoder) -> Result<(), DecodeError> {
        let count = d.var_u32()?;
        self.exports = (0..count)
            .map(|_| {
                let name = d.name()?;
                let kind = ExternalKind::from_byte(d.u8()?)?;
                let index = d.var_u32()?;
                Ok(Export { name, kind, index })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn decode_elements(&mut self, d: &mut Decoder) -> Result<(), DecodeError> {
        let count = d.var_u32()?;
        self.elements = (0..count)
            .map(|_| {
                let flags = d.var_u32()?;
                if flags != 0 {
                    return Err(DecodeError::UnsupportedElementKind(flags));
                }
                let offset = read_expression(d)?;
                let func_count = d.var_u32()?;
                let functions = (0..func_count)
                    .map(|_| d.var_u32())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ElementSegment { offset, functions })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn decode_codes(&mut self, d: &mut Decoder) -> Result<(), DecodeError> {
        let count = d.var_u32()?;
        self.codes = (0..count)
            .map(|_| {
                let body_size = d.var_u32()? as usize;
                let mut body = Decoder::new(d.bytes(body_size)?);
                let group_count = body.var_u32()?;
                let mut locals = Vec::new();
                for _ in 0..group_count {
                    let n = body.var_u32()?;
                    let ty = ValType::from_byte(body.u8()?)?;
                    locals.extend(std::iter::repeat(ty).take(n as usize));
                }
                let expr = read_expression(&mut body)?;
                if !body.is_empty() {
                    return Err(DecodeError::SectionSizeMismatch {
                        name: section_name(SECTION_CODE),
                    });
                }
                Ok(FuncBody { locals, expr })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn decode_data(&mut self, d: &mut Decoder) -> Result<(), DecodeError> {
        let count = d.var_u32()?;
        self.data = (0..count)
            .map(|_| {
                let flags = d.var_u32()?;
                let (memory, offset) = match flags {
                    0 => (0, Some(read_expression(d)?)),
                    1 => (0, None),
                    2 => {
                        let memory = d.var_u32()?;
                        (memory, Some(read_expression(d)?))
                    }
                    other => return Err(DecodeError::UnsupportedDataKind(other)),
                };
                let len = d.var_u32()? as usize;
                let bytes = d.bytes(len)?.to_vec();
                Ok(DataSegment {
                    memory,
                    offset,
                    bytes,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Number of imported functions; `call` indices below it dispatch to
    /// the host bridge.
    pub fn import_count(&self) -> usize {
        self.imports.len()
    }

    /// Look up an export by name.
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Signature of a function in the combined (imports-first) index space.
    pub fn func_type(&self, func_index: u32) -> Result<&FuncType, TrapReason> {
        let type_index = match self.imports.get(func_index as usize) {
            Some(import) => import.type_index,
            None => {
                let defined = func_index as usize - self.imports.len();
                *self
                    .functions
                    .get(defined)
                    .ok_or(TrapReason::FunctionIndexOutOfBounds)?
            }
        };
        self.types
            .get(type_index as usize)
            .ok_or(TrapReason::TypeIndexOutOfBounds)
    }

    /// Body of a defined function in the combined index space.
    pub fn code(&self, func_index: u32) -> Result<&FuncBody, TrapReason> {
        let defined = (func_index as usize)
            .checked_sub(self.imports.len())
            .ok_or(TrapReason::FunctionIndexOutOfBounds)?;
        self.codes
            .get(defined)
            .ok_or(TrapReason::FunctionIndexOutOfBounds)
    }
}

fn decode_limits(d: &mut Decoder) -> Result<Limits, DecodeError> {
    let flags = d.u8()?;
    let min = d.var_u32()?;
    let max = match flags {
        0x00 => None,
        0x01 => Some(d.var_u32()?),
        other => return Err(DecodeError::InvalidLimits(other)),
    };
    Ok(Limits { min, max })
}
