//! Module instantiation
//!
//! Builds a runtime from a decoded image: memory at its declared minimum,
//! the funcref table at its declared size, then every constant initializer
//! expression evaluated through the execution engine itself against an
//! empty frame. Globals come first so later initializers can read them.

use tracing::debug;

use super::host::default_host;
use super::{Frame, Global, Interpreter, Memory, RuntimeData};
use crate::error::{RuntimeResult, TrapReason, TrapResult};
use crate::instruction::Instruction;
use crate::module::Module;

impl<'m> Interpreter<'m> {
    /// Instantiate a decoded module: allocate memory and table, place
    /// element and data segments, record globals, then run the start
    /// function if the module declares one.
    pub fn instantiate(module: &'m Module) -> RuntimeResult<Self> {
        let table_size = module.tables.first().map_or(0, |l| l.min as usize);
        let mut vm = Self {
            module,
            stack: Vec::new(),
            memory: Memory::new(module.memories.first()),
            globals: Vec::with_capacity(module.globals.len()),
            table: vec![None; table_size],
            data: module
                .data
                .iter()
                .map(|segment| RuntimeData {
                    bytes: segment.bytes.clone(),
                    dropped: false,
                })
                .collect(),
            host: default_host,
        };
        vm.initialize()?;
        Ok(vm)
    }

    fn initialize(&mut self) -> RuntimeResult<()> {
        let module = self.module;
        debug!(
            globals = module.globals.len(),
            elements = module.elements.len(),
            data = module.data.len(),
            pages = self.memory.size_pages(),
            "instantiating module"
        );

        for declaration in &module.globals {
            self.eval_const(&declaration.init)?;
            let value = self.pop()?;
            if value.ty() != declaration.ty.content {
                return Err(TrapReason::TypeMismatch.into());
            }
            self.globals.push(Global {
                ty: declaration.ty,
                value,
            });
        }

        for segment in &module.elements {
            self.eval_const(&segment.offset)?;
            let offset = self.pop_u32()? as usize;
            let end = offset
                .checked_add(segment.functions.len())
                .ok_or(TrapReason::TableOutOfBounds)?;
            if end > self.table.len() {
                return Err(TrapReason::TableOutOfBounds.into());
            }
            for (slot, func_index) in self.table[offset..end].iter_mut().zip(&segment.functions) {
                *slot = Some(*func_index);
            }
        }

        for segment in &module.data {
            let Some(offset_expr) = &segment.offset else {
                continue;
            };
            self.eval_const(offset_expr)?;
            let dest = self.pop_u32()?;
            self.memory.store(u64::from(dest), &segment.bytes)?;
        }

        if let Some(start) = module.start {
            debug!(start, "running start function");
            self.call(start)?;
        }
        Ok(())
    }

    /// Evaluate a constant initializer expression against an empty frame,
    /// leaving its result on the stack.
    fn eval_const(&mut self, expr: &[Instruction]) -> TrapResult<()> {
        let mut frame = Frame::default();
        self.execute_expr(expr, &mut frame)
    }
}
