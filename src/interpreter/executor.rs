//! Instruction executors
//!
//! [`Interpreter::run`] resolves the named export and executes it;
//! [`Interpreter::execute_expr`] drives a frame's instruction sequence
//! through one big dispatch per instruction. Dispatch reports an
//! [`ExecuteState`] instead of touching the program counter itself, which
//! keeps every handler a plain function of the stack and the frame.

use tracing::trace;

use super::{alu, Frame, Interpreter, Label};
use crate::error::{InterpreterError, RuntimeResult, TrapReason, TrapResult};
use crate::instruction::{Instruction, MemArg};
use crate::state::ExecuteState;
use crate::types::ExternalKind;
use crate::value::Value;

impl<'m> Interpreter<'m> {
    /// Look up the export by name and execute it.
    ///
    /// Results, if any, are left on the value stack; most guests report
    /// through linear memory or the host bridge instead.
    pub fn run(&mut self, name: &str) -> RuntimeResult<()> {
        let export = self
            .module
            .export(name)
            .ok_or_else(|| InterpreterError::ExportNotFound(name.into()))?;
        if export.kind != ExternalKind::Func {
            return Err(InterpreterError::NotAFunction(name.into()));
        }
        trace!(name, index = export.index, "running export");
        self.call(export.index)?;
        Ok(())
    }

    /// Execute a frame's instruction sequence to completion.
    pub(crate) fn execute_expr(
        &mut self,
        expr: &[Instruction],
        frame: &mut Frame,
    ) -> TrapResult<()> {
        let mut pc = 0;
        while let Some(instr) = expr.get(pc) {
            match self.step(pc, instr, frame)? {
                ExecuteState::Proceed => pc += 1,
                ExecuteState::Jump(target) => pc = target,
                ExecuteState::Return => break,
            }
        }
        Ok(())
    }

    fn step(
        &mut self,
        pc: usize,
        instr: &Instruction,
        frame: &mut Frame,
    ) -> TrapResult<ExecuteState> {
        trace!(pc, ?instr, stack = self.stack.len(), "step");

        let state = match instr {
            Instruction::Unreachable => return Err(TrapReason::Unreachable),
            Instruction::Nop => ExecuteState::Proceed,

            Instruction::Block { end, .. } => {
                frame.labels.push(Label::Block { end: *end });
                ExecuteState::Proceed
            }
            Instruction::Loop { .. } => {
                frame.labels.push(Label::Loop { head: pc });
                ExecuteState::Proceed
            }
            Instruction::If {
                else_target, end, ..
            } => {
                let condition = self.pop_i32()?;
                frame.labels.push(Label::Block { end: *end });
                if condition != 0 {
                    ExecuteState::Proceed
                } else {
                    // False arm starts behind the else sentinel; without
                    // one, land on the end, which pops the label.
                    ExecuteState::Jump(else_target.map_or(*end, |e| e + 1))
                }
            }
            Instruction::Else { end } => {
                // Reached by falling out of the true arm.
                ExecuteState::Jump(*end)
            }
            Instruction::End => {
                frame.labels.pop();
                ExecuteState::Proceed
            }
            Instruction::Br { depth } => self.branch(frame, *depth)?,
            Instruction::BrIf { depth } => {
                if self.pop_i32()? != 0 {
                    self.branch(frame, *depth)?
                } else {
                    ExecuteState::Proceed
                }
            }
            Instruction::BrTable { targets, default } => {
                self.branch_table(frame, targets, *default)?
            }
            Instruction::Return => ExecuteState::Return,
            Instruction::Call(func_index) => {
                self.call(*func_index)?;
                ExecuteState::Proceed
            }
            Instruction::CallIndirect { type_index, .. } => {
                self.call_indirect(*type_index)?;
                ExecuteState::Proceed
            }

            Instruction::Drop => {
                self.pop()?;
                ExecuteState::Proceed
            }
            Instruction::Select | Instruction::SelectT(_) => self.select()?,

            Instruction::LocalGet(index) => {
                let value = *self.local_slot(frame, *index)?;
                self.push(value);
                ExecuteState::Proceed
            }
            Instruction::LocalSet(index) => {
                let value = self.pop()?;
                *self.local_slot(frame, *index)? = value;
                ExecuteState::Proceed
            }
            Instruction::LocalTee(index) => {
                let value = self.peek()?;
                *self.local_slot(frame, *index)? = value;
                ExecuteState::Proceed
            }
            Instruction::GlobalGet(index) => self.global_get(*index)?,
            Instruction::GlobalSet(index) => self.global_set(*index)?,

            Instruction::I32Load(m) => {
                self.load_op(m, |b: [u8; 4]| Value::I32(i32::from_le_bytes(b)))?
            }
            Instruction::I64Load(m) => {
                self.load_op(m, |b: [u8; 8]| Value::I64(i64::from_le_bytes(b)))?
            }
            Instruction::F32Load(m) => {
                self.load_op(m, |b: [u8; 4]| Value::F32(f32::from_le_bytes(b)))?
            }
            Instruction::F64Load(m) => {
                self.load_op(m, |b: [u8; 8]| Value::F64(f64::from_le_bytes(b)))?
            }
            Instruction::I32Load8S(m) => {
                self.load_op(m, |b: [u8; 1]| Value::I32(i32::from(b[0] as i8)))?
            }
            Instruction::I32Load8U(m) => {
                self.load_op(m, |b: [u8; 1]| Value::I32(i32::from(b[0])))?
            }
            Instruction::I32Load16S(m) => {
                self.load_op(m, |b: [u8; 2]| Value::I32(i32::from(i16::from_le_bytes(b))))?
            }
            Instruction::I32Load16U(m) => {
                self.load_op(m, |b: [u8; 2]| Value::I32(i32::from(u16::from_le_bytes(b))))?
            }
            Instruction::I64Load8S(m) => {
                self.load_op(m, |b: [u8; 1]| Value::I64(i64::from(b[0] as i8)))?
            }
            Instruction::I64Load8U(m) => {
                self.load_op(m, |b: [u8; 1]| Value::I64(i64::from(b[0])))?
            }
            Instruction::I64Load16S(m) => {
                self.load_op(m, |b: [u8; 2]| Value::I64(i64::from(i16::from_le_bytes(b))))?
            }
            Instruction::I64Load16U(m) => {
                self.load_op(m, |b: [u8; 2]| Value::I64(i64::from(u16::from_le_bytes(b))))?
            }
            Instruction::I64Load32S(m) => {
                self.load_op(m, |b: [u8; 4]| Value::I64(i64::from(i32::from_le_bytes(b))))?
            }
            Instruction::I64Load32U(m) => {
                self.load_op(m, |b: [u8; 4]| Value::I64(i64::from(u32::from_le_bytes(b))))?
            }

            Instruction::I32Store(m) => {
                let value = self.pop_i32()?;
                self.store_op(m, &value.to_le_bytes())?
            }
            Instruction::I64Store(m) => {
                let value = self.pop_i64()?;
                self.store_op(m, &value.to_le_bytes())?
            }
            Instruction::F32Store(m) => {
                let value = self.pop_f32()?;
                self.store_op(m, &value.to_le_bytes())?
            }
            Instruction::F64Store(m) => {
                let value = self.pop_f64()?;
                self.store_op(m, &value.to_le_bytes())?
            }
            Instruction::I32Store8(m) => {
                let value = self.pop_i32()?;
                self.store_op(m, &[value as u8])?
            }
            Instruction::I32Store16(m) => {
                let value = self.pop_i32()?;
                self.store_op(m, &(value as u16).to_le_bytes())?
            }
            Instruction::I64Store8(m) => {
                let value = self.pop_i64()?;
                self.store_op(m, &[value as u8])?
            }
            Instruction::I64Store16(m) => {
                let value = self.pop_i64()?;
                self.store_op(m, &(value as u16).to_le_bytes())?
            }
            Instruction::I64Store32(m) => {
                let value = self.pop_i64()?;
                self.store_op(m, &(value as u32).to_le_bytes())?
            }

            Instruction::MemorySize => {
                self.push(Value::I32(self.memory.size_pages() as i32));
                ExecuteState::Proceed
            }
            Instruction::MemoryGrow => {
                let delta = self.pop_u32()?;
                let result = self.memory.grow(delta);
                self.push(Value::I32(result));
                ExecuteState::Proceed
            }

            Instruction::I32Const(v) => {
                self.push(Value::I32(*v));
                ExecuteState::Proceed
            }
            Instruction::I64Const(v) => {
                self.push(Value::I64(*v));
                ExecuteState::Proceed
            }
            Instruction::F32Const(v) => {
                self.push(Value::F32(*v));
                ExecuteState::Proceed
            }
            Instruction::F64Const(v) => {
                self.push(Value::F64(*v));
                ExecuteState::Proceed
            }

            Instruction::I32Eqz => self.unop(|a: i32| a == 0)?,
            Instruction::I32Eq => self.binop(|a: i32, b: i32| a == b)?,
            Instruction::I32Ne => self.binop(|a: i32, b: i32| a != b)?,
            Instruction::I32LtS => self.binop(|a: i32, b: i32| a < b)?,
            Instruction::I32LtU => self.binop(|a: u32, b: u32| a < b)?,
            Instruction::I32GtS => self.binop(|a: i32, b: i32| a > b)?,
            Instruction::I32GtU => self.binop(|a: u32, b: u32| a > b)?,
            Instruction::I32LeS => self.binop(|a: i32, b: i32| a <= b)?,
            Instruction::I32LeU => self.binop(|a: u32, b: u32| a <= b)?,
            Instruction::I32GeS => self.binop(|a: i32, b: i32| a >= b)?,
            Instruction::I32GeU => self.binop(|a: u32, b: u32| a >= b)?,
            Instruction::I64Eqz => self.unop(|a: i64| a == 0)?,
            Instruction::I64Eq => self.binop(|a: i64, b: i64| a == b)?,
            Instruction::I64Ne => self.binop(|a: i64, b: i64| a != b)?,
            Instruction::I64LtS => self.binop(|a: i64, b: i64| a < b)?,
            Instruction::I64LtU => self.binop(|a: u64, b: u64| a < b)?,
            Instruction::I64GtS => self.binop(|a: i64, b: i64| a > b)?,
            Instruction::I64GtU => self.binop(|a: u64, b: u64| a > b)?,
            Instruction::I64LeS => self.binop(|a: i64, b: i64| a <= b)?,
            Instruction::I64LeU => self.binop(|a: u64, b: u64| a <= b)?,
            Instruction::I64GeS => self.binop(|a: i64, b: i64| a >= b)?,
            Instruction::I64GeU => self.binop(|a: u64, b: u64| a >= b)?,
            Instruction::F32Eq => self.binop(|a: f32, b: f32| a == b)?,
            Instruction::F32Ne => self.binop(|a: f32, b: f32| a != b)?,
            Instruction::F32Lt => self.binop(|a: f32, b: f32| a < b)?,
            Instruction::F32Gt => self.binop(|a: f32, b: f32| a > b)?,
            Instruction::F32Le => self.binop(|a: f32, b: f32| a <= b)?,
            Instruction::F32Ge => self.binop(|a: f32, b: f32| a >= b)?,
            Instruction::F64Eq => self.binop(|a: f64, b: f64| a == b)?,
            Instruction::F64Ne => self.binop(|a: f64, b: f64| a != b)?,
            Instruction::F64Lt => self.binop(|a: f64, b: f64| a < b)?,
            Instruction::F64Gt => self.binop(|a: f64, b: f64| a > b)?,
            Instruction::F64Le => self.binop(|a: f64, b: f64| a <= b)?,
            Instruction::F64Ge => self.binop(|a: f64, b: f64| a >= b)?,

            Instruction::I32Clz => self.unop(|a: u32| a.leading_zeros())?,
            Instruction::I32Ctz => self.unop(|a: u32| a.trailing_zeros())?,
            Instruction::I32Popcnt => self.unop(|a: u32| a.count_ones())?,
            Instruction::I32Add => self.binop(i32::wrapping_add)?,
            Instruction::I32Sub => self.binop(i32::wrapping_sub)?,
            Instruction::I32Mul => self.binop(i32::wrapping_mul)?,
            Instruction::I32DivS => self.try_binop(alu::i32_div_s)?,
            Instruction::I32DivU => self.try_binop(alu::i32_div_u)?,
            Instruction::I32RemS => self.try_binop(alu::i32_rem_s)?,
            Instruction::I32RemU => self.try_binop(alu::i32_rem_u)?,
            Instruction::I32And => self.binop(|a: i32, b: i32| a & b)?,
            Instruction::I32Or => self.binop(|a: i32, b: i32| a | b)?,
            Instruction::I32Xor => self.binop(|a: i32, b: i32| a ^ b)?,
            Instruction::I32Shl => self.binop(|a: u32, b: u32| a.wrapping_shl(b))?,
            Instruction::I32ShrS => self.binop(|a: i32, b: i32| a.wrapping_shr(b as u32))?,
            Instruction::I32ShrU => self.binop(|a: u32, b: u32| a.wrapping_shr(b))?,
            Instruction::I32Rotl => self.binop(|a: u32, b: u32| a.rotate_left(b))?,
            Instruction::I32Rotr => self.binop(|a: u32, b: u32| a.rotate_right(b))?,
            Instruction::I64Clz => self.unop(|a: u64| u64::from(a.leading_zeros()))?,
            Instruction::I64Ctz => self.unop(|a: u64| u64::from(a.trailing_zeros()))?,
            Instruction::I64Popcnt => self.unop(|a: u64| u64::from(a.count_ones()))?,
            Instruction::I64Add => self.binop(i64::wrapping_add)?,
            Instruction::I64Sub => self.binop(i64::wrapping_sub)?,
            Instruction::I64Mul => self.binop(i64::wrapping_mul)?,
            Instruction::I64DivS => self.try_binop(alu::i64_div_s)?,
            Instruction::I64DivU => self.try_binop(alu::i64_div_u)?,
            Instruction::I64RemS => self.try_binop(alu::i64_rem_s)?,
            Instruction::I64RemU => self.try_binop(alu::i64_rem_u)?,
            Instruction::I64And => self.binop(|a: i64, b: i64| a & b)?,
            Instruction::I64Or => self.binop(|a: i64, b: i64| a | b)?,
            Instruction::I64Xor => self.binop(|a: i64, b: i64| a ^ b)?,
            Instruction::I64Shl => self.binop(|a: u64, b: u64| a.wrapping_shl(b as u32))?,
            Instruction::I64ShrS => self.binop(|a: i64, b: i64| a.wrapping_shr(b as u32))?,
            Instruction::I64ShrU => self.binop(|a: u64, b: u64| a.wrapping_shr(b as u32))?,
            Instruction::I64Rotl => self.binop(|a: u64, b: u64| a.rotate_left(b as u32))?,
            Instruction::I64Rotr => self.binop(|a: u64, b: u64| a.rotate_right(b as u32))?,

            Instruction::F32Abs => self.unop(f32::abs)?,
            Instruction::F32Neg => self.unop(|a: f32| -a)?,
            Instruction::F32Ceil => self.unop(f32::ceil)?,
            Instruction::F32Floor => self.unop(f32::floor)?,
            Instruction::F32Trunc => self.unop(f32::trunc)?,
            Instruction::F32Nearest => self.unop(alu::f32_nearest)?,
            Instruction::F32Sqrt => self.unop(f32::sqrt)?,
            Instruction::F32Add => self.binop(|a: f32, b: f32| a + b)?,
            Instruction::F32Sub => self.binop(|a: f32, b: f32| a - b)?,
            Instruction::F32Mul => self.binop(|a: f32, b: f32| a * b)?,
            Instruction::F32Div => self.binop(|a: f32, b: f32| a / b)?,
            Instruction::F32Min => self.binop(alu::f32_min)?,
            Instruction::F32Max => self.binop(alu::f32_max)?,
            Instruction::F32Copysign => self.binop(f32::copysign)?,
            Instruction::F64Abs => self.unop(f64::abs)?,
            Instruction::F64Neg => self.unop(|a: f64| -a)?,
            Instruction::F64Ceil => self.unop(f64::ceil)?,
            Instruction::F64Floor => self.unop(f64::floor)?,
            Instruction::F64Trunc => self.unop(f64::trunc)?,
            Instruction::F64Nearest => self.unop(alu::f64_nearest)?,
            Instruction::F64Sqrt => self.unop(f64::sqrt)?,
            Instruction::F64Add => self.binop(|a: f64, b: f64| a + b)?,
            Instruction::F64Sub => self.binop(|a: f64, b: f64| a - b)?,
            Instruction::F64Mul => self.binop(|a: f64, b: f64| a * b)?,
            Instruction::F64Div => self.binop(|a: f64, b: f64| a / b)?,
            Instruction::F64Min => self.binop(alu::f64_min)?,
            Instruction::F64Max => self.binop(alu::f64_max)?,
            Instruction::F64Copysign => self.binop(f64::copysign)?,

            Instruction::I32WrapI64 => self.unop(|a: i64| a as i32)?,
            Instruction::I32TruncF32S => self.try_unop(alu::i32_trunc_f32_s)?,
            Instruction::I32TruncF32U => self.try_unop(alu::i32_trunc_f32_u)?,
            Instruction::I32TruncF64S => self.try_unop(alu::i32_trunc_f64_s)?,
            Instruction::I32TruncF64U => self.try_unop(alu::i32_trunc_f64_u)?,
            Instruction::I64ExtendI32S => self.unop(|a: i32| i64::from(a))?,
            Instruction::I64ExtendI32U => self.unop(|a: u32| u64::from(a))?,
            Instruction::I64TruncF32S => self.try_unop(alu::i64_trunc_f32_s)?,
            Instruction::I64TruncF32U => self.try_unop(alu::i64_trunc_f32_u)?,
            Instruction::I64TruncF64S => self.try_unop(alu::i64_trunc_f64_s)?,
            Instruction::I64TruncF64U => self.try_unop(alu::i64_trunc_f64_u)?,
            Instruction::F32ConvertI32S => self.unop(|a: i32| a as f32)?,
            Instruction::F32ConvertI32U => self.unop(|a: u32| a as f32)?,
            Instruction::F32ConvertI64S => self.unop(|a: i64| a as f32)?,
            Instruction::F32ConvertI64U => self.unop(|a: u64| a as f32)?,
            Instruction::F32DemoteF64 => self.unop(|a: f64| a as f32)?,
            Instruction::F64ConvertI32S => self.unop(|a: i32| f64::from(a))?,
            Instruction::F64ConvertI32U => self.unop(|a: u32| f64::from(a))?,
            Instruction::F64ConvertI64S => self.unop(|a: i64| a as f64)?,
            Instruction::F64ConvertI64U => self.unop(|a: u64| a as f64)?,
            Instruction::F64PromoteF32 => self.unop(|a: f32| f64::from(a))?,
            Instruction::I32ReinterpretF32 => self.unop(f32::to_bits)?,
            Instruction::I64ReinterpretF64 => self.unop(f64::to_bits)?,
            Instruction::F32ReinterpretI32 => self.unop(|a: u32| f32::from_bits(a))?,
            Instruction::F64ReinterpretI64 => self.unop(|a: u64| f64::from_bits(a))?,

            Instruction::I32Extend8S
            | Instruction::I32Extend16S
            | Instruction::I64Extend8S
            | Instruction::I64Extend16S
            | Instruction::I64Extend32S => {
                return Err(TrapReason::NotImplemented("sign-extension operators"))
            }
            Instruction::TruncSat(_) => {
                return Err(TrapReason::NotImplemented("saturating truncation"))
            }

            Instruction::MemoryInit { segment } => self.memory_init(*segment)?,
            Instruction::DataDrop { segment } => self.data_drop(*segment)?,
            Instruction::MemoryCopy => self.memory_copy()?,
            Instruction::MemoryFill => self.memory_fill()?,
        };
        Ok(state)
    }

    fn effective_address(&mut self, memarg: &MemArg) -> TrapResult<u64> {
        let base = self.pop_u32()?;
        Ok(u64::from(base) + u64::from(memarg.offset))
    }

    fn load_op<const N: usize>(
        &mut self,
        memarg: &MemArg,
        make: impl FnOnce([u8; N]) -> Value,
    ) -> TrapResult<ExecuteState> {
        let address = self.effective_address(memarg)?;
        let bytes = self.memory.load::<N>(address)?;
        self.push(make(bytes));
        Ok(ExecuteState::Proceed)
    }

    /// The value is popped by the caller (it precedes the address on the
    /// stack in pop order); this pops the base and writes.
    fn store_op(&mut self, memarg: &MemArg, bytes: &[u8]) -> TrapResult<ExecuteState> {
        let address = self.effective_address(memarg)?;
        self.memory.store(address, bytes)?;
        Ok(ExecuteState::Proceed)
    }

    fn memory_fill(&mut self) -> TrapResult<ExecuteState> {
        let len = self.pop_u32()?;
        let value = self.pop_i32()?;
        let dest = self.pop_u32()?;
        self.memory
            .fill(u64::from(dest), value as u8, u64::from(len))?;
        Ok(ExecuteState::Proceed)
    }

    fn memory_copy(&mut self) -> TrapResult<ExecuteState> {
        let len = self.pop_u32()?;
        let src = self.pop_u32()?;
        let dest = self.pop_u32()?;
        self.memory
            .copy(u64::from(dest), u64::from(src), u64::from(len))?;
        Ok(ExecuteState::Proceed)
    }

    fn memory_init(&mut self, segment: u32) -> TrapResult<ExecuteState> {
        let len = self.pop_u32()?;
        let src = self.pop_u32()?;
        let dest = self.pop_u32()?;
        let data = self
            .data
            .get(segment as usize)
            .ok_or(TrapReason::DataSegmentOutOfBounds)?;
        if data.dropped {
            return Err(TrapReason::DataSegmentDropped);
        }
        // Split the borrow: clone-free access needs the segment and the
        // memory at once.
        let bytes = std::mem::take(&mut self.data[segment as usize].bytes);
        let result = self
            .memory
            .init(u64::from(dest), &bytes, u64::from(src), u64::from(len));
        self.data[segment as usize].bytes = bytes;
        result?;
        Ok(ExecuteState::Proceed)
    }

    fn data_drop(&mut self, segment: u32) -> TrapResult<ExecuteState> {
        let data = self
            .data
            .get_mut(segment as usize)
            .ok_or(TrapReason::DataSegmentOutOfBounds)?;
        data.bytes.clear();
        data.dropped = true;
        Ok(ExecuteState::Proceed)
    }
}
