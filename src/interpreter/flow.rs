//! Control-flow routines: branches, calls and frame transfer
//!
//! Branch targets are absolute expression indices resolved at decode time;
//! taking a branch truncates the frame's label stack to the target
//! construct and jumps. The shared value stack is not isolated between
//! frames: a caller observes the callee's pushes directly, which is what
//! carries call results.

use tracing::trace;

use super::{Frame, Interpreter, Label};
use crate::error::{TrapReason, TrapResult};
use crate::state::ExecuteState;
use crate::value::Value;

impl Interpreter<'_> {
    /// `br depth`: jump out of (or back into, for loops) the `depth`-th
    /// enclosing construct. A depth equal to the number of entered labels
    /// targets the function body itself and returns.
    pub(crate) fn branch(&mut self, frame: &mut Frame, depth: u32) -> TrapResult<ExecuteState> {
        let depth = depth as usize;
        if depth == frame.labels.len() {
            return Ok(ExecuteState::Return);
        }
        let index = frame
            .labels
            .len()
            .checked_sub(1 + depth)
            .ok_or(TrapReason::LabelOutOfBounds)?;
        let state = match frame.labels[index] {
            // The construct's own end still executes and pops its label.
            Label::Block { end } => ExecuteState::Jump(end),
            // Re-enter the body; the loop's label stays entered.
            Label::Loop { head } => ExecuteState::Jump(head + 1),
        };
        frame.labels.truncate(index + 1);
        Ok(state)
    }

    /// `br_table`: pop the selector, pick a label, saturating into the
    /// default target.
    pub(crate) fn branch_table(
        &mut self,
        frame: &mut Frame,
        targets: &[u32],
        default: u32,
    ) -> TrapResult<ExecuteState> {
        let selector = self.pop_u32()? as usize;
        let depth = targets.get(selector).copied().unwrap_or(default);
        self.branch(frame, depth)
    }

    /// `call f`: host bridge for imported indices, a fresh frame otherwise.
    ///
    /// Operands are popped in reverse signature order into the parameter
    /// vector; declared locals are zero-initialized from their types.
    pub(crate) fn call(&mut self, func_index: u32) -> TrapResult<()> {
        let module = self.module;
        if (func_index as usize) < module.import_count() {
            return self.host_call(func_index as usize);
        }

        let signature = module.func_type(func_index)?;
        let code = module.code(func_index)?;
        trace!(
            func_index,
            params = signature.params.len(),
            locals = code.locals.len(),
            "calling function"
        );

        let mut locals = vec![Value::I32(0); signature.params.len()];
        for slot in (0..signature.params.len()).rev() {
            let value = self.pop()?;
            if value.ty() != signature.params[slot] {
                return Err(TrapReason::TypeMismatch);
            }
            locals[slot] = value;
        }
        locals.extend(code.locals.iter().map(|ty| Value::zero(*ty)));

        let mut frame = Frame::new(locals);
        self.execute_expr(&code.expr, &mut frame)
    }

    /// `call_indirect`: pop the table index, resolve the function index,
    /// verify the callee's signature against the declared type, then call.
    pub(crate) fn call_indirect(&mut self, type_index: u32) -> TrapResult<()> {
        let module = self.module;
        let entry = self.pop_u32()? as usize;
        let func_index = self
            .table
            .get(entry)
            .copied()
            .ok_or(TrapReason::TableOutOfBounds)?
            .ok_or(TrapReason::UninitializedElement)?;

        let declared = module
            .types
            .get(type_index as usize)
            .ok_or(TrapReason::TypeIndexOutOfBounds)?;
        if module.func_type(func_index)? != declared {
            return Err(TrapReason::IndirectCallTypeMismatch);
        }
        self.call(func_index)
    }

    /// `select`: pop the condition and both alternatives, keep one.
    pub(crate) fn select(&mut self) -> TrapResult<ExecuteState> {
        let condition = self.pop_i32()?;
        let on_zero = self.pop()?;
        let on_nonzero = self.pop()?;
        self.push(if condition != 0 { on_nonzero } else { on_zero });
        Ok(ExecuteState::Proceed)
    }

    /// `local.get`/`local.set`/`local.tee` share one bounds-checked slot
    /// lookup over the linear parameter+local namespace.
    pub(crate) fn local_slot<'f>(
        &self,
        frame: &'f mut Frame,
        index: u32,
    ) -> TrapResult<&'f mut Value> {
        frame
            .locals
            .get_mut(index as usize)
            .ok_or(TrapReason::LocalIndexOutOfBounds)
    }

    pub(crate) fn global_get(&mut self, index: u32) -> TrapResult<ExecuteState> {
        let value = self
            .globals
            .get(index as usize)
            .ok_or(TrapReason::GlobalIndexOutOfBounds)?
            .value;
        self.push(value);
        Ok(ExecuteState::Proceed)
    }

    pub(crate) fn global_set(&mut self, index: u32) -> TrapResult<ExecuteState> {
        let value = self.pop()?;
        let global = self
            .globals
            .get_mut(index as usize)
            .ok_or(TrapReason::GlobalIndexOutOfBounds)?;
        if !global.ty.mutable {
            return Err(TrapReason::ImmutableGlobal);
        }
        global.value = value;
        Ok(ExecuteState::Proceed)
    }
}
