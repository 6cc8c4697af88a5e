//! Runtime state representation for the interpreter

/// Resulting state of a single instruction dispatch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecuteState {
    /// Fall through to the next instruction.
    #[default]
    Proceed,
    /// Transfer control to an absolute index within the current
    /// expression (branch targets resolved at decode time).
    Jump(usize),
    /// Abandon the remainder of the current frame.
    Return,
}

impl ExecuteState {
    /// True when execution falls through to the next instruction.
    pub const fn should_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}
