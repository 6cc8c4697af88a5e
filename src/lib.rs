//! Standalone interpreter for the WebAssembly MVP binary format
//!
//! The crate splits into two halves: a streaming module decoder
//! ([`module::Module::decode`]) that lowers section payloads and
//! instruction streams into an immutable image, and a recursive
//! stack-machine runtime ([`interpreter::Interpreter`]) that instantiates
//! the image and executes exported functions. Signed-LEB immediates,
//! indirect calls through a funcref table, bulk-memory operations and a
//! single-import host surface are supported on top of the MVP set.
//!
//! ```no_run
//! use wasmite::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("module.wasm")?;
//! let module = Module::decode(&bytes)?;
//! let mut vm = Interpreter::instantiate(&module)?;
//! vm.run("_start")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod consts;
pub mod decode;
pub mod error;
pub mod instruction;
pub mod interpreter;
pub mod module;
pub mod state;
pub mod types;
pub mod value;

pub mod prelude {
    //! Required implementations for full functionality

    #[doc(no_inline)]
    pub use crate::error::{DecodeError, InterpreterError, TrapReason};
    #[doc(no_inline)]
    pub use crate::instruction::{Instruction, MemArg};
    #[doc(no_inline)]
    pub use crate::interpreter::{HostAccess, HostFn, Interpreter, Memory};
    #[doc(no_inline)]
    pub use crate::module::Module;
    #[doc(no_inline)]
    pub use crate::state::ExecuteState;
    #[doc(no_inline)]
    pub use crate::types::{Export, ExternalKind, FuncType, Limits, ValType};
    #[doc(no_inline)]
    pub use crate::value::Value;
}
