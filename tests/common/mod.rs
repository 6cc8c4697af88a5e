//! Shared harness: assemble a module from text, run one export, read the
//! observable effects back out of linear memory.

#![allow(dead_code)]

use wasmite::error::InterpreterError;
use wasmite::module::Module;
use wasmite::prelude::Interpreter;

/// Assemble, instantiate and run, returning the final linear memory.
pub fn run(wat: &str, entry: &str) -> Vec<u8> {
    let bytes = wat::parse_str(wat).expect("invalid wat");
    let module = Module::decode(&bytes).expect("failed to decode module");
    let mut vm = Interpreter::instantiate(&module).expect("failed to instantiate");
    vm.run(entry).expect("failed to run export");
    vm.memory().to_vec()
}

/// Assemble, instantiate and run, returning the failure.
pub fn run_err(wat: &str, entry: &str) -> InterpreterError {
    let bytes = wat::parse_str(wat).expect("invalid wat");
    let module = Module::decode(&bytes).expect("failed to decode module");
    let mut vm = Interpreter::instantiate(&module).expect("failed to instantiate");
    vm.run(entry).expect_err("expected the export to fail")
}

pub fn read_i32(memory: &[u8], offset: usize) -> i32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&memory[offset..offset + 4]);
    i32::from_le_bytes(buf)
}

pub fn read_u32(memory: &[u8], offset: usize) -> u32 {
    read_i32(memory, offset) as u32
}

pub fn read_i64(memory: &[u8], offset: usize) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&memory[offset..offset + 8]);
    i64::from_le_bytes(buf)
}

pub fn read_f32(memory: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(memory, offset))
}

pub fn read_f64(memory: &[u8], offset: usize) -> f64 {
    f64::from_bits(read_i64(memory, offset) as u64)
}
