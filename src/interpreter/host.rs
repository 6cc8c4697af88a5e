//! Host-call bridge
//!
//! Imported functions dispatch through a [`HostFn`] handler keyed on the
//! import index. The default table exposes a single POSIX-shaped routine,
//! `fd_write(fd, iovs_ptr, iovs_len, nwritten_ptr)`, which gathers
//! length-prefixed chunks out of linear memory and writes them to stdout or
//! stderr. Sink failures are logged and surface as a non-zero guest status,
//! never as a trap.

use std::io::{self, Write};

use itertools::Itertools;
use tracing::{debug, warn};

use super::Interpreter;
use crate::error::{TrapReason, TrapResult};
use crate::value::Value;

/// WASI-style status codes pushed back to the guest.
const ERRNO_SUCCESS: i32 = 0;
const ERRNO_IO: i32 = 29;

/// Accessing the VM state from a host handler is done through this trait.
pub trait HostAccess {
    /// Pop the top of the value stack.
    fn pop_value(&mut self) -> TrapResult<Value>;
    /// Push onto the value stack.
    fn push_value(&mut self, value: Value);
    /// Linear memory, read side.
    fn memory(&self) -> &[u8];
    /// Linear memory, write side.
    fn memory_mut(&mut self) -> &mut [u8];
}

impl HostAccess for Interpreter<'_> {
    fn pop_value(&mut self) -> TrapResult<Value> {
        self.pop()
    }

    fn push_value(&mut self, value: Value) {
        self.push(value);
    }

    fn memory(&self) -> &[u8] {
        self.memory.as_slice()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.as_mut_slice()
    }
}

/// Host handler function type, dispatched on the import index.
pub type HostFn = fn(&mut dyn HostAccess, usize) -> TrapResult<()>;

/// Default dispatch table: import index 0 is `fd_write`.
pub(crate) fn default_host(vm: &mut dyn HostAccess, import_index: usize) -> TrapResult<()> {
    match import_index {
        0 => fd_write(vm),
        _ => Err(TrapReason::UnknownHostFunction),
    }
}

impl Interpreter<'_> {
    /// Sets the host handler function.
    pub fn set_host(&mut self, host: HostFn) {
        self.host = host;
    }

    /// Resets the host handler function back to the default table.
    pub fn reset_host(&mut self) {
        self.set_host(default_host);
    }

    /// Dispatch an imported function index to the host bridge.
    pub(crate) fn host_call(&mut self, import_index: usize) -> TrapResult<()> {
        let import = &self.module.imports[import_index];
        debug!(
            import_index,
            module = import.module.as_str(),
            field = import.field.as_str(),
            "host call"
        );
        (self.host)(self, import_index)
    }
}

/// `fd_write(fd, iovs_ptr, iovs_len, nwritten_ptr)`: gather `iovs_len`
/// (base, length) pairs at `iovs_ptr`, write them to the sink selected by
/// `fd` (1 is stdout, everything else stderr), store the total byte count
/// at `nwritten_ptr` and push a status code.
fn fd_write(vm: &mut dyn HostAccess) -> TrapResult<()> {
    let nwritten_ptr = u32::try_from(vm.pop_value()?)?;
    let iovs_len = u32::try_from(vm.pop_value()?)?;
    let iovs_ptr = u32::try_from(vm.pop_value()?)?;
    let fd = i32::try_from(vm.pop_value()?)?;

    let status = {
        let stdout = io::stdout();
        let stderr = io::stderr();
        let result = if fd == 1 {
            gather_write(vm.memory(), iovs_ptr, iovs_len, &mut stdout.lock())
        } else {
            gather_write(vm.memory(), iovs_ptr, iovs_len, &mut stderr.lock())
        };
        match result {
            Ok(total) => {
                store_u32(vm.memory_mut(), nwritten_ptr, total)?;
                ERRNO_SUCCESS
            }
            Err(GatherError::Trap(reason)) => return Err(reason),
            Err(GatherError::Sink(err)) => {
                warn!(fd, %err, "host sink write failed");
                ERRNO_IO
            }
        }
    };

    vm.push_value(Value::I32(status));
    Ok(())
}

/// Failure modes of the gather walk: guest-visible traps for bad
/// descriptors, sink errors reported through the status code.
#[derive(Debug)]
pub(crate) enum GatherError {
    Trap(TrapReason),
    Sink(io::Error),
}

impl From<TrapReason> for GatherError {
    fn from(reason: TrapReason) -> Self {
        Self::Trap(reason)
    }
}

/// Walk the scatter-gather list and write every chunk, returning the total
/// byte count.
pub(crate) fn gather_write(
    memory: &[u8],
    iovs_ptr: u32,
    iovs_len: u32,
    sink: &mut impl Write,
) -> Result<u32, GatherError> {
    let words = (0..u64::from(iovs_len) * 2)
        .map(|i| load_u32(memory, u64::from(iovs_ptr) + 4 * i))
        .collect::<TrapResult<Vec<u32>>>()?;

    let mut total = 0u32;
    for (base, len) in words.into_iter().tuples() {
        let chunk = memory
            .get(base as usize..base as usize + len as usize)
            .ok_or(TrapReason::MemoryOutOfBounds)?;
        sink.write_all(chunk).map_err(GatherError::Sink)?;
        total = total.saturating_add(len);
    }
    sink.flush().map_err(GatherError::Sink)?;
    Ok(total)
}

fn load_u32(memory: &[u8], addr: u64) -> TrapResult<u32> {
    let addr = usize::try_from(addr).map_err(|_| TrapReason::MemoryOutOfBounds)?;
    let bytes = memory
        .get(addr..addr.saturating_add(4))
        .ok_or(TrapReason::MemoryOutOfBounds)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(buf))
}

fn store_u32(memory: &mut [u8], addr: u32, value: u32) -> TrapResult<()> {
    let addr = addr as usize;
    let slot = memory
        .get_mut(addr..addr.saturating_add(4))
        .ok_or(TrapReason::MemoryOutOfBounds)?;
    slot.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_iov(memory: &mut [u8], slot: u32, base: u32, len: u32) {
        store_u32(memory, slot, base).unwrap();
        store_u32(memory, slot + 4, len).unwrap();
    }

    #[test]
    fn gather_walk_concatenates_chunks() {
        let mut memory = vec![0u8; 256];
        memory[0..5].copy_from_slice(b"Hello");
        memory[8..14].copy_from_slice(b" World");
        write_iov(&mut memory, 32, 0, 5);
        write_iov(&mut memory, 40, 8, 6);

        let mut sink = Vec::new();
        let total = gather_write(&memory, 32, 2, &mut sink).unwrap();
        assert_eq!(total, 11);
        assert_eq!(sink, b"Hello World");
    }

    #[test]
    fn gather_walk_traps_on_bad_descriptor() {
        let mut memory = vec![0u8; 64];
        write_iov(&mut memory, 0, 60, 32);
        let mut sink = Vec::new();
        assert!(matches!(
            gather_write(&memory, 0, 1, &mut sink),
            Err(GatherError::Trap(TrapReason::MemoryOutOfBounds))
        ));
    }

    #[test]
    fn empty_gather_list_writes_nothing() {
        let memory = vec![0u8; 16];
        let mut sink = Vec::new();
        let total = gather_write(&memory, 0, 0, &mut sink).unwrap();
        assert_eq!(total, 0);
        assert!(sink.is_empty());
    }
}
