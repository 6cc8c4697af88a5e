//! Launcher: decode a module file, instantiate it and run one export.

use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use wasmite::module::Module;
use wasmite::prelude::Interpreter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("wasmite: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().context("missing input file")?;
    let entry = args.next().unwrap_or_else(|| "_start".into());

    let bytes = std::fs::read(&path).with_context(|| format!("unable to open {path}"))?;
    let module = Module::decode(&bytes).with_context(|| format!("decoding {path}"))?;

    let mut vm = Interpreter::instantiate(&module)?;
    vm.run(&entry)?;
    Ok(())
}
