//! CLI command implementations.
//!
//! Each command reports its own errors on stderr and returns the exit code
//! to use.

use crate::config::Config;
use crate::json::to_json;
use crate::logging;
use lazyflow_common::{Image, Program};
use lazyflow_compiler::DocumentContext;
use lazyflow_vm::{Vm, VmOptions};
use std::fs;
use tracing::debug;

/// Flags shared by the commands.
#[derive(Debug, Default, PartialEq)]
struct Flags {
    input: Option<String>,
    no_optimize: bool,
    stats: bool,
    trace: bool,
    config: Option<String>,
}

/// Parse `<input> [flags]`, accepting only the flags listed in `allowed`.
fn parse_flags(args: &[String], allowed: &[&str], usage: &str) -> Result<Flags, i32> {
    let mut flags = Flags::default();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if arg.starts_with("--") && !allowed.contains(&arg) {
            eprintln!("error: unknown option '{arg}'");
            eprintln!("Usage: {usage}");
            return Err(1);
        }
        match arg {
            "--no-optimize" => flags.no_optimize = true,
            "--stats" => flags.stats = true,
            "--trace" => flags.trace = true,
            "--config" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("error: --config requires a file");
                    return Err(1);
                };
                flags.config = Some(path.clone());
            }
            _ if flags.input.is_none() => flags.input = Some(arg.to_string()),
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: {usage}");
                return Err(1);
            }
        }
        i += 1;
    }
    if flags.input.is_none() {
        eprintln!("error: missing input file");
        eprintln!("Usage: {usage}");
        return Err(1);
    }
    Ok(flags)
}

const COMPILE_USAGE: &str = "lazyflow compile <doc.json> [--no-optimize] [--config <file.json>]";
const RUN_USAGE: &str =
    "lazyflow run <doc.json> [--no-optimize] [--stats] [--trace] [--config <file.json>]";
const EXEC_USAGE: &str =
    "lazyflow exec <prog.lfa> [--no-optimize] [--stats] [--trace] [--config <file.json>]";

/// Compile a document and print its disassembly.
pub fn compile(args: &[String]) -> Result<(), i32> {
    let flags = parse_flags(args, &["--no-optimize", "--config"], COMPILE_USAGE)?;
    let config = load_config(&flags)?;
    logging::init(false);

    let program = build(&flags, &config)?;
    print!("{}", lazyflow_assembler::disassemble(&program));
    Ok(())
}

/// Compile and run a document, printing the result as JSON.
pub fn run(args: &[String]) -> Result<(), i32> {
    let flags = parse_flags(
        args,
        &["--no-optimize", "--stats", "--trace", "--config"],
        RUN_USAGE,
    )?;
    let config = load_config(&flags)?;
    logging::init(flags.trace);

    let program = build(&flags, &config)?;
    execute(&program, &flags, &config)
}

/// Assemble a listing and run it.
pub fn exec(args: &[String]) -> Result<(), i32> {
    let flags = parse_flags(
        args,
        &["--no-optimize", "--stats", "--trace", "--config"],
        EXEC_USAGE,
    )?;
    let config = load_config(&flags)?;
    logging::init(flags.trace);

    let text = read_input(&flags)?;
    let program = lazyflow_assembler::assemble(&text).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let program = maybe_optimize(program, &flags, &config)?;
    execute(&program, &flags, &config)
}

// --- Helpers ---

fn load_config(flags: &Flags) -> Result<Config, i32> {
    match &flags.config {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

fn read_input(flags: &Flags) -> Result<String, i32> {
    let path = flags.input.as_deref().unwrap_or_default();
    fs::read_to_string(path).map_err(|e| {
        eprintln!("error: cannot read '{path}': {e}");
        1
    })
}

/// Read, parse, compile and optionally optimize the input document.
fn build(flags: &Flags, config: &Config) -> Result<Program, i32> {
    let text = read_input(flags)?;
    let document = DocumentContext::from_json(&text).map_err(|e| {
        eprintln!("error: invalid document: {e}");
        1
    })?;

    let program = lazyflow_compiler::compile(&document, &config.compile).map_err(|e| {
        eprintln!("compile error: {e}");
        2
    })?;
    debug!(chunks = program.len(), "compiled");
    maybe_optimize(program, flags, config)
}

fn maybe_optimize(program: Program, flags: &Flags, config: &Config) -> Result<Program, i32> {
    if flags.no_optimize {
        return Ok(program);
    }
    lazyflow_optimizer::optimize(program, &config.optimize).map_err(|e| {
        eprintln!("optimize error: {e}");
        2
    })
}

fn link(program: &Program) -> Result<Image, i32> {
    program.link().map_err(|e| {
        eprintln!("link error: {e}");
        2
    })
}

/// Run a program and print its result; `--stats` adds counters on stderr.
fn execute(program: &Program, flags: &Flags, config: &Config) -> Result<(), i32> {
    let image = link(program)?;
    let options = VmOptions {
        count_executed_instructions: config.vm.count_executed_instructions || flags.stats,
        record_maximum_stack_heights: config.vm.record_maximum_stack_heights || flags.stats,
        trace: config.vm.trace || flags.trace,
    };

    let mut vm = Vm::new(&image, options);
    let result = vm.interpret().and_then(|()| vm.pop_result());

    if flags.stats {
        match serde_json::to_string(vm.stats()) {
            Ok(stats) => eprintln!("stats: {stats}"),
            Err(e) => eprintln!("warning: cannot print stats: {e}"),
        }
    }

    match result {
        Ok(value) => {
            println!("{}", to_json(&value));
            Ok(())
        }
        Err(e) => {
            eprintln!("runtime error: {e}");
            Err(3)
        }
    }
}
