//! lazyflow CLI: compile and run dataflow documents.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input error (arguments, files, JSON, assembly)
//! - 2: Compile, optimize or link error
//! - 3: Runtime error

use lazyflow_cli::commands;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "compile" => commands::compile(&args[2..]),
        "run" => commands::run(&args[2..]),
        "exec" => commands::exec(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => {
            eprintln!("error: unknown command '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

fn print_usage() {
    eprintln!("Usage: lazyflow <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  compile <doc.json> [--no-optimize]      Print the compiled program");
    eprintln!("  run <doc.json> [--no-optimize] [--stats] [--trace]");
    eprintln!("                                          Compile and run, print the result as JSON");
    eprintln!("  exec <prog.lfa> [--no-optimize] [--stats] [--trace]");
    eprintln!("                                          Run an assembly listing");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file.json>                    Load compile/optimize/vm options");
    eprintln!();
    eprintln!("Logging is controlled by RUST_LOG (default: warn).");
}
