//! # SimOS Host Daemon
//!
//! Main entry point for the SimOS simulator.

use simosd::{parse_args, CliAction, HostRuntime};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("simosd");

    let config = match parse_args(&args) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            print_usage(program);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage(program);
            process::exit(1);
        }
    };

    let mut runtime = HostRuntime::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to start: {}", e);
        process::exit(1);
    });

    match runtime.run() {
        Ok(summary) => println!("{}", summary),
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <fifo|lru> [OPTIONS]", program);
    eprintln!();
    eprintln!("Cache policy (required):");
    eprintln!("  fifo, -fifo, --fifo       First in, first out");
    eprintln!("  lru, -lru, --lru          Least recently used");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -i, --io <DIR>            Program directory (default: io)");
    eprintln!("  -c, --config <FILE>       JSON kernel and vm settings");
    eprintln!("  --max-dispatches <N>      Stop with an error after N bursts");
    eprintln!("  -v, --verbose             Log scheduling decisions");
    eprintln!("  -h, --help                Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} fifo --io io", program);
    eprintln!("  {} -lru --config simos.json --max-dispatches 10000", program);
}
