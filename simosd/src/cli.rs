//! Launch argument parsing
//!
//! `simosd <fifo|lru> [--io DIR] [--config FILE] [--max-dispatches N] [--verbose]`
//!
//! The cache policy selector is mandatory. It may be written bare or with
//! one or two leading dashes.

use crate::runtime::HostRuntimeConfig;
use sim_kernel::CachePolicy;
use std::path::PathBuf;

/// What the command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(HostRuntimeConfig),
    Help,
}

/// Parses `args`, where `args[0]` is the program name
pub fn parse_args(args: &[String]) -> Result<CliAction, String> {
    let mut config = HostRuntimeConfig::default();
    let mut policy = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--io" | "-i" => {
                i += 1;
                let dir = args.get(i).ok_or("Missing value for --io")?;
                config.io_root = PathBuf::from(dir);
            }
            "--config" | "-c" => {
                i += 1;
                let file = args.get(i).ok_or("Missing value for --config")?;
                config.config_file = Some(PathBuf::from(file));
            }
            "--max-dispatches" => {
                i += 1;
                let value = args.get(i).ok_or("Missing value for --max-dispatches")?;
                let limit = value
                    .parse()
                    .map_err(|_| format!("Invalid max-dispatches value: {}", value))?;
                config.max_dispatches = Some(limit);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => return Ok(CliAction::Help),
            other => match CachePolicy::parse(other) {
                Some(selected) if policy.is_none() => policy = Some(selected),
                Some(_) => return Err(format!("Cache policy given twice: {}", other)),
                None => return Err(format!("Unknown option: {}", other)),
            },
        }
        i += 1;
    }

    config.policy = policy.ok_or("Missing cache policy: fifo or lru")?;
    Ok(CliAction::Run(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("simosd")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    fn run_config(list: &[&str]) -> HostRuntimeConfig {
        match parse_args(&args(list)).unwrap() {
            CliAction::Run(config) => config,
            CliAction::Help => panic!("expected a run"),
        }
    }

    #[test]
    fn test_selector_forms() {
        assert_eq!(run_config(&["fifo"]).policy, CachePolicy::Fifo);
        assert_eq!(run_config(&["-lru"]).policy, CachePolicy::Lru);
        assert_eq!(run_config(&["--lru"]).policy, CachePolicy::Lru);
    }

    #[test]
    fn test_missing_or_invalid_selector_is_rejected() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["--verbose"])).is_err());
        assert!(parse_args(&args(&["mru"])).is_err());
        assert!(parse_args(&args(&["fifo", "lru"])).is_err());
    }

    #[test]
    fn test_options() {
        let config = run_config(&[
            "--io",
            "programs",
            "lru",
            "--config",
            "simos.json",
            "--max-dispatches",
            "500",
            "-v",
        ]);
        assert_eq!(config.io_root, PathBuf::from("programs"));
        assert_eq!(config.config_file, Some(PathBuf::from("simos.json")));
        assert_eq!(config.max_dispatches, Some(500));
        assert!(config.verbose);
    }

    #[test]
    fn test_option_errors() {
        assert!(parse_args(&args(&["fifo", "--io"])).is_err());
        assert!(parse_args(&args(&["fifo", "--max-dispatches", "many"])).is_err());
        assert_eq!(parse_args(&args(&["--help"])), Ok(CliAction::Help));
    }
}
