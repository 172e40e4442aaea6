//! # Host Runtime
//!
//! Boots the machine and the kernel, loads the programs and runs them.

use crate::report::FileReportSink;
use kernel_api::KernelError;
use serde::{Deserialize, Serialize};
use services_logger::{LogLevel, StdoutLogSink};
use sim_kernel::{
    CachePolicy, FileStackStore, Kernel, KernelConfig, Loader, LoaderError, SystemSummary,
};
use sim_vm::{VirtualMachine, VmConfig};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Host runtime error types
#[derive(Debug, Error)]
pub enum HostRuntimeError {
    #[error("Config error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

/// Contents of the `--config` JSON file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfigFile {
    pub kernel: KernelConfig,
    pub vm: VmConfig,
}

/// Host runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRuntimeConfig {
    /// Cache policy selected on the command line
    pub policy: CachePolicy,
    /// Directory holding one subdirectory per program
    pub io_root: PathBuf,
    /// Optional JSON config file
    pub config_file: Option<PathBuf>,
    /// Overrides the dispatch limit from the config file
    pub max_dispatches: Option<u64>,
    /// Log scheduling decisions as well
    pub verbose: bool,
}

impl Default for HostRuntimeConfig {
    fn default() -> Self {
        Self {
            policy: CachePolicy::Fifo,
            io_root: PathBuf::from("io"),
            config_file: None,
            max_dispatches: None,
            verbose: false,
        }
    }
}

impl HostRuntimeConfig {
    /// Reads the config file, if any, and applies the command-line overrides
    pub fn resolve(&self) -> Result<HostConfigFile, HostRuntimeError> {
        let mut file = match &self.config_file {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| HostRuntimeError::Config {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                serde_json::from_str(&text).map_err(|e| HostRuntimeError::Config {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            None => HostConfigFile::default(),
        };
        file.kernel.policy = self.policy;
        if self.max_dispatches.is_some() {
            file.kernel.max_dispatches = self.max_dispatches;
        }
        Ok(file)
    }
}

/// Host runtime
pub struct HostRuntime {
    kernel: Kernel<VirtualMachine>,
    loaded: usize,
}

impl HostRuntime {
    /// Boots the machine and kernel and loads every program under the I/O root
    pub fn new(config: HostRuntimeConfig) -> Result<Self, HostRuntimeError> {
        let settings = config.resolve()?;
        let level = if config.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };

        let machine = VirtualMachine::new(settings.vm);
        let mut kernel = Kernel::new(machine, settings.kernel)
            .with_stack_store(FileStackStore::new(&config.io_root))
            .with_log_sink(StdoutLogSink::new(level))
            .with_report_sink(FileReportSink::new(&config.io_root));

        let loaded = Loader::new(&config.io_root).load_all(&mut kernel)?.len();
        Ok(Self { kernel, loaded })
    }

    /// Number of programs that made it into the ready queue
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn kernel(&self) -> &Kernel<VirtualMachine> {
        &self.kernel
    }

    /// Runs until every process has halted
    pub fn run(&mut self) -> Result<SystemSummary, HostRuntimeError> {
        Ok(self.kernel.run()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simos.json");
        fs::write(
            &path,
            r#"{ "kernel": { "io_latency": 10, "max_dispatches": 50 }, "vm": { "time_slice": 20 } }"#,
        )
        .unwrap();

        let config = HostRuntimeConfig {
            policy: CachePolicy::Lru,
            config_file: Some(path),
            max_dispatches: Some(7),
            ..HostRuntimeConfig::default()
        };
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.kernel.io_latency, 10);
        assert_eq!(resolved.kernel.policy, CachePolicy::Lru);
        assert_eq!(resolved.kernel.max_dispatches, Some(7));
        assert_eq!(resolved.vm.time_slice, 20);
        assert_eq!(resolved.vm.mem_size, 256);
    }

    #[test]
    fn test_resolve_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let config = HostRuntimeConfig {
            config_file: Some(path),
            ..HostRuntimeConfig::default()
        };
        assert!(matches!(
            config.resolve(),
            Err(HostRuntimeError::Config { .. })
        ));
    }
}
