//! File-backed reports
//!
//! `<root>/<name>/<name>.out` gets the words a program wrote followed by its
//! halt report; `<root>/os.out` gets the system summary.

use kernel_api::KernelError;
use sim_kernel::{ProcessReport, ReportSink, SystemSummary};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileReportSink {
    root: PathBuf,
}

impl FileReportSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn process_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(format!("{}.out", name))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join("os.out")
    }
}

fn write_file(path: &Path, text: &str) -> Result<(), KernelError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| KernelError::Report(format!("{}: {}", parent.display(), e)))?;
    }
    fs::write(path, text).map_err(|e| KernelError::Report(format!("{}: {}", path.display(), e)))
}

impl ReportSink for FileReportSink {
    fn process_report(&mut self, report: &ProcessReport) -> Result<(), KernelError> {
        let mut text = String::new();
        for word in &report.output {
            let _ = writeln!(text, "{}", word);
        }
        let _ = writeln!(text, "{}", report);
        write_file(&self.process_path(&report.name), &text)
    }

    fn system_summary(&mut self, summary: &SystemSummary) -> Result<(), KernelError> {
        write_file(&self.summary_path(), &format!("{}\n", summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_kernel::{CachePolicy, SystemStats};
    use kernel_api::{Duration, Instant};

    #[test]
    fn test_summary_written_to_os_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileReportSink::new(dir.path());
        let summary = SystemSummary::new(
            CachePolicy::Fifo,
            Instant::from_ticks(100),
            &SystemStats {
                user_total: Duration::from_ticks(80),
                finished: 1,
                ..SystemStats::default()
            },
            1000,
        );

        sink.system_summary(&summary).unwrap();
        let text = fs::read_to_string(dir.path().join("os.out")).unwrap();
        assert!(text.starts_with("System summary (fifo policy)"));
        assert!(text.contains("user time:        80"));
    }
}
