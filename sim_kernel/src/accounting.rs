//! Process and system accounting
//!
//! Every statistic is cumulative since the machine started and is
//! recomputed whenever a process halts.

use crate::config::CachePolicy;
use core_types::{ProcessId, Word};
use kernel_api::{Duration, Instant, KernelError};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Running totals for the whole machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    /// Clock ticks with no process resident
    pub idle_total: Duration,
    /// Context switches plus idle time
    pub system_time: Duration,
    /// Sum of every burst executed
    pub user_total: Duration,
    pub finished: u64,
}

/// `part / whole`, zero before the clock has moved
pub fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Fraction of the clock not spent idle
pub fn system_utilization(clock: Instant, stats: &SystemStats) -> f64 {
    let busy = clock.as_ticks().saturating_sub(stats.idle_total.as_ticks());
    ratio(busy, clock.as_ticks())
}

/// Finished processes per `scale` clock ticks
pub fn throughput(clock: Instant, finished: u64, scale: u64) -> f64 {
    ratio(finished.saturating_mul(scale), clock.as_ticks())
}

/// Halt report for one process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub id: ProcessId,
    pub name: String,
    /// Clock at halt
    pub clock: Instant,
    pub exec_time: Duration,
    pub wait_time: Duration,
    pub io_time: Duration,
    /// Time from machine start to halt
    pub turnaround: Duration,
    /// Deepest stack reached, in words
    pub largest_stack: usize,
    pub system_utilization: f64,
    pub user_utilization: f64,
    pub throughput: f64,
    pub finished: u64,
    /// Words the program wrote
    pub output: Vec<Word>,
}

impl fmt::Display for ProcessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Process {} halted", self.name)?;
        writeln!(f, "  clock:              {}", self.clock.as_ticks())?;
        writeln!(f, "  cpu time:           {}", self.exec_time.as_ticks())?;
        writeln!(f, "  waiting time:       {}", self.wait_time.as_ticks())?;
        writeln!(f, "  i/o time:           {}", self.io_time.as_ticks())?;
        writeln!(f, "  turnaround time:    {}", self.turnaround.as_ticks())?;
        writeln!(f, "  largest stack size: {}", self.largest_stack)?;
        writeln!(f, "  system cpu util:    {:.2}%", self.system_utilization * 100.0)?;
        writeln!(f, "  user cpu util:      {:.2}%", self.user_utilization * 100.0)?;
        writeln!(f, "  throughput:         {:.3}", self.throughput)?;
        write!(f, "  finished:           {}", self.finished)
    }
}

/// End of run summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub policy: CachePolicy,
    pub clock: Instant,
    pub system_time: Duration,
    pub idle_total: Duration,
    pub user_total: Duration,
    pub system_utilization: f64,
    pub user_utilization: f64,
    pub throughput: f64,
    pub finished: u64,
}

impl SystemSummary {
    pub fn new(policy: CachePolicy, clock: Instant, stats: &SystemStats, scale: u64) -> Self {
        Self {
            policy,
            clock,
            system_time: stats.system_time,
            idle_total: stats.idle_total,
            user_total: stats.user_total,
            system_utilization: system_utilization(clock, stats),
            user_utilization: ratio(stats.user_total.as_ticks(), clock.as_ticks()),
            throughput: throughput(clock, stats.finished, scale),
            finished: stats.finished,
        }
    }
}

impl fmt::Display for SystemSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "System summary ({} policy)", self.policy)?;
        writeln!(f, "  clock:            {}", self.clock.as_ticks())?;
        writeln!(f, "  system time:      {}", self.system_time.as_ticks())?;
        writeln!(f, "  idle time:        {}", self.idle_total.as_ticks())?;
        writeln!(f, "  user time:        {}", self.user_total.as_ticks())?;
        writeln!(f, "  system cpu util:  {:.2}%", self.system_utilization * 100.0)?;
        writeln!(f, "  user cpu util:    {:.2}%", self.user_utilization * 100.0)?;
        writeln!(f, "  throughput:       {:.3}", self.throughput)?;
        write!(f, "  finished:         {}", self.finished)
    }
}

/// Destination for halt reports and the final summary
pub trait ReportSink {
    fn process_report(&mut self, report: &ProcessReport) -> Result<(), KernelError>;

    fn system_summary(&mut self, summary: &SystemSummary) -> Result<(), KernelError>;
}

/// Discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReportSink;

impl ReportSink for NullReportSink {
    fn process_report(&mut self, _report: &ProcessReport) -> Result<(), KernelError> {
        Ok(())
    }

    fn system_summary(&mut self, _summary: &SystemSummary) -> Result<(), KernelError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Collected {
    reports: Vec<ProcessReport>,
    summary: Option<SystemSummary>,
}

/// Keeps reports in memory
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportSink {
    collected: Rc<RefCell<Collected>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ProcessReport> {
        self.collected.borrow().reports.clone()
    }

    pub fn report(&self, name: &str) -> Option<ProcessReport> {
        self.collected
            .borrow()
            .reports
            .iter()
            .find(|report| report.name == name)
            .cloned()
    }

    pub fn summary(&self) -> Option<SystemSummary> {
        self.collected.borrow().summary.clone()
    }
}

impl ReportSink for MemoryReportSink {
    fn process_report(&mut self, report: &ProcessReport) -> Result<(), KernelError> {
        self.collected.borrow_mut().reports.push(report.clone());
        Ok(())
    }

    fn system_summary(&mut self, summary: &SystemSummary) -> Result<(), KernelError> {
        self.collected.borrow_mut().summary = Some(summary.clone());
        Ok(())
    }
}
