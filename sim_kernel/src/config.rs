//! Kernel configuration

use kernel_api::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache policy named on the command line
///
/// Paging is not simulated; the policy is validated at launch and reported
/// in the system summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    #[default]
    Fifo,
    Lru,
}

impl CachePolicy {
    /// Parses a policy selector, accepting `fifo`, `-fifo` and `--fifo`
    pub fn parse(selector: &str) -> Option<Self> {
        match selector.trim_start_matches('-') {
            "fifo" => Some(CachePolicy::Fifo),
            "lru" => Some(CachePolicy::Lru),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CachePolicy::Fifo => "fifo",
            CachePolicy::Lru => "lru",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scheduling and accounting constants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Ticks charged to the clock and system time on every preemption
    pub context_switch_cost: u64,
    /// Ticks a blocking read or write keeps a process in the wait queue
    pub io_latency: u64,
    /// Ticks charged before jumping to the next wake time when idle
    pub idle_increment: u64,
    /// Multiplier applied to finished-per-tick throughput
    pub throughput_scale: u64,
    /// Upper bound on dispatches per run (None = unlimited)
    pub max_dispatches: Option<u64>,
    pub policy: CachePolicy,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            context_switch_cost: 5,
            io_latency: 27,
            idle_increment: 1,
            throughput_scale: 1000,
            max_dispatches: None,
            policy: CachePolicy::Fifo,
        }
    }
}

impl KernelConfig {
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn context_switch(&self) -> Duration {
        Duration::from_ticks(self.context_switch_cost)
    }

    pub fn io_wait(&self) -> Duration {
        Duration::from_ticks(self.io_latency)
    }

    pub fn idle_step(&self) -> Duration {
        Duration::from_ticks(self.idle_increment)
    }
}
