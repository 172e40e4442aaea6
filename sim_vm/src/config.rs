//! Virtual machine configuration

use serde::{Deserialize, Serialize};

/// Machine parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Words of shared memory
    pub mem_size: usize,
    /// Ticks a burst may run before the machine yields
    pub time_slice: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            mem_size: 256,
            time_slice: 15,
        }
    }
}
