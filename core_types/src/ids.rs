//! Process identity

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one loaded process
///
/// Names come from the program directory and are what reports show; two
/// loads of the same program still get distinct ids, so the process table
/// and every queue are keyed by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(Uuid);

impl ProcessId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First eight hex digits, enough to tell processes apart in logs
    pub fn short(&self) -> String {
        let mut text = self.0.simple().to_string();
        text.truncate(8);
        text
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid-{}", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_get_distinct_ids() {
        assert_ne!(ProcessId::new(), ProcessId::new());
    }

    #[test]
    fn test_display_uses_short_form() {
        let uuid = Uuid::from_u128(0x1234_5678_9abc_def0_0000_0000_0000_0001);
        let id = ProcessId::from_uuid(uuid);
        assert_eq!(id.short(), "12345678");
        assert_eq!(id.to_string(), "pid-12345678");
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn test_serializes_as_bare_uuid() {
        let uuid = Uuid::from_u128(7);
        let json = serde_json::to_string(&ProcessId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
        let back: ProcessId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_uuid(), uuid);
    }
}
