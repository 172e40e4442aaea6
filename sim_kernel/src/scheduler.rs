//! Round-robin scheduler
//!
//! ## Philosophy
//!
//! - **Mechanism, not policy**: the scheduler only moves process ids between
//!   queues. The dispatch loop decides which queue a process belongs in.
//! - **Determinism first**: same loads + same bursts => same schedule.
//! - **Strict arrival order**: no priorities, no aging. Every process that is
//!   not terminated goes back to the tail of a queue.
//!
//! ## Design
//!
//! - **Ready queue**: FIFO of runnable processes.
//! - **Wait queue**: FIFO of processes blocked on I/O, each with the clock
//!   value at which it becomes runnable again.
//! - **Active slot**: at most one process is resident in the machine.
//!
//! Every process id is in exactly one of ready, waiting, active or
//! terminated at any observation point.

use core_types::ProcessId;
use kernel_api::{ExitStatus, Instant};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Where a process currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Residency {
    Ready,
    Waiting,
    Active,
    Terminated,
}

/// A blocked process and the clock value it waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitEntry {
    pub id: ProcessId,
    pub wake_at: Instant,
}

/// Scheduling event for audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// Process was moved into the active slot
    Selected { id: ProcessId, at: Instant },
    /// Time slice expired, process went back to the ready tail
    Preempted { id: ProcessId, at: Instant },
    /// Process issued blocking I/O
    Blocked {
        id: ProcessId,
        wake_at: Instant,
        at: Instant,
    },
    /// Wait time elapsed, process moved to the ready tail
    Woken { id: ProcessId, at: Instant },
    /// Process faulted and was requeued
    Faulted {
        id: ProcessId,
        status: ExitStatus,
        at: Instant,
    },
    /// Process halted
    Exited { id: ProcessId, at: Instant },
}

impl ScheduleEvent {
    pub fn id(&self) -> ProcessId {
        match self {
            ScheduleEvent::Selected { id, .. }
            | ScheduleEvent::Preempted { id, .. }
            | ScheduleEvent::Blocked { id, .. }
            | ScheduleEvent::Woken { id, .. }
            | ScheduleEvent::Faulted { id, .. }
            | ScheduleEvent::Exited { id, .. } => *id,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    ready: VecDeque<ProcessId>,
    waiting: VecDeque<WaitEntry>,
    active: Option<ProcessId>,
    terminated: Vec<ProcessId>,
    audit_log: Vec<ScheduleEvent>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a newly loaded process to the ready tail
    pub fn enqueue(&mut self, id: ProcessId) {
        self.ready.push_back(id);
    }

    /// One scheduling pass
    ///
    /// Promotes every waiting process whose wake time has been reached, then
    /// fills an empty active slot from the ready head. Returns the promoted
    /// entries in the order they were moved.
    pub fn schedule(&mut self, now: Instant) -> Vec<WaitEntry> {
        let mut woken = Vec::new();
        // Single pass over the current length; still-waiting entries keep
        // their relative order.
        for _ in 0..self.waiting.len() {
            let Some(entry) = self.waiting.pop_front() else {
                break;
            };
            if entry.wake_at <= now {
                self.ready.push_back(entry.id);
                self.audit_log.push(ScheduleEvent::Woken { id: entry.id, at: now });
                woken.push(entry);
            } else {
                self.waiting.push_back(entry);
            }
        }

        if self.active.is_none() {
            if let Some(id) = self.ready.pop_front() {
                self.active = Some(id);
                self.audit_log.push(ScheduleEvent::Selected { id, at: now });
            }
        }
        woken
    }

    /// Sends the active process to the ready tail after its slice expired
    pub fn preempt(&mut self, id: ProcessId, now: Instant) {
        self.release(id);
        self.ready.push_back(id);
        self.audit_log.push(ScheduleEvent::Preempted { id, at: now });
    }

    /// Sends the active process to the ready tail after a runtime fault
    pub fn fault(&mut self, id: ProcessId, status: ExitStatus, now: Instant) {
        self.release(id);
        self.ready.push_back(id);
        self.audit_log
            .push(ScheduleEvent::Faulted { id, status, at: now });
    }

    /// Sends the active process to the wait queue until `wake_at`
    pub fn block(&mut self, id: ProcessId, wake_at: Instant, now: Instant) {
        self.release(id);
        self.waiting.push_back(WaitEntry { id, wake_at });
        self.audit_log
            .push(ScheduleEvent::Blocked { id, wake_at, at: now });
    }

    /// Retires the active process
    pub fn exit(&mut self, id: ProcessId, now: Instant) {
        self.release(id);
        self.terminated.push(id);
        self.audit_log.push(ScheduleEvent::Exited { id, at: now });
    }

    fn release(&mut self, id: ProcessId) {
        if self.active == Some(id) {
            self.active = None;
        }
    }

    pub fn active(&self) -> Option<ProcessId> {
        self.active
    }

    pub fn ready(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.ready.iter().copied()
    }

    pub fn waiting(&self) -> impl Iterator<Item = &WaitEntry> + '_ {
        self.waiting.iter()
    }

    pub fn terminated(&self) -> &[ProcessId] {
        &self.terminated
    }

    pub fn has_waiting(&self) -> bool {
        !self.waiting.is_empty()
    }

    /// Earliest wake time in the wait queue
    pub fn next_wake(&self) -> Option<Instant> {
        self.waiting.iter().map(|entry| entry.wake_at).min()
    }

    /// Ready, wait and active are all empty
    pub fn is_finished(&self) -> bool {
        self.active.is_none() && self.ready.is_empty() && self.waiting.is_empty()
    }

    pub fn residency(&self, id: ProcessId) -> Option<Residency> {
        if self.active == Some(id) {
            Some(Residency::Active)
        } else if self.ready.contains(&id) {
            Some(Residency::Ready)
        } else if self.waiting.iter().any(|entry| entry.id == id) {
            Some(Residency::Waiting)
        } else if self.terminated.contains(&id) {
            Some(Residency::Terminated)
        } else {
            None
        }
    }

    /// Returns a reference to the audit log
    ///
    /// Used in tests to verify scheduling behavior.
    pub fn audit_log(&self) -> &[ScheduleEvent] {
        &self.audit_log
    }

    /// Clears the audit log
    pub fn clear_audit_log(&mut self) {
        self.audit_log.clear();
    }
}
