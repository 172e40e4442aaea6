//! The dispatch loop
//!
//! One iteration: fill the active slot (idling the clock forward when only
//! blocked processes remain), load the active process, run one burst and
//! route the process by the burst's [`ExitStatus`].
//!
//! | Exit | Route |
//! |---|---|
//! | time slice expired | save, charge a context switch, ready tail |
//! | halt | finalize and emit the halt report |
//! | runtime fault | log one error line, save, ready tail |
//! | blocking read or write | save, wait queue until clock + I/O latency |
//!
//! Faults are observed, not fatal: the faulting process stays scheduled.
//! An instruction that faults while executing has already advanced pc, so
//! the process resumes after it. A fetch fault (pc outside the partition,
//! e.g. running off the end without `halt`) leaves pc in place and repeats
//! on every burst; `max_dispatches` is what ends such a run.

use crate::accounting::{self, ProcessReport, SystemSummary};
use crate::Kernel;
use core_types::ProcessId;
use kernel_api::{Duration, ExitStatus, Instant, KernelError, Machine};
use services_logger::{LogEntry, LogLevel};

/// What one call to [`Kernel::step`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A burst ran and ended with `exit`
    Dispatched { id: ProcessId, exit: ExitStatus },
    /// Nothing was runnable, processes are still waiting
    Idle,
    /// Ready, wait and active are all empty
    Finished,
}

impl<M: Machine> Kernel<M> {
    /// Runs one iteration of the dispatch loop
    pub fn step(&mut self) -> Result<StepOutcome, KernelError> {
        if self.scheduler.active().is_none() {
            if self.scheduler.has_waiting() {
                self.idle();
            }
            self.schedule();
        }

        let Some(id) = self.scheduler.active() else {
            return Ok(if self.scheduler.is_finished() {
                StepOutcome::Finished
            } else {
                StepOutcome::Idle
            });
        };

        if let Some(limit) = self.config.max_dispatches {
            if self.dispatches >= limit {
                return Err(KernelError::DispatchLimitReached(limit));
            }
        }
        self.dispatches += 1;

        self.load_state(id)?;
        let burst = self.machine.run();
        self.descriptor_mut(id)?.exec_time += burst.elapsed;
        self.stats.user_total += burst.elapsed;

        self.route(id, burst.exit)?;
        self.schedule();
        Ok(StepOutcome::Dispatched {
            id,
            exit: burst.exit,
        })
    }

    /// Drives the loop until every process has halted
    ///
    /// Emits and returns the system summary.
    pub fn run(&mut self) -> Result<SystemSummary, KernelError> {
        while self.step()? != StepOutcome::Finished {}

        let summary = SystemSummary::new(
            self.config.policy,
            self.machine.clock(),
            &self.stats,
            self.config.throughput_scale,
        );
        self.reports.system_summary(&summary)?;
        self.log(
            LogEntry::new(LogLevel::Info, "all processes finished")
                .with_field("clock", summary.clock.as_ticks())
                .with_field("finished", summary.finished),
        );
        Ok(summary)
    }

    /// Current system summary without ending the run
    pub fn summary(&self) -> SystemSummary {
        SystemSummary::new(
            self.config.policy,
            self.machine.clock(),
            &self.stats,
            self.config.throughput_scale,
        )
    }

    /// Promotes due waiters and fills the active slot
    fn schedule(&mut self) {
        let now = self.machine.clock();
        for entry in self.scheduler.schedule(now) {
            let name = self.name_of(entry.id);
            self.log(
                LogEntry::new(LogLevel::Debug, "woken")
                    .with_source(name)
                    .with_field("clock", now.as_ticks()),
            );
        }
        if let Some(id) = self.scheduler.active() {
            let name = self.name_of(id);
            self.log(
                LogEntry::new(LogLevel::Debug, "selected")
                    .with_source(name)
                    .with_field("clock", now.as_ticks()),
            );
        }
    }

    /// Moves the clock to the earliest wake time
    ///
    /// Charges the idle increment first, then whatever wait remains measured
    /// from the already advanced clock, so the total idle never overshoots
    /// the earliest wake time unless the increment alone does.
    fn idle(&mut self) {
        let step = self.config.idle_step();
        self.machine.advance_clock(step);
        let now = self.machine.clock();
        let remaining = self
            .scheduler
            .next_wake()
            .map(|wake_at| wake_at.duration_since(now))
            .unwrap_or(Duration::ZERO);
        self.machine.advance_clock(remaining);

        let idled = step + remaining;
        self.stats.idle_total += idled;
        self.stats.system_time += idled;
        self.log(
            LogEntry::new(LogLevel::Debug, "idle")
                .with_field("ticks", idled.as_ticks())
                .with_field("clock", self.machine.clock().as_ticks()),
        );
    }

    fn route(&mut self, id: ProcessId, exit: ExitStatus) -> Result<(), KernelError> {
        match exit {
            ExitStatus::TimeSliceExpired => {
                self.save_state(id)?;
                let cost = self.config.context_switch();
                self.machine.advance_clock(cost);
                self.stats.system_time += cost;

                let now = self.machine.clock();
                self.descriptor_mut(id)?.wake_marker = now;
                self.scheduler.preempt(id, now);
                let name = self.name_of(id);
                self.log(
                    LogEntry::new(LogLevel::Debug, "preempted")
                        .with_source(name)
                        .with_field("clock", now.as_ticks()),
                );
            }
            ExitStatus::Halt => self.finalize(id)?,
            ExitStatus::AddressOutOfBounds
            | ExitStatus::StackOverflow
            | ExitStatus::StackUnderflow
            | ExitStatus::InvalidOpcode => {
                let now = self.machine.clock();
                let pc = self.machine.context().pc;
                let name = self.name_of(id);
                self.log(
                    LogEntry::new(LogLevel::Error, exit.describe())
                        .with_source(name)
                        .with_field("code", exit.code())
                        .with_field("pc", pc)
                        .with_field("clock", now.as_ticks()),
                );

                self.save_state(id)?;
                self.descriptor_mut(id)?.wake_marker = now;
                self.scheduler.fault(id, exit, now);
            }
            ExitStatus::Read | ExitStatus::Write => {
                let now = self.machine.clock();
                let latency = self.config.io_wait();
                let wake_at = now + latency;

                self.save_state(id)?;
                let pcb = self.descriptor_mut(id)?;
                pcb.io_time += latency;
                pcb.wake_marker = wake_at;
                self.scheduler.block(id, wake_at, now);
                let name = self.name_of(id);
                self.log(
                    LogEntry::new(LogLevel::Debug, exit.describe())
                        .with_source(name)
                        .with_field("wake_at", wake_at.as_ticks()),
                );
            }
        }
        Ok(())
    }

    /// Emits the halt report and releases the descriptor
    fn finalize(&mut self, id: ProcessId) -> Result<(), KernelError> {
        let now = self.machine.clock();
        let mem_size = self.machine.memory().size();
        let context = self.machine.context();
        let io = self.machine.detach_io();

        self.stats.finished += 1;
        let pcb = self
            .processes
            .remove(&id)
            .ok_or_else(|| KernelError::UnknownProcess(id.to_string()))?;
        self.stacks.discard(pcb.name())?;

        let largest_stack = mem_size
            .saturating_sub(context.largest_stack)
            .saturating_sub(1);
        let report = ProcessReport {
            id,
            name: pcb.name().to_string(),
            clock: now,
            exec_time: pcb.exec_time,
            wait_time: pcb.wait_time,
            io_time: pcb.io_time,
            turnaround: now.duration_since(Instant::ZERO),
            largest_stack,
            system_utilization: accounting::system_utilization(now, &self.stats),
            user_utilization: accounting::ratio(pcb.exec_time.as_ticks(), now.as_ticks()),
            throughput: accounting::throughput(
                now,
                self.stats.finished,
                self.config.throughput_scale,
            ),
            finished: self.stats.finished,
            output: io.output().to_vec(),
        };

        self.scheduler.exit(id, now);
        self.log(
            LogEntry::new(LogLevel::Info, "halted")
                .with_source(pcb.name())
                .with_field("clock", now.as_ticks())
                .with_field("cpu", pcb.exec_time.as_ticks()),
        );
        self.reports.process_report(&report)
    }
}
