//! Whole-run invariants
//!
//! A mixed workload is stepped one burst at a time while queue membership
//! and time accounting are checked after every step.

use kernel_api::{Duration, Instant};
use sim_kernel::{Residency, StepOutcome};
use tests_scenarios::{call_and_spin_program, compute_program, TestSystem};

const SUM: &str = "\
loadi 0 0
loadi 1 5
add 0 1       ! loop
subi 1 1
compri 1 0
jumpg 2
write 0
halt
";

const ECHO: &str = "read 0\nwrite 0\nread 1\nwrite 1\nhalt\n";

fn mixed_workload() -> TestSystem {
    let mut system = TestSystem::with_time_slice(15);
    system.load("compute", &compute_program(60)).unwrap();
    system.load_with_input("echo", ECHO, vec![11, 12]).unwrap();
    system.load("sum", SUM).unwrap();
    system.load("calls", &call_and_spin_program(5, 20)).unwrap();
    system
}

/// Test: queue membership after every step
///
/// This validates that every loaded process is in exactly one of ready,
/// waiting, active, or terminated at every step boundary.
#[test]
fn test_each_process_in_exactly_one_place() {
    let mut system = mixed_workload();
    let ids = system.loaded().to_vec();

    let mut steps = 0;
    loop {
        for &id in &ids {
            assert_eq!(system.memberships(id), 1, "step {}", steps);
        }
        if system.kernel.step().unwrap() == StepOutcome::Finished {
            break;
        }
        steps += 1;
        assert!(steps < 10_000, "run did not terminate");
    }

    for &id in &ids {
        assert_eq!(system.kernel.residency(id), Some(Residency::Terminated));
    }
    assert_eq!(system.kernel.process_count(), 0);
}

/// Test: time accounting after a full run
///
/// This validates that:
/// 1. The clock is exactly user time plus system time
/// 2. Per-process exec, wait and I/O never exceed turnaround
/// 3. User time is the sum of every process's exec time
#[test]
fn test_time_is_conserved() {
    let mut system = mixed_workload();
    let summary = system.run().unwrap();

    assert_eq!(summary.finished, 4);
    assert_eq!(
        summary.clock.duration_since(Instant::ZERO),
        summary.user_total + summary.system_time
    );

    let reports = system.reports.reports();
    assert_eq!(reports.len(), 4);
    for report in &reports {
        let accounted = report.exec_time + report.wait_time + report.io_time;
        assert!(
            accounted <= report.turnaround,
            "{}: {:?} > {:?}",
            report.name,
            accounted,
            report.turnaround
        );
    }
    let exec: Duration = reports.iter().map(|r| r.exec_time).sum();
    assert_eq!(exec, summary.user_total);

    assert_eq!(system.report("sum").unwrap().output, vec![15]);
    assert_eq!(system.report("echo").unwrap().output, vec![11, 12]);
    assert_eq!(system.report("calls").unwrap().output, vec![5]);
}

/// Test: reports arrive in halt order with increasing counts
#[test]
fn test_finished_count_increases() {
    let mut system = mixed_workload();
    system.run().unwrap();

    let finished: Vec<u64> = system.reports.reports().iter().map(|r| r.finished).collect();
    assert_eq!(finished, vec![1, 2, 3, 4]);

    let clocks: Vec<Instant> = system.reports.reports().iter().map(|r| r.clock).collect();
    assert!(clocks.windows(2).all(|pair| pair[0] <= pair[1]));
}
