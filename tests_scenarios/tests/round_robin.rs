//! Round-robin fairness tests
//!
//! Validates that compute-bound processes share the CPU in load order and
//! that every preemption is charged as system time.

use kernel_api::{Duration, Instant};
use tests_scenarios::{compute_program, TestSystem};

/// Test: three equal compute jobs under a 15-tick slice
///
/// This validates that:
/// 1. Selection cycles a, b, c until the first job halts
/// 2. Each preemption charges exactly one context switch
/// 3. Wait time covers only the ticks spent in the ready queue
#[test]
fn test_equal_jobs_rotate_in_load_order() {
    let mut system = TestSystem::with_time_slice(15);
    let a = system.load("a", &compute_program(41)).unwrap();
    let b = system.load("b", &compute_program(41)).unwrap();
    let c = system.load("c", &compute_program(41)).unwrap();

    let summary = system.run().unwrap();

    assert_eq!(system.selections(), vec![a, b, c, a, b, c, a, b, c]);
    assert_eq!(summary.finished, 3);
    assert_eq!(summary.user_total, Duration::from_ticks(123));
    // Two preemptions per job
    assert_eq!(summary.system_time, Duration::from_ticks(30));
    assert_eq!(summary.clock, Instant::from_ticks(153));

    let report = system.report("a").unwrap();
    assert_eq!(report.exec_time, Duration::from_ticks(41));
    assert_eq!(report.wait_time, Duration::from_ticks(80));
    assert_eq!(report.io_time, Duration::ZERO);
    assert_eq!(report.clock, Instant::from_ticks(131));
    assert_eq!(report.largest_stack, 0);
}

/// Test: a short job does not wait behind a long one forever
///
/// This validates that a job shorter than one slice halts on its first
/// burst even when loaded behind a long job.
#[test]
fn test_short_job_finishes_after_one_slice_of_long_job() {
    let mut system = TestSystem::with_time_slice(15);
    system.load("long", &compute_program(200)).unwrap();
    system.load("short", &compute_program(5)).unwrap();

    system.run().unwrap();

    let short = system.report("short").unwrap();
    // 15 ticks of long, 5 ticks switch, 5 ticks of short
    assert_eq!(short.clock, Instant::from_ticks(25));
    assert_eq!(short.wait_time, Duration::from_ticks(20));
    assert_eq!(short.finished, 1);
    assert_eq!(system.report("long").unwrap().finished, 2);
}
