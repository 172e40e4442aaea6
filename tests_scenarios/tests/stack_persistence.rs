//! Stack persistence tests
//!
//! A process preempted inside a subroutine leaves its call frame in the
//! stack store; another process may reuse the same stack region before
//! the first one resumes.

use tests_scenarios::{call_and_spin_program, TestSystem};

/// Test: two processes interleave inside their subroutines
///
/// This validates that:
/// 1. The preempted frame is saved top-down starting with the return pc
/// 2. Each process returns with its own registers restored
/// 3. No snapshot remains once both have halted
#[test]
fn test_call_frames_survive_interleaving() {
    let mut system = TestSystem::with_time_slice(15);
    system.load("p", &call_and_spin_program(7, 40)).unwrap();
    system.load("q", &call_and_spin_program(3, 40)).unwrap();

    // First burst ends mid-loop in p's subroutine
    system.kernel.step().unwrap();
    let frame = system.stacks.get("p").unwrap();
    assert_eq!(frame.len(), 6);
    // return pc, r0, r1
    assert_eq!(&frame.words()[..3], &[3, 7, 9]);

    system.run().unwrap();

    let p = system.report("p").unwrap();
    let q = system.report("q").unwrap();
    assert_eq!(p.output, vec![7]);
    assert_eq!(q.output, vec![3]);
    assert_eq!(p.largest_stack, 6);
    assert_eq!(q.largest_stack, 6);
    assert!(system.stacks.is_empty());
}

/// Test: a process with an empty stack saves nothing
#[test]
fn test_empty_stack_leaves_no_snapshot() {
    let mut system = TestSystem::with_time_slice(15);
    system
        .load("flat", &tests_scenarios::compute_program(40))
        .unwrap();

    system.kernel.step().unwrap();
    assert!(system.stacks.get("flat").is_none());
}
