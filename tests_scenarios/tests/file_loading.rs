//! File-backed loading tests
//!
//! Programs are discovered in an I/O directory, assembled to object code,
//! and their stacks persisted as files between bursts.

use kernel_api::Machine;
use sim_kernel::{FileStackStore, Kernel, KernelConfig, Loader, MemoryReportSink, StackSnapshot};
use sim_vm::{VirtualMachine, VmConfig};
use std::fs;
use std::path::Path;
use tests_scenarios::call_and_spin_program;

fn write_source(root: &Path, name: &str, source: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{}.s", name)), source).unwrap();
}

/// Test: stack files appear while preempted and vanish at halt
///
/// This validates that:
/// 1. Discovered sources are assembled into `.o` files
/// 2. A preempted call frame is written to `<name>/<name>.st`
/// 3. The stack file is removed when the process halts
#[test]
fn test_stack_file_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "p", &call_and_spin_program(7, 40));
    write_source(dir.path(), "q", &call_and_spin_program(3, 40));

    let reports = MemoryReportSink::new();
    let mut kernel = Kernel::new(VirtualMachine::new(VmConfig::default()), KernelConfig::default())
        .with_stack_store(FileStackStore::new(dir.path()))
        .with_report_sink(reports.clone());
    let loader = Loader::new(dir.path());
    let ids = loader.load_all(&mut kernel).unwrap();
    assert_eq!(ids.len(), 2);
    assert!(dir.path().join("p").join("p.o").exists());
    assert!(dir.path().join("q").join("q.o").exists());

    kernel.step().unwrap();
    let stack_file = dir.path().join("p").join("p.st");
    let snapshot = StackSnapshot::from_text(&fs::read_to_string(&stack_file).unwrap()).unwrap();
    assert_eq!(snapshot.len(), 6);

    let summary = kernel.run().unwrap();
    assert_eq!(summary.finished, 2);
    assert!(!stack_file.exists());
    assert!(!dir.path().join("q").join("q.st").exists());
    assert_eq!(reports.report("p").unwrap().output, vec![7]);
    assert_eq!(reports.report("q").unwrap().output, vec![3]);
    assert!(kernel.machine().clock().as_ticks() > 0);
}
