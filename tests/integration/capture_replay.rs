//! Integration tests for capture and replay on the in-process kernel
//!
//! Requests that arrive while a cell blocks must run afterwards under the
//! identity of the client that sent them, and output the blocking cell
//! wrote must stay attributed to the blocking cell.

use super::common::fixtures::{executed_parents, kernel, start_blocking_cell, stdout_of};
use cellblock::kernel::{Engine, Identity, StepOutcome, StreamName};
use cellblock::{capture_scope, CaptureError, CaptureExecution, ReplayReport};

/// Three requests from three clients are replayed in arrival order
#[test]
fn test_replay_preserves_order_and_identity() {
    let mut kernel = kernel();
    let handle = kernel.handle();
    let blocking = start_blocking_cell(&mut kernel, "tab-0", "%block slider");

    let mut session = CaptureExecution::new(&mut kernel, true);
    session.enter().unwrap();

    let ids: Vec<String> = (1..=3)
        .map(|i| handle.execute(Identity::new(format!("tab-{i}")), format!("print cell {i}")))
        .collect();
    for _ in 0..3 {
        assert_eq!(session.step().unwrap(), StepOutcome::Processed);
    }
    assert_eq!(session.captured(), 3);

    let report = session.exit().unwrap();
    drop(session);

    assert_eq!(
        report,
        ReplayReport {
            captured: 3,
            replayed: 3,
            discarded: 0
        }
    );

    let front_end = kernel.front_end();
    assert_eq!(executed_parents(&front_end.records()), ids);
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(stdout_of(&front_end, id), format!("cell {}\n", i + 1));
    }
    assert!(stdout_of(&front_end, &blocking).is_empty());
    assert_eq!(kernel.parent_identity(), Some(&Identity::new("tab-3")));
}

/// Output buffered by the blocking cell is flushed before the parent moves
#[test]
fn test_blocking_cell_output_is_flushed_before_replay() {
    let mut kernel = kernel();
    let handle = kernel.handle();
    let blocking = start_blocking_cell(&mut kernel, "tab-0", "print waiting");
    kernel.run_code("print waiting").unwrap();
    kernel.write(StreamName::Stderr, "still waiting\n");

    let queued = handle.execute(Identity::new("tab-1"), "print queued");
    let ((), report) = capture_scope(&mut kernel, true, |session| {
        session.step()?;
        Ok(())
    })
    .unwrap();
    assert_eq!(report.replayed, 1);

    let front_end = kernel.front_end();
    assert_eq!(stdout_of(&front_end, &blocking), "waiting\n");
    assert_eq!(
        front_end.stream_text(&blocking, StreamName::Stderr),
        "still waiting\n"
    );
    assert_eq!(stdout_of(&front_end, &queued), "queued\n");
}

/// Replayed cells get execution counts after the one the blocking cell took
#[test]
fn test_execution_counts_follow_blocking_cell() {
    let mut kernel = kernel();
    let handle = kernel.handle();
    start_blocking_cell(&mut kernel, "tab-0", "%block x");

    handle.execute(Identity::new("tab-1"), "print a");
    handle.execute(Identity::new("tab-1"), "print b");
    capture_scope(&mut kernel, true, |session| {
        while session.step()? == StepOutcome::Processed {}
        Ok(())
    })
    .unwrap();

    // One count for the blocking cell, then one per replayed request.
    assert_eq!(kernel.execution_count(), 3);
}

/// An interrupt while capturing drops the captured requests
#[test]
fn test_interrupt_discards_captured_requests() {
    let mut kernel = kernel();
    let handle = kernel.handle();
    start_blocking_cell(&mut kernel, "tab-0", "%block x");

    handle.execute(Identity::new("tab-1"), "print lost");
    let result: Result<((), ReplayReport), CaptureError> =
        capture_scope(&mut kernel, true, |session| {
            session.step()?;
            handle.interrupt();
            session.step()?;
            Ok(())
        });

    assert!(result.unwrap_err().is_interrupt());
    assert!(!kernel.is_capturing());
    assert!(kernel.front_end().records().is_empty());

    // The kernel executes normally again.
    let later = handle.execute(Identity::new("tab-1"), "print later");
    kernel.run_until_idle().unwrap();
    assert_eq!(stdout_of(&kernel.front_end(), &later), "later\n");
}

/// A second session on a capturing kernel is refused and the first survives
#[test]
fn test_nested_capture_is_refused() {
    let mut kernel = kernel();
    let sink = cellblock::kernel::CaptureSink::new();
    kernel.replace_run_entry(cellblock::kernel::DispatchEntry::Capture(sink.clone()));

    let err = capture_scope(&mut kernel, true, |_| Ok(())).unwrap_err();
    assert!(matches!(err, CaptureError::AlreadyCapturing));

    let still = kernel.replace_run_entry(cellblock::kernel::DispatchEntry::Execute);
    match still {
        cellblock::kernel::DispatchEntry::Capture(s) => assert!(s.same_buffer(&sink)),
        other => panic!("unexpected entry {other:?}"),
    }
}
