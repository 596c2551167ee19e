//! Integration tests for blocking on a kernel fed by an async channel

use std::thread;
use std::time::Duration;

use super::common::fixtures::{fast_options, kernel, start_blocking_cell, stdout_of};
use cellblock::kernel::{
    channel_engine, ControlUpdate, Engine, Identity, KernelMessage, PendingRequest,
    RequestMessage, StepOutcome, StreamHandle,
};
use cellblock::{BreakReason, CaptureMagic, ControlValue, Namespace, ValueControl};

fn execute(client: &str, code: &str) -> (String, KernelMessage) {
    let parent = RequestMessage::execute("integration", code);
    let msg_id = parent.msg_id().to_string();
    let message = KernelMessage::Execute(PendingRequest::new(
        StreamHandle::SHELL,
        Identity::new(client),
        parent,
    ));
    (msg_id, message)
}

/// Messages sent from another thread release the wait and get replayed
#[test]
fn test_block_with_messages_from_another_thread() {
    let mut kernel = kernel();
    let slider = ValueControl::new(0i64);
    kernel.register_control(slider.clone());
    let blocking = start_blocking_cell(&mut kernel, "tab-0", "%block slider");
    kernel.run_code("print blocking").unwrap();

    let (tx, mut engine) = channel_engine(kernel, Duration::from_millis(5)).unwrap();
    let (first, first_msg) = execute("tab-1", "print first");
    let (second, second_msg) = execute("tab-2", "print second");
    let target = slider.id().clone();

    let sender = thread::spawn(move || {
        tx.send(first_msg).unwrap();
        thread::sleep(Duration::from_millis(20));
        tx.send(second_msg).unwrap();
        thread::sleep(Duration::from_millis(20));
        tx.send(KernelMessage::Comm {
            target,
            update: ControlUpdate::SetValue(ControlValue::Int(3)),
        })
        .unwrap();
    });

    let mut namespace = Namespace::new();
    namespace.insert("slider", slider);
    let outcome = CaptureMagic::new(fast_options())
        .block(&mut engine, &namespace, "slider -t 10")
        .unwrap();
    sender.join().unwrap();

    assert_eq!(outcome.reason, BreakReason::Condition);
    assert_eq!(outcome.replay.replayed, 2);

    let front_end = engine.front_end();
    assert_eq!(stdout_of(&front_end, &blocking), "blocking\n");
    assert_eq!(stdout_of(&front_end, &first), "first\n");
    assert_eq!(stdout_of(&front_end, &second), "second\n");
    assert_eq!(
        engine.kernel().parent_identity(),
        Some(&Identity::new("tab-2"))
    );
}

/// A silent channel only produces idle iterations, so the wait times out
#[test]
fn test_silent_channel_times_out() {
    let (_tx, mut engine) = channel_engine(kernel(), Duration::from_millis(2)).unwrap();
    let mut namespace = Namespace::new();
    namespace.insert("slider", ValueControl::new(0i64));

    let outcome = CaptureMagic::new(fast_options())
        .block(&mut engine, &namespace, "slider --timeout 0.03")
        .unwrap();

    assert_eq!(outcome.reason, BreakReason::TimedOut);
    assert!(outcome.steps > 0);
    assert_eq!(outcome.replay.captured, 0);
}

/// Once every sender is gone the engine stays idle without waiting
#[test]
fn test_closed_channel_is_idle() {
    let (tx, mut engine) = channel_engine(kernel(), Duration::from_millis(2)).unwrap();
    drop(tx);

    assert_eq!(engine.do_one_iteration().unwrap(), StepOutcome::Idle);
    assert!(engine.is_closed());
    assert_eq!(engine.do_one_iteration().unwrap(), StepOutcome::Idle);
}
