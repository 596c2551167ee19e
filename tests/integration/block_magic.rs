//! Integration tests for the `%block` and `%blockrun` magics

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::common::fixtures::{fast_options, kernel, start_blocking_cell, stdout_of, StepHookEngine};
use cellblock::kernel::{ControlUpdate, Engine, Identity, KernelMessage, OutputRecord};
use cellblock::{
    BreakReason, Button, CaptureMagic, ControlValue, MagicError, Namespace, UserObject,
    ValueControl,
};

/// The value control changes after the third iteration; the wait ends with
/// exactly three steps and nothing to replay
#[test]
fn test_block_on_value_control_counts_steps() {
    let slider = ValueControl::new(0i64);
    let mut namespace = Namespace::new();
    namespace.insert("slider", slider.clone());

    let external = slider.clone();
    let mut engine = StepHookEngine::new(kernel(), move |step| {
        if step == 3 {
            external.set_value(1i64);
        }
    });

    let magic = CaptureMagic::new(fast_options());
    let outcome = magic.block(&mut engine, &namespace, "slider").unwrap();

    assert_eq!(outcome.reason, BreakReason::Condition);
    assert_eq!(outcome.steps, 3);
    assert_eq!(engine.steps, 3);
    assert_eq!(outcome.replay.captured, 0);
    assert_eq!(outcome.replay.replayed, 0);
    assert!(!engine.inner.is_capturing());
}

/// A front-end comm message moves the slider and releases the queued cells
#[test]
fn test_block_released_by_comm_message() {
    let mut kernel = kernel();
    let handle = kernel.handle();
    let slider = ValueControl::new(ControlValue::Float(0.5));
    kernel.register_control(slider.clone());
    let mut namespace = Namespace::new();
    namespace.insert("slider", slider.clone());

    start_blocking_cell(&mut kernel, "tab-0", "%block slider");
    let queued = handle.execute(Identity::new("tab-1"), "print after");
    handle.send(KernelMessage::after_ticks(
        3,
        KernelMessage::Comm {
            target: slider.id().clone(),
            update: ControlUpdate::SetValue(ControlValue::Float(0.75)),
        },
    ));

    let mut magic = CaptureMagic::new(fast_options());
    let outcome = magic
        .run_line(&mut kernel, &namespace, "%block slider -t 5")
        .unwrap()
        .unwrap();

    assert_eq!(outcome.reason, BreakReason::Condition);
    assert_eq!(outcome.replay.replayed, 1);
    assert_eq!(slider.value(), ControlValue::Float(0.75));
    assert_eq!(stdout_of(&kernel.front_end(), &queued), "after\n");
}

/// A timeout ends the wait and still replays what was captured
#[test]
fn test_block_times_out_and_replays() {
    let mut kernel = kernel();
    let handle = kernel.handle();
    let go = Button::new("Go");
    let mut namespace = Namespace::new();
    namespace.insert("go", go.clone());

    start_blocking_cell(&mut kernel, "tab-0", "%block go");
    let queued = handle.execute(Identity::new("tab-1"), "print late");

    let magic = CaptureMagic::new(fast_options().with_idle_backoff(Duration::from_millis(1)));
    let outcome = magic
        .block(&mut kernel, &namespace, "go --timeout 0.05")
        .unwrap();

    assert_eq!(outcome.reason, BreakReason::TimedOut);
    assert!(outcome.elapsed >= Duration::from_millis(50));
    assert_eq!(outcome.replay.replayed, 1);
    assert_eq!(stdout_of(&kernel.front_end(), &queued), "late\n");
    // The latch detached when the wait ended.
    assert_eq!(go.observer_count(), 0);
}

/// A function in the namespace is used as the predicate
#[test]
fn test_block_on_function() {
    let ready = Arc::new(AtomicBool::new(false));
    let flag = ready.clone();
    let mut namespace = Namespace::new();
    namespace.insert("ready", UserObject::function(move || flag.load(Ordering::SeqCst)));

    let setter = ready.clone();
    let mut engine = StepHookEngine::new(kernel(), move |step| {
        if step == 5 {
            setter.store(true, Ordering::SeqCst);
        }
    });

    let outcome = CaptureMagic::new(fast_options())
        .block(&mut engine, &namespace, "ready")
        .unwrap();
    assert_eq!(outcome.steps, 5);
}

/// Classification failures happen before the dispatch entry is touched
#[test]
fn test_classification_failure_leaves_kernel_untouched() {
    let mut kernel = kernel();
    let handle = kernel.handle();
    let mut namespace = Namespace::new();
    namespace.insert("answer", UserObject::Int(42));

    let queued = handle.execute(Identity::new("tab-1"), "print normal");
    let magic = CaptureMagic::new(fast_options());

    let err = magic.block(&mut kernel, &namespace, "answer").unwrap_err();
    assert!(matches!(err, MagicError::Classification(ref e) if e.found == "int"));
    assert!(err.to_string().contains("value control"));
    assert!(!kernel.is_capturing());
    assert_eq!(kernel.execution_count(), 0);

    let err = magic.block(&mut kernel, &namespace, "missing").unwrap_err();
    assert!(matches!(err, MagicError::UnknownName(ref name) if name == "missing"));

    kernel.run_until_idle().unwrap();
    assert_eq!(stdout_of(&kernel.front_end(), &queued), "normal\n");
}

/// Bad timeouts and usage are rejected before blocking
#[test]
fn test_invalid_arguments_are_rejected() {
    let mut kernel = kernel();
    let mut namespace = Namespace::new();
    namespace.insert("go", Button::new("Go"));
    let mut magic = CaptureMagic::default();

    assert!(matches!(
        magic.block(&mut kernel, &namespace, "go -t soon"),
        Err(MagicError::Timeout(_))
    ));
    assert!(matches!(
        magic.block(&mut kernel, &namespace, ""),
        Err(MagicError::Usage(_))
    ));
    assert!(matches!(
        magic.run_line(&mut kernel, &namespace, "%unblock go"),
        Err(MagicError::UnknownCommand(_))
    ));
    assert!(!kernel.is_capturing());
}

/// `%blockrun` blocks once, asks the front end to run the cells below on
/// click, and never blocks again for that button
#[test]
fn test_blockrun_is_idempotent() {
    let go = Button::new("Run below");
    let mut namespace = Namespace::new();
    namespace.insert("go", go.clone());
    namespace.insert("slider", ValueControl::new(0i64));

    let clicker = go.clone();
    let mut engine = StepHookEngine::new(kernel(), move |step| {
        if step == 2 {
            clicker.click();
        }
    });
    let handle = engine.inner.handle();
    start_blocking_cell(&mut engine.inner, "tab-0", "%blockrun go");
    let queued = handle.execute(Identity::new("tab-1"), "print dropped");

    let mut magic = CaptureMagic::new(fast_options());
    let outcome = magic
        .run_line(&mut engine, &namespace, "%blockrun go")
        .unwrap()
        .unwrap();

    assert_eq!(outcome.reason, BreakReason::Condition);
    assert_eq!(outcome.replay.discarded, 1);
    assert!(magic.has_been_clicked(go.id()));

    let records = engine.front_end().records();
    assert!(records
        .iter()
        .any(|r| matches!(r, OutputRecord::Javascript { .. })));
    assert!(stdout_of(&engine.front_end(), &queued).is_empty());

    // Already clicked: returns immediately without stepping.
    let steps_before = engine.steps;
    let again = magic.run_line(&mut engine, &namespace, "%blockrun go").unwrap();
    assert!(again.is_none());
    assert_eq!(engine.steps, steps_before);

    // Later clicks keep re-running the cells below with a single observer.
    go.click();
    assert_eq!(go.observer_count(), 1);
    let javascript = engine
        .front_end()
        .records()
        .iter()
        .filter(|r| matches!(r, OutputRecord::Javascript { .. }))
        .count();
    assert_eq!(javascript, 2);

    assert!(matches!(
        magic.run_line(&mut engine, &namespace, "%blockrun slider"),
        Err(MagicError::NotAButton { found: "value control", .. })
    ));
}
