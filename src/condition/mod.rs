//! Break conditions: when does a blocking wait end?
//!
//! A caller hands over a function, a value control or a button. It is
//! classified once into a [`BreakCondition`], which the driving loop polls
//! between event-loop iterations.

mod deadline;
mod driver;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::namespace::{Predicate, UserObject};
use crate::widgets::{Button, ControlValue, ObserverId, ValueControl};

pub use deadline::{parse_timeout, Deadline, TimeoutError};
pub use driver::{block_until, BreakReason, WaitOptions, WaitOutcome};

/// The break value matched none of the accepted kinds
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("The break value should be a value control, a button, or a function (got {found})")]
pub struct ClassificationError {
    pub found: &'static str,
}

/// Tracks whether a button has been clicked since the latch was attached
pub struct ClickLatch {
    button: Button,
    observer: ObserverId,
    clicked: Arc<AtomicBool>,
}

impl ClickLatch {
    pub fn attach(button: &Button) -> Self {
        let clicked = Arc::new(AtomicBool::new(false));
        let flag = clicked.clone();
        let observer = button.on_click(move |_| {
            flag.store(true, Ordering::SeqCst);
        });
        Self {
            button: button.clone(),
            observer,
            clicked,
        }
    }

    pub fn is_clicked(&self) -> bool {
        self.clicked.load(Ordering::SeqCst)
    }
}

impl Drop for ClickLatch {
    fn drop(&mut self) {
        self.button.remove_click(self.observer);
    }
}

/// A classified break value
pub enum BreakCondition {
    /// Met when the function returns true
    Predicate(Predicate),
    /// Met while the control's value differs from the snapshot
    ValueChanged {
        control: ValueControl,
        snapshot: ControlValue,
    },
    /// Met once the button has been clicked
    Clicked(ClickLatch),
}

impl BreakCondition {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        BreakCondition::Predicate(Arc::new(f))
    }

    /// Snapshot the control's current value
    pub fn value_changed(control: &ValueControl) -> Self {
        BreakCondition::ValueChanged {
            control: control.clone(),
            snapshot: control.value(),
        }
    }

    pub fn clicked(button: &Button) -> Self {
        BreakCondition::Clicked(ClickLatch::attach(button))
    }

    pub fn is_met(&self) -> bool {
        match self {
            BreakCondition::Predicate(f) => f(),
            BreakCondition::ValueChanged { control, snapshot } => control.value() != *snapshot,
            BreakCondition::Clicked(latch) => latch.is_clicked(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BreakCondition::Predicate(_) => "function",
            BreakCondition::ValueChanged { .. } => "value control",
            BreakCondition::Clicked(_) => "button",
        }
    }
}

impl fmt::Debug for BreakCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakCondition::Predicate(_) => f.write_str("Predicate(..)"),
            BreakCondition::ValueChanged { control, snapshot } => f
                .debug_struct("ValueChanged")
                .field("control", control.id())
                .field("snapshot", snapshot)
                .finish(),
            BreakCondition::Clicked(latch) => f
                .debug_struct("Clicked")
                .field("button", latch.button.id())
                .field("clicked", &latch.is_clicked())
                .finish(),
        }
    }
}

impl TryFrom<&UserObject> for BreakCondition {
    type Error = ClassificationError;

    fn try_from(object: &UserObject) -> Result<Self, Self::Error> {
        match object {
            UserObject::Function(f) => Ok(BreakCondition::Predicate(f.clone())),
            UserObject::Value(control) => Ok(BreakCondition::value_changed(control)),
            UserObject::Button(button) => Ok(BreakCondition::clicked(button)),
            other => Err(ClassificationError {
                found: other.type_name(),
            }),
        }
    }
}
