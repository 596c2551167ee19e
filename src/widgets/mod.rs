//! Front-end controls as the kernel sees them
//!
//! Controls are shared handles: the kernel's registry applies UI events to
//! them while break conditions and user code hold clones and read them.

mod button;
mod value;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kernel::message::ControlUpdate;

pub use button::Button;
pub use value::{ValueChange, ValueControl};

/// Model id of a control
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlId(pub String);

impl ControlId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ControlId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle returned by observer registration, used to detach the observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Current value of a value-bearing control.
///
/// Equality is numeric across `Int` and `Float`: `Int(0) == Float(0.0)`, so
/// a front end echoing `0.0` for an integer slider is not a change. `NaN`
/// never equals itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PartialEq for ControlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ControlValue::None, ControlValue::None) => true,
            (ControlValue::Bool(a), ControlValue::Bool(b)) => a == b,
            (ControlValue::Int(a), ControlValue::Int(b)) => a == b,
            (ControlValue::Float(a), ControlValue::Float(b)) => a == b,
            (ControlValue::Int(i), ControlValue::Float(x))
            | (ControlValue::Float(x), ControlValue::Int(i)) => int_equals_float(*i, *x),
            (ControlValue::Text(a), ControlValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

/// Exact comparison; `i as f64` would round large integers.
fn int_equals_float(i: i64, x: f64) -> bool {
    // 2^63 is exactly representable; anything at or above it is out of range.
    x.fract() == 0.0 && x >= i64::MIN as f64 && x < 9_223_372_036_854_775_808.0 && x as i64 == i
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::None => f.write_str("None"),
            ControlValue::Bool(b) => write!(f, "{b}"),
            ControlValue::Int(i) => write!(f, "{i}"),
            ControlValue::Float(x) => write!(f, "{x}"),
            ControlValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for ControlValue {
    fn from(value: bool) -> Self {
        ControlValue::Bool(value)
    }
}

impl From<i64> for ControlValue {
    fn from(value: i64) -> Self {
        ControlValue::Int(value)
    }
}

impl From<f64> for ControlValue {
    fn from(value: f64) -> Self {
        ControlValue::Float(value)
    }
}

impl From<&str> for ControlValue {
    fn from(value: &str) -> Self {
        ControlValue::Text(value.to_string())
    }
}

/// A control registered with the kernel
#[derive(Debug, Clone)]
pub enum Control {
    Value(ValueControl),
    Button(Button),
}

impl Control {
    pub fn id(&self) -> &ControlId {
        match self {
            Control::Value(v) => v.id(),
            Control::Button(b) => b.id(),
        }
    }
}

impl From<ValueControl> for Control {
    fn from(control: ValueControl) -> Self {
        Control::Value(control)
    }
}

impl From<Button> for Control {
    fn from(button: Button) -> Self {
        Control::Button(button)
    }
}

/// Kernel-side map of live controls
#[derive(Debug, Default)]
pub struct ControlRegistry {
    controls: HashMap<ControlId, Control>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, control: impl Into<Control>) {
        let control = control.into();
        self.controls.insert(control.id().clone(), control);
    }

    pub fn get(&self, id: &ControlId) -> Option<&Control> {
        self.controls.get(id)
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Apply a UI event. Returns false if the target is unknown or the
    /// update does not fit the control.
    pub fn apply(&self, target: &ControlId, update: ControlUpdate) -> bool {
        match (self.controls.get(target), update) {
            (Some(Control::Value(control)), ControlUpdate::SetValue(value)) => {
                control.set_value(value);
                true
            }
            (Some(Control::Button(button)), ControlUpdate::Click) => {
                button.click();
                true
            }
            (Some(_), update) => {
                tracing::warn!(target = %target, ?update, "Update does not apply to control");
                false
            }
            (None, update) => {
                tracing::warn!(target = %target, ?update, "Update for unknown control ignored");
                false
            }
        }
    }
}
