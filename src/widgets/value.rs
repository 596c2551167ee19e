use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ControlId, ControlValue, ObserverId};

/// Old and new value passed to value observers
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    pub old: ControlValue,
    pub new: ControlValue,
}

type ValueObserver = Arc<dyn Fn(&ValueChange) + Send + Sync>;

struct ValueState {
    value: ControlValue,
    observers: Vec<(ObserverId, ValueObserver)>,
    next_observer: u64,
}

/// A control with a current value (slider, text box, dropdown, ...)
///
/// Cloning yields another handle to the same control.
#[derive(Clone)]
pub struct ValueControl {
    id: ControlId,
    state: Arc<Mutex<ValueState>>,
}

impl ValueControl {
    pub fn new(value: impl Into<ControlValue>) -> Self {
        Self::with_id(ControlId::new(), value)
    }

    pub fn with_id(id: ControlId, value: impl Into<ControlValue>) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(ValueState {
                value: value.into(),
                observers: Vec::new(),
                next_observer: 1,
            })),
        }
    }

    pub fn id(&self) -> &ControlId {
        &self.id
    }

    pub fn value(&self) -> ControlValue {
        self.state.lock().value.clone()
    }

    /// Set the value, notifying observers if it actually changed
    pub fn set_value(&self, value: impl Into<ControlValue>) {
        let value = value.into();
        let (change, observers) = {
            let mut state = self.state.lock();
            if state.value == value {
                return;
            }
            let old = std::mem::replace(&mut state.value, value.clone());
            let observers: Vec<ValueObserver> =
                state.observers.iter().map(|(_, o)| o.clone()).collect();
            (ValueChange { old, new: value }, observers)
        };
        // Observers run without the lock held so they may read the control.
        for observer in observers {
            observer(&change);
        }
    }

    pub fn observe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&ValueChange) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.push((id, Arc::new(observer)));
        id
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut state = self.state.lock();
        let before = state.observers.len();
        state.observers.retain(|(existing, _)| *existing != id);
        state.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }
}

impl fmt::Debug for ValueControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueControl")
            .field("id", &self.id)
            .field("value", &self.value())
            .finish()
    }
}
