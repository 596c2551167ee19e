use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ControlId, ObserverId};

type ClickObserver = Arc<dyn Fn(&Button) + Send + Sync>;

struct ButtonState {
    observers: Vec<(ObserverId, ClickObserver)>,
    next_observer: u64,
    clicks: u64,
}

/// A clickable control with no meaningful value
#[derive(Clone)]
pub struct Button {
    id: ControlId,
    description: String,
    state: Arc<Mutex<ButtonState>>,
}

impl Button {
    pub fn new(description: impl Into<String>) -> Self {
        Self::with_id(ControlId::new(), description)
    }

    pub fn with_id(id: ControlId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            state: Arc::new(Mutex::new(ButtonState {
                observers: Vec::new(),
                next_observer: 1,
                clicks: 0,
            })),
        }
    }

    pub fn id(&self) -> &ControlId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Register a click observer
    pub fn on_click<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&Button) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.push((id, Arc::new(observer)));
        id
    }

    pub fn remove_click(&self, id: ObserverId) -> bool {
        let mut state = self.state.lock();
        let before = state.observers.len();
        state.observers.retain(|(existing, _)| *existing != id);
        state.observers.len() != before
    }

    /// Deliver a click to every registered observer
    pub fn click(&self) {
        let observers: Vec<ClickObserver> = {
            let mut state = self.state.lock();
            state.clicks += 1;
            state.observers.iter().map(|(_, o)| o.clone()).collect()
        };
        for observer in observers {
            observer(self);
        }
    }

    pub fn clicks(&self) -> u64 {
        self.state.lock().clicks
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }
}

impl fmt::Debug for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Button")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish()
    }
}
