use ferrous_doh_domain::{SessionEvent, SessionState};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::ports::SessionListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct BusState {
    listeners: Vec<(ListenerId, Arc<dyn SessionListener>)>,
    next_id: u64,
    state: SessionState,
    message: Option<String>,
}

/// Owns the session state and fans events out to registered listeners.
///
/// Registration, removal, state changes and dispatch all happen under one
/// lock, so a listener never misses or double-sees a transition.
pub struct SessionEventBus {
    inner: Mutex<BusState>,
}

impl SessionEventBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusState {
                listeners: Vec::new(),
                next_id: 0,
                state: SessionState::Disconnected,
                message: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // A listener that panicked must not take the session down with it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers `listener` and immediately replays the current state to it.
    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;

        listener.on_event(&SessionEvent::StateChanged {
            state: inner.state,
            message: inner.message.clone(),
        });
        inner.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
        inner.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn current_state(&self) -> SessionState {
        self.lock().state
    }

    /// Moves to `next` if the transition is legal and publishes it.
    /// Returns `false` (and publishes nothing) for illegal or no-op moves.
    pub fn transition(&self, next: SessionState, message: Option<String>) -> bool {
        let mut inner = self.lock();
        if inner.state == next || !inner.state.can_transition_to(next) {
            debug!(from = %inner.state, to = %next, "Ignoring session transition");
            return false;
        }

        if next == SessionState::Error {
            warn!(error = message.as_deref().unwrap_or(""), "Session entered error state");
        }
        debug!(from = %inner.state, to = %next, "Session state changed");

        inner.state = next;
        inner.message = message.clone();
        let event = SessionEvent::StateChanged {
            state: next,
            message,
        };
        Self::dispatch(&inner, &event);
        true
    }

    /// Publishes a non-state event, such as a certificate status change.
    pub fn publish(&self, event: SessionEvent) {
        let inner = self.lock();
        Self::dispatch(&inner, &event);
    }

    fn dispatch(inner: &BusState, event: &SessionEvent) {
        for (_, listener) in &inner.listeners {
            listener.on_event(event);
        }
    }
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new()
    }
}
