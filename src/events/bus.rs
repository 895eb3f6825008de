use super::types::{EventSequence, QueueEvent, QueueEventPayload};
use crate::logging::log_error;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

pub type EventReceiver = mpsc::UnboundedReceiver<QueueEvent>;
pub type EventSender = mpsc::UnboundedSender<QueueEvent>;

#[derive(Debug)]
struct BusState {
    next_sequence: EventSequence,
    subscribers: Vec<EventSender>,
}

/// Event bus for distributing queue change notifications.
///
/// Each subscriber gets its own unbounded channel, so a slow reader never
/// loses events. Sequence assignment and delivery happen under one lock,
/// which keeps every subscriber's view in publish order.
#[derive(Clone, Debug)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                next_sequence: 1,
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // Delivery only pushes into channels; a poisoned guard is still consistent
        self.state.lock().unwrap_or_else(|poisoned| {
            log_error("events", "Event bus lock poisoned, recovering").unwrap_or_default();
            poisoned.into_inner()
        })
    }

    /// Publish an event (returns sequence number)
    pub fn publish(&self, payload: QueueEventPayload) -> EventSequence {
        let mut state = self.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let event = QueueEvent {
            sequence,
            timestamp: Utc::now(),
            payload,
        };

        // Drop subscribers whose receiver has gone away
        state
            .subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());

        sequence
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Sequence number the next event will carry
    pub fn next_sequence(&self) -> EventSequence {
        self.lock().next_sequence
    }

    /// Get number of active receivers
    pub fn receiver_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|subscriber| !subscriber.is_closed());
        state.subscribers.len()
    }
}
