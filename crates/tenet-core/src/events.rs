//! Domain event emission.
//!
//! Models announce state changes as named events with JSON payloads. The
//! emitter is injected so the core stays testable without a real event bus;
//! delivery to subscribers is out of scope.

use std::sync::{Mutex, PoisonError};

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub name: String,
    pub payload: Value,
}

impl DomainEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Fire-and-forget event sink. Emission must never fail the operation that
/// produced the event.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl EventEmitter for NullEmitter {
    fn emit(&self, _event: DomainEvent) {}
}

/// Records events in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct MemoryEmitter {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain recorded events, leaving the emitter empty.
    pub fn take(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.name).collect()
    }
}

impl EventEmitter for MemoryEmitter {
    fn emit(&self, event: DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_emitter_records_and_drains() {
        let emitter = MemoryEmitter::new();
        emitter.emit(DomainEvent::new("a", json!({ "n": 1 })));
        emitter.emit(DomainEvent::new("b", json!({ "n": 2 })));

        assert_eq!(emitter.names(), vec!["a", "b"]);
        assert_eq!(emitter.take().len(), 2);
        assert!(emitter.events().is_empty());
    }
}
