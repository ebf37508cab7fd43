// MIT License - Copyright (c) 2026 Peter Wright
// Broadcast events

use crate::topic::Category;

/// Events emitted by the aggregator and the connection.
///
/// This is the queued counterpart of the synchronous observer lists: a
/// consumer that may be slow subscribes via `panel.subscribe()` and reads
/// a `tokio::sync::broadcast::Receiver<AlarmEvent>` at its own pace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmEvent {
    /// Broker accepted the session and the namespace subscription was issued
    Connected,
    /// Session ended. `requested` is true when it ended through `stop()`.
    Disconnected { requested: bool },
    /// First field for a previously unknown ID arrived
    EntityAdded { category: Category, id: String },
    /// A field of an entity was written
    FieldUpdated {
        category: Category,
        id: String,
        field: String,
        value: String,
    },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<AlarmEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<AlarmEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
