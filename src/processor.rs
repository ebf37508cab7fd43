// MIT License - Copyright (c) 2026 Peter Wright
// Inbound message handling

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::topic::{self, Category};
use crate::transport::MessageHandler;

/// Why an inbound message did not change any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Zero-length payload (e.g. a cleared retained message)
    EmptyPayload,
    /// Topic is outside `system/{serial}/`
    OutsideNamespace,
    /// Not an `inputs/` or `partitions/` field update
    UnrecognizedTopic,
    /// Payload is not valid UTF-8 text
    InvalidUtf8,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EmptyPayload => "empty payload",
            Self::OutsideNamespace => "outside panel namespace",
            Self::UnrecognizedTopic => "unrecognized topic",
            Self::InvalidUtf8 => "payload is not UTF-8",
        };
        f.write_str(text)
    }
}

/// Outcome of processing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Applied {
        category: Category,
        id: String,
        field: String,
    },
    Dropped(DropReason),
}

impl Disposition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Turns `(topic, payload)` pairs from the broker into aggregator updates.
///
/// Never fails: every message is either applied or dropped with a reason.
#[derive(Debug, Clone)]
pub struct StreamProcessor {
    aggregator: Arc<Aggregator>,
    serial_number: String,
}

impl StreamProcessor {
    pub fn new(aggregator: Arc<Aggregator>, serial_number: impl Into<String>) -> Self {
        Self {
            aggregator,
            serial_number: serial_number.into(),
        }
    }

    /// Process one wire message.
    pub fn process(&self, topic: &str, payload: &[u8]) -> Disposition {
        if payload.is_empty() {
            debug!("Dropping {topic}: {}", DropReason::EmptyPayload);
            return Disposition::Dropped(DropReason::EmptyPayload);
        }

        let Some(relative) = topic::strip_namespace(topic, &self.serial_number) else {
            debug!("Dropping {topic}: {}", DropReason::OutsideNamespace);
            return Disposition::Dropped(DropReason::OutsideNamespace);
        };

        let Some(update) = topic::parse(relative) else {
            debug!("Ignoring {topic}");
            return Disposition::Dropped(DropReason::UnrecognizedTopic);
        };

        let value = match std::str::from_utf8(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("Dropping {topic}: {} ({e})", DropReason::InvalidUtf8);
                return Disposition::Dropped(DropReason::InvalidUtf8);
            }
        };

        self.aggregator
            .update(update.category, &update.id, &update.field, value);

        Disposition::Applied {
            category: update.category,
            id: update.id,
            field: update.field,
        }
    }
}

impl MessageHandler for StreamProcessor {
    async fn handle(&self, topic: &str, payload: &[u8]) {
        self.process(topic, payload);
    }
}
