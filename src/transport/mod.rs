// MIT License - Copyright (c) 2026 Peter Wright
// Broker transport

pub mod mqtt;

use std::future::Future;

pub use mqtt::MqttConnection;

/// Receives every message the broker delivers for the panel namespace.
///
/// Called from the connection's receive task, one message at a time and in
/// arrival order. Implementations must not publish through the same
/// connection while awaiting, or the receive loop stalls.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, topic: &str, payload: &[u8]) -> impl Future<Output = ()> + Send;
}
