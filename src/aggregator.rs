// MIT License - Copyright (c) 2026 Peter Wright
// State aggregation over the inbound MQTT stream

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::devices::{InputView, PartitionView};
use crate::dispatch::Dispatcher;
use crate::event::{AlarmEvent, EventReceiver, EventSender, event_channel};
use crate::store::{FieldMap, StateStore};
use crate::topic::Category;

/// Full-device dictionary: every known entity with all of its raw fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Epoch milliseconds at which the copy was taken
    pub now: u64,
    pub inputs: BTreeMap<String, BTreeMap<String, String>>,
    pub partitions: BTreeMap<String, BTreeMap<String, String>>,
}

/// Live view of one panel's inputs and partitions.
///
/// Owns the state store and the observer lists; the only way to mutate
/// state is [`Aggregator::update`]. Readers get copies.
#[derive(Debug)]
pub struct Aggregator {
    store: StateStore,
    dispatcher: Dispatcher,
    event_tx: EventSender,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        let (event_tx, _event_rx) = event_channel(256);
        Self {
            store: StateStore::new(),
            dispatcher: Dispatcher::new(),
            event_tx,
        }
    }

    /// Record one field value for an entity.
    ///
    /// A first sighting of `id` creates an empty record and runs the
    /// category's added observers before the field is written. Every call
    /// then runs all entity-changed observers, even when the value did not
    /// change. Returns `true` if the entity was new.
    pub fn update(&self, category: Category, id: &str, field: &str, value: &str) -> bool {
        let created = self.store.ensure(category, id);
        if created {
            debug!("New {category} entity: {id}");
            self.dispatcher.notify_added(category, id);
            let _ = self.event_tx.send(AlarmEvent::EntityAdded {
                category,
                id: id.to_string(),
            });
        }

        self.store.set_field(category, id, field, value);
        debug!("{category}/{id}/{field} = {value}");

        self.dispatcher.notify_entity_changed();
        let _ = self.event_tx.send(AlarmEvent::FieldUpdated {
            category,
            id: id.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
        created
    }

    pub fn update_input(&self, id: &str, field: &str, value: &str) -> bool {
        self.update(Category::Inputs, id, field, value)
    }

    pub fn update_partition(&self, id: &str, field: &str, value: &str) -> bool {
        self.update(Category::Partitions, id, field, value)
    }

    // --- Reads ---

    /// Fields of one entity; empty for unknown IDs.
    pub fn get_state(&self, category: Category, id: &str) -> FieldMap {
        self.store.get(category, id)
    }

    /// A single raw field.
    pub fn field(&self, category: Category, id: &str, field: &str) -> Option<String> {
        self.store.field(category, id, field)
    }

    /// Known IDs in first-seen order.
    pub fn list_ids(&self, category: Category) -> Vec<String> {
        self.store.ids(category)
    }

    pub fn input_ids(&self) -> Vec<String> {
        self.list_ids(Category::Inputs)
    }

    pub fn partition_ids(&self) -> Vec<String> {
        self.list_ids(Category::Partitions)
    }

    /// Typed reader over an input's current fields.
    pub fn input(&self, id: &str) -> InputView {
        InputView::new(id, self.get_state(Category::Inputs, id))
    }

    /// Typed reader over a partition's current fields.
    pub fn partition(&self, id: &str) -> PartitionView {
        PartitionView::new(id, self.get_state(Category::Partitions, id))
    }

    /// Copy of everything known, with sorted keys.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            now: Utc::now().timestamp_millis() as u64,
            inputs: self.store.dump(Category::Inputs),
            partitions: self.store.dump(Category::Partitions),
        }
    }

    // --- Observers ---

    pub fn register_entity_changed<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.dispatcher.register_entity_changed(callback);
    }

    pub fn register_added<F>(&self, category: Category, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.dispatcher.register_added(category, callback);
    }

    /// Subscribe to the queued event stream.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    pub(crate) fn event_sender(&self) -> EventSender {
        self.event_tx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_added_fires_once_per_id() {
        let agg = Aggregator::new();
        let added = Arc::new(Mutex::new(Vec::new()));
        {
            let added = Arc::clone(&added);
            agg.register_added(Category::Inputs, move |id| {
                added.lock().unwrap().push(id.to_string())
            });
        }

        assert!(agg.update_input("7", "status", "1"));
        assert!(!agg.update_input("7", "status", "1"));
        assert!(!agg.update_input("7", "block", "0"));

        assert_eq!(*added.lock().unwrap(), vec!["7"]);
    }

    #[test]
    fn test_added_runs_before_field_is_visible() {
        let agg = Arc::new(Aggregator::new());
        let seen = Arc::new(Mutex::new(None));
        {
            let agg_ref = Arc::clone(&agg);
            let seen = Arc::clone(&seen);
            agg.register_added(Category::Partitions, move |id| {
                *seen.lock().unwrap() = Some(agg_ref.get_state(Category::Partitions, id));
            });
        }

        agg.update_partition("1", "status", "0");

        let seen = seen.lock().unwrap().clone().expect("observer ran");
        assert!(seen.is_empty());
    }

    #[test]
    fn test_every_update_notifies_changed() {
        let agg = Aggregator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            agg.register_entity_changed(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        agg.update_partition("1", "status", "0");
        agg.update_partition("1", "ready", "1");
        agg.update_partition("1", "ready", "1");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_snapshot_contents() {
        let agg = Aggregator::new();
        agg.update_input("2", "status", "1");
        agg.update_partition("1", "status", "2");

        let snap = agg.snapshot();
        assert_eq!(snap.inputs["2"]["status"], "1");
        assert_eq!(snap.partitions["1"]["status"], "2");
        assert!(snap.now > 0);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let agg = Aggregator::new();
        let mut rx = agg.subscribe();

        agg.update_input("3", "status", "2");

        assert_eq!(
            rx.recv().await.unwrap(),
            AlarmEvent::EntityAdded {
                category: Category::Inputs,
                id: "3".to_string()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            AlarmEvent::FieldUpdated {
                category: Category::Inputs,
                id: "3".to_string(),
                field: "status".to_string(),
                value: "2".to_string(),
            }
        );
    }
}
