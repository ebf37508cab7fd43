// MIT License - Copyright (c) 2026 Peter Wright
// Observer registries

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use crate::topic::Category;

/// Observer of the broad "something changed" signal.
pub type ChangedCallback = Arc<dyn Fn() + Send + Sync>;

/// Observer of newly discovered entity IDs.
pub type AddedCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Append-only observer lists, invoked synchronously in registration order.
///
/// Lists are copied out of their lock before invocation, so an observer may
/// register further observers or read the store without deadlocking.
#[derive(Default)]
pub struct Dispatcher {
    entity_changed: RwLock<Vec<ChangedCallback>>,
    input_added: RwLock<Vec<AddedCallback>>,
    partition_added: RwLock<Vec<AddedCallback>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entity_changed<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.entity_changed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn register_added<F>(&self, category: Category, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.added_list(category)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    fn added_list(&self, category: Category) -> &RwLock<Vec<AddedCallback>> {
        match category {
            Category::Inputs => &self.input_added,
            Category::Partitions => &self.partition_added,
        }
    }

    /// Number of entity-changed observers.
    pub fn entity_changed_count(&self) -> usize {
        self.entity_changed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of added observers for a category.
    pub fn added_count(&self, category: Category) -> usize {
        self.added_list(category)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run every entity-changed observer once. Returns how many ran cleanly.
    pub fn notify_entity_changed(&self) -> usize {
        let observers = self
            .entity_changed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        observers
            .iter()
            .filter(|cb| guarded("entity-changed", || cb()))
            .count()
    }

    /// Run every added observer of `category` with `id`. Returns how many
    /// ran cleanly.
    pub fn notify_added(&self, category: Category, id: &str) -> usize {
        let observers = self
            .added_list(category)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        observers
            .iter()
            .filter(|cb| guarded("added", || cb(id)))
            .count()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("entity_changed", &self.entity_changed_count())
            .field("input_added", &self.added_count(Category::Inputs))
            .field("partition_added", &self.added_count(Category::Partitions))
            .finish()
    }
}

/// Run one observer, containing a panic to that observer.
fn guarded(kind: &str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!("{kind} observer panicked: {msg}");
            false
        }
    }
}
