//! Change listeners and the registry that dispatches them
//!
//! The [`Registry`] holds everything the datastore keeps in memory besides
//! the connection: the key -> type map, the global listener list and the
//! per-key listener lists. The datastore guards it with one mutex and never
//! calls out to user code while holding it; [`Registry::snapshot`] copies the
//! lists out so dispatch happens unlocked.

use crate::value::ValueType;
use std::collections::HashMap;
use std::sync::Arc;

/// A consumer of change events with a single entry point.
pub trait DataListener: Send + Sync {
    fn notify(&self);
}

/// Parameterless callback invoked on every mutation.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

struct FnListener<F>(F);

impl<F: Fn() + Send + Sync> DataListener for FnListener<F> {
    fn notify(&self) {
        (self.0)()
    }
}

/// Wrap a closure as a shareable listener.
///
/// Listeners are compared by identity, so keep the returned `Arc` around if
/// you intend to remove it later.
pub fn listener<F>(f: F) -> Arc<dyn DataListener>
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(FnListener(f))
}

/// Identity comparison for listener handles (data pointer only).
pub fn same_listener(a: &Arc<dyn DataListener>, b: &Arc<dyn DataListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Listeners captured for one dispatch.
pub struct Snapshot {
    global: Vec<ChangeCallback>,
    keyed: Vec<Arc<dyn DataListener>>,
}

impl Snapshot {
    /// Invoke global callbacks in order, then per-key listeners in order.
    pub fn dispatch(self) {
        for callback in &self.global {
            callback();
        }
        for listener in &self.keyed {
            listener.notify();
        }
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.keyed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory state shared by all datastore operations.
#[derive(Default)]
pub struct Registry {
    types: HashMap<String, ValueType>,
    global: Vec<ChangeCallback>,
    keyed: HashMap<String, Vec<Arc<dyn DataListener>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Type Registry ==========

    pub fn type_of(&self, key: &str) -> Option<ValueType> {
        self.types.get(key).copied()
    }

    pub fn record_type(&mut self, key: &str, ty: ValueType) {
        self.types.insert(key.to_string(), ty);
    }

    pub fn forget_type(&mut self, key: &str) -> Option<ValueType> {
        self.types.remove(key)
    }

    /// Replace the type map wholesale, e.g. after enumerating the database.
    pub fn rebuild_types(&mut self, entries: impl IntoIterator<Item = (String, ValueType)>) {
        self.types = entries.into_iter().collect();
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    // ========== Listeners ==========

    pub fn add_global(&mut self, callback: ChangeCallback) {
        self.global.push(callback);
    }

    pub fn add_keyed(&mut self, key: &str, listener: Arc<dyn DataListener>) {
        self.keyed.entry(key.to_string()).or_default().push(listener);
    }

    /// Remove `listener` from `key`'s list by identity. No-op if absent.
    ///
    /// The (possibly empty) list is kept so the key can be re-bound later.
    pub fn remove_keyed(&mut self, key: &str, listener: &Arc<dyn DataListener>) {
        if let Some(listeners) = self.keyed.get_mut(key) {
            listeners.retain(|l| !same_listener(l, listener));
        }
    }

    pub fn keyed_count(&self, key: &str) -> usize {
        self.keyed.get(key).map_or(0, Vec::len)
    }

    /// Copy out the listeners that a mutation of `key` must reach.
    pub fn snapshot(&self, key: &str) -> Snapshot {
        Snapshot {
            global: self.global.clone(),
            keyed: self.keyed.get(key).cloned().unwrap_or_default(),
        }
    }

    /// Drop all in-memory state.
    pub fn clear(&mut self) {
        self.types.clear();
        self.global.clear();
        self.keyed.clear();
    }
}
