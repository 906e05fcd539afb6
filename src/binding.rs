//! Per-key typed bindings
//!
//! A [`Binding`] mirrors one key of one type. It owns a local listener list
//! and installs a single trampoline listener in the datastore which fans
//! each change out to that list. Dropping the binding removes the
//! trampoline; the datastore itself is only borrowed and is never closed by
//! a binding.

use crate::datastore::Datastore;
use crate::listener::{same_listener, DataListener};
use crate::value::Scalar;
use crate::Result;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type ListenerList = Arc<Mutex<Vec<Arc<dyn DataListener>>>>;

fn lock(list: &ListenerList) -> MutexGuard<'_, Vec<Arc<dyn DataListener>>> {
    list.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The listener a binding registers with the datastore on its own behalf.
struct Trampoline {
    listeners: ListenerList,
}

impl DataListener for Trampoline {
    fn notify(&self) {
        // Snapshot so local listeners can add or remove listeners while running.
        let listeners = lock(&self.listeners).clone();
        for listener in &listeners {
            listener.notify();
        }
    }
}

/// A handle bound to one `(datastore, key, type)` triple.
///
/// Bindings on the same key do not deduplicate: two bindings on one key
/// each fire once per write.
pub struct Binding<'s, T: Scalar> {
    store: &'s Datastore,
    key: String,
    listeners: ListenerList,
    trampoline: Arc<dyn DataListener>,
    _type: PhantomData<fn() -> T>,
}

impl<'s, T: Scalar> Binding<'s, T> {
    pub(crate) fn new(store: &'s Datastore, key: &str) -> Self {
        let listeners: ListenerList = Arc::new(Mutex::new(Vec::new()));
        let trampoline: Arc<dyn DataListener> = Arc::new(Trampoline {
            listeners: Arc::clone(&listeners),
        });
        store.add_key_listener(key, Arc::clone(&trampoline));

        Self {
            store,
            key: key.to_string(),
            listeners,
            trampoline,
            _type: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the bound key as `T`
    pub fn get(&self) -> Result<T> {
        self.store.get::<T>(&self.key)
    }

    /// Write the bound key as `T`
    pub fn set(&self, value: T) -> Result<()> {
        self.store.set(&self.key, value)
    }

    /// Append a listener to this binding's local list.
    pub fn add_listener(&self, listener: Arc<dyn DataListener>) {
        lock(&self.listeners).push(listener);
    }

    /// Remove a listener from the local list by identity.
    pub fn remove_listener(&self, listener: &Arc<dyn DataListener>) {
        lock(&self.listeners).retain(|l| !same_listener(l, listener));
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl<T: Scalar> Drop for Binding<'_, T> {
    fn drop(&mut self) {
        self.store.remove_key_listener(&self.key, &self.trampoline);
    }
}
