//! The datastore handle: typed accessors, enumeration, listeners and bindings
//!
//! Locking: the connection lives behind its own mutex and SQLite serializes
//! writes underneath it. The in-memory [`Registry`] sits behind a second
//! mutex that is only ever taken after the connection mutex (never the other
//! way round) and is never held while user callbacks run.

use crate::binding::Binding;
use crate::listener::{ChangeCallback, DataListener, Registry};
use crate::storage::sqlite::{META_APP_NAME, META_APP_VERSION, META_VERSION};
use crate::storage::{DbStats, OpenOptions, SqliteStore, MEMORY_PATH};
use crate::value::{Scalar, Value, ValueType};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use crate::storage::FORMAT_VERSION;

/// A typed key-value datastore backed by one SQLite database.
///
/// Keys are non-empty strings and are unique across all four value types:
/// writing a key under a new type removes it from the old one. Every
/// successful `set_*` or `remove` is a mutation, even when the value does not
/// change, and triggers the global listeners followed by the key's listeners.
///
/// A `Datastore` may be shared between threads. All access, reads included,
/// goes through one connection and is serialized by its mutex; callers that
/// need parallel reads should open a second `Datastore` on the same file.
/// Sharing one database file between processes is not supported.
pub struct Datastore {
    path: PathBuf,
    backend: Mutex<Option<SqliteStore>>,
    registry: Mutex<Registry>,
}

impl Datastore {
    /// Open (or create) the datastore at `path`. `":memory:"` opens a
    /// transient in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Open an in-memory datastore
    pub fn open_in_memory() -> Result<Self> {
        Self::open(MEMORY_PATH)
    }

    /// Open with explicit connection options.
    ///
    /// The type registry is rebuilt from the database so that keys written by
    /// an earlier process can be removed without being touched first.
    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = SqliteStore::open(&path, options)?;

        let entries = store.keys_and_types().map_err(|e| Error::OpenFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut registry = Registry::new();
        registry.rebuild_types(entries);

        tracing::debug!(
            "Opened datastore {} ({} keys)",
            path.display(),
            registry.type_count()
        );

        Ok(Self {
            path,
            backend: Mutex::new(Some(store)),
            registry: Mutex::new(registry),
        })
    }

    /// Path this datastore was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the connection and drop all listeners. Idempotent; every other
    /// operation fails with [`Error::Closed`] afterwards.
    pub fn close(&self) -> Result<()> {
        let store = self.backend().take();
        let Some(store) = store else {
            return Ok(());
        };
        self.registry().clear();
        tracing::debug!("Closing datastore {}", self.path.display());
        store.close()
    }

    pub fn is_closed(&self) -> bool {
        self.backend().is_none()
    }

    fn backend(&self) -> MutexGuard<'_, Option<SqliteStore>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_backend<R>(&self, f: impl FnOnce(&mut SqliteStore) -> Result<R>) -> Result<R> {
        let mut guard = self.backend();
        let store = guard.as_mut().ok_or(Error::Closed)?;
        f(store)
    }

    /// Snapshot the listeners for `key` under the registry lock, then invoke
    /// them with no lock held so they may call back into the store.
    fn trigger(&self, key: &str) {
        let snapshot = self.registry().snapshot(key);
        snapshot.dispatch();
    }

    // ========== Typed Accessors ==========

    /// Read `key` as `T`.
    ///
    /// Fails with [`Error::NoSuchKey`] if `key` has no value of type `T`, even
    /// when it exists under another type.
    pub fn get<T: Scalar>(&self, key: &str) -> Result<T> {
        validate_key(key)?;
        self.with_backend(|store| store.get::<T>(key))?
            .ok_or_else(|| Error::no_such_key(key, Some(T::TYPE)))
    }

    /// Read `key` as `T`, returning `fallback` on any error.
    ///
    /// A missing key is expected and silent; other errors are logged.
    pub fn get_with_fallback<T: Scalar>(&self, key: &str, fallback: T) -> T {
        match self.get::<T>(key) {
            Ok(value) => value,
            Err(e) => {
                if !e.is_no_such_key() {
                    tracing::error!("Failed to get {} '{}': {}", T::TYPE, key, e);
                }
                fallback
            }
        }
    }

    /// Read `key` as `T`, falling back to the type's zero value.
    pub fn get_or_default<T: Scalar + Default>(&self, key: &str) -> T {
        self.get_with_fallback(key, T::default())
    }

    /// Read `key` under whatever type it currently has.
    pub fn get_value(&self, key: &str) -> Result<Value> {
        validate_key(key)?;
        let value = self.with_backend(|store| {
            let Some(ty) = self.registry().type_of(key) else {
                return Ok(None);
            };
            let value = match ty {
                ValueType::String => store.get::<String>(key)?.map(Value::String),
                ValueType::Bool => store.get::<bool>(key)?.map(Value::Bool),
                ValueType::Float => store.get::<f64>(key)?.map(Value::Float),
                ValueType::Int => store.get::<i64>(key)?.map(Value::Int),
            };
            Ok(value)
        })?;
        value.ok_or_else(|| Error::no_such_key(key, None))
    }

    /// Write `value` under `key` as `T`.
    pub fn set<T: Scalar>(&self, key: &str, value: T) -> Result<()> {
        self.set_value(key, value.into_value())
    }

    /// Write a dynamically typed value.
    ///
    /// The upsert and the removal of the key from any other type table commit
    /// together; listeners run after the commit and after the type registry
    /// reflects the new type.
    pub fn set_value(&self, key: &str, value: Value) -> Result<()> {
        validate_key(key)?;
        let ty = value.value_type();
        self.with_backend(|store| {
            store.upsert(key, &value)?;
            self.registry().record_type(key, ty);
            Ok(())
        })?;
        tracing::debug!("Set {} '{}'", ty, key);
        self.trigger(key);
        Ok(())
    }

    /// Like [`Datastore::set`], but logs and swallows errors.
    pub fn set_or_log<T: Scalar>(&self, key: &str, value: T) {
        if let Err(e) = self.set(key, value) {
            tracing::error!("Failed to set {} '{}': {}", T::TYPE, key, e);
        }
    }

    /// Remove `key` whatever its type.
    ///
    /// Routed through the type registry; fails with `NoSuchKey` (type
    /// `"unknown"`) without touching the database if the key is not known.
    /// Listeners registered for the key stay registered.
    pub fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.with_backend(|store| {
            let ty = self
                .registry()
                .type_of(key)
                .ok_or_else(|| Error::no_such_key(key, None))?;
            store.delete(key, ty)?;
            self.registry().forget_type(key);
            Ok(())
        })?;
        tracing::debug!("Removed '{}'", key);
        self.trigger(key);
        Ok(())
    }

    /// Like [`Datastore::remove`], but ignores missing keys and logs other errors.
    pub fn remove_or_log(&self, key: &str) {
        match self.remove(key) {
            Ok(()) => {}
            Err(e) if e.is_no_such_key() => {}
            Err(e) => tracing::error!("Failed to remove '{}': {}", key, e),
        }
    }

    /// Current type of `key` according to the type registry
    pub fn type_of(&self, key: &str) -> Option<ValueType> {
        self.registry().type_of(key)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    pub fn get_float(&self, key: &str) -> Result<f64> {
        self.get(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    pub fn get_string_with_fallback(&self, key: &str, fallback: &str) -> String {
        self.get_with_fallback(key, fallback.to_string())
    }

    pub fn get_bool_with_fallback(&self, key: &str, fallback: bool) -> bool {
        self.get_with_fallback(key, fallback)
    }

    pub fn get_float_with_fallback(&self, key: &str, fallback: f64) -> f64 {
        self.get_with_fallback(key, fallback)
    }

    pub fn get_int_with_fallback(&self, key: &str, fallback: i64) -> i64 {
        self.get_with_fallback(key, fallback)
    }

    pub fn set_string(&self, key: &str, value: impl Into<String>) -> Result<()> {
        self.set(key, value.into())
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, value)
    }

    pub fn set_float(&self, key: &str, value: f64) -> Result<()> {
        self.set(key, value)
    }

    pub fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, value)
    }

    // ========== Enumeration ==========

    /// All keys with their types, as parallel vectors.
    ///
    /// Read straight from the database; order is unspecified.
    pub fn keys_and_types(&self) -> Result<(Vec<String>, Vec<ValueType>)> {
        let entries = self.with_backend(|store| store.keys_and_types())?;
        Ok(entries.into_iter().unzip())
    }

    /// All keys irrespective of type
    pub fn keys(&self) -> Result<Vec<String>> {
        let (keys, _) = self.keys_and_types()?;
        Ok(keys)
    }

    /// Row counts per type
    pub fn stats(&self) -> Result<DbStats> {
        self.with_backend(|store| store.stats())
    }

    // ========== Listeners ==========

    /// Register a callback invoked after every mutation of any key.
    pub fn add_change_listener<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: ChangeCallback = Arc::new(callback);
        self.registry().add_global(callback);
    }

    /// Register `listener` for mutations of `key`.
    pub fn add_key_listener(&self, key: &str, listener: Arc<dyn DataListener>) {
        self.registry().add_keyed(key, listener);
    }

    /// Remove `listener` (by identity) from `key`. No-op if it is not registered.
    pub fn remove_key_listener(&self, key: &str, listener: &Arc<dyn DataListener>) {
        self.registry().remove_keyed(key, listener);
    }

    // ========== Bindings ==========

    /// Bind to `key` as `T`. The binding de-registers itself when dropped.
    pub fn bind<T: Scalar>(&self, key: &str) -> Binding<'_, T> {
        Binding::new(self, key)
    }

    pub fn bind_string(&self, key: &str) -> Binding<'_, String> {
        self.bind(key)
    }

    pub fn bind_bool(&self, key: &str) -> Binding<'_, bool> {
        self.bind(key)
    }

    pub fn bind_float(&self, key: &str) -> Binding<'_, f64> {
        self.bind(key)
    }

    pub fn bind_int(&self, key: &str) -> Binding<'_, i64> {
        self.bind(key)
    }

    // ========== Metadata ==========

    /// File format version recorded in the database
    pub fn format_version(&self) -> Result<i64> {
        let raw = self
            .with_backend(|store| store.metadata_get(META_VERSION))?
            .ok_or_else(|| Error::Metadata("missing format version".to_string()))?;
        raw.parse()
            .map_err(|_| Error::Metadata(format!("invalid format version '{}'", raw)))
    }

    /// Application name, if one has been set
    pub fn app_name(&self) -> Result<Option<String>> {
        self.with_backend(|store| store.metadata_get(META_APP_NAME))
    }

    /// Record which application owns this file, overwriting any previous name.
    pub fn set_app_name(&self, name: &str) -> Result<()> {
        self.with_backend(|store| store.metadata_set(META_APP_NAME, name))
    }

    /// Application-defined file version, if one has been set
    pub fn app_version(&self) -> Result<Option<i64>> {
        let Some(raw) = self.with_backend(|store| store.metadata_get(META_APP_VERSION))? else {
            return Ok(None);
        };
        raw.parse()
            .map(Some)
            .map_err(|_| Error::Metadata(format!("invalid app version '{}'", raw)))
    }

    pub fn set_app_version(&self, version: i64) -> Result<()> {
        self.with_backend(|store| store.metadata_set(META_APP_VERSION, &version.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn key_listener_count(&self, key: &str) -> usize {
        self.registry().keyed_count(key)
    }
}

impl Drop for Datastore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close datastore {}: {}", self.path.display(), e);
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::EmptyKey);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::listener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn DataListener>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let l = listener(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, l)
    }

    fn sorted_pairs(store: &Datastore) -> Vec<(String, ValueType)> {
        let (keys, types) = store.keys_and_types().unwrap();
        let mut pairs: Vec<_> = keys.into_iter().zip(types).collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn test_string_roundtrip_and_fallbacks() {
        let store = Datastore::open_in_memory().unwrap();
        let binding = store.bind_string("foo");
        let (count, l) = counter();
        binding.add_listener(l);

        store.set_string("foo", "bar").unwrap();

        assert_eq!(store.get_string("foo").unwrap(), "bar");
        assert!(store.get_string("baz").unwrap_err().is_no_such_key());
        assert_eq!(store.get_string_with_fallback("baz", "quux"), "quux");
        assert_eq!(store.get_string_with_fallback("foo", "quux"), "bar");

        store.set_string("foo", "bar").unwrap();
        store.set_string("foo", "baz").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_bool_via_binding() {
        let store = Datastore::open_in_memory().unwrap();
        let binding = store.bind_bool("foo");
        let (count, l) = counter();
        binding.add_listener(l);

        store.set_bool("foo", true).unwrap();
        assert!(store.get_bool("foo").unwrap());
        assert!(!store.get_or_default::<bool>("baz"));
        assert!(store.get_bool_with_fallback("baz", true));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        binding.set(false).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!store.get_bool("foo").unwrap());
    }

    #[test]
    fn test_float_and_int_roundtrip() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_float("pi", 3.25).unwrap();
        store.set_int("big", i64::MIN).unwrap();

        assert_eq!(store.get_float("pi").unwrap(), 3.25);
        assert_eq!(store.get_int("big").unwrap(), i64::MIN);
        assert_eq!(store.get_float_with_fallback("missing", 2.5), 2.5);
        assert_eq!(store.get_int_with_fallback("pi", 9), 9);
        assert_eq!(store.get_or_default::<i64>("missing"), 0);
    }

    #[test]
    fn test_enumeration() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_int("foo", 1).unwrap();
        store.set_float("bar", 3.7).unwrap();
        store.set_bool("baz", true).unwrap();
        store.set_string("quux", "spam").unwrap();

        let (keys, types) = store.keys_and_types().unwrap();
        assert_eq!(keys.len(), 4);
        assert_eq!(types.len(), 4);
        for key in ["foo", "bar", "baz", "quux"] {
            assert!(keys.iter().any(|k| k == key));
        }
        assert_eq!(
            sorted_pairs(&store),
            vec![
                ("bar".to_string(), ValueType::Float),
                ("baz".to_string(), ValueType::Bool),
                ("foo".to_string(), ValueType::Int),
                ("quux".to_string(), ValueType::String),
            ]
        );
    }

    #[test]
    fn test_type_migration_keeps_latest_type_only() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_int("foo", 1).unwrap();
        store.set_float("foo", 1.7).unwrap();
        store.set_string("foo", "baz").unwrap();

        assert_eq!(store.get_string("foo").unwrap(), "baz");
        assert!(store.get_int("foo").unwrap_err().is_no_such_key());
        assert!(store.get_float("foo").unwrap_err().is_no_such_key());
        assert_eq!(store.type_of("foo"), Some(ValueType::String));
        assert_eq!(
            sorted_pairs(&store),
            vec![("foo".to_string(), ValueType::String)]
        );
    }

    #[test]
    fn test_no_such_key_reports_requested_type() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_int("foo", 1).unwrap();

        match store.get_bool("foo") {
            Err(Error::NoSuchKey {
                key,
                requested_type,
            }) => {
                assert_eq!(key, "foo");
                assert_eq!(requested_type, "bool");
            }
            other => panic!("expected NoSuchKey, got {:?}", other),
        }
        match store.remove("nope") {
            Err(Error::NoSuchKey { requested_type, .. }) => assert_eq!(requested_type, "unknown"),
            other => panic!("expected NoSuchKey, got {:?}", other),
        }
    }

    #[test]
    fn test_remove_then_readd_preserves_listeners() {
        let store = Datastore::open_in_memory().unwrap();
        let binding = store.bind_int("foo");
        let (count, l) = counter();
        binding.add_listener(l);

        store.set_int("foo", 7).unwrap();
        store.set_string("foo", "frob").unwrap();
        store.remove("foo").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(store.get_string("foo").unwrap_err().is_no_such_key());

        store.set_int("foo", 7).unwrap();
        store.remove("foo").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_global_listener_fires_once_per_write() {
        let store = Datastore::open_in_memory().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        store.add_change_listener(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.set_int("foo", 1).unwrap();
        store.set_int("bar", 2).unwrap();
        store.set_int("baz", 2).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_global_listener_fires_for_identical_rewrites() {
        let store = Datastore::open_in_memory().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        store.add_change_listener(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.set_string("foo", "bar").unwrap();
        store.set_string("foo", "bar").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_binding_listener_fires_once_on_remove() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_int("foo", 7).unwrap();

        let binding = store.bind_int("foo");
        let (count, l) = counter();
        binding.add_listener(l);

        store.remove("foo").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_key_listener_only_fires_for_its_key() {
        let store = Datastore::open_in_memory().unwrap();
        let (count, l) = counter();
        store.add_key_listener("k1", Arc::clone(&l));

        store.set_int("k2", 1).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        store.set_int("k1", 1).unwrap();
        store.set_int("k1", 1).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        store.remove_key_listener("k1", &l);
        store.set_int("k1", 2).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_mutations_do_not_notify() {
        let store = Datastore::open_in_memory().unwrap();
        let (count, l) = counter();
        store.add_key_listener("ghost", l);

        assert!(store.remove("ghost").is_err());
        assert!(matches!(store.set_int("", 1), Err(Error::EmptyKey)));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_observes_new_value_and_may_reenter() {
        let store = Arc::new(Datastore::open_in_memory().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&store);
        let s = Arc::clone(&seen);
        store.add_change_listener(move || {
            if let Some(store) = weak.upgrade() {
                s.lock().unwrap().push(store.get_int("counter").ok());
                // Registering from inside a callback must not deadlock.
                store.add_key_listener("other", listener(|| {}));
            }
        });

        store.set_int("counter", 1).unwrap();
        store.set_int("counter", 2).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2)]);
        assert_eq!(store.key_listener_count("other"), 2);
    }

    #[test]
    fn test_dynamic_value_access() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_value("v", Value::Float(0.5)).unwrap();
        assert_eq!(store.get_value("v").unwrap(), Value::Float(0.5));

        store.set("v", "text".to_string()).unwrap();
        assert_eq!(store.get_value("v").unwrap(), Value::String("text".into()));
        assert!(store.get_value("absent").unwrap_err().is_no_such_key());
    }

    #[test]
    fn test_convenience_variants_swallow_errors() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_or_log("k", 5i64);
        assert_eq!(store.get_int("k").unwrap(), 5);
        store.remove_or_log("k");
        store.remove_or_log("k");
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_int("k", 1).unwrap();

        store.close().unwrap();
        store.close().unwrap();
        assert!(store.is_closed());
        assert!(matches!(store.get_int("k"), Err(Error::Closed)));
        assert!(matches!(store.set_int("k", 2), Err(Error::Closed)));
        assert!(matches!(store.keys_and_types(), Err(Error::Closed)));
        assert_eq!(store.get_int_with_fallback("k", 9), 9);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let store = Datastore::open(&path).unwrap();
            store.set_int("keep", 1).unwrap();
            store.set_string("gone", "x").unwrap();
            store.set_float("moved", 1.0).unwrap();
            store.set_bool("moved", true).unwrap();
            store.remove("gone").unwrap();
            store.set_app_name("test app").unwrap();
            store.set_app_version(123).unwrap();
            store.close().unwrap();
        }

        let store = Datastore::open(&path).unwrap();
        assert_eq!(
            sorted_pairs(&store),
            vec![
                ("keep".to_string(), ValueType::Int),
                ("moved".to_string(), ValueType::Bool),
            ]
        );
        assert_eq!(store.app_name().unwrap().as_deref(), Some("test app"));
        assert_eq!(store.app_version().unwrap(), Some(123));

        // The registry is rebuilt on open, so untouched keys can be removed.
        store.remove("keep").unwrap();
        assert!(store.get_int("keep").unwrap_err().is_no_such_key());
    }

    #[test]
    fn test_float_nan_roundtrip() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_float("k", f64::NAN).unwrap();

        assert!(store.get_float("k").unwrap().is_nan());
        assert!(store.get_float_with_fallback("k", 1.0).is_nan());
        assert!(matches!(store.get_value("k").unwrap(), Value::Float(x) if x.is_nan()));
        assert_eq!(sorted_pairs(&store), vec![("k".to_string(), ValueType::Float)]);
    }

    #[test]
    fn test_opens_file_written_by_earlier_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE kvp_string (key TEXT PRIMARY KEY, value TEXT);
                CREATE TABLE kvp_bool (key TEXT PRIMARY KEY, value BOOLEAN);
                CREATE TABLE kvp_float (key TEXT PRIMARY KEY, value REAL);
                CREATE TABLE kvp_int (key TEXT PRIMARY KEY, value INTEGER);
                CREATE TABLE sqlitedatastore_metadata (key TEXT PRIMARY KEY, value TEXT);
                INSERT INTO sqlitedatastore_metadata VALUES
                    ('SQLiteDatastoreMagic', '9e1f63f7-a6b1-4d50-88e8-269ccca04d89'),
                    ('SQLiteDatastoreVersion', '1'),
                    ('SQLiteDatastoreAppName', 'legacy app'),
                    ('SQLiteDatastoreAppVersion', '4');
                INSERT INTO kvp_string VALUES ('name', 'old');
                INSERT INTO kvp_int VALUES ('count', 3);
                "#,
            )
            .unwrap();
        }

        let store = Datastore::open(&path).unwrap();
        assert_eq!(store.format_version().unwrap(), 1);
        assert_eq!(store.app_name().unwrap().as_deref(), Some("legacy app"));
        assert_eq!(store.app_version().unwrap(), Some(4));
        assert_eq!(store.get_string("name").unwrap(), "old");
        assert_eq!(store.get_int("count").unwrap(), 3);
        store.remove("count").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_is_used_verbatim() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"st\xFFore.db"));

        let store = Datastore::open(&path).unwrap();
        store.set_int("k", 1).unwrap();
        assert_eq!(store.path(), path.as_path());
        store.close().unwrap();

        assert!(path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let store = Datastore::open_in_memory().unwrap();
        store.set_int("n", 0).unwrap();

        std::thread::scope(|scope| {
            let writer = &store;
            scope.spawn(move || {
                for i in 1..=50i64 {
                    writer.set_int("n", i).unwrap();
                }
            });
            for _ in 0..3 {
                let reader = &store;
                scope.spawn(move || {
                    let mut last = 0;
                    for _ in 0..50 {
                        let n = reader.get_int("n").unwrap();
                        assert!(n >= last);
                        last = n;
                    }
                });
            }
        });

        assert_eq!(store.get_int("n").unwrap(), 50);
    }

    #[test]
    fn test_metadata_defaults() {
        let store = Datastore::open_in_memory().unwrap();
        assert_eq!(store.format_version().unwrap(), FORMAT_VERSION);
        assert_eq!(store.app_name().unwrap(), None);
        assert_eq!(store.app_version().unwrap(), None);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Datastore::open_in_memory().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        store.add_change_listener(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::scope(|scope| {
            for t in 0..4i64 {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..25i64 {
                        store.set_int(&format!("t{}-{}", t, i), i).unwrap();
                        if i % 2 == 0 {
                            store.set_int("shared", t).unwrap();
                        } else {
                            store.set_string("shared", format!("{}", t)).unwrap();
                        }
                    }
                });
            }
        });

        assert_eq!(count.load(Ordering::SeqCst), 4 * 25 * 2);
        let (keys, types) = store.keys_and_types().unwrap();
        assert_eq!(keys.len(), 101);
        let shared: Vec<_> = keys
            .iter()
            .zip(&types)
            .filter(|(k, _)| k.as_str() == "shared")
            .collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(store.type_of("shared"), Some(*shared[0].1));
    }
}
