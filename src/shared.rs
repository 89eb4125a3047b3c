//! Process-wide shared memory.
//!
//! Values are stored as JSON so they can be read from any VM. A store has
//! named child stores (namespaces) that are created on first use and live as
//! long as the process.
//!
//! Writes to a scope are serialized through a writer slot owned by one thread
//! at a time. `update` keeps the slot for the whole read-modify-write, so a
//! `set` from another thread lands either before or after it. The owning
//! thread may write again while it holds the slot (a script callback running
//! inside `update`), except for a second `update` of the same key.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use serde_json::{Map, Value};
use thiserror::Error;

lazy_static! {
    static ref GLOBAL_STORE: SharedStore = SharedStore::new();
}

#[derive(Debug, Error, PartialEq)]
pub enum SharedError {
    #[error("shared.update('{0}') called while an update of '{0}' is running")]
    NestedUpdate(String),
}

#[derive(Default)]
struct Writer {
    owner: Option<ThreadId>,
    depth: usize,
    /// Keys whose `update` is running on the owning thread.
    updating: Vec<String>,
}

struct Scope {
    path: String,
    values: Mutex<Map<String, Value>>,
    writer: Mutex<Writer>,
    released: Condvar,
    namespaces: Mutex<HashMap<String, Arc<Scope>>>,
}

impl Scope {
    fn new(path: String) -> Self {
        Scope {
            path,
            values: Mutex::new(Map::new()),
            writer: Mutex::new(Writer::default()),
            released: Condvar::new(),
            namespaces: Mutex::new(HashMap::new()),
        }
    }

    /// Takes the writer slot, waiting while another thread owns it.
    fn begin_write(&self) -> WriteGuard<'_> {
        let me = thread::current().id();
        let mut writer = lock(&self.writer);
        loop {
            match writer.owner {
                Some(owner) if owner == me => break,
                None => {
                    writer.owner = Some(me);
                    break;
                }
                Some(_) => {
                    writer = self
                        .released
                        .wait(writer)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
            }
        }
        writer.depth += 1;
        WriteGuard {
            scope: self,
            updating: false,
        }
    }
}

struct WriteGuard<'a> {
    scope: &'a Scope,
    updating: bool,
}

impl WriteGuard<'_> {
    /// Marks `key` as being updated until the guard is dropped.
    fn claim(&mut self, key: &str) -> Result<(), SharedError> {
        let mut writer = lock(&self.scope.writer);
        if writer.updating.iter().any(|k| k == key) {
            return Err(SharedError::NestedUpdate(key.to_string()));
        }
        writer.updating.push(key.to_string());
        self.updating = true;
        Ok(())
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let mut writer = lock(&self.scope.writer);
        if self.updating {
            writer.updating.pop();
        }
        writer.depth -= 1;
        if writer.depth == 0 {
            writer.owner = None;
            drop(writer);
            self.scope.released.notify_all();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock leaves plain data behind; keep going.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct SharedStore {
    scope: Arc<Scope>,
}

impl SharedStore {
    /// A new, empty, unnamed store. Most callers want [`SharedStore::global`].
    pub fn new() -> Self {
        SharedStore {
            scope: Arc::new(Scope::new(String::new())),
        }
    }

    /// The store shared by every runtime in this process.
    pub fn global() -> SharedStore {
        GLOBAL_STORE.clone()
    }

    /// Dotted namespace path, empty for a root store.
    pub fn path(&self) -> &str {
        &self.scope.path
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.scope.values).get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        log::trace!("shared[{}] set {}", self.scope.path, key);
        let _write = self.scope.begin_write();
        lock(&self.scope.values).insert(key.to_string(), value);
    }

    pub fn has(&self, key: &str) -> bool {
        lock(&self.scope.values).contains_key(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        let _write = self.scope.begin_write();
        lock(&self.scope.values).shift_remove(key).is_some()
    }

    /// Removes every key of this scope. Namespaces are kept.
    pub fn clear(&self) {
        let _write = self.scope.begin_write();
        lock(&self.scope.values).clear();
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.scope.values).keys().cloned().collect()
    }

    /// Reads the current value, passes it to `f` and stores what `f` returns.
    /// No other thread writes to the scope while `f` runs, so concurrent
    /// updates run one after the other, each seeing every write committed
    /// before it. `f` may write to the store itself, but updating `key`
    /// again from inside `f` fails with [`SharedError::NestedUpdate`].
    pub fn update<F, E>(&self, key: &str, f: F) -> Result<Value, E>
    where
        F: FnOnce(Option<Value>) -> Result<Value, E>,
        E: From<SharedError>,
    {
        let mut write = self.scope.begin_write();
        write.claim(key)?;
        let current = self.get(key);
        let next = f(current)?;
        lock(&self.scope.values).insert(key.to_string(), next.clone());
        Ok(next)
    }

    /// Mutates a stored value in place. Returns `None` when `key` is absent.
    pub fn modify<R>(&self, key: &str, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        let _write = self.scope.begin_write();
        let mut values = lock(&self.scope.values);
        values.get_mut(key).map(f)
    }


    /// Child store `name`, created on first use.
    pub fn namespace(&self, name: &str) -> SharedStore {
        let mut namespaces = lock(&self.scope.namespaces);
        let scope = namespaces
            .entry(name.to_string())
            .or_insert_with(|| {
                let path = if self.scope.path.is_empty() {
                    name.to_string()
                } else {
                    format!("{}.{}", self.scope.path, name)
                };
                log::debug!("creating shared namespace {}", path);
                Arc::new(Scope::new(path))
            })
            .clone();
        SharedStore { scope }
    }

    /// Whether two handles address the same scope.
    pub fn same_scope(&self, other: &SharedStore) -> bool {
        Arc::ptr_eq(&self.scope, &other.scope)
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore").field("path", &self.scope.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_clear_keeps_parent_and_namespaces() {
        let store = SharedStore::new();
        store.set("a", json!(1));
        let ns = store.namespace("child");
        ns.set("b", json!(2));
        ns.clear();
        assert!(!ns.has("b"));
        assert_eq!(store.get("a"), Some(json!(1)));
        store.clear();
        assert!(store.namespace("child").same_scope(&ns));
        assert_eq!(ns.path(), "child");
    }

    #[test]
    fn test_concurrent_updates_serialize() {
        let store = SharedStore::new();
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .update::<_, SharedError>("counter", |v| {
                                let n = v.and_then(|v| v.as_i64()).unwrap_or(0);
                                Ok(json!(n + 1))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(store.get("counter"), Some(json!(800)));
    }

    #[test]
    fn test_nested_update_of_other_key() {
        let store = SharedStore::new();
        let outer = store.update::<_, SharedError>("a", |_| {
            let inner = store.update::<_, SharedError>("b", |_| Ok(json!(1)))?;
            assert_eq!(inner, json!(1));
            store.set("c", json!(3));
            Ok(json!(2))
        });
        assert_eq!(outer, Ok(json!(2)));
        assert_eq!(store.get("b"), Some(json!(1)));
        assert_eq!(store.get("c"), Some(json!(3)));
    }

    #[test]
    fn test_nested_update_of_same_key_fails() {
        let store = SharedStore::new();
        let result = store.update::<_, SharedError>("a", |_| store.update("a", |_| Ok(json!(1))));
        assert_eq!(result, Err(SharedError::NestedUpdate("a".to_string())));
        assert!(!store.has("a"));
        // The slot is released again.
        store.update::<_, SharedError>("a", |_| Ok(json!(5))).unwrap();
        assert_eq!(store.get("a"), Some(json!(5)));
    }

    #[test]
    fn test_set_waits_for_running_update() {
        let store = SharedStore::new();
        store.set("n", json!(1));
        let (started_tx, started_rx) = mpsc::channel();
        let updater = {
            let store = store.clone();
            thread::spawn(move || {
                store
                    .update::<_, SharedError>("n", |v| {
                        started_tx.send(()).unwrap();
                        thread::sleep(Duration::from_millis(100));
                        Ok(json!(v.and_then(|v| v.as_i64()).unwrap_or(0) + 1))
                    })
                    .unwrap();
            })
        };
        started_rx.recv().unwrap();
        store.set("n", json!(100));
        updater.join().unwrap();
        // The set came after the update committed, so it is not overwritten.
        assert_eq!(store.get("n"), Some(json!(100)));
    }
}
