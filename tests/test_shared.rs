//! Tests for shared memory between runtimes.

extern crate mokapi_engine;

use std::sync::Arc;
use std::thread;

use mokapi_engine::config::RuntimeConfig;
use mokapi_engine::host::DefaultHost;
use mokapi_engine::runtime::ScriptRuntime;
use mokapi_engine::shared::SharedStore;
use serde_json::json;

fn runtime(name: &str, store: &SharedStore) -> ScriptRuntime {
    let config = RuntimeConfig::default().with_script_name(name);
    let host = DefaultHost::new(&config).unwrap().with_shared(store.clone());
    ScriptRuntime::new(&config, Arc::new(host)).unwrap()
}

const PRELUDE: &str = "var shared = require('mokapi').shared;";

// ============================================================================
// Between runtimes
// ============================================================================

mod cross_runtime_tests {
    use super::*;

    #[test]
    fn test_value_set_in_one_is_seen_in_other() {
        let store = SharedStore::new();
        let a = runtime("a.js", &store);
        let b = runtime("b.js", &store);
        a.eval(&format!("{} shared.set('k', 'v')", PRELUDE)).unwrap();
        assert_eq!(b.eval(&format!("{} shared.get('k')", PRELUDE)).unwrap(), json!("v"));
        assert_eq!(store.get("k"), Some(json!("v")));
    }

    #[test]
    fn test_updates_from_two_runtimes_accumulate() {
        let store = SharedStore::new();
        let a = runtime("a.js", &store);
        let b = runtime("b.js", &store);
        let script = format!("{} shared.update('counter', c => (c ?? 0) + 1)", PRELUDE);
        a.eval(&script).unwrap();
        b.eval(&script).unwrap();
        assert_eq!(store.get("counter"), Some(json!(2)));
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let store = SharedStore::new();
        let workers: Vec<_> = (0..2)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    let rt = runtime(&format!("w{}.js", i), &store);
                    rt.eval(&format!(
                        "{} for (var i = 0; i < 50; i++) {{ shared.update('hits', n => (n ?? 0) + 1) }}",
                        PRELUDE
                    ))
                    .unwrap();
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(store.get("hits"), Some(json!(100)));
    }

    #[test]
    fn test_objects_are_copied_out_and_written_back() {
        let store = SharedStore::new();
        store.set("user", json!({"name": "alice", "roles": ["read"]}));
        let a = runtime("a.js", &store);
        a.eval(&format!(
            "{} var u = shared.get('user'); u.name = 'bob'; u.roles[1] = 'write'",
            PRELUDE
        ))
        .unwrap();
        assert_eq!(store.get("user"), Some(json!({"name": "bob", "roles": ["read", "write"]})));
    }
}

// ============================================================================
// Store operations
// ============================================================================

mod store_tests {
    use super::*;

    #[test]
    fn test_namespaces_are_isolated() {
        let store = SharedStore::new();
        let a = runtime("a.js", &store);
        a.eval(&format!(
            "{} shared.namespace('orders').set('count', 3); shared.set('count', 1)",
            PRELUDE
        ))
        .unwrap();
        assert_eq!(store.get("count"), Some(json!(1)));
        let orders = store.namespace("orders");
        assert_eq!(orders.get("count"), Some(json!(3)));
        assert_eq!(orders.path(), "orders");
        assert!(orders.same_scope(&store.namespace("orders")));
    }

    #[test]
    fn test_keys_has_delete() {
        let store = SharedStore::new();
        let a = runtime("a.js", &store);
        let result = a
            .eval(&format!(
                "{} shared.set('a', 1); shared.set('b', 2); shared.delete('a');\n\
                 [shared.has('a'), shared.has('b'), shared.keys()]",
                PRELUDE
            ))
            .unwrap();
        assert_eq!(result, json!([false, true, ["b"]]));
    }

    #[test]
    fn test_missing_key_reads_undefined() {
        let store = SharedStore::new();
        let a = runtime("a.js", &store);
        let result = a.eval(&format!("{} shared.get('nope') === undefined", PRELUDE)).unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn test_nested_update_of_other_key() {
        let store = SharedStore::new();
        let a = runtime("a.js", &store);
        let result = a
            .eval(&format!(
                "{} shared.update('a', v => {{ shared.update('b', w => 1); return 2 }})",
                PRELUDE
            ))
            .unwrap();
        assert_eq!(result, json!(2));
        assert_eq!(store.get("a"), Some(json!(2)));
        assert_eq!(store.get("b"), Some(json!(1)));
    }

    #[test]
    fn test_nested_update_of_same_key_throws() {
        let store = SharedStore::new();
        let a = runtime("a.js", &store);
        let err = a
            .eval(&format!(
                "{} shared.update('a', v => {{ shared.update('a', w => 1); return 2 }})",
                PRELUDE
            ))
            .unwrap_err();
        assert!(err.to_string().contains("TypeError"), "{}", err);
        assert!(!store.has("a"));
        // The store is usable again afterwards.
        a.eval(&format!("{} shared.update('a', v => 3)", PRELUDE)).unwrap();
        assert_eq!(store.get("a"), Some(json!(3)));
    }

    #[test]
    fn test_set_is_not_lost_under_a_running_update() {
        let store = SharedStore::new();
        store.set("n", json!(1));
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let updater = {
            let store = store.clone();
            thread::spawn(move || {
                store
                    .update::<_, mokapi_engine::shared::SharedError>("n", |v| {
                        started_tx.send(()).unwrap();
                        thread::sleep(std::time::Duration::from_millis(100));
                        Ok(json!(v.and_then(|v| v.as_i64()).unwrap_or(0) + 1))
                    })
                    .unwrap();
            })
        };
        started_rx.recv().unwrap();
        let b = runtime("b.js", &store);
        b.eval(&format!("{} shared.set('n', 100)", PRELUDE)).unwrap();
        updater.join().unwrap();
        assert_eq!(store.get("n"), Some(json!(100)));
    }
}
