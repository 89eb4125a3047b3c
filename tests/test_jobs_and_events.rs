//! Tests for jobs and event handlers registered by scripts.

extern crate mokapi_engine;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mokapi_engine::config::RuntimeConfig;
use mokapi_engine::host::DefaultHost;
use mokapi_engine::runtime::ScriptRuntime;
use mokapi_engine::shared::SharedStore;
use serde_json::{json, Value};

fn setup(name: &str) -> (ScriptRuntime, Arc<DefaultHost>, SharedStore) {
    let store = SharedStore::new();
    let config = RuntimeConfig::default().with_script_name(name);
    let host = Arc::new(DefaultHost::new(&config).unwrap().with_shared(store.clone()));
    let runtime = ScriptRuntime::new(&config, host.clone()).unwrap();
    (runtime, host, store)
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// ============================================================================
// Scheduled jobs
// ============================================================================

mod job_tests {
    use super::*;

    #[test]
    fn test_every_runs_the_given_number_of_times() {
        let (runtime, host, store) = setup("ticker.js");
        runtime
            .run_source(
                "ticker.js",
                "import { every, shared } from 'mokapi'\n\
                 export default function () {\n\
                     every('20ms', () => shared.update('ticks', n => (n ?? 0) + 1), { times: 2 })\n\
                 }",
            )
            .unwrap();
        runtime.start();
        assert!(wait_until(Duration::from_secs(5), || store.get("ticks") == Some(json!(2))));
        assert!(wait_until(Duration::from_secs(5), || host.scheduler().jobs().is_empty()));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(store.get("ticks"), Some(json!(2)));
    }

    #[test]
    fn test_jobs_are_tagged_with_their_file() {
        let (runtime, host, _store) = setup("tagged.js");
        let id = runtime
            .run_source(
                "tagged.js",
                "import { every } from 'mokapi'\n\
                 export default function () {\n\
                     return every('1h', () => {}, { skipImmediateFirstRun: true, tags: { name: 'refresh' } })\n\
                 }",
            )
            .unwrap();
        let jobs = host.scheduler().jobs_tagged("file", "tagged.js");
        assert_eq!(jobs.len(), 1);
        assert_eq!(Value::from(jobs[0].id), id);
        assert_eq!(jobs[0].tags.get("name").map(String::as_str), Some("refresh"));
    }

    #[test]
    fn test_cron_every_shorthand() {
        let (runtime, _host, store) = setup("cron.js");
        runtime
            .run_source(
                "cron.js",
                "import { cron, shared } from 'mokapi'\n\
                 export default function () {\n\
                     cron('@every 10ms', () => shared.set('cron', true), { times: 1 })\n\
                 }",
            )
            .unwrap();
        runtime.start();
        assert!(wait_until(Duration::from_secs(5), || store.get("cron") == Some(json!(true))));
    }

    #[test]
    fn test_invalid_cron_is_a_script_error() {
        let (runtime, host, _store) = setup("bad.js");
        let err = runtime
            .run_source(
                "bad.js",
                "import { cron } from 'mokapi'\nexport default function () { cron('not a cron', () => {}) }",
            )
            .unwrap_err();
        assert!(err.to_string().contains("invalid cron expression 'not a cron'"), "{}", err);
        assert!(host.scheduler().jobs().is_empty());
    }

    #[test]
    fn test_close_cancels_registered_jobs() {
        let (runtime, host, _store) = setup("closing.js");
        runtime
            .run_source(
                "closing.js",
                "import { every } from 'mokapi'\n\
                 export default function () { every('1h', () => {}, { skipImmediateFirstRun: true }) }",
            )
            .unwrap();
        assert_eq!(host.scheduler().jobs().len(), 1);
        host.close();
        assert!(host.scheduler().jobs().is_empty());
    }
}

// ============================================================================
// Event handlers
// ============================================================================

mod event_tests {
    use super::*;

    #[test]
    fn test_handlers_mutate_arguments_in_order() {
        let (runtime, host, _store) = setup("events.js");
        runtime
            .run_source(
                "events.js",
                "import { on } from 'mokapi'\n\
                 export default function () {\n\
                     on('http', (request, response) => { response.data = { path: request.path } })\n\
                     on('http', (request, response) => { response.data.seen = true; return true }, { tags: { name: 'second' } })\n\
                 }",
            )
            .unwrap();
        runtime.start();
        assert_eq!(host.handler_count("http"), 2);
        assert_eq!(host.handler_tags("http")[1].get("name").map(String::as_str), Some("second"));

        let outcome = host.emit("http", vec![json!({"path": "/pets"}), json!({})]).unwrap();
        assert_eq!(outcome.args[1], json!({"data": {"path": "/pets", "seen": true}}));
        assert_eq!(outcome.handled, 1);
    }

    #[test]
    fn test_unregistered_event_is_a_no_op() {
        let (_runtime, host, _store) = setup("quiet.js");
        let outcome = host.emit("kafka", vec![json!({"offset": 1})]).unwrap();
        assert_eq!(outcome.args, vec![json!({"offset": 1})]);
        assert_eq!(outcome.handled, 0);
    }

    #[test]
    fn test_handler_errors_reach_the_emitter() {
        let (runtime, host, _store) = setup("failing.js");
        runtime
            .run_source(
                "failing.js",
                "import { on } from 'mokapi'\n\
                 export default function () { on('http', () => { throw new Error('handler failed') }) }",
            )
            .unwrap();
        let err = host.emit("http", vec![json!({}), json!({})]).unwrap_err();
        assert_eq!(err.to_string(), "Error: handler failed");
    }
}
