//! Tests for the event loop as seen through a script runtime: timers,
//! promises, blocking submissions and shutdown.

extern crate mokapi_engine;

use std::thread;
use std::time::{Duration, Instant};

use mokapi_engine::config::{LoopConfig, RuntimeConfig};
use mokapi_engine::event_loop::{EventLoop, RuntimeError};
use mokapi_engine::runner::plugin::types::EvalContext;
use mokapi_engine::runtime::ScriptRuntime;
use serde_json::json;

fn runtime() -> ScriptRuntime {
    let (runtime, _host) = ScriptRuntime::with_default_host(RuntimeConfig::default()).unwrap();
    runtime
}

// ============================================================================
// Timers
// ============================================================================

mod timer_tests {
    use super::*;

    #[test]
    fn test_timeout_fires_after_delay() {
        let runtime = runtime();
        runtime.start();
        runtime
            .eval("var start = Date.now(); var calledAt = 0; setTimeout(() => { calledAt = Date.now() }, 1000)")
            .unwrap();
        thread::sleep(Duration::from_millis(1500));
        let elapsed = runtime.eval("calledAt - start").unwrap();
        assert!(elapsed.as_f64().unwrap() >= 1000.0, "fired after {}", elapsed);
        assert!(!runtime.has_jobs());
    }

    #[test]
    fn test_cleared_timeout_never_runs() {
        let runtime = runtime();
        runtime.start();
        runtime
            .eval("var ran = false; var id = setTimeout(() => { ran = true }, 1000)")
            .unwrap();
        assert!(runtime.has_jobs());
        thread::sleep(Duration::from_millis(500));
        runtime.eval("clearTimeout(id)").unwrap();
        thread::sleep(Duration::from_millis(1000));
        assert_eq!(runtime.eval("ran").unwrap(), json!(false));
        assert!(!runtime.has_jobs());
    }

    #[test]
    fn test_interval_until_cleared() {
        let runtime = runtime();
        runtime.start();
        runtime
            .eval(
                "var ticks = 0; var handle = setInterval(() => { ticks++; if (ticks === 3) clearInterval(handle) }, 10)",
            )
            .unwrap();
        assert!(runtime.wait_idle(Duration::from_secs(5)));
        assert_eq!(runtime.eval("ticks").unwrap(), json!(3));
    }

    #[test]
    fn test_timers_do_not_fire_before_start() {
        let runtime = runtime();
        runtime.eval("var fired = false; setTimeout(() => { fired = true }, 0)").unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(runtime.eval("fired").unwrap(), json!(false));
        runtime.start();
        assert!(runtime.wait_idle(Duration::from_secs(5)));
        assert_eq!(runtime.eval("fired").unwrap(), json!(true));
    }
}

// ============================================================================
// Promises and blocking submissions
// ============================================================================

mod promise_tests {
    use super::*;

    #[test]
    fn test_returned_promise_is_awaited() {
        let runtime = runtime();
        let value = runtime.eval("Promise.resolve(41).then(x => x + 1)").unwrap();
        assert_eq!(value, json!(42));
    }

    #[test]
    fn test_awaiting_a_timer_promise() {
        let runtime = runtime();
        let started = Instant::now();
        let value = runtime
            .eval("new Promise(resolve => setTimeout(() => resolve('late'), 50))")
            .unwrap();
        assert_eq!(value, json!("late"));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_rejection_surfaces_as_script_error() {
        let runtime = runtime();
        match runtime.eval("Promise.reject(new TypeError('nope'))") {
            Err(RuntimeError::Script { name, message }) => {
                assert_eq!(name, "TypeError");
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_thrown_error_message() {
        let runtime = runtime();
        let err = runtime.eval("throw new Error('boom')").unwrap_err();
        assert_eq!(err.to_string(), "Error: boom");
    }

    #[test]
    fn test_syntax_error_does_not_run() {
        let runtime = runtime();
        assert!(runtime.eval("var = ;").is_err());
        assert_eq!(runtime.eval("1 + 1").unwrap(), json!(2));
    }
}

// ============================================================================
// The loop itself
// ============================================================================

mod loop_tests {
    use super::*;

    fn spawn() -> EventLoop {
        EventLoop::spawn(&LoopConfig::default().with_thread_name("test-loop"), |_| {
            EvalContext::with_core_builtins()
        })
        .unwrap()
    }

    #[test]
    fn test_run_sync_returns_value() {
        let event_loop = spawn();
        let answer = event_loop.run_sync(|_ctx: &mut EvalContext| Ok(6 * 7)).unwrap();
        assert_eq!(answer, 42);
    }

    #[test]
    fn test_items_run_on_loop_thread() {
        let event_loop = spawn();
        let name = event_loop
            .run_sync(|_ctx: &mut EvalContext| Ok(thread::current().name().map(str::to_string)))
            .unwrap();
        assert_eq!(name.as_deref(), Some("test-loop"));
    }

    #[test]
    fn test_fire_and_forget_after_start() {
        let event_loop = spawn();
        event_loop.start();
        let (tx, rx) = crossbeam_channel::bounded(1);
        event_loop.run(move |_ctx: &mut EvalContext| {
            let _ = tx.send("done");
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "done");
    }

    #[test]
    fn test_reentrant_run_sync_is_rejected() {
        let event_loop = spawn();
        let handle = event_loop.handle();
        let inner = event_loop
            .run_sync(move |_ctx: &mut EvalContext| Ok(handle.run_sync(|_ctx: &mut EvalContext| Ok(1))))
            .unwrap();
        assert!(matches!(inner, Err(RuntimeError::Reentrant)));
    }

    #[test]
    fn test_stopped_loop_rejects_work() {
        let event_loop = spawn();
        event_loop.start();
        event_loop.stop();
        let result = event_loop.run_sync(|_ctx: &mut EvalContext| Ok(()));
        assert!(matches!(result, Err(RuntimeError::NotStarted)));
    }

    #[test]
    fn test_panicking_item_does_not_stop_the_loop() {
        let event_loop = spawn();
        event_loop.start();
        event_loop.run(|_ctx: &mut EvalContext| panic!("work item failed"));
        let answer = event_loop.run_sync(|_ctx: &mut EvalContext| Ok("still running")).unwrap();
        assert_eq!(answer, "still running");
    }

    #[test]
    fn test_throwing_timer_does_not_stop_the_loop() {
        let runtime = runtime();
        runtime.start();
        runtime.eval("setTimeout(() => { throw new Error('timer failed') }, 1); 1").unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(runtime.eval("40 + 2").unwrap(), json!(42));
    }
}
