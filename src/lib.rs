//! # mokapi-engine - script execution core for a mock server
//!
//! Runs user mock scripts: each script gets its own VM on its own event
//! loop, loads modules through a host, registers scheduled jobs and event
//! handlers, generates fake data from schemas and shares state with other
//! scripts of the same process.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use mokapi_engine::config::RuntimeConfig;
//! use mokapi_engine::runtime::ScriptRuntime;
//!
//! let (runtime, host) = ScriptRuntime::with_default_host(RuntimeConfig::default()).unwrap();
//! runtime
//!     .run_source(
//!         "orders.js",
//!         "import { on } from 'mokapi'\n\
//!          export default function () {\n\
//!              on('http', (req, res) => { res.data = { ok: true } })\n\
//!          }",
//!     )
//!     .unwrap();
//! runtime.start();
//! let outcome = host.emit("http", vec![serde_json::json!({}), serde_json::json!({})]).unwrap();
//! assert_eq!(outcome.args[1]["data"]["ok"], true);
//! runtime.wait_idle(Duration::from_secs(1));
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - PEG parser and AST types for the script dialect
//! - **[`runner`]** - the VM: values, evaluator, plugin scope, built-ins
//! - **[`event_loop`]** - the thread a VM lives on and how work reaches it
//! - **[`modules`]** - `require`/`import` resolution, compile cache, TypeScript stripping
//! - **[`scheduler`]** - interval and cron jobs
//! - **[`shared`]** - process-wide shared memory
//! - **[`generator`]** - schema-driven fake data and the faker tree
//! - **[`host`]** - the bridge to files, HTTP, Kafka, mail and events
//! - **[`bindings`]** - the `mokapi*` modules and script globals
//! - **[`runtime`]** - ties a VM, its loop and a host together
//! - **[`config`]** - configuration with environment overrides

#[macro_use]
extern crate lazy_static;

pub mod bindings;
pub mod config;
pub mod event_loop;
pub mod generator;
pub mod host;
pub mod modules;
pub mod parser;
pub mod runner;
pub mod runtime;
pub mod scheduler;
pub mod shared;
