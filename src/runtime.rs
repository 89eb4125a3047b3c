//! A script runtime: one VM on its own event loop, wired to a host.
//!
//! ```no_run
//! use std::time::Duration;
//! use mokapi_engine::config::RuntimeConfig;
//! use mokapi_engine::runtime::ScriptRuntime;
//!
//! let (runtime, _host) = ScriptRuntime::with_default_host(RuntimeConfig::from_env()).unwrap();
//! runtime.run_main("scripts/orders.js".as_ref()).unwrap();
//! runtime.start();
//! runtime.wait_idle(Duration::from_secs(60));
//! ```

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::bindings;
use crate::config::RuntimeConfig;
use crate::event_loop::{EventLoop, LoopHandle, RuntimeError};
use crate::host::{DefaultHost, Host, HostLoader};
use crate::modules::compile::compile;
use crate::modules::{normalize, ModuleError, ModuleRegistry};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::json::js_to_json;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_value;
use crate::runner::eval::property::get_property;
use crate::runner::eval::run_program;
use crate::runner::plugin::types::EvalContext;

pub struct ScriptRuntime {
    event_loop: EventLoop,
    host: Arc<dyn Host>,
    working_dir: PathBuf,
}

impl ScriptRuntime {
    /// Spawns the loop and builds the VM on it: core built-ins, the module
    /// registry reading through `host`, and the script API.
    pub fn new(config: &RuntimeConfig, host: Arc<dyn Host>) -> Result<Self, RuntimeError> {
        let vm_host = host.clone();
        let max_call_depth = config.max_call_depth;
        let base_dir = config.working_dir.clone();
        let event_loop = EventLoop::spawn(&config.event_loop, move |_handle: &LoopHandle| {
            let mut ctx = EvalContext::with_core_builtins();
            ctx.max_call_depth = max_call_depth;
            let loader = Rc::new(HostLoader::new(vm_host.clone()));
            let registry = ModuleRegistry::install(&mut ctx, loader);
            bindings::install(&mut ctx, vm_host, &registry, base_dir);
            ctx
        })?;
        log::info!("runtime for {} ready", host.name());
        Ok(ScriptRuntime {
            event_loop,
            host,
            working_dir: config.working_dir.clone(),
        })
    }

    /// Runtime over a fresh [`DefaultHost`], which is returned as well so
    /// callers can emit events and inspect jobs.
    pub fn with_default_host(config: RuntimeConfig) -> Result<(Self, Arc<DefaultHost>), RuntimeError> {
        let host = Arc::new(DefaultHost::new(&config)?);
        let runtime = ScriptRuntime::new(&config, host.clone())?;
        Ok((runtime, host))
    }

    pub fn handle(&self) -> LoopHandle {
        self.event_loop.handle()
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Loads the script at `path` and calls its default export when that
    /// is a function. Returns what the default export returned, awaited, or
    /// the exports as JSON.
    pub fn run_main(&self, path: &Path) -> Result<Value, RuntimeError> {
        let path = normalize(&self.working_dir.join(path));
        log::info!("running {}", path.display());
        self.event_loop.run_sync(move |ctx: &mut EvalContext| {
            let registry = ModuleRegistry::of(ctx)?;
            let exports = registry.run_main(ctx, &path)?;
            run_default(ctx, exports)
        })
    }

    /// Like [`run_main`](Self::run_main) for source text; relative requires
    /// resolve against the working directory.
    pub fn run_source(&self, name: &str, source: &str) -> Result<Value, RuntimeError> {
        let name = name.to_string();
        let source = source.to_string();
        let dir = self.working_dir.clone();
        self.event_loop.run_sync(move |ctx: &mut EvalContext| {
            let registry = ModuleRegistry::of(ctx)?;
            let exports = registry.run_source(ctx, &name, &dir, &source)?;
            run_default(ctx, exports)
        })
    }

    /// Runs `source` as a plain program in the VM's global scope and
    /// returns the value of its last expression statement, awaited.
    pub fn eval(&self, source: &str) -> Result<Value, RuntimeError> {
        let source = source.to_string();
        self.handle().run_sync_value(move |ctx: &mut EvalContext| {
            let program = compile("<eval>", &source).map_err(|e| JErrorType::from(ModuleError::from(e)))?;
            run_program(&program, ctx)
        })
    }

    /// From here on work items queue up and timers fire.
    pub fn start(&self) {
        self.event_loop.start();
    }

    pub fn stop(&self) {
        self.event_loop.stop();
    }

    pub fn has_jobs(&self) -> bool {
        self.event_loop.has_jobs()
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.event_loop.wait_idle(timeout)
    }
}

fn run_default(ctx: &mut EvalContext, exports: JsValue) -> Result<Value, RuntimeError> {
    let default = get_property(ctx, &exports, "default")?;
    let result = if default.is_callable() {
        let value = call_value(ctx, &default, JsValue::Undefined, vec![])?;
        ctx.await_value(value)?
    } else {
        exports
    };
    js_to_json(&result).map_err(|e| RuntimeError::Conversion(e.to_string()))
}
