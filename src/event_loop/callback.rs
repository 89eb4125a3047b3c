use std::sync::Arc;

use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

use super::{LoopHandle, RuntimeError};

/// Receives the outcome of one invocation.
pub type InvokeDone = Box<dyn FnOnce(Result<serde_json::Value, RuntimeError>) + Send>;

/// Something that can be invoked from any thread, with the result reported
/// asynchronously. The scheduler fires jobs through this.
pub trait CallbackInvoker: Send + Sync {
    /// Queues one invocation. `done` runs after the call, and any promise it
    /// returned, has settled.
    fn invoke(&self, args: Vec<serde_json::Value>, done: InvokeDone);

    /// Name used in log records.
    fn describe(&self) -> String {
        "callback".to_string()
    }
}

struct Registration {
    id: u64,
    handle: LoopHandle,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let id = self.id;
        self.handle.post(Box::new(move |ctx: &mut EvalContext| ctx.release_callback(id)));
    }
}

/// A script function pinned inside its VM, callable from other threads.
/// The function is released when the last clone is dropped.
#[derive(Clone)]
pub struct ScriptCallback {
    registration: Arc<Registration>,
    name: String,
}

impl ScriptCallback {
    /// Pins `f`. Must be called on the VM's loop thread.
    pub fn new(ctx: &mut EvalContext, handle: LoopHandle, f: JsValue) -> Self {
        let name = match &f {
            JsValue::Object(o) => o.borrow().describe(),
            other => other.to_string(),
        };
        let id = ctx.register_callback(f);
        ScriptCallback {
            registration: Arc::new(Registration { id, handle }),
            name,
        }
    }

    pub fn handle(&self) -> &LoopHandle {
        &self.registration.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.registration.id
    }

    /// Id of the VM that owns the function.
    pub fn vm_id(&self) -> u64 {
        self.registration.handle.vm_id()
    }

    /// Calls the function from code already running inside a VM. On its own
    /// VM the call is direct; otherwise it goes through the owning loop.
    pub fn call_in(
        &self,
        ctx: &mut EvalContext,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RuntimeError> {
        if ctx.vm_id() == self.vm_id() {
            ctx.invoke_callback_json(self.registration.id, args).map_err(RuntimeError::from)
        } else {
            self.call(args)
        }
    }

    /// Like [`call`](Self::call), also returning the arguments after the
    /// function had a chance to modify them.
    pub fn call_mut(
        &self,
        args: Vec<serde_json::Value>,
    ) -> Result<(serde_json::Value, Vec<serde_json::Value>), RuntimeError> {
        let id = self.registration.id;
        self.registration.handle.run_sync(move |ctx: &mut EvalContext| {
            ctx.invoke_callback_mut(id, args).map_err(RuntimeError::from)
        })
    }

    /// Calls the function and blocks until it and any returned promise
    /// settle.
    pub fn call(&self, args: Vec<serde_json::Value>) -> Result<serde_json::Value, RuntimeError> {
        let id = self.registration.id;
        self.registration.handle.run_sync(move |ctx: &mut EvalContext| {
            ctx.invoke_callback_json(id, args).map_err(RuntimeError::from)
        })
    }
}

impl CallbackInvoker for ScriptCallback {
    fn invoke(&self, args: Vec<serde_json::Value>, done: InvokeDone) {
        let id = self.registration.id;
        let name = self.name.clone();
        self.registration.handle.run(move |ctx: &mut EvalContext| {
            let result = ctx.invoke_callback_json(id, args).map_err(RuntimeError::from);
            if let Err(e) = &result {
                ctx.report_warning(&format!("error in {}: {}", name, e));
            }
            done(result);
        });
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
