//! Microtasks, timers and host tasks of one VM.
//!
//! Everything here runs on the thread that owns the [`EvalContext`]. When the
//! context is attached to an event loop, awaiting a pending promise keeps
//! draining the loop's queue (timers, host completions, other work items)
//! until the promise settles. Without a loop only local timers can make
//! progress.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::event_loop::{LoopHandle, LoopMessage, LoopTask};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::json::{js_to_json, json_to_js};
use crate::runner::ds::object::{JsObjectType, ObjectType};
use crate::runner::ds::promise::PromiseState;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_value;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::error::{create_error, error_to_value};
use crate::runner::std_lib::promise::{new_promise, reject_promise, resolve_promise};

static NEXT_VM_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) enum Microtask {
    /// A promise reaction. A missing handler passes the settlement through.
    Reaction {
        handler: Option<JsValue>,
        argument: JsValue,
        derived: Option<JsObjectType>,
        rejected: bool,
    },
}

struct TimerEntry {
    id: u64,
    callback: JsValue,
    args: Vec<JsValue>,
    interval: Option<Duration>,
}

type HostCompletion = Box<dyn FnOnce(&mut EvalContext, serde_json::Value) -> ValueResult>;

pub(crate) struct LoopLink {
    pub(crate) receiver: Receiver<LoopMessage>,
    pub(crate) handle: LoopHandle,
}

pub struct JobQueue {
    vm_id: u64,
    microtasks: VecDeque<Microtask>,
    timers: BTreeMap<(Instant, u64), TimerEntry>,
    timer_keys: HashMap<u64, (Instant, u64)>,
    next_timer_id: u64,
    next_seq: u64,
    callbacks: HashMap<u64, JsValue>,
    next_callback_id: u64,
    host_tasks: HashMap<u64, (JsObjectType, HostCompletion)>,
    next_host_task: u64,
    pending: Arc<AtomicUsize>,
    link: Option<LoopLink>,
    stopped: bool,
    warn: Option<Rc<dyn Fn(&str)>>,
}

impl JobQueue {
    pub fn new() -> Self {
        JobQueue {
            vm_id: NEXT_VM_ID.fetch_add(1, Ordering::Relaxed),
            microtasks: VecDeque::new(),
            timers: BTreeMap::new(),
            timer_keys: HashMap::new(),
            next_timer_id: 1,
            next_seq: 0,
            callbacks: HashMap::new(),
            next_callback_id: 1,
            host_tasks: HashMap::new(),
            next_host_task: 1,
            pending: Arc::new(AtomicUsize::new(0)),
            link: None,
            stopped: false,
            warn: None,
        }
    }

    /// Connects the queue to the loop that owns this VM. Outstanding work is
    /// carried over into the loop's counter.
    pub(crate) fn attach(&mut self, link: LoopLink) {
        let carried = self.pending.load(Ordering::SeqCst);
        let shared = link.handle.pending_counter();
        shared.fetch_add(carried, Ordering::SeqCst);
        self.pending = shared;
        self.link = Some(link);
    }

    pub(crate) fn enqueue(&mut self, task: Microtask) {
        self.microtasks.push_back(task);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.keys().next().map(|(at, _)| *at)
    }

    fn insert_timer(&mut self, at: Instant, entry: TimerEntry) {
        let key = (at, self.next_seq);
        self.next_seq += 1;
        self.timer_keys.insert(entry.id, key);
        self.timers.insert(key, entry);
    }

    fn take_due_timer(&mut self, now: Instant) -> Option<TimerEntry> {
        let key = *self.timers.keys().next()?;
        if key.0 > now {
            return None;
        }
        let entry = self.timers.remove(&key)?;
        self.timer_keys.remove(&entry.id);
        Some(entry)
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn loop_stopped() -> JErrorType {
    JErrorType::TypeError("event loop stopped".to_string())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl EvalContext {
    /// Identifier of this VM, unique within the process.
    pub fn vm_id(&self) -> u64 {
        self.jobs.vm_id
    }

    pub fn loop_handle(&self) -> Option<LoopHandle> {
        self.jobs.link.as_ref().map(|l| l.handle.clone())
    }

    pub fn set_warn_handler(&mut self, warn: Rc<dyn Fn(&str)>) {
        self.jobs.warn = Some(warn);
    }

    /// Reports a problem that has no script caller to return to.
    pub fn report_warning(&self, message: &str) {
        match &self.jobs.warn {
            Some(w) => w(message),
            None => log::warn!("{}", message),
        }
    }

    /// Whether timers, host tasks or awaited promises are outstanding.
    pub fn has_jobs(&self) -> bool {
        self.jobs.pending_count() > 0 || !self.jobs.microtasks.is_empty()
    }

    /// Schedules `callback` after `delay_ms`, repeating when `repeat` is set.
    pub fn set_timer(&mut self, callback: JsValue, delay_ms: f64, args: Vec<JsValue>, repeat: bool) -> u64 {
        let delay = if delay_ms.is_finite() && delay_ms > 0.0 {
            Duration::from_micros((delay_ms * 1000.0) as u64)
        } else {
            Duration::ZERO
        };
        let id = self.jobs.next_timer_id;
        self.jobs.next_timer_id += 1;
        let interval = if repeat {
            Some(delay.max(Duration::from_millis(1)))
        } else {
            None
        };
        self.jobs.insert_timer(
            Instant::now() + delay,
            TimerEntry {
                id,
                callback,
                args,
                interval,
            },
        );
        self.jobs.pending.fetch_add(1, Ordering::SeqCst);
        log::trace!("vm {} timer {} set for {:?}", self.jobs.vm_id, id, delay);
        id
    }

    /// Cancels a timer. Clearing a timer that already fired is a no-op.
    pub fn clear_timer(&mut self, id: u64) -> bool {
        match self.jobs.timer_keys.remove(&id) {
            Some(key) => {
                self.jobs.timers.remove(&key);
                self.jobs.pending.fetch_sub(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.jobs.next_deadline()
    }

    /// Drains the microtask queue.
    pub fn run_microtasks(&mut self) {
        while let Some(task) = self.jobs.microtasks.pop_front() {
            let Microtask::Reaction {
                handler,
                argument,
                derived,
                rejected,
            } = task;
            let outcome = match handler {
                Some(h) => call_value(self, &h, JsValue::Undefined, vec![argument]),
                None if rejected => Err(JErrorType::Thrown(argument)),
                None => Ok(argument),
            };
            if let Some(derived) = derived {
                match outcome {
                    Ok(v) => resolve_promise(self, &derived, v),
                    Err(e) => {
                        let reason = error_to_value(e);
                        reject_promise(self, &derived, reason)
                    }
                }
            }
        }
    }

    /// Fires every timer whose deadline has passed, in deadline order.
    /// Returns how many fired.
    pub fn run_due_timers(&mut self) -> usize {
        let mut fired = 0;
        let now = Instant::now();
        while let Some(entry) = self.jobs.take_due_timer(now) {
            fired += 1;
            match entry.interval {
                Some(interval) => {
                    let again = TimerEntry {
                        id: entry.id,
                        callback: entry.callback.clone(),
                        args: entry.args.clone(),
                        interval: entry.interval,
                    };
                    self.jobs.insert_timer(Instant::now() + interval, again);
                }
                None => {
                    self.jobs.pending.fetch_sub(1, Ordering::SeqCst);
                }
            }
            let id = entry.id;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                call_value(self, &entry.callback, JsValue::Undefined, entry.args)
            }));
            match outcome {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => self.report_warning(&format!("error in timer {}: {}", id, e)),
                Err(p) => {
                    self.reset_after_panic();
                    self.report_warning(&format!("timer {} panicked: {}", id, panic_message(&*p)))
                }
            }
            self.run_microtasks();
        }
        fired
    }

    fn reset_after_panic(&mut self) {
        self.lex_env = self.global_env.clone();
        self.var_env = self.global_env.clone();
        self.this_value = JsValue::Undefined;
        self.call_depth = 0;
        self.is_construct_call = false;
    }

    /// Runs one work item posted to the loop, isolating panics.
    pub(crate) fn run_task(&mut self, task: LoopTask) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(self)));
        if let Err(p) = outcome {
            self.reset_after_panic();
            self.report_warning(&format!("work item panicked: {}", panic_message(&*p)));
        }
        self.run_microtasks();
    }

    pub(crate) fn handle_loop_message(&mut self, message: LoopMessage) {
        match message {
            LoopMessage::Task(task) => {
                let stopped = self.jobs.link.as_ref().map(|l| l.handle.is_stopped()).unwrap_or(false);
                if stopped {
                    self.jobs.stopped = true;
                } else {
                    self.run_task(task);
                }
            }
            LoopMessage::Start => {
                if let Some(link) = &self.jobs.link {
                    link.handle.mark_running();
                }
            }
            LoopMessage::Wake => {}
            LoopMessage::Stop => self.jobs.stopped = true,
        }
    }

    /// Makes one unit of progress: a microtask batch, due timers, or one
    /// message from the owning loop. Blocks until something can happen.
    pub fn pump_once(&mut self) -> Result<(), JErrorType> {
        if self.jobs.stopped {
            return Err(loop_stopped());
        }
        if !self.jobs.microtasks.is_empty() {
            self.run_microtasks();
            return Ok(());
        }
        if self.run_due_timers() > 0 {
            return Ok(());
        }
        let deadline = self.jobs.next_deadline();
        let message = match &self.jobs.link {
            Some(link) => {
                let received = match deadline {
                    Some(d) => link.receiver.recv_deadline(d),
                    None => link
                        .receiver
                        .recv()
                        .map_err(|_| RecvTimeoutError::Disconnected),
                };
                match received {
                    Ok(m) => Some(m),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return Err(loop_stopped()),
                }
            }
            None => match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if d > now {
                        thread::sleep(d - now);
                    }
                    None
                }
                None => {
                    return Err(JErrorType::TypeError(
                        "awaited promise can never settle: no pending jobs".to_string(),
                    ))
                }
            },
        };
        if let Some(m) = message {
            self.handle_loop_message(m);
        }
        Ok(())
    }

    /// Suspends the current computation until `value` settles when it is a
    /// promise. Other values are returned as they are.
    pub fn await_value(&mut self, value: JsValue) -> ValueResult {
        let promise = match &value {
            JsValue::Object(o) if matches!(&*o.borrow(), ObjectType::Promise(_)) => o.clone(),
            _ => return Ok(value),
        };
        self.jobs.pending.fetch_add(1, Ordering::SeqCst);
        let result = loop {
            let state = match &mut *promise.borrow_mut() {
                ObjectType::Promise(p) => {
                    p.handled = true;
                    match &p.state {
                        PromiseState::Fulfilled(v) => Some(Ok(v.clone())),
                        PromiseState::Rejected(e) => Some(Err(JErrorType::Thrown(e.clone()))),
                        PromiseState::Pending => None,
                    }
                }
                _ => Some(Ok(JsValue::Undefined)),
            };
            match state {
                Some(r) => break r,
                None => {
                    if let Err(e) = self.pump_once() {
                        break Err(e);
                    }
                }
            }
        };
        self.jobs.pending.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Keeps a function alive so other threads can invoke it by id.
    pub fn register_callback(&mut self, callback: JsValue) -> u64 {
        let id = self.jobs.next_callback_id;
        self.jobs.next_callback_id += 1;
        self.jobs.callbacks.insert(id, callback);
        id
    }

    pub fn release_callback(&mut self, id: u64) {
        self.jobs.callbacks.remove(&id);
    }

    pub fn invoke_callback(&mut self, id: u64, args: Vec<JsValue>) -> ValueResult {
        let callback = self
            .jobs
            .callbacks
            .get(&id)
            .cloned()
            .ok_or_else(|| JErrorType::ReferenceError(format!("callback {} was released", id)))?;
        let result = call_value(self, &callback, JsValue::Undefined, args);
        self.run_microtasks();
        result
    }

    /// Same as [`invoke_callback`](Self::invoke_callback) with JSON values on
    /// both sides; a returned promise is awaited.
    pub fn invoke_callback_json(
        &mut self,
        id: u64,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, JErrorType> {
        let args = args.iter().map(json_to_js).collect();
        let value = self.invoke_callback(id, args)?;
        let value = self.await_value(value)?;
        js_to_json(&value)
    }

    /// Invokes a callback and returns its result together with the
    /// arguments as they look after the call, so handlers can mutate event
    /// objects in place.
    pub fn invoke_callback_mut(
        &mut self,
        id: u64,
        args: Vec<serde_json::Value>,
    ) -> Result<(serde_json::Value, Vec<serde_json::Value>), JErrorType> {
        let args: Vec<JsValue> = args.iter().map(json_to_js).collect();
        let value = self.invoke_callback(id, args.clone())?;
        let value = self.await_value(value)?;
        let after = args.iter().map(js_to_json).collect::<Result<Vec<_>, _>>()?;
        Ok((js_to_json(&value)?, after))
    }

    /// Runs `work` off the VM thread and settles the returned promise with
    /// `complete` once the result is posted back through the loop. Without a
    /// loop the work runs inline.
    pub fn spawn_host_task<W, C>(&mut self, work: W, complete: C) -> JsValue
    where
        W: FnOnce() -> Result<serde_json::Value, String> + Send + 'static,
        C: FnOnce(&mut EvalContext, serde_json::Value) -> ValueResult + 'static,
    {
        let promise = new_promise();
        let handle = self.loop_handle();
        match handle {
            Some(handle) => {
                let id = self.jobs.next_host_task;
                self.jobs.next_host_task += 1;
                self.jobs
                    .host_tasks
                    .insert(id, (promise.clone(), Box::new(complete)));
                self.jobs.pending.fetch_add(1, Ordering::SeqCst);
                let spawned = thread::Builder::new()
                    .name(format!("mokapi-host-task-{}", id))
                    .spawn(move || {
                        let result = work();
                        handle.post(Box::new(move |ctx: &mut EvalContext| {
                            ctx.complete_host_task(id, result)
                        }));
                    });
                if let Err(e) = spawned {
                    self.jobs.host_tasks.remove(&id);
                    self.jobs.pending.fetch_sub(1, Ordering::SeqCst);
                    let reason = create_error("Error", &format!("cannot start host task: {}", e));
                    reject_promise(self, &promise, reason);
                }
            }
            None => {
                let result = work();
                self.settle_host_result(&promise, Box::new(complete), result);
            }
        }
        JsValue::Object(promise)
    }

    fn complete_host_task(&mut self, id: u64, result: Result<serde_json::Value, String>) {
        if let Some((promise, complete)) = self.jobs.host_tasks.remove(&id) {
            self.jobs.pending.fetch_sub(1, Ordering::SeqCst);
            self.settle_host_result(&promise, complete, result);
        }
    }

    fn settle_host_result(
        &mut self,
        promise: &JsObjectType,
        complete: HostCompletion,
        result: Result<serde_json::Value, String>,
    ) {
        match result {
            Ok(json) => match complete(self, json) {
                Ok(v) => resolve_promise(self, promise, v),
                Err(e) => {
                    let reason = error_to_value(e);
                    reject_promise(self, promise, reason)
                }
            },
            Err(message) => {
                let reason = create_error("Error", &message);
                reject_promise(self, promise, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::eval::function::closure_value;
    use std::cell::RefCell;

    fn counting_fn(counter: Rc<RefCell<u32>>) -> JsValue {
        closure_value("counter", move |_ctx: &mut EvalContext, _this: JsValue, _args: Vec<JsValue>| {
            *counter.borrow_mut() += 1;
            Ok(JsValue::Undefined)
        })
    }

    #[test]
    fn test_cleared_timer_does_not_fire() {
        let mut ctx = EvalContext::new();
        let counter = Rc::new(RefCell::new(0));
        let id = ctx.set_timer(counting_fn(counter.clone()), 0.0, vec![], false);
        assert!(ctx.has_jobs());
        assert!(ctx.clear_timer(id));
        assert!(!ctx.clear_timer(id));
        assert_eq!(ctx.run_due_timers(), 0);
        assert_eq!(*counter.borrow(), 0);
        assert!(!ctx.has_jobs());
    }

    #[test]
    fn test_equal_deadlines_fire_in_insertion_order() {
        let mut ctx = EvalContext::new();
        let order = Rc::new(RefCell::new(vec![]));
        for n in 0..3 {
            let order = order.clone();
            let value = closure_value("t", move |_c: &mut EvalContext, _t: JsValue, _a: Vec<JsValue>| {
                order.borrow_mut().push(n);
                Ok(JsValue::Undefined)
            });
            ctx.set_timer(value, 0.0, vec![], false);
        }
        ctx.run_due_timers();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_await_without_loop_fails_once_timers_are_gone() {
        let mut ctx = EvalContext::new();
        let counter = Rc::new(RefCell::new(0));
        ctx.set_timer(counting_fn(counter.clone()), 5.0, vec![], false);
        let promise = new_promise();
        let result = ctx.await_value(JsValue::Object(promise));
        assert!(result.is_err());
        assert_eq!(*counter.borrow(), 1);
    }
}
