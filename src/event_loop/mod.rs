//! The event loop: the only place a VM runs.
//!
//! A VM ([`EvalContext`]) is created on, and never leaves, the loop's worker
//! thread. Every other thread talks to it by posting work items through a
//! [`LoopHandle`]:
//!
//! ```text
//! scheduler ──┐
//! host tasks ─┼──> channel ──> worker thread ──> EvalContext
//! callers ────┘                    │
//!                                  └─ timers, microtasks, awaited promises
//! ```
//!
//! Before [`EventLoop::start`] items are executed synchronously for the
//! submitting caller and timers do not fire. Once started, [`LoopHandle::run`]
//! is fire-and-forget and the worker also drives timers.

mod callback;
mod error;

pub use callback::{CallbackInvoker, InvokeDone, ScriptCallback};
pub use error::RuntimeError;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::config::LoopConfig;
use crate::runner::ds::json::js_to_json;
use crate::runner::eval::jobs::LoopLink;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;

/// A unit of work executed on the VM.
pub type LoopTask = Box<dyn FnOnce(&mut EvalContext) + Send>;

pub(crate) enum LoopMessage {
    Task(LoopTask),
    Start,
    /// Forces the worker to re-evaluate its timer deadline.
    Wake,
    Stop,
}

struct LoopState {
    running: AtomicBool,
    stopped: AtomicBool,
    /// Set once the worker thread has left its loop.
    finished: AtomicBool,
    /// Outstanding timers, awaited promises and host tasks of the VM.
    pending: Arc<AtomicUsize>,
    /// Work items posted but not yet finished.
    queued: AtomicUsize,
    vm_id: AtomicU64,
    thread: Mutex<Option<ThreadId>>,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl LoopState {
    fn notify(&self) {
        let _guard = self.idle_lock.lock();
        self.idle.notify_all();
    }
}

/// Counts a posted item until it has run or was dropped unrun.
struct QueuedItem(Arc<LoopState>);

impl Drop for QueuedItem {
    fn drop(&mut self) {
        self.0.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

const REPLY_POLL: Duration = Duration::from_millis(50);

/// Cloneable, thread-safe access to one event loop.
#[derive(Clone)]
pub struct LoopHandle {
    sender: Sender<LoopMessage>,
    state: Arc<LoopState>,
}

impl LoopHandle {
    pub(crate) fn pending_counter(&self) -> Arc<AtomicUsize> {
        self.state.pending.clone()
    }

    pub(crate) fn mark_running(&self) {
        self.state.running.store(true, Ordering::SeqCst);
        self.state.notify();
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst) && !self.is_stopped()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }

    /// Whether timers, awaited promises or host calls are outstanding.
    pub fn has_jobs(&self) -> bool {
        self.state.pending.load(Ordering::SeqCst) > 0
    }

    pub fn is_loop_thread(&self) -> bool {
        match self.state.thread.lock() {
            Ok(t) => *t == Some(thread::current().id()),
            Err(_) => false,
        }
    }

    /// Identifier of the VM owned by this loop.
    pub fn vm_id(&self) -> u64 {
        self.state.vm_id.load(Ordering::SeqCst)
    }

    /// Queues a task without any pre-start handling. Returns false when the
    /// loop no longer accepts work.
    pub(crate) fn post(&self, task: LoopTask) -> bool {
        if self.is_stopped() {
            log::debug!("event loop {} stopped, dropping work item", self.vm_id());
            return false;
        }
        self.state.queued.fetch_add(1, Ordering::SeqCst);
        let item = QueuedItem(self.state.clone());
        let task: LoopTask = Box::new(move |ctx: &mut EvalContext| {
            let _item = item;
            task(ctx);
        });
        let sent = if self.is_loop_thread() {
            match self.sender.try_send(LoopMessage::Task(task)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    log::warn!("event loop {} queue is full, dropping work item", self.vm_id());
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        } else {
            self.sender.send(LoopMessage::Task(task)).is_ok()
        };
        sent
    }

    /// Waits for the reply of a posted item. Gives up once the worker has
    /// exited without running it.
    fn wait_reply<T>(&self, reply: &Receiver<T>) -> Option<T> {
        loop {
            match reply.recv_timeout(REPLY_POLL) {
                Ok(v) => return Some(v),
                Err(RecvTimeoutError::Disconnected) => return None,
                Err(RecvTimeoutError::Timeout) => {
                    if self.state.finished.load(Ordering::SeqCst) {
                        return reply.try_recv().ok();
                    }
                }
            }
        }
    }

    /// Submits a fire-and-forget work item. Before the loop is started the
    /// item runs to completion before this returns.
    pub fn run<F>(&self, f: F)
    where
        F: FnOnce(&mut EvalContext) + Send + 'static,
    {
        if self.is_running() || self.is_loop_thread() {
            self.post(Box::new(f));
            return;
        }
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let posted = self.post(Box::new(move |ctx: &mut EvalContext| {
            f(ctx);
            let _ = done_tx.send(());
        }));
        if posted {
            let _ = self.wait_reply(&done_rx);
        }
    }

    /// Submits a work item and blocks until it completes.
    pub fn run_sync<F, R>(&self, f: F) -> Result<R, RuntimeError>
    where
        F: FnOnce(&mut EvalContext) -> Result<R, RuntimeError> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_loop_thread() {
            return Err(RuntimeError::Reentrant);
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let posted = self.post(Box::new(move |ctx: &mut EvalContext| {
            let _ = reply_tx.send(f(ctx));
        }));
        if !posted {
            return Err(RuntimeError::NotStarted);
        }
        self.wait_reply(&reply_rx).ok_or(RuntimeError::NotStarted)?
    }

    /// Runs a script-producing item and returns its value as JSON. A returned
    /// promise is awaited; the worker keeps draining timers and other items
    /// while it is pending.
    pub fn run_sync_value<F>(&self, f: F) -> Result<serde_json::Value, RuntimeError>
    where
        F: FnOnce(&mut EvalContext) -> ValueResult + Send + 'static,
    {
        self.run_sync(move |ctx: &mut EvalContext| {
            let value = f(ctx)?;
            let settled = ctx.await_value(value)?;
            js_to_json(&settled).map_err(|e| RuntimeError::Conversion(e.to_string()))
        })
    }

    /// Nudges the worker so that it re-reads its timer deadlines.
    pub fn wake(&self) {
        let _ = self.sender.try_send(LoopMessage::Wake);
    }

    /// Requests termination. The item in flight finishes, queued items and
    /// outstanding timers are abandoned.
    pub fn stop(&self) {
        if self.state.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("stopping event loop {}", self.vm_id());
        let _ = self.sender.send(LoopMessage::Stop);
        self.state.notify();
    }

    /// Blocks until no work items, timers or awaited promises remain, the
    /// loop stops, or `timeout` passes. Returns true when the loop went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = match self.state.idle_lock.lock() {
            Ok(g) => g,
            Err(_) => return false,
        };
        loop {
            let busy =
                self.has_jobs() || self.state.queued.load(Ordering::SeqCst) > 0;
            if !busy {
                return true;
            }
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = match self.state.idle.wait_timeout(guard, deadline - now) {
                Ok((g, _)) => g,
                Err(_) => return false,
            };
        }
    }
}

/// Owns the worker thread of one VM.
pub struct EventLoop {
    handle: LoopHandle,
    worker: Option<JoinHandle<()>>,
}

impl EventLoop {
    /// Spawns the worker and builds the VM on it with `init`.
    pub fn spawn<I>(config: &LoopConfig, init: I) -> Result<Self, RuntimeError>
    where
        I: FnOnce(&LoopHandle) -> EvalContext + Send + 'static,
    {
        let (sender, receiver) = match config.queue_capacity {
            Some(cap) => crossbeam_channel::bounded(cap),
            None => crossbeam_channel::unbounded(),
        };
        let state = Arc::new(LoopState {
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            pending: Arc::new(AtomicUsize::new(0)),
            queued: AtomicUsize::new(0),
            vm_id: AtomicU64::new(0),
            thread: Mutex::new(None),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
        });
        let handle = LoopHandle { sender, state };
        let worker_handle = handle.clone();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                if let Ok(mut t) = worker_handle.state.thread.lock() {
                    *t = Some(thread::current().id());
                }
                let mut ctx = init(&worker_handle);
                worker_handle.state.vm_id.store(ctx.vm_id(), Ordering::SeqCst);
                ctx.jobs.attach(LoopLink {
                    receiver: receiver.clone(),
                    handle: worker_handle.clone(),
                });
                let _ = ready_tx.send(());
                run_worker(&mut ctx, &receiver, &worker_handle);
            })?;
        // The VM id is only known once `init` ran.
        let _ = ready_rx.recv();
        log::debug!("event loop {} spawned", handle.vm_id());
        Ok(EventLoop {
            handle,
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Switches to the running state: items are queued and timers fire.
    pub fn start(&self) {
        if self.handle.is_running() {
            return;
        }
        let _ = self.handle.sender.send(LoopMessage::Start);
        // Items submitted right after start must already be queued.
        self.handle.state.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn has_jobs(&self) -> bool {
        self.handle.has_jobs()
    }

    pub fn run<F>(&self, f: F)
    where
        F: FnOnce(&mut EvalContext) + Send + 'static,
    {
        self.handle.run(f)
    }

    pub fn run_sync<F, R>(&self, f: F) -> Result<R, RuntimeError>
    where
        F: FnOnce(&mut EvalContext) -> Result<R, RuntimeError> + Send + 'static,
        R: Send + 'static,
    {
        self.handle.run_sync(f)
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.handle.wait_idle(timeout)
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.handle.stop();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("event loop {} worker panicked", self.handle.vm_id());
            }
        }
    }
}

fn run_worker(ctx: &mut EvalContext, receiver: &Receiver<LoopMessage>, handle: &LoopHandle) {
    log::trace!("event loop {} worker started", handle.vm_id());
    loop {
        if ctx.jobs.is_stopped() || handle.is_stopped() {
            break;
        }
        let running = handle.state.running.load(Ordering::SeqCst);
        if running && ctx.run_due_timers() > 0 {
            handle.state.notify();
        }
        let deadline = if running {
            ctx.next_timer_deadline()
        } else {
            None
        };
        let received = match deadline {
            Some(d) => receiver.recv_deadline(d),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(message) => ctx.handle_loop_message(message),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        handle.state.notify();
    }
    handle.state.stopped.store(true, Ordering::SeqCst);
    handle.state.finished.store(true, Ordering::SeqCst);
    // Queued items are dropped unrun; their callers see `NotStarted`.
    while receiver.try_recv().is_ok() {}
    // Abandoned timers no longer count as outstanding work.
    handle.state.pending.store(0, Ordering::SeqCst);
    handle.state.notify();
    log::trace!("event loop {} worker finished", handle.vm_id());
}
