//! Cron- and interval-driven job scheduling.
//!
//! Jobs are kept in one table read by a single dispatcher thread. A due job
//! is handed to its [`CallbackInvoker`]; script callbacks post into their
//! event loop, so every fire is a fire-and-forget work item. Fires of one
//! job never overlap: a fire that comes due while the previous one still
//! runs is queued behind it.

mod cron;
mod duration;

pub use self::cron::{parse_cron, CronExpr, CronSchedule};
pub use self::duration::{duration_from_millis, parse_duration};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{RecvTimeoutError, Sender};
use thiserror::Error;

use crate::event_loop::CallbackInvoker;

pub type JobId = u64;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expr}': {message}")]
    InvalidCron { expr: String, message: String },

    #[error("invalid duration '{input}': {message}")]
    InvalidDuration { input: String, message: String },

    #[error("interval must be greater than zero")]
    ZeroInterval,

    #[error("scheduler stopped")]
    Stopped,

    #[error("cannot start scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Metadata for filtering and cancellation; never affects timing.
    pub tags: BTreeMap<String, String>,
    /// Number of fires, -1 for unbounded.
    pub times: i64,
    /// Defer the first fire by one period instead of firing at once.
    pub skip_immediate_first_run: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        JobOptions {
            tags: BTreeMap::new(),
            times: -1,
            skip_immediate_first_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Schedule {
    Every(Duration),
    Cron(CronSchedule),
}

impl Schedule {
    /// Parses a cron line; `@every` lines become interval schedules.
    pub fn cron(expr: &str) -> Result<Schedule, SchedulerError> {
        Ok(match parse_cron(expr)? {
            CronExpr::Fields(s) => Schedule::Cron(s),
            CronExpr::Every(d) => Schedule::Every(d),
        })
    }

    fn next_after(&self, previous: Instant, now: Instant) -> Option<Instant> {
        match self {
            Schedule::Every(d) => {
                let next = previous + *d;
                Some(if next < now { now + *d } else { next })
            }
            Schedule::Cron(s) => {
                let wall = Utc::now();
                let at = s.next_after(wall)?;
                let wait = (at - wall).to_std().unwrap_or(Duration::ZERO);
                Some(now + wait)
            }
        }
    }
}

/// Snapshot of a scheduled job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: JobId,
    pub tags: BTreeMap<String, String>,
    /// Fires left, -1 for unbounded.
    pub remaining: i64,
    pub next_run: Option<Instant>,
    pub running: bool,
}

struct Job {
    schedule: Schedule,
    tags: BTreeMap<String, String>,
    invoker: Arc<dyn CallbackInvoker>,
    next_run: Option<Instant>,
    remaining: i64,
    running: bool,
    /// Fires that came due while the job was running.
    backlog: usize,
}

struct JobTable {
    jobs: BTreeMap<JobId, Job>,
    next_id: JobId,
}

enum Control {
    Wake,
    Stop,
}

struct Shared {
    table: Mutex<JobTable>,
    control: Sender<Control>,
    stopped: AtomicBool,
}

impl Shared {
    fn table(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub struct Scheduler {
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Result<Self, SchedulerError> {
        let (control, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            table: Mutex::new(JobTable {
                jobs: BTreeMap::new(),
                next_id: 1,
            }),
            control,
            stopped: AtomicBool::new(false),
        });
        let worker_shared = shared.clone();
        let dispatcher = thread::Builder::new()
            .name("mokapi-scheduler".to_string())
            .spawn(move || loop {
                let deadline = dispatch_due(&worker_shared);
                let received = match deadline {
                    Some(d) => receiver.recv_deadline(d),
                    None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match received {
                    Ok(Control::Wake) | Err(RecvTimeoutError::Timeout) => {}
                    Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Scheduler {
            shared,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// Fires `invoker` every `interval`.
    pub fn every(
        &self,
        interval: Duration,
        invoker: Arc<dyn CallbackInvoker>,
        options: JobOptions,
    ) -> Result<JobId, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        self.add(Schedule::Every(interval), invoker, options)
    }

    /// Fires `invoker` at the times matching `expr`.
    pub fn cron(
        &self,
        expr: &str,
        invoker: Arc<dyn CallbackInvoker>,
        options: JobOptions,
    ) -> Result<JobId, SchedulerError> {
        let schedule = Schedule::cron(expr)?;
        if let Schedule::Every(d) = &schedule {
            if d.is_zero() {
                return Err(SchedulerError::ZeroInterval);
            }
        }
        self.add(schedule, invoker, options)
    }

    pub fn add(
        &self,
        schedule: Schedule,
        invoker: Arc<dyn CallbackInvoker>,
        options: JobOptions,
    ) -> Result<JobId, SchedulerError> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(SchedulerError::Stopped);
        }
        let now = Instant::now();
        let next_run = if options.skip_immediate_first_run {
            schedule.next_after(now, now)
        } else {
            Some(now)
        };
        let id = {
            let mut table = self.shared.table();
            let id = table.next_id;
            table.next_id += 1;
            log::debug!(
                "scheduling job {} ({}) {:?} times={}",
                id,
                invoker.describe(),
                schedule,
                options.times
            );
            table.jobs.insert(
                id,
                Job {
                    schedule,
                    tags: options.tags,
                    invoker,
                    next_run,
                    remaining: options.times,
                    running: false,
                    backlog: 0,
                },
            );
            id
        };
        let _ = self.shared.control.send(Control::Wake);
        Ok(id)
    }

    /// Stops future fires. A fire already running completes.
    pub fn cancel(&self, id: JobId) -> bool {
        let removed = self.shared.table().jobs.remove(&id).is_some();
        if removed {
            log::debug!("cancelled job {}", id);
            let _ = self.shared.control.send(Control::Wake);
        }
        removed
    }

    /// Cancels every job carrying tag `key=value`. Returns how many.
    pub fn cancel_tagged(&self, key: &str, value: &str) -> usize {
        let mut table = self.shared.table();
        let before = table.jobs.len();
        table
            .jobs
            .retain(|_, job| job.tags.get(key).map(|v| v != value).unwrap_or(true));
        before - table.jobs.len()
    }

    pub fn jobs(&self) -> Vec<JobInfo> {
        self.shared
            .table()
            .jobs
            .iter()
            .map(|(id, job)| JobInfo {
                id: *id,
                tags: job.tags.clone(),
                remaining: job.remaining,
                next_run: job.next_run,
                running: job.running,
            })
            .collect()
    }

    /// Jobs carrying tag `key=value`.
    pub fn jobs_tagged(&self, key: &str, value: &str) -> Vec<JobInfo> {
        self.jobs()
            .into_iter()
            .filter(|j| j.tags.get(key).map(|v| v == value).unwrap_or(false))
            .collect()
    }

    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.table().jobs.clear();
        let _ = self.shared.control.send(Control::Stop);
        let worker = self.dispatcher.lock().ok().and_then(|mut d| d.take());
        if let Some(worker) = worker {
            if worker.join().is_err() {
                log::error!("scheduler dispatcher panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fires every due job and returns the earliest future deadline.
fn dispatch_due(shared: &Arc<Shared>) -> Option<Instant> {
    let now = Instant::now();
    let mut fire = Vec::new();
    let next = {
        let mut table = shared.table();
        let mut finished = Vec::new();
        for (id, job) in table.jobs.iter_mut() {
            let due = matches!(job.next_run, Some(at) if at <= now);
            if !due {
                continue;
            }
            if job.remaining > 0 {
                job.remaining -= 1;
            }
            job.next_run = if job.remaining == 0 {
                None
            } else {
                job.schedule.next_after(job.next_run.unwrap_or(now), now)
            };
            if job.running {
                job.backlog += 1;
                log::trace!("job {} still running, fire queued", id);
            } else {
                job.running = true;
                fire.push((*id, job.invoker.clone()));
            }
            if job.next_run.is_none() && !job.running {
                finished.push(*id);
            }
        }
        for id in finished {
            table.jobs.remove(&id);
        }
        table.jobs.values().filter_map(|j| j.next_run).min()
    };
    for (id, invoker) in fire {
        invoke(shared.clone(), id, invoker);
    }
    next
}

fn invoke(shared: Arc<Shared>, id: JobId, invoker: Arc<dyn CallbackInvoker>) {
    log::trace!("firing job {}", id);
    let again = invoker.clone();
    invoker.invoke(
        vec![],
        Box::new(move |_result| fire_completed(shared, id, again)),
    );
}

fn fire_completed(shared: Arc<Shared>, id: JobId, invoker: Arc<dyn CallbackInvoker>) {
    let run_again = {
        let mut table = shared.table();
        let (run_again, done) = match table.jobs.get_mut(&id) {
            Some(job) if job.backlog > 0 => {
                job.backlog -= 1;
                (true, false)
            }
            Some(job) => {
                job.running = false;
                (false, job.next_run.is_none())
            }
            None => (false, false),
        };
        if done {
            table.jobs.remove(&id);
        }
        run_again
    };
    if run_again {
        invoke(shared, id, invoker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::{InvokeDone, RuntimeError};
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        fired: Arc<AtomicUsize>,
    }

    impl CallbackInvoker for Counter {
        fn invoke(&self, _args: Vec<serde_json::Value>, done: InvokeDone) {
            self.fired.fetch_add(1, Ordering::SeqCst);
            done(Ok(serde_json::Value::Null));
        }
    }

    /// Completes each fire from another thread after `delay`, recording how
    /// many fires were in flight at once.
    struct Slow {
        delay: Duration,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        fired: Arc<AtomicUsize>,
    }

    impl CallbackInvoker for Slow {
        fn invoke(&self, _args: Vec<serde_json::Value>, done: InvokeDone) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let (delay, active, fired) = (self.delay, self.active.clone(), self.fired.clone());
            thread::spawn(move || {
                thread::sleep(delay);
                active.fetch_sub(1, Ordering::SeqCst);
                fired.fetch_add(1, Ordering::SeqCst);
                done(Ok(serde_json::Value::Null));
            });
        }
    }

    struct Failing;

    impl CallbackInvoker for Failing {
        fn invoke(&self, _args: Vec<serde_json::Value>, done: InvokeDone) {
            done(Err(RuntimeError::NotStarted));
        }
    }

    #[test]
    fn test_times_limits_fires_and_removes_job() {
        let scheduler = Scheduler::new().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let options = JobOptions {
            times: 3,
            ..Default::default()
        };
        scheduler
            .every(Duration::from_millis(10), Arc::new(Counter { fired: fired.clone() }), options)
            .unwrap();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert!(scheduler.jobs().is_empty());
    }

    #[test]
    fn test_skip_immediate_first_run_defers() {
        let scheduler = Scheduler::new().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let options = JobOptions {
            skip_immediate_first_run: true,
            ..Default::default()
        };
        scheduler
            .every(Duration::from_secs(60), Arc::new(Counter { fired: fired.clone() }), options)
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_by_tag() {
        let scheduler = Scheduler::new().unwrap();
        let mut tags = BTreeMap::new();
        tags.insert("name".to_string(), "cleanup".to_string());
        let options = JobOptions {
            tags,
            skip_immediate_first_run: true,
            ..Default::default()
        };
        scheduler.every(Duration::from_secs(1), Arc::new(Failing), options).unwrap();
        assert_eq!(scheduler.jobs_tagged("name", "cleanup").len(), 1);
        assert_eq!(scheduler.cancel_tagged("name", "cleanup"), 1);
        assert!(scheduler.jobs().is_empty());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let scheduler = Scheduler::new().unwrap();
        let err = scheduler
            .every(Duration::ZERO, Arc::new(Failing), JobOptions::default())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::ZeroInterval));
    }

    #[test]
    fn test_slow_job_fires_never_overlap() {
        let scheduler = Scheduler::new().unwrap();
        let slow = Slow {
            delay: Duration::from_millis(40),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            fired: Arc::new(AtomicUsize::new(0)),
        };
        let (peak, fired) = (slow.peak.clone(), slow.fired.clone());
        let options = JobOptions {
            times: 4,
            ..Default::default()
        };
        scheduler.every(Duration::from_millis(10), Arc::new(slow), options).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while fired.load(Ordering::SeqCst) < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 4);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
