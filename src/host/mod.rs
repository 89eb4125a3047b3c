//! The host bridge: capabilities the core uses but does not implement.
//!
//! A script runtime sees its surroundings only through [`Host`]: files,
//! HTTP, Kafka, mail, job registration, event handlers, the advisory lock,
//! the cleanup stack and the generator. [`DefaultHost`] implements all of it
//! for a standalone process.

mod http;
mod kafka;
mod sync;

pub use self::http::{HttpClient, HttpRequest, HttpResponse, ReqwestClient};
pub use self::kafka::{
    InMemoryKafka, KafkaClient, KafkaMessage, Mail, MailSender, ProduceArgs, ProduceResult, ProducedMessage,
};
pub use self::sync::{AdvisoryGuard, AdvisoryLock, Cleanup, CleanupStack};

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::config::RuntimeConfig;
use crate::event_loop::{CallbackInvoker, RuntimeError, ScriptCallback};
use crate::generator::{Generator, NodeRef};
use crate::modules::SourceLoader;
use crate::scheduler::{JobId, JobOptions, Scheduler, SchedulerError};
use crate::shared::SharedStore;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{0}")]
    Kafka(String),

    #[error("{0}")]
    Mail(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("{0} is not supported by this host")]
    Unsupported(&'static str),
}

/// How a script wants a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAs {
    String,
    Binary,
    /// Parsed as JSON or YAML with `$ref`s inlined.
    Resolved,
}

impl OpenAs {
    pub fn parse(s: &str) -> Option<OpenAs> {
        match s {
            "string" => Some(OpenAs::String),
            "binary" => Some(OpenAs::Binary),
            "resolved" => Some(OpenAs::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub path: PathBuf,
    pub data: Vec<u8>,
}

impl SourceRecord {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Dir,
}

#[derive(Debug, Clone, Default)]
pub struct EventOptions {
    pub tags: BTreeMap<String, String>,
}

/// Result of running every handler of an event.
#[derive(Debug, Clone, Default)]
pub struct EmitOutcome {
    /// The arguments after every handler had its turn.
    pub args: Vec<Value>,
    /// Handlers that returned a truthy value.
    pub handled: usize,
}

pub trait Host: Send + Sync {
    fn name(&self) -> &str;

    /// Directory relative paths of the script resolve against.
    fn cwd(&self) -> &Path;

    fn warn(&self, message: &str) {
        log::warn!(target: "script", "{}: {}", self.name(), message);
    }

    fn open_file(&self, path: &Path, hint: OpenAs) -> Result<SourceRecord, HostError> {
        log::trace!("open {} as {:?}", path.display(), hint);
        let data = std::fs::read(path).map_err(|source| HostError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(SourceRecord {
            path: path.to_path_buf(),
            data,
        })
    }

    fn path_kind(&self, path: &Path) -> Option<PathKind> {
        let meta = std::fs::metadata(path).ok()?;
        if meta.is_dir() {
            Some(PathKind::Dir)
        } else {
            Some(PathKind::File)
        }
    }

    /// Source behind an absolute URL, for `require`.
    fn fetch_source(&self, url: &str) -> Result<String, HostError> {
        let response = self.http_client().send(HttpRequest::new("GET", url))?;
        if response.status >= 400 {
            return Err(HostError::Http {
                url: url.to_string(),
                message: format!("status {}", response.status),
            });
        }
        Ok(response.text())
    }

    fn http_client(&self) -> Arc<dyn HttpClient>;

    fn kafka_client(&self) -> Result<Arc<dyn KafkaClient>, HostError>;

    fn send_mail(&self, mail: Mail) -> Result<(), HostError>;

    fn every(
        &self,
        interval: Duration,
        invoker: Arc<dyn CallbackInvoker>,
        options: JobOptions,
    ) -> Result<JobId, HostError>;

    fn cron(&self, expr: &str, invoker: Arc<dyn CallbackInvoker>, options: JobOptions) -> Result<JobId, HostError>;

    fn cancel_job(&self, id: JobId) -> bool;

    fn on(&self, event: &str, handler: ScriptCallback, options: EventOptions) -> Result<(), HostError>;

    fn lock(&self);

    fn unlock(&self);

    /// Registers `f` to run when the current script context is cleaned up.
    fn add_cleanup(&self, f: Cleanup);

    fn generator(&self) -> Arc<Generator>;

    fn find_faker_node(&self, name: &str) -> Option<NodeRef> {
        self.generator().find_node(name)
    }

    fn env(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn shared(&self) -> SharedStore {
        SharedStore::global()
    }
}

/// Module sources read through a [`Host`].
pub struct HostLoader {
    host: Arc<dyn Host>,
}

impl HostLoader {
    pub fn new(host: Arc<dyn Host>) -> Self {
        HostLoader { host }
    }
}

impl SourceLoader for HostLoader {
    fn read(&self, path: &Path) -> io::Result<String> {
        match self.host.open_file(path, OpenAs::String) {
            Ok(record) => String::from_utf8(record.data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(HostError::Io { source, .. }) => Err(source),
            Err(other) => Err(io::Error::new(io::ErrorKind::Other, other.to_string())),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        self.host.path_kind(path) == Some(PathKind::File)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.host.path_kind(path) == Some(PathKind::Dir)
    }

    fn fetch(&self, url: &str) -> Result<String, String> {
        self.host.fetch_source(url).map_err(|e| e.to_string())
    }
}

struct EventHandler {
    event: String,
    callback: ScriptCallback,
    tags: BTreeMap<String, String>,
}

/// Host for a standalone process: scheduler thread, `reqwest` HTTP client,
/// optional Kafka and mail backends, the process-wide shared store.
pub struct DefaultHost {
    name: String,
    cwd: PathBuf,
    generator: Arc<Generator>,
    scheduler: Scheduler,
    http: Arc<dyn HttpClient>,
    kafka: Option<Arc<dyn KafkaClient>>,
    mail: Option<Arc<dyn MailSender>>,
    handlers: Mutex<Vec<EventHandler>>,
    lock: AdvisoryLock,
    cleanup: CleanupStack,
    shared: SharedStore,
}

impl DefaultHost {
    pub fn new(config: &RuntimeConfig) -> Result<Self, HostError> {
        Ok(DefaultHost {
            name: config.script_name.clone(),
            cwd: config.working_dir.clone(),
            generator: Arc::new(Generator::new(config.generator.clone())),
            scheduler: Scheduler::new()?,
            http: Arc::new(ReqwestClient::default()),
            kafka: None,
            mail: None,
            handlers: Mutex::new(vec![]),
            lock: AdvisoryLock::new(),
            cleanup: CleanupStack::default(),
            shared: SharedStore::global(),
        })
    }

    pub fn with_generator(mut self, generator: Arc<Generator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http = client;
        self
    }

    pub fn with_kafka_client(mut self, client: Arc<dyn KafkaClient>) -> Self {
        self.kafka = Some(client);
        self
    }

    pub fn with_mail_sender(mut self, sender: Arc<dyn MailSender>) -> Self {
        self.mail = Some(sender);
        self
    }

    pub fn with_shared(mut self, shared: SharedStore) -> Self {
        self.shared = shared;
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of handlers registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|h| h.event == event)
            .count()
    }

    /// Tags of the handlers registered for `event`, in registration order.
    pub fn handler_tags(&self, event: &str) -> Vec<BTreeMap<String, String>> {
        self.handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|h| h.event == event)
            .map(|h| h.tags.clone())
            .collect()
    }

    /// Runs the handlers of `event` in registration order under the
    /// advisory lock. Each handler sees the arguments as the previous one
    /// left them.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> Result<EmitOutcome, RuntimeError> {
        let callbacks: Vec<ScriptCallback> = self
            .handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|h| h.event == event)
            .map(|h| h.callback.clone())
            .collect();
        let _guard = self.lock.guard();
        let mut outcome = EmitOutcome {
            args,
            handled: 0,
        };
        for callback in callbacks {
            let (result, args) = callback.call_mut(outcome.args)?;
            outcome.args = args;
            if is_truthy(&result) {
                outcome.handled += 1;
            }
        }
        Ok(outcome)
    }

    /// Runs the cleanup stack and drops every event handler and job.
    pub fn close(&self) {
        self.cleanup.run();
        self.handlers.lock().unwrap_or_else(|p| p.into_inner()).clear();
        for job in self.scheduler.jobs() {
            self.scheduler.cancel(job.id);
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

impl Host for DefaultHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn http_client(&self) -> Arc<dyn HttpClient> {
        self.http.clone()
    }

    fn kafka_client(&self) -> Result<Arc<dyn KafkaClient>, HostError> {
        self.kafka.clone().ok_or(HostError::Unsupported("kafka"))
    }

    fn send_mail(&self, mail: Mail) -> Result<(), HostError> {
        match &self.mail {
            Some(sender) => sender.send(mail),
            None => Err(HostError::Unsupported("smtp")),
        }
    }

    fn every(
        &self,
        interval: Duration,
        invoker: Arc<dyn CallbackInvoker>,
        options: JobOptions,
    ) -> Result<JobId, HostError> {
        Ok(self.scheduler.every(interval, invoker, options)?)
    }

    fn cron(&self, expr: &str, invoker: Arc<dyn CallbackInvoker>, options: JobOptions) -> Result<JobId, HostError> {
        Ok(self.scheduler.cron(expr, invoker, options)?)
    }

    fn cancel_job(&self, id: JobId) -> bool {
        self.scheduler.cancel(id)
    }

    fn on(&self, event: &str, handler: ScriptCallback, options: EventOptions) -> Result<(), HostError> {
        log::debug!("{}: handler {} registered for '{}'", self.name, handler.name(), event);
        self.handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(EventHandler {
                event: event.to_string(),
                callback: handler,
                tags: options.tags,
            });
        Ok(())
    }

    fn lock(&self) {
        self.lock.lock()
    }

    fn unlock(&self) {
        self.lock.unlock()
    }

    fn add_cleanup(&self, f: Cleanup) {
        self.cleanup.push(f)
    }

    fn generator(&self) -> Arc<Generator> {
        self.generator.clone()
    }

    fn shared(&self) -> SharedStore {
        self.shared.clone()
    }
}

impl Drop for DefaultHost {
    fn drop(&mut self) {
        self.cleanup.run();
        self.scheduler.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn host() -> DefaultHost {
        DefaultHost::new(&RuntimeConfig::default().with_script_name("test.js")).unwrap()
    }

    #[test]
    fn open_file_and_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::File::create(&path).unwrap().write_all(b"var a = 1;").unwrap();
        let host: Arc<dyn Host> = Arc::new(host());
        assert_eq!(host.open_file(&path, OpenAs::String).unwrap().text(), "var a = 1;");
        let loader = HostLoader::new(host.clone());
        assert!(loader.is_file(&path));
        assert!(loader.is_dir(dir.path()));
        assert!(!loader.is_file(&dir.path().join("missing.js")));
        assert_eq!(loader.read(&path).unwrap(), "var a = 1;");
        assert!(matches!(
            host.open_file(&dir.path().join("missing.js"), OpenAs::Binary),
            Err(HostError::Io { .. })
        ));
    }

    #[test]
    fn missing_backends_are_reported() {
        let host = host();
        assert!(matches!(host.kafka_client(), Err(HostError::Unsupported("kafka"))));
        let mail = Mail {
            url: "smtp://localhost".into(),
            message: Value::Null,
            auth: None,
        };
        assert_eq!(host.send_mail(mail).unwrap_err().to_string(), "smtp is not supported by this host");
    }

    #[test]
    fn close_runs_cleanups() {
        let host = host();
        let ran = Arc::new(Mutex::new(false));
        let flag = ran.clone();
        host.add_cleanup(Box::new(move || *flag.lock().unwrap() = true));
        host.close();
        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn open_as_names() {
        assert_eq!(OpenAs::parse("resolved"), Some(OpenAs::Resolved));
        assert_eq!(OpenAs::parse("text"), None);
    }
}
