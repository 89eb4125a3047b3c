//! The `mokapi` module: jobs, event handlers, sleep and small utilities.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;

use crate::event_loop::ScriptCallback;
use crate::generator::schema::SchemaSet;
use crate::host::{EventOptions, Host};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::eval::function::closure_value;
use crate::runner::eval::property::own_keys;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::arg;
use crate::runner::std_lib::promise::{new_promise, resolve_promise};
use crate::scheduler::{duration_from_millis, parse_duration, JobId, JobOptions};

use super::date::{format_go_layout, from_millis};
use super::marshal::marshal;
use super::patch::{delete_marker, patch};
use super::shared::shared_object;
use super::{expect_options, function, host, host_error, object, option, script_error, string_option, to_json, type_error};

const DEFAULT_LAYOUT: &str = "RFC3339";

pub(crate) fn exports(ctx: &mut EvalContext) -> ValueResult {
    let shared = shared_object(host(ctx)?.shared());
    Ok(object(vec![
        ("every", function("every", every)),
        ("cron", function("cron", cron)),
        ("on", function("on", on)),
        ("sleep", function("sleep", sleep)),
        ("env", function("env", env)),
        ("date", function("date", date)),
        ("marshal", function("marshal", marshal_value)),
        ("patch", function("patch", |ctx, _this, args| patch(ctx, &arg(&args, 0), &arg(&args, 1)))),
        ("Delete", delete_marker()),
        ("shared", shared),
    ]))
}

/// Milliseconds or a duration string such as `"1m30s"`.
pub(super) fn duration_arg(field: &str, value: &JsValue) -> Result<Duration, JErrorType> {
    match value {
        JsValue::Number(n) => {
            duration_from_millis(n.as_f64()).ok_or_else(|| script_error(format!("invalid duration {}", value)))
        }
        JsValue::String(s) => parse_duration(s).map_err(|e| script_error(e.to_string())),
        other => Err(type_error(field, other, "String")),
    }
}

fn tags_option(ctx: &mut EvalContext, options: &JsValue) -> Result<BTreeMap<String, String>, JErrorType> {
    let tags = option(ctx, options, "tags")?;
    let mut out = BTreeMap::new();
    match &tags {
        JsValue::Undefined | JsValue::Null => {}
        JsValue::Object(o) if !o.borrow().is_array() => {
            for key in own_keys(&tags) {
                match option(ctx, &tags, &key)? {
                    JsValue::String(s) => {
                        out.insert(key, s);
                    }
                    other => return Err(type_error(&key, &other, "String")),
                }
            }
        }
        other => return Err(type_error("tags", other, "Object")),
    }
    Ok(out)
}

fn job_options(ctx: &mut EvalContext, host: &dyn Host, options: &JsValue) -> Result<JobOptions, JErrorType> {
    expect_options("options", options)?;
    let mut job = JobOptions {
        tags: tags_option(ctx, options)?,
        ..JobOptions::default()
    };
    job.tags.entry("file".to_string()).or_insert_with(|| host.name().to_string());
    match option(ctx, options, "times")? {
        JsValue::Undefined | JsValue::Null => {}
        JsValue::Number(JsNumberType::Integer(n)) => job.times = n,
        JsValue::Number(n) if n.is_integer() => job.times = n.as_f64() as i64,
        other => return Err(type_error("times", &other, "Integer")),
    }
    match option(ctx, options, "skipImmediateFirstRun")? {
        JsValue::Undefined | JsValue::Null => {}
        JsValue::Boolean(b) => job.skip_immediate_first_run = b,
        other => return Err(type_error("skipImmediateFirstRun", &other, "Boolean")),
    }
    Ok(job)
}

/// Pins `f` in this VM so the scheduler or host can call it later.
fn pin(ctx: &mut EvalContext, f: JsValue) -> Result<ScriptCallback, JErrorType> {
    if !f.is_callable() {
        return Err(type_error("handler", &f, "Function"));
    }
    let handle = ctx
        .loop_handle()
        .ok_or_else(|| script_error("scheduling requires a running event loop"))?;
    Ok(ScriptCallback::new(ctx, handle, f))
}

/// Cancels `id` when the script's host context is cleaned up.
fn cancel_on_cleanup(host: &Arc<dyn Host>, id: JobId) {
    let weak: Weak<dyn Host> = Arc::downgrade(host);
    host.add_cleanup(Box::new(move || {
        if let Some(host) = weak.upgrade() {
            host.cancel_job(id);
        }
    }));
}

fn every(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let host = host(ctx)?;
    let interval = duration_arg("interval", &arg(&args, 0))?;
    let callback = pin(ctx, arg(&args, 1))?;
    let options = job_options(ctx, host.as_ref(), &arg(&args, 2))?;
    log::debug!("{}: every {:?} {}", host.name(), interval, callback.name());
    let id = host
        .every(interval, Arc::new(callback), options)
        .map_err(host_error)?;
    cancel_on_cleanup(&host, id);
    Ok(JsValue::from_i64(id as i64))
}

fn cron(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let host = host(ctx)?;
    let expr = match arg(&args, 0) {
        JsValue::String(s) => s,
        other => return Err(type_error("expr", &other, "String")),
    };
    let callback = pin(ctx, arg(&args, 1))?;
    let options = job_options(ctx, host.as_ref(), &arg(&args, 2))?;
    log::debug!("{}: cron '{}' {}", host.name(), expr, callback.name());
    let id = host.cron(&expr, Arc::new(callback), options).map_err(host_error)?;
    cancel_on_cleanup(&host, id);
    Ok(JsValue::from_i64(id as i64))
}

fn on(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let host = host(ctx)?;
    let event = match arg(&args, 0) {
        JsValue::String(s) => s,
        other => return Err(type_error("event", &other, "String")),
    };
    let callback = pin(ctx, arg(&args, 1))?;
    let options = arg(&args, 2);
    expect_options("options", &options)?;
    let tags = tags_option(ctx, &options)?;
    host.on(&event, callback, EventOptions { tags }).map_err(host_error)?;
    Ok(JsValue::Undefined)
}

/// Suspends the script for the given time. Other work items of the loop
/// keep running meanwhile.
fn sleep(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let wait = duration_arg("time", &arg(&args, 0))?;
    let promise = new_promise();
    let settle = promise.clone();
    let wake = closure_value("wake", move |ctx, _this, _args| {
        resolve_promise(ctx, &settle, JsValue::Undefined);
        Ok(JsValue::Undefined)
    });
    ctx.set_timer(wake, wait.as_secs_f64() * 1000.0, vec![], false);
    ctx.await_value(JsValue::Object(promise))?;
    Ok(JsValue::Undefined)
}

/// Unset variables read as an empty string.
fn env(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let name = match arg(&args, 0) {
        JsValue::String(s) => s,
        other => return Err(type_error("name", &other, "String")),
    };
    Ok(JsValue::String(host(ctx)?.env(&name).unwrap_or_default()))
}

fn date(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let options = arg(&args, 0);
    expect_options("options", &options)?;
    let layout = string_option(ctx, &options, "layout")?.unwrap_or_else(|| DEFAULT_LAYOUT.to_string());
    let time = match option(ctx, &options, "timestamp")? {
        JsValue::Undefined | JsValue::Null => Utc::now(),
        JsValue::Number(n) => {
            from_millis(n.as_f64()).ok_or_else(|| script_error(format!("invalid timestamp {}", n.as_f64())))?
        }
        other => return Err(type_error("timestamp", &other, "Integer")),
    };
    Ok(JsValue::String(format_go_layout(&time, &layout)))
}

fn marshal_value(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let value = to_json(&arg(&args, 0))?;
    let options = arg(&args, 1);
    expect_options("options", &options)?;
    let schema = match option(ctx, &options, "schema")? {
        JsValue::Undefined | JsValue::Null => None,
        s @ JsValue::Object(_) => Some(SchemaSet::from_value(to_json(&s)?).map_err(|e| script_error(e.to_string()))?),
        other => return Err(type_error("schema", &other, "Object")),
    };
    let content_type = string_option(ctx, &options, "contentType")?.unwrap_or_else(|| "application/json".to_string());
    marshal(&value, schema.as_ref(), &content_type)
        .map(JsValue::String)
        .map_err(|e| script_error(e.to_string()))
}
