//! The `mokapi/http` module and the global `fetch`.
//!
//! Requests run on a host worker thread. The verb functions wait for the
//! response before returning; `fetch` returns a promise instead.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::host::{HttpRequest, HttpResponse};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::json::json_to_js;
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::eval::property::{iterate_to_vec, own_keys};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::arg;
use crate::runner::std_lib::promise::{new_promise, resolve_promise};

use super::mokapi::duration_arg;
use super::{expect_options, function, host, object, option, string_option, to_json, type_error};

pub(crate) fn exports(_ctx: &mut EvalContext) -> ValueResult {
    Ok(object(vec![
        ("get", function("get", |ctx, _this, args| verb(ctx, "GET", &args, false))),
        ("post", function("post", |ctx, _this, args| verb(ctx, "POST", &args, true))),
        ("put", function("put", |ctx, _this, args| verb(ctx, "PUT", &args, true))),
        ("patch", function("patch", |ctx, _this, args| verb(ctx, "PATCH", &args, true))),
        ("del", function("del", |ctx, _this, args| verb(ctx, "DELETE", &args, true))),
        ("head", function("head", |ctx, _this, args| verb(ctx, "HEAD", &args, false))),
        ("options", function("options", |ctx, _this, args| verb(ctx, "OPTIONS", &args, true))),
        ("fetch", function("fetch", fetch)),
    ]))
}

/// `http.<verb>(url, [body,] args)`: blocks the script until the response
/// is in.
fn verb(ctx: &mut EvalContext, method: &str, args: &[JsValue], with_body: bool) -> ValueResult {
    let (body, options) = if with_body {
        (arg(args, 1), arg(args, 2))
    } else {
        (JsValue::Undefined, arg(args, 1))
    };
    expect_options("args", &options)?;
    let request = build_request(ctx, method, &arg(args, 0), &body, &options)?;
    let pending = send(ctx, request, |_ctx, response| Ok(verb_response(&response)));
    ctx.await_value(pending)
}

/// `fetch(url, {method, headers, body, maxRedirects, timeout})`.
pub(super) fn fetch(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let options = arg(&args, 1);
    expect_options("options", &options)?;
    let method = string_option(ctx, &options, "method")?.unwrap_or_else(|| "GET".to_string());
    let body = option(ctx, &options, "body")?;
    let request = build_request(ctx, &method, &arg(&args, 0), &body, &options)?;
    Ok(send(ctx, request, |_ctx, response| Ok(fetch_response(&response))))
}

fn send<F>(ctx: &mut EvalContext, request: HttpRequest, complete: F) -> JsValue
where
    F: FnOnce(&mut EvalContext, Response) -> ValueResult + 'static,
{
    let client = match host(ctx) {
        Ok(h) => h.http_client(),
        Err(e) => {
            let message = e.get_message();
            return ctx.spawn_host_task(move || Err(message), |_ctx, _| Ok(JsValue::Undefined));
        }
    };
    log::debug!("{} {}", request.method, request.url);
    ctx.spawn_host_task(
        move || {
            let url = request.url.clone();
            let response = client.send(request).map_err(|e| e.to_string())?;
            Ok(Response::from_http(url, response).into_json())
        },
        move |ctx, json| complete(ctx, Response::from_json(json)),
    )
}

fn build_request(
    ctx: &mut EvalContext,
    method: &str,
    url: &JsValue,
    body: &JsValue,
    options: &JsValue,
) -> Result<HttpRequest, JErrorType> {
    let url = match url {
        JsValue::String(s) => s.clone(),
        other => return Err(type_error("url", other, "String")),
    };
    let mut request = HttpRequest::new(method, &url);
    let headers = option(ctx, options, "headers")?;
    match &headers {
        JsValue::Undefined | JsValue::Null => {}
        JsValue::Object(o) if !o.borrow().is_array() => {
            for name in own_keys(&headers) {
                let value = option(ctx, &headers, &name)?;
                let values = match &value {
                    JsValue::Object(o) if o.borrow().is_array() => iterate_to_vec(ctx, &value)?,
                    _ => vec![value],
                };
                for v in values {
                    request.headers.push((name.clone(), header_value(&name, &v)?));
                }
            }
        }
        other => return Err(type_error("headers", other, "Object")),
    }
    match body {
        JsValue::Undefined | JsValue::Null => {}
        JsValue::String(s) => request.body = Some(s.clone().into_bytes()),
        JsValue::Object(_) => {
            request.body = Some(serde_json::to_vec(&to_json(body)?).unwrap_or_default());
            if !request.has_header("Content-Type") {
                request.headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
        }
        other => request.body = Some(other.to_string().into_bytes()),
    }
    match option(ctx, options, "maxRedirects")? {
        JsValue::Undefined | JsValue::Null => {}
        JsValue::Number(JsNumberType::Integer(n)) if n >= 0 => request.max_redirects = Some(n as usize),
        other => return Err(type_error("maxRedirects", &other, "Integer")),
    }
    match option(ctx, options, "timeout")? {
        JsValue::Undefined | JsValue::Null => {}
        t => request.timeout = Some(duration_arg("timeout", &t)?),
    }
    Ok(request)
}

fn header_value(name: &str, value: &JsValue) -> Result<String, JErrorType> {
    match value {
        JsValue::String(s) => Ok(s.clone()),
        JsValue::Number(_) | JsValue::Boolean(_) => Ok(value.to_string()),
        other => Err(type_error(name, other, "String")),
    }
}

/// A response as it crosses from the worker thread back into the VM.
struct Response {
    url: String,
    status: u16,
    headers: BTreeMap<String, Vec<String>>,
    body: String,
}

impl Response {
    fn from_http(url: String, response: HttpResponse) -> Self {
        Response {
            url,
            status: response.status,
            body: response.text(),
            headers: response.headers,
        }
    }

    fn into_json(self) -> Value {
        json!({
            "url": self.url,
            "status": self.status,
            "headers": self.headers,
            "body": self.body,
        })
    }

    fn from_json(value: Value) -> Self {
        let headers = value
            .get("headers")
            .cloned()
            .and_then(|h| serde_json::from_value(h).ok())
            .unwrap_or_default();
        Response {
            url: value.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
            status: value.get("status").and_then(Value::as_u64).unwrap_or_default() as u16,
            headers,
            body: value.get("body").and_then(Value::as_str).unwrap_or_default().to_string(),
        }
    }
}

fn parse_body(body: &str) -> ValueResult {
    serde_json::from_str::<Value>(body)
        .map(|v| json_to_js(&v))
        .map_err(|e| JErrorType::SyntaxError(format!("response is not valid JSON: {}", e)))
}

/// `{statusCode, headers, body, json()}`.
fn verb_response(response: &Response) -> JsValue {
    let headers = response
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), json!(v)))
        .collect::<serde_json::Map<_, _>>();
    let body = response.body.clone();
    object(vec![
        ("statusCode", JsValue::from_i64(response.status as i64)),
        ("headers", json_to_js(&Value::Object(headers))),
        ("body", JsValue::String(response.body.clone())),
        ("json", function("json", move |_ctx, _this, _args| parse_body(&body))),
    ])
}

/// Fetch API style response; `text()` and `json()` return promises.
fn fetch_response(response: &Response) -> JsValue {
    let headers = response
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.join(", "))))
        .collect::<serde_json::Map<_, _>>();
    let status_text = reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default();
    let text_body = response.body.clone();
    let json_body = response.body.clone();
    object(vec![
        ("url", JsValue::String(response.url.clone())),
        ("status", JsValue::from_i64(response.status as i64)),
        ("statusText", JsValue::str(status_text)),
        ("ok", JsValue::Boolean((200..300).contains(&response.status))),
        ("headers", json_to_js(&Value::Object(headers))),
        (
            "text",
            function("text", move |ctx, _this, _args| {
                let promise = new_promise();
                resolve_promise(ctx, &promise, JsValue::String(text_body.clone()));
                Ok(JsValue::Object(promise))
            }),
        ),
        (
            "json",
            function("json", move |ctx, _this, _args| {
                let value = parse_body(&json_body)?;
                let promise = new_promise();
                resolve_promise(ctx, &promise, value);
                Ok(JsValue::Object(promise))
            }),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::bindings::HostBinding;
    use crate::config::RuntimeConfig;
    use crate::host::{DefaultHost, Host, HostError, HttpClient};
    use crate::runner::eval::function::call_value;
    use crate::runner::eval::property::get_property;

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl HttpClient for Recorder {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, HostError> {
            if request.url.contains("down") {
                return Err(HostError::Timeout { url: request.url });
            }
            self.requests.lock().unwrap().push(request);
            let mut headers = BTreeMap::new();
            headers.insert("content-type".to_string(), vec!["application/json".to_string()]);
            Ok(HttpResponse {
                status: 201,
                headers,
                body: br#"{"id":1}"#.to_vec(),
            })
        }
    }

    fn context(client: Arc<Recorder>) -> EvalContext {
        let config = RuntimeConfig::default();
        let host: Arc<dyn Host> = Arc::new(DefaultHost::new(&config).unwrap().with_http_client(client));
        let mut ctx = EvalContext::with_core_builtins();
        ctx.set_extension(Rc::new(HostBinding {
            host,
            base_dir: config.working_dir,
        }));
        ctx
    }

    fn call(ctx: &mut EvalContext, name: &str, args: Vec<JsValue>) -> ValueResult {
        let module = exports(ctx)?;
        let f = get_property(ctx, &module, name)?;
        call_value(ctx, &f, module, args)
    }

    #[test]
    fn post_sends_json_body() {
        let client = Arc::new(Recorder::default());
        let mut ctx = context(client.clone());
        let body = object(vec![("name", JsValue::str("x"))]);
        let args = object(vec![
            ("headers", object(vec![("X-Trace", JsValue::from_i64(7))])),
            ("timeout", JsValue::str("2s")),
        ]);
        let res = call(&mut ctx, "post", vec![JsValue::str("http://api/pets"), body, args]).unwrap();
        assert_eq!(get_property(&mut ctx, &res, "statusCode").unwrap().as_f64(), Some(201.0));
        let json = get_property(&mut ctx, &res, "json").unwrap();
        let parsed = call_value(&mut ctx, &json, res, vec![]).unwrap();
        assert_eq!(get_property(&mut ctx, &parsed, "id").unwrap().as_f64(), Some(1.0));

        let sent = client.requests.lock().unwrap();
        assert_eq!(sent[0].method, "POST");
        assert_eq!(sent[0].body.as_deref(), Some(&br#"{"name":"x"}"#[..]));
        assert!(sent[0].headers.contains(&("X-Trace".to_string(), "7".to_string())));
        assert!(sent[0].has_header("content-type"));
        assert_eq!(sent[0].timeout, Some(std::time::Duration::from_secs(2)));
    }

    #[test]
    fn host_errors_are_thrown() {
        let mut ctx = context(Arc::new(Recorder::default()));
        let err = call(&mut ctx, "get", vec![JsValue::str("http://down/")]).unwrap_err();
        assert_eq!(err.get_message(), "Error: request to http://down/ timed out");
    }

    #[test]
    fn fetch_resolves_a_response() {
        let mut ctx = context(Arc::new(Recorder::default()));
        let promise = fetch(&mut ctx, JsValue::Undefined, vec![JsValue::str("http://api/")]).unwrap();
        let res = ctx.await_value(promise).unwrap();
        assert_eq!(get_property(&mut ctx, &res, "ok").unwrap(), JsValue::Boolean(true));
        assert_eq!(get_property(&mut ctx, &res, "statusText").unwrap().as_str(), Some("Created"));
    }

    #[test]
    fn bad_option_types() {
        let mut ctx = context(Arc::new(Recorder::default()));
        let args = object(vec![("headers", JsValue::str("nope"))]);
        let err = call(&mut ctx, "get", vec![JsValue::str("http://api/"), args]).unwrap_err();
        assert_eq!(err.get_message(), "unexpected type for 'headers': got String, expected Object");
    }
}
