//! The `mokapi/kafka` module: `produce` and `produceAsync`.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::host::{KafkaMessage, ProduceArgs, ProduceResult};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::json::json_to_js;
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::eval::property::{iterate_to_vec, own_keys};
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::arg;

use super::{expect_options, function, host, host_error, object, option, string_option, to_json, type_error};

const FLAT_FIELDS: &[&str] = &["key", "value", "headers", "partition"];

pub(crate) fn exports(_ctx: &mut EvalContext) -> ValueResult {
    Ok(object(vec![
        ("produce", function("produce", produce)),
        ("produceAsync", function("produceAsync", produce_async)),
    ]))
}

fn produce(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let request = produce_args(ctx, &arg(&args, 0))?;
    let client = host(ctx)?.kafka_client().map_err(host_error)?;
    let result = client.produce(request).map_err(host_error)?;
    Ok(json_to_js(&result_json(&result)))
}

fn produce_async(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let request = produce_args(ctx, &arg(&args, 0))?;
    let client = host(ctx)?.kafka_client().map_err(host_error)?;
    Ok(ctx.spawn_host_task(
        move || {
            client
                .produce(request)
                .map(|r| result_json(&r))
                .map_err(|e| e.to_string())
        },
        |_ctx, json| Ok(json_to_js(&json)),
    ))
}

/// Reads `{cluster, topic, messages}`. The older form with a single
/// message's fields at the top level is still accepted with a warning.
fn produce_args(ctx: &mut EvalContext, args: &JsValue) -> Result<ProduceArgs, JErrorType> {
    expect_options("args", args)?;
    let mut request = ProduceArgs {
        cluster: string_option(ctx, args, "cluster")?,
        topic: string_option(ctx, args, "topic")?,
        messages: vec![],
    };
    let messages = option(ctx, args, "messages")?;
    match &messages {
        JsValue::Undefined | JsValue::Null => {
            let keys = own_keys(args);
            if keys.iter().any(|k| FLAT_FIELDS.contains(&k.as_str())) {
                ctx.report_warning("kafka.produce: message fields at the top level are deprecated, use 'messages'");
            }
            request.messages.push(message(ctx, args)?);
        }
        JsValue::Object(o) if o.borrow().is_array() => {
            for m in iterate_to_vec(ctx, &messages)? {
                expect_options("messages", &m)?;
                request.messages.push(message(ctx, &m)?);
            }
        }
        other => return Err(type_error("messages", other, "Array")),
    }
    Ok(request)
}

fn message(ctx: &mut EvalContext, m: &JsValue) -> Result<KafkaMessage, JErrorType> {
    let key = match option(ctx, m, "key")? {
        JsValue::Undefined => None,
        v => Some(to_json(&v)?),
    };
    let value = match option(ctx, m, "value")? {
        JsValue::Undefined => None,
        v => Some(to_json(&v)?),
    };
    let mut headers = BTreeMap::new();
    let h = option(ctx, m, "headers")?;
    match &h {
        JsValue::Undefined | JsValue::Null => {}
        JsValue::Object(o) if !o.borrow().is_array() => {
            for name in own_keys(&h) {
                match option(ctx, &h, &name)? {
                    JsValue::String(s) => {
                        headers.insert(name, s);
                    }
                    other => return Err(type_error(&name, &other, "String")),
                }
            }
        }
        other => return Err(type_error("headers", other, "Object")),
    }
    let partition = match option(ctx, m, "partition")? {
        JsValue::Undefined | JsValue::Null => None,
        JsValue::Number(JsNumberType::Integer(p)) if p >= i32::MIN as i64 && p <= i32::MAX as i64 => Some(p as i32),
        other => return Err(type_error("partition", &other, "Integer")),
    };
    Ok(KafkaMessage {
        key,
        value,
        headers,
        partition,
    })
}

fn result_json(result: &ProduceResult) -> Value {
    json!({
        "cluster": result.cluster,
        "topic": result.topic,
        "messages": result.messages.iter().map(|m| json!({
            "key": m.key,
            "value": m.value,
            "headers": m.headers,
            "partition": m.partition,
            "offset": m.offset,
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    use super::*;
    use crate::bindings::HostBinding;
    use crate::config::RuntimeConfig;
    use crate::host::{DefaultHost, Host, InMemoryKafka};
    use crate::runner::eval::function::call_value;
    use crate::runner::eval::property::get_property;

    fn context(kafka: Arc<InMemoryKafka>) -> EvalContext {
        let config = RuntimeConfig::default();
        let host: Arc<dyn Host> = Arc::new(DefaultHost::new(&config).unwrap().with_kafka_client(kafka));
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
    fn produce_nested_messages() {
        let kafka = Arc::new(InMemoryKafka::new("local"));
        let mut ctx = context(kafka.clone());
        let args = json_to_js(&json!({
            "topic": "orders",
            "messages": [{"key": "a", "value": {"n": 1}}, {"key": "b", "value": 2, "partition": 1}]
        }));
        let result = call(&mut ctx, "produce", vec![args]).unwrap();
        assert_eq!(get_property(&mut ctx, &result, "topic").unwrap().as_str(), Some("orders"));
        let records = kafka.records("orders");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].partition, 1);
    }

    #[test]
    fn flat_form_warns() {
        let kafka = Arc::new(InMemoryKafka::new("local"));
        let mut ctx = context(kafka.clone());
        let warnings = Rc::new(RefCell::new(vec![]));
        let sink = warnings.clone();
        ctx.set_warn_handler(Rc::new(move |m: &str| sink.borrow_mut().push(m.to_string())));
        let args = json_to_js(&json!({"topic": "t", "key": "k", "value": "v"}));
        call(&mut ctx, "produce", vec![args]).unwrap();
        assert_eq!(kafka.records("t").len(), 1);
        assert_eq!(warnings.borrow().len(), 1);
    }

    #[test]
    fn produce_async_resolves() {
        let kafka = Arc::new(InMemoryKafka::new("local"));
        let mut ctx = context(kafka);
        let args = json_to_js(&json!({"topic": "t", "messages": [{"value": "v"}]}));
        let promise = call(&mut ctx, "produceAsync", vec![args]).unwrap();
        let result = ctx.await_value(promise).unwrap();
        assert_eq!(to_json(&result).unwrap()["messages"][0]["offset"], json!(0));
    }

    #[test]
    fn partition_must_be_integer() {
        let mut ctx = context(Arc::new(InMemoryKafka::new("local")));
        let args = json_to_js(&json!({"topic": "t", "messages": [{"partition": "1"}]}));
        let err = call(&mut ctx, "produce", vec![args]).unwrap_err();
        assert_eq!(err.get_message(), "unexpected type for 'partition': got String, expected Integer");
    }
}
