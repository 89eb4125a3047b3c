//! The `mokapi/faker` module.
//!
//! `fake(schema)` runs the host's generator inside this VM so script
//! nodes of the same VM are called directly. `findByName(name)` hands out a
//! node of the faker tree; nodes appended through it hang in the tree
//! until the host cleans up the script.

use crate::event_loop::ScriptCallback;
use crate::generator::{Node, NodeRef, Request, ScriptNode};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::host_object::{HostKind, HostObject};
use crate::runner::ds::json::json_to_js;
use crate::runner::ds::object::{array_value, new_host_object, ObjectType};
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::eval::property::iterate_to_vec;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::arg;

use super::{function, host, is_plain_object, object, option, script_error, to_json, type_error};

pub(crate) fn exports(_ctx: &mut EvalContext) -> ValueResult {
    Ok(object(vec![
        ("fake", function("fake", fake)),
        ("findByName", function("findByName", find_by_name)),
    ]))
}

fn fake(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let schema = arg(&args, 0);
    if !is_plain_object(&schema) {
        return Err(type_error("schema", &schema, "Object"));
    }
    let request = Request::for_schema(to_json(&schema)?).map_err(|e| script_error(e.to_string()))?;
    let generator = host(ctx)?.generator();
    let value = generator
        .generate_with(request, ctx)
        .map_err(|e| script_error(e.to_string()))?;
    Ok(json_to_js(&value))
}

fn find_by_name(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let name = match arg(&args, 0) {
        JsValue::String(s) => s,
        other => return Err(type_error("name", &other, "String")),
    };
    match host(ctx)?.find_faker_node(&name) {
        Some(node) => Ok(handle(node)),
        None => Err(script_error(format!("faker node '{}' not found", name))),
    }
}

fn handle(node: NodeRef) -> JsValue {
    JsValue::Object(new_host_object(Box::new(NodeHandle { node })))
}

fn strings(values: &[String]) -> JsValue {
    array_value(values.iter().cloned().map(JsValue::String).collect())
}

fn index_arg(value: &JsValue) -> Result<usize, JErrorType> {
    match value {
        JsValue::Number(JsNumberType::Integer(i)) if *i >= 0 => Ok(*i as usize),
        JsValue::Number(n) if n.is_integer() && n.as_f64() >= 0.0 => Ok(n.as_f64() as usize),
        other => Err(type_error("index", other, "Integer")),
    }
}

fn string_list(ctx: &mut EvalContext, spec: &JsValue, field: &str) -> Result<Vec<String>, JErrorType> {
    let value = option(ctx, spec, field)?;
    match &value {
        JsValue::Undefined | JsValue::Null => Ok(vec![]),
        JsValue::Object(o) if o.borrow().is_array() => iterate_to_vec(ctx, &value)?
            .into_iter()
            .map(|v| match v {
                JsValue::String(s) => Ok(s),
                other => Err(type_error(field, &other, "String")),
            })
            .collect(),
        other => Err(type_error(field, other, "Array")),
    }
}

fn script_fn(ctx: &mut EvalContext, spec: &JsValue, field: &str) -> Result<Option<ScriptCallback>, JErrorType> {
    let f = option(ctx, spec, field)?;
    if f.is_nullish() {
        return Ok(None);
    }
    if !f.is_callable() {
        return Err(type_error(field, &f, "Function"));
    }
    let handle = ctx
        .loop_handle()
        .ok_or_else(|| script_error("faker nodes require a running event loop"))?;
    Ok(Some(ScriptCallback::new(ctx, handle, f)))
}

/// Builds a tree node from `{name, attributes, dependsOn, test, fake}`.
fn script_node(ctx: &mut EvalContext, spec: &JsValue) -> Result<NodeRef, JErrorType> {
    if let JsValue::Object(o) = spec {
        if let ObjectType::Host(h) = &*o.borrow() {
            if h.class_name() == NODE_CLASS {
                return Err(script_error("faker node is already part of the tree"));
            }
        }
    }
    if !is_plain_object(spec) {
        return Err(type_error("node", spec, "Object"));
    }
    let name = match option(ctx, spec, "name")? {
        JsValue::String(s) if !s.is_empty() => s,
        other => return Err(type_error("name", &other, "String")),
    };
    let attributes = string_list(ctx, spec, "attributes")?;
    let depends_on = string_list(ctx, spec, "dependsOn")?;
    let test = script_fn(ctx, spec, "test")?;
    let fake = script_fn(ctx, spec, "fake")?;
    Ok(Node::script(&name, attributes, depends_on, ScriptNode { test, fake }))
}

/// Hangs `child` below `parent` and removes it again at cleanup.
fn attach(ctx: &mut EvalContext, parent: &NodeRef, child: NodeRef) -> Result<(), JErrorType> {
    let host = host(ctx)?;
    log::debug!("{}: faker node '{}' added to '{}'", host.name(), child.name(), parent.name());
    let parent = parent.clone();
    host.add_cleanup(Box::new(move || {
        parent.remove_node(&child);
    }));
    Ok(())
}

const NODE_CLASS: &str = "FakerNode";

struct NodeHandle {
    node: NodeRef,
}

const NODE_KEYS: &[&str] = &[
    "name",
    "attributes",
    "dependsOn",
    "children",
    "append",
    "insert",
    "removeAt",
    "remove",
];

impl HostObject for NodeHandle {
    fn class_name(&self) -> &str {
        NODE_CLASS
    }

    fn kind(&self) -> HostKind {
        HostKind::Struct
    }

    fn get(&self, key: &str) -> Result<JsValue, JErrorType> {
        let node = self.node.clone();
        Ok(match key {
            "name" => JsValue::str(node.name()),
            "attributes" => strings(node.attributes()),
            "dependsOn" => strings(node.depends_on()),
            "children" => array_value(node.children().into_iter().map(handle).collect()),
            "append" => function("append", move |ctx, _this, args| {
                let child = script_node(ctx, &arg(&args, 0))?;
                node.append(child.clone());
                attach(ctx, &node, child.clone())?;
                Ok(handle(child))
            }),
            "insert" => function("insert", move |ctx, _this, args| {
                let index = index_arg(&arg(&args, 0))?;
                let child = script_node(ctx, &arg(&args, 1))?;
                node.insert(index, child.clone()).map_err(script_error)?;
                attach(ctx, &node, child.clone())?;
                Ok(handle(child))
            }),
            "removeAt" => function("removeAt", move |_ctx, _this, args| {
                let index = index_arg(&arg(&args, 0))?;
                match node.remove_at(index) {
                    Some(removed) => Ok(handle(removed)),
                    None => Err(JErrorType::RangeError(format!("index {} out of range", index))),
                }
            }),
            "remove" => function("remove", move |_ctx, _this, args| match arg(&args, 0) {
                JsValue::String(name) => Ok(JsValue::Boolean(node.remove(&name))),
                other => Err(type_error("name", &other, "String")),
            }),
            _ => JsValue::Undefined,
        })
    }

    fn has(&self, key: &str) -> bool {
        NODE_KEYS.contains(&key)
    }

    fn keys(&self) -> Vec<String> {
        NODE_KEYS[..4].iter().map(|k| k.to_string()).collect()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.node.name(),
            "attributes": self.node.attributes(),
            "dependsOn": self.node.depends_on(),
            "children": self.node.children().iter().map(|c| c.name().to_string()).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::sync::Arc;

    use super::*;
    use crate::bindings::HostBinding;
    use crate::config::RuntimeConfig;
    use crate::host::{DefaultHost, Host};
    use crate::runner::eval::function::call_value;
    use crate::runner::eval::property::get_property;

    fn context() -> EvalContext {
        let mut config = RuntimeConfig::default();
        config.generator.seed = Some(11);
        let host: Arc<dyn Host> = Arc::new(DefaultHost::new(&config).unwrap());
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
    fn fake_from_schema() {
        let mut ctx = context();
        let schema = json_to_js(&serde_json::json!({"const": "foo"}));
        assert_eq!(call(&mut ctx, "fake", vec![schema]).unwrap().as_str(), Some("foo"));
    }

    #[test]
    fn invalid_schema_is_thrown() {
        let mut ctx = context();
        let schema = json_to_js(&serde_json::json!({"type": 123}));
        let err = call(&mut ctx, "fake", vec![schema]).unwrap_err();
        assert_eq!(err.get_message(), "Error: unexpected type for 'type': Integer");
    }

    #[test]
    fn node_handles() {
        let mut ctx = context();
        let root = call(&mut ctx, "findByName", vec![JsValue::str("root")]).unwrap();
        assert_eq!(get_property(&mut ctx, &root, "name").unwrap().as_str(), Some("root"));
        let children = get_property(&mut ctx, &root, "children").unwrap();
        assert!(!iterate_to_vec(&mut ctx, &children).unwrap().is_empty());

        let missing = call(&mut ctx, "findByName", vec![JsValue::str("nope")]).unwrap_err();
        assert_eq!(missing.get_message(), "Error: faker node 'nope' not found");
    }

    #[test]
    fn append_needs_event_loop() {
        let mut ctx = context();
        let root = call(&mut ctx, "findByName", vec![JsValue::str("root")]).unwrap();
        let append = get_property(&mut ctx, &root, "append").unwrap();
        let spec = object(vec![
            ("name", JsValue::str("pet")),
            ("fake", function("fake", |_ctx, _this, _args| Ok(JsValue::str("cat")))),
        ]);
        let err = call_value(&mut ctx, &append, root, vec![spec]).unwrap_err();
        assert_eq!(err.get_message(), "Error: faker nodes require a running event loop");
    }
}
