use std::cell::RefCell;
use std::rc::Rc;

use crate::runner::ds::function_object::FunctionObject;
use crate::runner::ds::host_object::{HostKind, HostObject};
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::promise::PromiseObject;
use crate::runner::ds::value::JsValue;

pub type JsObjectType = Rc<RefCell<ObjectType>>;

pub const CLASS_OBJECT: &str = "Object";

pub struct OrdinaryObject {
    pub class_name: String,
    pub properties: PropertyMap,
    pub proto: Option<JsObjectType>,
    pub frozen: bool,
}

pub struct ArrayObject {
    pub elements: Vec<JsValue>,
}

pub struct RegExpObject {
    pub source: String,
    pub flags: String,
    pub regex: regex::Regex,
    pub last_index: usize,
}

pub enum ObjectType {
    Ordinary(OrdinaryObject),
    Array(ArrayObject),
    Function(FunctionObject),
    Promise(PromiseObject),
    RegExp(RegExpObject),
    /// Milliseconds since the epoch, NaN for an invalid date.
    Date(f64),
    Host(Box<dyn HostObject>),
}

impl ObjectType {
    /// Tag used to look up prototype methods in the built-in registry.
    pub fn prototype_tag(&self) -> &'static str {
        match self {
            ObjectType::Ordinary(_) => "Object",
            ObjectType::Array(_) => "Array",
            ObjectType::Function(_) => "Function",
            ObjectType::Promise(_) => "Promise",
            ObjectType::RegExp(_) => "RegExp",
            ObjectType::Date(_) => "Date",
            ObjectType::Host(h) => match h.kind() {
                HostKind::Sequence => "Array",
                _ => "Object",
            },
        }
    }

    pub fn class_name(&self) -> String {
        match self {
            ObjectType::Ordinary(o) => o.class_name.clone(),
            ObjectType::Host(h) => h.class_name().to_string(),
            other => other.prototype_tag().to_string(),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, ObjectType::Function(_))
    }

    pub fn is_array(&self) -> bool {
        match self {
            ObjectType::Array(_) => true,
            ObjectType::Host(h) => h.kind() == HostKind::Sequence,
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ObjectType::Function(f) => format!("[Function: {}]", f.name),
            ObjectType::Array(a) => format!("[Array({})]", a.elements.len()),
            ObjectType::RegExp(r) => format!("/{}/{}", r.source, r.flags),
            other => format!("[object {}]", other.class_name()),
        }
    }

    /// Own property map for kinds that carry one.
    pub fn properties(&self) -> Option<&PropertyMap> {
        match self {
            ObjectType::Ordinary(o) => Some(&o.properties),
            ObjectType::Function(f) => Some(&f.properties),
            _ => None,
        }
    }

    pub fn properties_mut(&mut self) -> Option<&mut PropertyMap> {
        match self {
            ObjectType::Ordinary(o) => Some(&mut o.properties),
            ObjectType::Function(f) => Some(&mut f.properties),
            _ => None,
        }
    }
}

pub fn new_object_with_class(class_name: &str, properties: PropertyMap) -> JsObjectType {
    Rc::new(RefCell::new(ObjectType::Ordinary(OrdinaryObject {
        class_name: class_name.to_string(),
        properties,
        proto: None,
        frozen: false,
    })))
}

pub fn new_object(properties: PropertyMap) -> JsObjectType {
    new_object_with_class(CLASS_OBJECT, properties)
}

pub fn new_array(elements: Vec<JsValue>) -> JsObjectType {
    Rc::new(RefCell::new(ObjectType::Array(ArrayObject { elements })))
}

pub fn new_host_object(host: Box<dyn HostObject>) -> JsObjectType {
    Rc::new(RefCell::new(ObjectType::Host(host)))
}

/// Convenience constructors returning values.
pub fn object_value(properties: PropertyMap) -> JsValue {
    JsValue::Object(new_object(properties))
}

pub fn array_value(elements: Vec<JsValue>) -> JsValue {
    JsValue::Object(new_array(elements))
}
