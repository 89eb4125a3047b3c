//! The faker tree.
//!
//! Nodes carry a name, alias attributes and optional children. Leaves
//! produce values: native leaves are plain functions, script leaves call
//! back into the VM that appended them. A path is matched by consuming its
//! tokens from the root downwards; a node name may span several tokens
//! (`first`, `name` matches `firstname`) and `*` matches any single token.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::{json, Value};

use crate::event_loop::ScriptCallback;

use super::context::normalize;
use super::schema::{Schema, SchemaRef};
use super::session::Session;
use super::GeneratorError;

pub type NodeRef = Arc<Node>;

pub type NativeFake = fn(&mut Session<'_>, &FakeRequest) -> Result<Value, FakeError>;
pub type NativeTest = fn(&FakeRequest) -> bool;

/// Outcome of a leaf that produced nothing.
#[derive(Debug)]
pub enum FakeError {
    /// The leaf does not handle this request; schema-only generation
    /// takes over.
    NotSupported,
    Failed(GeneratorError),
}

impl From<GeneratorError> for FakeError {
    fn from(e: GeneratorError) -> Self {
        FakeError::Failed(e)
    }
}

lazy_static! {
    static ref EMPTY_SCHEMA: Schema = Schema::default();
}

/// What a leaf is asked to produce.
#[derive(Debug, Clone)]
pub struct FakeRequest {
    pub path: Vec<String>,
    pub tokens: Vec<String>,
    pub schema: Option<SchemaRef>,
}

impl FakeRequest {
    /// The schema, or an unconstrained one.
    pub fn schema(&self) -> &Schema {
        self.schema.as_deref().unwrap_or(&EMPTY_SCHEMA)
    }

    /// Normalized name of the last path segment.
    pub fn last_name(&self) -> String {
        self.path.last().map(|s| normalize(s)).unwrap_or_default()
    }

    pub fn to_json(&self, session: &Session<'_>) -> Value {
        json!({
            "path": self.path,
            "name": self.path.last().cloned().unwrap_or_default(),
            "schema": self.schema.as_ref().map(|s| s.to_value()).unwrap_or(Value::Null),
            "context": session.context.to_json(),
        })
    }
}

/// Functions of a node appended by a script.
#[derive(Clone)]
pub struct ScriptNode {
    pub test: Option<ScriptCallback>,
    pub fake: Option<ScriptCallback>,
}

enum NodeKind {
    Branch,
    Native { test: NativeTest, fake: NativeFake },
    Script(ScriptNode),
}

pub struct Node {
    name: String,
    attributes: Vec<String>,
    depends_on: Vec<String>,
    children: RwLock<Vec<NodeRef>>,
    kind: NodeKind,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("children", &self.children().len())
            .finish()
    }
}

impl Node {
    fn new(name: &str, kind: NodeKind) -> Node {
        Node {
            name: name.to_string(),
            attributes: vec![],
            depends_on: vec![],
            children: RwLock::new(vec![]),
            kind,
        }
    }

    pub fn branch(name: &str, children: Vec<NodeRef>) -> NodeRef {
        Node::new(name, NodeKind::Branch).with_children(children).into_ref()
    }

    pub fn leaf(name: &str, test: NativeTest, fake: NativeFake) -> Node {
        Node::new(name, NodeKind::Native { test, fake })
    }

    pub fn script(name: &str, attributes: Vec<String>, depends_on: Vec<String>, functions: ScriptNode) -> NodeRef {
        let mut node = Node::new(name, NodeKind::Script(functions));
        node.attributes = attributes;
        node.depends_on = depends_on;
        node.into_ref()
    }

    pub fn aliases(mut self, names: &[&str]) -> Self {
        self.attributes.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn depends(mut self, names: &[&str]) -> Self {
        self.depends_on.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_children(self, children: Vec<NodeRef>) -> Self {
        if let Ok(mut c) = self.children.write() {
            *c = children;
        }
        self
    }

    pub fn into_ref(self) -> NodeRef {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self.kind, NodeKind::Branch)
    }

    pub fn children(&self) -> Vec<NodeRef> {
        match self.children.read() {
            Ok(c) => c.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn append(&self, node: NodeRef) {
        if let Ok(mut c) = self.children.write() {
            c.push(node);
        }
    }

    /// Inserts at `index`; fails when `index` is past the end.
    pub fn insert(&self, index: usize, node: NodeRef) -> Result<(), String> {
        let mut c = self.children.write().map_err(|_| "faker tree is poisoned".to_string())?;
        if index > c.len() {
            return Err(format!("index {} out of range [0, {}]", index, c.len()));
        }
        c.insert(index, node);
        Ok(())
    }

    pub fn remove_at(&self, index: usize) -> Option<NodeRef> {
        let mut c = self.children.write().ok()?;
        if index < c.len() {
            Some(c.remove(index))
        } else {
            None
        }
    }

    /// Removes the first child called `name`.
    pub fn remove(&self, name: &str) -> bool {
        match self.children.write() {
            Ok(mut c) => match c.iter().position(|n| n.name.eq_ignore_ascii_case(name)) {
                Some(i) => {
                    c.remove(i);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Removes `node` itself, wherever it hangs below this node.
    pub fn remove_node(&self, node: &NodeRef) -> bool {
        let children = match self.children.write() {
            Ok(mut c) => {
                if let Some(i) = c.iter().position(|n| Arc::ptr_eq(n, node)) {
                    c.remove(i);
                    return true;
                }
                c.clone()
            }
            Err(_) => return false,
        };
        children.iter().any(|child| child.remove_node(node))
    }

    /// Depth-first search of the descendants.
    pub fn find_by_name(&self, name: &str) -> Option<NodeRef> {
        for child in self.children() {
            if child.name.eq_ignore_ascii_case(name) {
                return Some(child);
            }
            if let Some(found) = child.find_by_name(name) {
                return Some(found);
            }
        }
        None
    }

    /// How many leading tokens this node can consume, longest first.
    fn match_lengths(&self, tokens: &[String]) -> Vec<usize> {
        if self.name == "*" {
            return if tokens.is_empty() { vec![] } else { vec![1] };
        }
        let names: Vec<String> = std::iter::once(&self.name)
            .chain(self.attributes.iter())
            .map(|n| normalize(n))
            .collect();
        let mut lengths = Vec::new();
        let mut joined = String::new();
        for (i, token) in tokens.iter().enumerate() {
            joined.push_str(token);
            if names.iter().any(|n| *n == joined) {
                lengths.push(i + 1);
            }
        }
        lengths.reverse();
        lengths
    }

    fn accepts(&self, session: &mut Session<'_>, request: &FakeRequest) -> Result<bool, GeneratorError> {
        match &self.kind {
            NodeKind::Branch => Ok(false),
            NodeKind::Native { test, .. } => Ok(test(request)),
            NodeKind::Script(functions) => match &functions.test {
                Some(test) => {
                    let arg = request.to_json(session);
                    let result = session.call_script(test, vec![arg])?;
                    Ok(truthy(&result))
                }
                None => Ok(functions.fake.is_some()),
            },
        }
    }

    pub(crate) fn fake(&self, session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
        match &self.kind {
            NodeKind::Branch => Err(FakeError::NotSupported),
            NodeKind::Native { fake, .. } => fake(session, request),
            NodeKind::Script(functions) => {
                let fake = functions.fake.as_ref().ok_or(FakeError::NotSupported)?;
                let arg = request.to_json(session);
                match session.call_script(fake, vec![arg])? {
                    Value::Null => Err(FakeError::NotSupported),
                    value => Ok(value),
                }
            }
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Finds the leaf for `request`. Leading tokens that match nothing are
/// skipped; among children the first that consumes the next tokens and
/// accepts the schema wins.
pub(crate) fn resolve(
    root: &NodeRef,
    session: &mut Session<'_>,
    request: &FakeRequest,
) -> Result<Option<NodeRef>, GeneratorError> {
    let tokens = &request.tokens;
    for start in 0..tokens.len() {
        if let Some(node) = descend(root, &tokens[start..], session, request)? {
            return Ok(Some(node));
        }
    }
    Ok(None)
}

fn descend(
    parent: &NodeRef,
    tokens: &[String],
    session: &mut Session<'_>,
    request: &FakeRequest,
) -> Result<Option<NodeRef>, GeneratorError> {
    for child in parent.children() {
        for consumed in child.match_lengths(tokens) {
            let rest = &tokens[consumed..];
            if rest.is_empty() {
                if child.accepts(session, request)? {
                    return Ok(Some(child));
                }
            } else if let Some(found) = descend(&child, rest, session, request)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any(_: &FakeRequest) -> bool {
        true
    }

    fn fixed(_: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
        Ok(Value::from("x"))
    }

    #[test]
    fn multi_token_names_and_aliases() {
        let node = Node::leaf("firstname", any, fixed).aliases(&["forename"]);
        let tokens: Vec<String> = vec!["first".into(), "name".into()];
        assert_eq!(node.match_lengths(&tokens), vec![2]);
        assert_eq!(node.match_lengths(&["forename".to_string()]), vec![1]);
        assert!(node.match_lengths(&["name".to_string()]).is_empty());
    }

    #[test]
    fn mutation_api() {
        let root = Node::branch("root", vec![]);
        let a = Node::leaf("a", any, fixed).into_ref();
        root.append(a.clone());
        root.insert(0, Node::leaf("b", any, fixed).into_ref()).unwrap();
        assert!(root.insert(5, Node::leaf("c", any, fixed).into_ref()).is_err());
        assert_eq!(root.children()[0].name(), "b");
        assert!(root.remove("B"));
        assert!(root.remove_node(&a));
        assert!(root.children().is_empty());
        assert!(root.remove_at(0).is_none());
    }
}
