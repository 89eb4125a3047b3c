use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::value::JsValue;

pub enum PromiseState {
    Pending,
    Fulfilled(JsValue),
    Rejected(JsValue),
}

pub struct PromiseReaction {
    pub on_fulfilled: Option<JsValue>,
    pub on_rejected: Option<JsValue>,
    /// Promise returned by the `then` call that registered this reaction.
    pub derived: Option<JsObjectType>,
}

pub struct PromiseObject {
    pub state: PromiseState,
    pub reactions: Vec<PromiseReaction>,
    pub handled: bool,
}

impl PromiseObject {
    pub fn new() -> Self {
        PromiseObject {
            state: PromiseState::Pending,
            reactions: vec![],
            handled: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, PromiseState::Pending)
    }
}

impl Default for PromiseObject {
    fn default() -> Self {
        Self::new()
    }
}
