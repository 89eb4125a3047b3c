//! Host globals: `require`, `fetch` and `open`.

use std::path::PathBuf;

use crate::modules::require_function;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::resolver::PluginResolver;
use crate::runner::plugin::types::EvalContext;

use super::{function, http, open};

const GLOBALS: &[&str] = &["require", "fetch", "open"];

pub(crate) struct GlobalsResolver {
    base_dir: PathBuf,
}

impl GlobalsResolver {
    pub(crate) fn new(base_dir: PathBuf) -> Self {
        GlobalsResolver { base_dir }
    }
}

impl PluginResolver for GlobalsResolver {
    fn has_binding(&self, name: &str) -> bool {
        GLOBALS.contains(&name)
    }

    fn resolve(&self, name: &str, _ctx: &mut EvalContext) -> Result<JsValue, JErrorType> {
        match name {
            "require" => Ok(require_function(self.base_dir.clone())),
            "fetch" => Ok(function("fetch", http::fetch)),
            "open" => Ok(function("open", open::open)),
            _ => Err(JErrorType::ReferenceError(format!("{} is not defined", name))),
        }
    }

    fn name(&self) -> &str {
        "mokapi_globals"
    }
}
