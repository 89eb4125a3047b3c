use std::collections::HashMap;

use serde_json::Value;

/// Values produced so far in one generation, keyed by normalized field
/// name. Builders take a snapshot before descending and restore it after,
/// so only siblings and ancestors see each other's values.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(&normalize(name))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(&normalize(name))
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(normalize(name), value);
    }

    /// Sets `name` unless a value is already present.
    pub fn offer(&mut self, name: &str, value: Value) {
        self.values.entry(normalize(name)).or_insert(value);
    }

    pub fn snapshot(&self) -> Context {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: Context) {
        *self = snapshot;
    }

    pub fn to_json(&self) -> Value {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        let map = keys
            .into_iter()
            .map(|k| (k.clone(), self.values[k].clone()))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

/// Lower-cased name without separators: `first_Name` and `firstName` both
/// become `firstname`.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | '.' | ' '))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Splits path segments into lower-case tokens on camel-case boundaries and
/// on `_`, `-`, `.` and spaces.
pub fn tokenize(path: &[String]) -> Vec<String> {
    let mut tokens = Vec::new();
    for segment in path {
        split_segment(segment, &mut tokens);
    }
    tokens
}

fn split_segment(segment: &str, tokens: &mut Vec<String>) {
    let chars: Vec<char> = segment.chars().collect();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '_' | '-' | '.' | ' ') {
            flush(&mut current, tokens);
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            // "userID" splits before "I"; "HTTPServer" splits before "S"
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                flush(&mut current, tokens);
            }
        }
        current.extend(c.to_lowercase());
    }
    flush(&mut current, tokens);
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(parts: &[&str]) -> Vec<String> {
        tokenize(&parts.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn splits_camel_case_and_separators() {
        assert_eq!(toks(&["firstName"]), vec!["first", "name"]);
        assert_eq!(toks(&["user_id", "HTTPServer"]), vec!["user", "id", "http", "server"]);
        assert_eq!(toks(&["created-at.date"]), vec!["created", "at", "date"]);
    }

    #[test]
    fn snapshot_restore() {
        let mut ctx = Context::new();
        ctx.set("firstName", Value::from("Ann"));
        let snap = ctx.snapshot();
        ctx.set("last_name", Value::from("Lee"));
        assert_eq!(ctx.get_str("lastname"), Some("Lee"));
        ctx.restore(snap);
        assert!(!ctx.has("lastname"));
        assert_eq!(ctx.get_str("first_name"), Some("Ann"));
    }
}
