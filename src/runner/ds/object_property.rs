use std::collections::HashMap;

use crate::runner::ds::value::JsValue;

/// Own properties of an object, iterated in insertion order.
#[derive(Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(String, JsValue)>,
    index: HashMap<String, usize>,
}

impl PropertyMap {
    pub fn new() -> Self {
        PropertyMap::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&JsValue> {
        self.index.get(key).map(|i| &self.entries[*i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts or overwrites; an overwritten key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: JsValue) {
        let key = key.into();
        match self.index.get(&key) {
            Some(i) => self.entries[*i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<JsValue> {
        let i = self.index.remove(key)?;
        let (_, v) = self.entries.remove(i);
        for idx in self.index.values_mut() {
            if *idx > i {
                *idx -= 1;
            }
        }
        Some(v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_across_overwrite_and_remove() {
        let mut m = PropertyMap::new();
        m.insert("b", JsValue::from_i64(1));
        m.insert("a", JsValue::from_i64(2));
        m.insert("c", JsValue::from_i64(3));
        m.insert("b", JsValue::from_i64(4));
        assert_eq!(m.keys().cloned().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(m.remove("a"), Some(JsValue::from_i64(2)));
        assert_eq!(m.get("c"), Some(&JsValue::from_i64(3)));
        assert_eq!(m.get("b"), Some(&JsValue::from_i64(4)));
        assert_eq!(m.len(), 2);
    }
}
