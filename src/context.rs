use std::collections::{BTreeMap, HashMap};

use crate::value::Value;

/// The mutable binding store shared by every fragment of one run.
///
/// Engine-provided names (`x`, `i`, `l`, `f`, `j`, `stdin`) are plain
/// bindings: they shadow seeded values of the same name, and names bound by
/// one record's statements stay visible to the next record.
#[derive(Debug, Clone, Default)]
pub struct Context {
    bindings: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings<I, K>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut ctx = Self::new();
        ctx.seed(bindings);
        ctx
    }

    pub fn seed<I, K>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (name, value) in bindings {
            self.bindings.insert(name.into(), value);
        }
    }

    /// Last write wins; returns the shadowed value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.bindings.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.bindings.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    /// Ordered copy of every binding.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.bindings.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn engine_names_shadow_seeded_ones() {
        let mut ctx = Context::with_bindings([("x", Value::from("seed")), ("foo", Value::Int(1))]);
        let old = ctx.set("x", Value::from("record"));
        assert_eq!(old, Some(Value::from("seed")));
        let snap = ctx.snapshot();
        assert_eq!(snap.keys().cloned().collect::<Vec<_>>(), vec!["foo", "x"]);
        assert_eq!(snap["x"], Value::from("record"));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut ctx = Context::new();
        ctx.set("a", Value::Int(1));
        let snap = ctx.snapshot();
        ctx.set("a", Value::Int(2));
        assert_eq!(snap["a"], Value::Int(1));
        assert_eq!(ctx.snapshot().len(), 1);
    }
}
