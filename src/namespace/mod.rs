//=====================================================
// File: namespace/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Hierarchical, sealable key/value registry
// Objective: Hold module exports and mounted imports under dotted paths,
//            rejecting overwrites and writes beneath sealed paths
//=====================================================

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use crate::error::NamespaceError;

/// Host function exported by a module.
#[derive(Clone)]
pub struct Function {
    name: String,
    body: Rc<dyn Fn(&[Value]) -> Value>,
}

impl Function {
    pub fn new(name: impl Into<String>, body: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self {
            name: name.into(),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Rc::ptr_eq(&self.body, &other.body)
    }
}

/// A value stored in a namespace.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Function(Function),
    Namespace(Namespace),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_namespace(&self) -> Option<&Namespace> {
        match self {
            Value::Namespace(ns) => Some(ns),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(num) => Value::Number(num.as_f64().unwrap_or_default()),
            serde_json::Value::String(text) => Value::Text(text),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let mut ns = Namespace::new();
                for (key, item) in map {
                    ns.entries.insert(key, Value::from(item));
                }
                Value::Namespace(ns)
            }
        }
    }
}

/// Dotted-path registry. Intermediate segments are namespaces created on demand.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Namespace {
    entries: BTreeMap<String, Value>,
    sealed: BTreeSet<String>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` at `path`. Existing leaves and sealed paths reject the write.
    pub fn add(&mut self, path: &str, value: Value, sealed: bool) -> Result<(), NamespaceError> {
        if path.is_empty() {
            return Ok(());
        }
        if self.is_sealed(path) {
            return Err(NamespaceError::Sealed(path.to_string()));
        }

        let mut segments: Vec<&str> = path.split('.').collect();
        let leaf = segments.pop().unwrap_or(path);
        let mut target = &mut *self;
        for segment in segments {
            let node = target
                .entries
                .entry(segment.to_string())
                .or_insert_with(|| Value::Namespace(Namespace::new()));
            target = match node {
                Value::Namespace(ns) => ns,
                _ => return Err(NamespaceError::Conflict(path.to_string())),
            };
        }
        if target.entries.contains_key(leaf) {
            return Err(NamespaceError::Conflict(path.to_string()));
        }
        target.entries.insert(leaf.to_string(), value);
        if sealed {
            self.sealed.insert(path.to_string());
        }
        Ok(())
    }

    pub fn add_sealed(&mut self, path: &str, value: Value) -> Result<(), NamespaceError> {
        self.add(path, value, true)
    }

    /// Register a function under its own name.
    pub fn add_function(&mut self, func: Function, sealed: bool) -> Result<(), NamespaceError> {
        let name = func.name().to_string();
        self.add(&name, Value::Function(func), sealed)
    }

    /// Flatten a mapping, one `add` per key.
    pub fn add_mapping<I, K>(&mut self, mapping: I, sealed: bool) -> Result<(), NamespaceError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (key, value) in mapping {
            self.add(key.as_ref(), value, sealed)?;
        }
        Ok(())
    }

    /// Look up a dotted path. Unknown paths yield `None`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.entries.get(first)?;
        for segment in segments {
            current = current.as_namespace()?.entries.get(segment)?;
        }
        Some(current)
    }

    pub fn is_sealed(&self, path: &str) -> bool {
        self.sealed.iter().any(|sealed| {
            path == sealed.as_str()
                || path
                    .strip_prefix(sealed.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn util() -> Function {
        Function::new("util", |_| Value::from("util"))
    }

    #[test]
    fn creates_intermediate_nodes() {
        let mut ns = Namespace::new();
        ns.add("ui.controls.button", Value::from(1.0), false).unwrap();
        assert!(ns.lookup("ui.controls").and_then(Value::as_namespace).is_some());
        assert_eq!(ns.lookup("ui.controls.button"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn existing_leaf_is_a_conflict() {
        let mut ns = Namespace::new();
        ns.add("a.b", Value::from("x"), false).unwrap();
        assert_eq!(
            ns.add("a.b", Value::from("y"), false),
            Err(NamespaceError::Conflict("a.b".into()))
        );
        assert_eq!(
            ns.add("a.b.c", Value::from("z"), false),
            Err(NamespaceError::Conflict("a.b.c".into()))
        );
    }

    #[test]
    fn sealed_path_rejects_writes_and_keeps_value() {
        let mut ns = Namespace::new();
        let original = util();
        ns.add("core.util", Value::Function(original.clone()), true)
            .unwrap();
        ns.add_sealed("core.tools", Value::Null).unwrap();
        assert!(ns.add("core.tools", Value::from("other"), false).is_err());
        assert_eq!(
            ns.add("core.tools.x", Value::from("other"), false),
            Err(NamespaceError::Sealed("core.tools.x".into()))
        );
        assert!(ns.add("core.util", Value::from("other"), false).is_err());
        assert_eq!(
            ns.lookup("core.util").and_then(Value::as_function),
            Some(&original)
        );
    }

    #[test]
    fn seal_flag_on_add_function_seals_the_name() {
        let mut ns = Namespace::new();
        ns.add_function(util(), true).unwrap();
        assert!(ns.is_sealed("util"));
        assert_eq!(
            ns.add("util", Value::Null, false),
            Err(NamespaceError::Sealed("util".into()))
        );
    }

    #[test]
    fn mapping_is_flattened() {
        let mut ns = Namespace::new();
        ns.add_mapping([("one", Value::from(1.0)), ("two", Value::from(2.0))], false)
            .unwrap();
        assert_eq!(ns.keys().collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn lookup_of_missing_path_is_none() {
        let ns = Namespace::new();
        assert!(ns.lookup("missing.deeply.nested").is_none());
        assert!(ns.lookup("").is_none());
        assert!(ns.is_empty());
    }

    #[test]
    fn json_objects_become_namespaces() {
        let value = Value::from(serde_json::json!({"title": "grid", "rows": [1, 2]}));
        let ns = value.as_namespace().expect("object maps to namespace");
        assert_eq!(ns.lookup("title").and_then(Value::as_text), Some("grid"));
        assert_eq!(ns.len(), 2);
    }
}
