//! Flattening of nested driver responses into single-level mappings.
//!
//! Paths are joined with a separator and are not escaped: a key that
//! already contains the separator produces a composite key that cannot be
//! split back unambiguously.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Separator used for driver result keys.
pub const RESULT_SEPARATOR: &str = "__";

/// Flatten `value` into `(composite_key, leaf)` pairs.
///
/// Objects contribute their keys in insertion order, arrays their indices.
/// Empty containers contribute nothing. A scalar root yields a single pair
/// with an empty key.
pub fn flatten<'a>(value: &'a Value, separator: &'a str) -> Flatten<'a> {
    Flatten {
        root: value,
        separator,
    }
}

/// Restartable view over the flattened pairs of a value.
///
/// Each call to `iter()` (or `into_iter()`) starts a fresh traversal.
#[derive(Debug, Clone, Copy)]
pub struct Flatten<'a> {
    root: &'a Value,
    separator: &'a str,
}

impl<'a> Flatten<'a> {
    pub fn iter(&self) -> FlattenIter<'a> {
        FlattenIter {
            root: Some(self.root),
            separator: self.separator,
            stack: Vec::new(),
        }
    }
}

impl<'a> IntoIterator for Flatten<'a> {
    type Item = (String, &'a Value);
    type IntoIter = FlattenIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

enum Children<'a> {
    Object(serde_json::map::Iter<'a>),
    Array(std::iter::Enumerate<std::slice::Iter<'a, Value>>),
}

impl<'a> Children<'a> {
    fn of(value: &'a Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Children::Object(map.iter())),
            Value::Array(items) => Some(Children::Array(items.iter().enumerate())),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<(String, &'a Value)> {
        match self {
            Children::Object(iter) => iter.next().map(|(k, v)| (k.clone(), v)),
            Children::Array(iter) => iter.next().map(|(i, v)| (i.to_string(), v)),
        }
    }
}

/// Depth-first iterator produced by [`Flatten`].
pub struct FlattenIter<'a> {
    root: Option<&'a Value>,
    separator: &'a str,
    /// Open containers with the path that leads to them (`None` for the root).
    stack: Vec<(Option<String>, Children<'a>)>,
}

impl<'a> Iterator for FlattenIter<'a> {
    type Item = (String, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(root) = self.root.take() {
            match Children::of(root) {
                Some(children) => self.stack.push((None, children)),
                None => return Some((String::new(), root)),
            }
        }

        loop {
            let (prefix, children) = self.stack.last_mut()?;
            let Some((key, value)) = children.next() else {
                self.stack.pop();
                continue;
            };

            let path = match prefix {
                Some(prefix) => format!("{}{}{}", prefix, self.separator, key),
                None => key,
            };

            match Children::of(value) {
                Some(children) => self.stack.push((Some(path), children)),
                None => return Some((path, value)),
            }
        }
    }
}

/// Flat, insertion-ordered output of one driver invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultMapping(Map<String, Value>);

impl ResultMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a nested response with [`RESULT_SEPARATOR`].
    pub fn from_response(response: &Value) -> Self {
        flatten(response, RESULT_SEPARATOR)
            .into_iter()
            .map(|(key, value)| (key, value.clone()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Keys prefixed with `namespace` and the result separator, for callers
    /// that persist results of several drivers side by side.
    pub fn namespaced<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = (String, &'a Value)> + 'a {
        self.0
            .iter()
            .map(move |(key, value)| (format!("{}{}{}", namespace, RESULT_SEPARATOR, key), value))
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl FromIterator<(String, Value)> for ResultMapping {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
