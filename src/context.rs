use serde_json::Map;
use crate::eval::{array_index, Value};
use crate::json::JsonValue;
use crate::sandbox::is_denied;


/// The data a render sees: a flat mapping of own keys to values.
///
/// Lookups never consult anything but the keys stored here, and a path that
/// mentions a denied name resolves to undefined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, JsonValue>,
}

impl Context {
    pub fn new() -> Self {
        Context { values: Map::new() }
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Copies every key of `other` over this context.
    pub fn merge(&mut self, other: Context) {
        self.values.extend(other.values);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolves a property path through own properties only. Missing steps
    /// give undefined rather than an error.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Value {
        if path.iter().any(|name| is_denied(name.as_ref())) {
            return Value::Undefined;
        }
        let mut names = path.iter().map(|name| -> &str { name.as_ref() });
        let mut current = match names.next().and_then(|first| self.values.get(first)) {
            Some(value) => value,
            None => return Value::Undefined
        };
        while let Some(name) = names.next() {
            let next = match current {
                JsonValue::Object(map) => map.get(name),
                JsonValue::Array(items) => array_index(name).and_then(|i| items.get(i)),
                _ => None
            };
            match next {
                Some(value) => current = value,
                None => {
                    // `length` and string indices are derived, not stored.
                    let mut value = match (current, name) {
                        (JsonValue::Array(items), "length") => Value::Number(items.len() as f64),
                        (JsonValue::Object(_) | JsonValue::Array(_), _) => return Value::Undefined,
                        _ => own_member(Value::from(current), name)
                    };
                    for name in names.by_ref() {
                        value = own_member(value, name);
                    }
                    return value;
                }
            }
        }
        Value::from(current)
    }

    pub fn lookup_dotted(&self, dotted: &str) -> Value {
        self.lookup(&dotted.split('.').collect::<Vec<_>>())
    }
}

// A falsy step ends the path, so `''.length` is undefined here.
fn own_member(value: Value, name: &str) -> Value {
    if !value.is_truthy() {
        return Value::Undefined;
    }
    value.member(name).unwrap_or(Value::Undefined)
}

impl From<Map<String, JsonValue>> for Context {
    fn from(values: Map<String, JsonValue>) -> Self {
        Context { values }
    }
}

/// Anything but an object gives an empty context.
impl From<JsonValue> for Context {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(values) => Context { values },
            _ => Context::new()
        }
    }
}

impl From<&JsonValue> for Context {
    fn from(value: &JsonValue) -> Self {
        Context::from(value.clone())
    }
}
