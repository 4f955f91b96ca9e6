use crate::context::Context;
use crate::json::JsonValue;
pub use serde_yaml::Value as YamlValue;


impl From<&YamlValue> for Context {
    fn from(value: &YamlValue) -> Self {
        Context::from(to_json(value))
    }
}

impl From<YamlValue> for Context {
    fn from(value: YamlValue) -> Self {
        Context::from(&value)
    }
}

/// Mapping keys that are not strings are stringified; tags are dropped.
pub(crate) fn to_json(value: &YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(*b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(JsonValue::Null, JsonValue::Number)
            }
        },
        YamlValue::String(s) => JsonValue::String(s.clone()),
        YamlValue::Sequence(seq) => JsonValue::Array(
            seq.iter()
                .map(to_json)
                .collect::<_>()
        ),
        YamlValue::Mapping(mapping) => JsonValue::Object(
            mapping.iter()
                .filter_map(|(key, value)| {
                    let key = match key {
                        YamlValue::String(s) => s.clone(),
                        YamlValue::Number(n) => n.to_string(),
                        YamlValue::Bool(b) => b.to_string(),
                        _ => return None
                    };
                    Some((key, to_json(value)))
                })
                .collect::<_>()
        ),
        YamlValue::Tagged(tagged) => to_json(&tagged.value),
    }
}
