use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Keys Gemini's OpenAPI-subset `responseSchema` rejects.
const UNSUPPORTED_KEYS: &[&str] = &[
    "$schema",
    "definitions",
    "title",
    "additionalProperties",
    "default",
    "examples",
    "minimum",
    "maximum",
];

/// Types usable as Gemini structured output.
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a Gemini-compatible `responseSchema` for this type.
    ///
    /// Gemini wants:
    /// 1. Fully inlined schemas (no `$ref`)
    /// 2. `nullable: true` instead of `["T", "null"]` type unions
    /// 3. None of the JSON Schema keywords in [`UNSUPPORTED_KEYS`]
    fn gemini_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        let definitions = value.get("definitions").cloned().unwrap_or(Value::Null);
        inline_refs(&mut value, &definitions);
        normalize(&mut value);

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_path)) = map.get("$ref").cloned() {
                let type_name = ref_path.trim_start_matches("#/definitions/");
                if let Some(def) = definitions.get(type_name) {
                    *value = def.clone();
                    inline_refs(value, definitions);
                    return;
                }
            }

            if let Some(Value::Array(all_of)) = map.get("allOf").cloned() {
                if let [single] = all_of.as_slice() {
                    *value = single.clone();
                    inline_refs(value, definitions);
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs(v, definitions);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs(item, definitions);
            }
        }
        _ => {}
    }
}

fn normalize(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in UNSUPPORTED_KEYS {
                map.remove(*key);
            }
            collapse_nullable_type(map);
            collapse_nullable_any_of(map);
            if map.get("type").and_then(Value::as_str) != Some("string") {
                map.remove("format");
            }

            for (key, v) in map.iter_mut() {
                // Property names are data, not schema keywords.
                match (key.as_str(), v) {
                    ("properties", Value::Object(props)) => {
                        for (_, prop) in props.iter_mut() {
                            normalize(prop);
                        }
                    }
                    (_, v) => normalize(v),
                }
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                normalize(item);
            }
        }
        _ => {}
    }
}

/// `"type": ["string", "null"]` → `"type": "string", "nullable": true`
fn collapse_nullable_type(map: &mut Map<String, Value>) {
    let Some(Value::Array(types)) = map.get("type").cloned() else {
        return;
    };
    let non_null: Vec<Value> = types
        .iter()
        .filter(|t| t.as_str() != Some("null"))
        .cloned()
        .collect();
    if non_null.len() == 1 && non_null.len() < types.len() {
        map.insert("type".to_string(), non_null[0].clone());
        map.insert("nullable".to_string(), Value::Bool(true));
    }
}

/// `anyOf: [{...}, {"type": "null"}]` → `{..., "nullable": true}`
fn collapse_nullable_any_of(map: &mut Map<String, Value>) {
    let Some(Value::Array(options)) = map.get("anyOf").cloned() else {
        return;
    };
    let non_null: Vec<&Value> = options
        .iter()
        .filter(|o| o.get("type").and_then(Value::as_str) != Some("null"))
        .collect();
    if let [inner] = non_null.as_slice() {
        if non_null.len() < options.len() {
            if let Value::Object(inner_map) = (*inner).clone() {
                map.remove("anyOf");
                for (k, v) in inner_map {
                    map.entry(k).or_insert(v);
                }
                map.insert("nullable".to_string(), Value::Bool(true));
            }
        }
    }
}
