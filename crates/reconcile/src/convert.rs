//! Flatten/expand between native object graphs and engine attributes
//!
//! Upstream API clients speak nested JSON-like objects; the engine speaks
//! schema-addressed [`Attributes`]. [`expand`] builds the native request body
//! from attributes before a Create/Update call goes out, [`flatten`] projects
//! a native response back onto the schema after a Read.
//!
//! The projection is lossy on purpose: native fields the schema does not
//! describe are dropped. For anything the schema can represent,
//! `flatten(expand(x)) == x` up to set ordering.
//!
//! Blocks with `max_items = 1` expand to a single object rather than a
//! one-element array, and flatten accepts either form. An empty single block
//! stays an empty array so it survives the round trip.

use crate::error::ConvertError;
use crate::schema::{NestingMode, Schema, Type};
use crate::value::{Attributes, Value, join_path};
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::BTreeMap;

/// Build a native object from attributes
pub fn expand(attributes: &Attributes, schema: &Schema) -> JsonValue {
    let mut object = Map::new();
    for (name, attr) in schema.iter() {
        if let Some(value) = attributes.get(name)
            && let Some(native) = expand_value(&attr.ty, attr.max_items, value)
        {
            object.insert(name.clone(), native);
        }
    }
    JsonValue::Object(object)
}

fn expand_value(ty: &Type, max_items: Option<usize>, value: &Value) -> Option<JsonValue> {
    match (ty, value) {
        (Type::Block { schema, .. }, Value::List(items) | Value::Set(items)) => {
            let blocks: Vec<JsonValue> = items
                .iter()
                .filter_map(|item| item.as_block().map(|attrs| expand(attrs, schema)))
                .collect();
            match (max_items, blocks.len()) {
                (Some(1), 1) => blocks.into_iter().next(),
                _ => Some(JsonValue::Array(blocks)),
            }
        }
        (Type::List(elem) | Type::Set(elem), Value::List(items) | Value::Set(items)) => Some(
            JsonValue::Array(
                items
                    .iter()
                    .filter_map(|item| expand_value(elem, None, item))
                    .collect(),
            ),
        ),
        (_, Value::Bool(b)) => Some(JsonValue::Bool(*b)),
        (_, Value::Int(i)) => Some(JsonValue::from(*i)),
        (_, Value::Float(f)) => Number::from_f64(*f).map(JsonValue::Number),
        (_, Value::String(s)) => Some(JsonValue::String(s.clone())),
        (_, Value::Map(entries)) => Some(JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect(),
        )),
        _ => None,
    }
}

/// Project a native object onto the schema
pub fn flatten(native: &JsonValue, schema: &Schema) -> Result<Attributes, ConvertError> {
    flatten_at("", native, schema)
}

fn flatten_at(prefix: &str, native: &JsonValue, schema: &Schema) -> Result<Attributes, ConvertError> {
    let Some(object) = native.as_object() else {
        let path = if prefix.is_empty() { "<root>" } else { prefix };
        return Err(mismatch(path, "object", native));
    };

    let mut attributes = Attributes::new();
    for (name, attr) in schema.iter() {
        match object.get(name) {
            None | Some(JsonValue::Null) => {}
            Some(field) => {
                let path = join_path(prefix, name);
                attributes.insert(name.clone(), flatten_value(&path, &attr.ty, field)?);
            }
        }
    }
    Ok(attributes)
}

fn flatten_value(path: &str, ty: &Type, native: &JsonValue) -> Result<Value, ConvertError> {
    match ty {
        Type::Bool => native
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| mismatch(path, "bool", native)),
        Type::Int => native
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| mismatch(path, "int", native)),
        Type::Float => native
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| mismatch(path, "float", native)),
        Type::String => scalar_string(native)
            .map(Value::String)
            .ok_or_else(|| mismatch(path, "string", native)),
        Type::Map => {
            let object = native
                .as_object()
                .ok_or_else(|| mismatch(path, "map", native))?;
            let mut entries = BTreeMap::new();
            for (key, value) in object {
                let entry = scalar_string(value)
                    .ok_or_else(|| mismatch(&join_path(path, key), "string", value))?;
                entries.insert(key.clone(), entry);
            }
            Ok(Value::Map(entries))
        }
        Type::List(elem) => {
            let items = flatten_items(path, elem, native)?;
            Ok(Value::List(items))
        }
        Type::Set(elem) => {
            let items = flatten_items(path, elem, native)?;
            Ok(Value::set(items))
        }
        Type::Block { schema, mode } => {
            let elements: Vec<&JsonValue> = match native {
                JsonValue::Array(items) => items.iter().collect(),
                JsonValue::Object(_) => vec![native],
                other => return Err(mismatch(path, "block", other)),
            };
            let blocks = elements
                .into_iter()
                .enumerate()
                .map(|(index, element)| {
                    flatten_at(&join_path(path, &index.to_string()), element, schema).map(Value::Block)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match mode {
                NestingMode::List => Value::List(blocks),
                NestingMode::Set => Value::set(blocks),
            })
        }
    }
}

fn flatten_items(path: &str, elem: &Type, native: &JsonValue) -> Result<Vec<Value>, ConvertError> {
    let items = native
        .as_array()
        .ok_or_else(|| mismatch(path, "array", native))?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| flatten_value(&join_path(path, &index.to_string()), elem, item))
        .collect()
}

/// Upstream APIs often return numeric ids and flags where strings are expected
fn scalar_string(native: &JsonValue) -> Option<String> {
    match native {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn mismatch(path: &str, expected: &str, got: &JsonValue) -> ConvertError {
    let got = match got {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    };
    ConvertError::new(path, format!("expected {expected}, got {got}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn schema() -> Schema {
        let network = Schema::new()
            .attribute("address", Attribute::required(Type::String))
            .attribute("mtu", Attribute::optional(Type::Int));
        let rule = Schema::new()
            .attribute("port", Attribute::required(Type::Int))
            .attribute("cidrs", Attribute::optional(Type::list(Type::String)));

        Schema::new()
            .attribute("name", Attribute::required(Type::String))
            .attribute("enabled", Attribute::optional(Type::Bool))
            .attribute("weight", Attribute::optional(Type::Float))
            .attribute("tags", Attribute::optional(Type::Map))
            .attribute("ports", Attribute::optional(Type::set(Type::Int)))
            .attribute("network", Attribute::optional(Type::list_block(network)).max_items(1))
            .attribute("rules", Attribute::optional(Type::set_block(rule)))
            .attribute("id", Attribute::computed(Type::String))
    }

    fn sample() -> Attributes {
        let rule = |port: i64, cidr: &str| {
            Value::block(
                Attributes::new()
                    .with("port", port)
                    .with("cidrs", Value::list(vec![Value::from(cidr)])),
            )
        };
        Attributes::new()
            .with("name", "web")
            .with("enabled", true)
            .with("weight", 0.5)
            .with("tags", Value::map([("env", "prod"), ("team", "core")]))
            .with("ports", Value::set(vec![Value::Int(443), Value::Int(80)]))
            .with(
                "network",
                Value::list(vec![Value::block(
                    Attributes::new().with("address", "10.0.0.1").with("mtu", 1500_i64),
                )]),
            )
            .with(
                "rules",
                Value::set(vec![rule(22, "10.0.0.0/8"), rule(80, "0.0.0.0/0")]),
            )
    }

    fn round_trip(attrs: &Attributes, schema: &Schema) -> Attributes {
        flatten(&expand(attrs, schema), schema).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let schema = schema();
        let attrs = sample();
        assert_eq!(round_trip(&attrs, &schema), attrs);
    }

    #[test]
    fn test_round_trip_boundary_values() {
        let schema = schema();
        let cases = vec![
            ("minimal", Attributes::new()),
            ("false flag", Attributes::new().with("enabled", false)),
            ("zero weight", Attributes::new().with("weight", 0.0)),
            ("negative weight", Attributes::new().with("weight", -12.25)),
            ("empty name", Attributes::new().with("name", "")),
            ("unicode name", Attributes::new().with("name", "naïve 名前")),
            ("empty map", Attributes::new().with("tags", Value::Map(BTreeMap::new()))),
            ("empty set", Attributes::new().with("ports", Value::set(vec![]))),
            ("int extremes", Attributes::new().with("ports", Value::set(vec![Value::Int(i64::MIN), Value::Int(i64::MAX)]))),
            ("empty single block", Attributes::new().with("network", Value::list(vec![]))),
            ("empty block set", Attributes::new().with("rules", Value::set(vec![]))),
            (
                "block with empty list",
                Attributes::new().with(
                    "rules",
                    Value::set(vec![Value::block(
                        Attributes::new().with("port", 1_i64).with("cidrs", Value::list(vec![])),
                    )]),
                ),
            ),
            (
                "single block without optional",
                Attributes::new().with(
                    "network",
                    Value::list(vec![Value::block(Attributes::new().with("address", "10.0.0.1"))]),
                ),
            ),
        ];
        for (name, attrs) in cases {
            let attrs = if attrs.contains_key("name") { attrs } else { attrs.with("name", "web") };
            assert!(schema.validate(&attrs).is_ok(), "{name} is not valid");
            assert_eq!(round_trip(&attrs, &schema), attrs, "{name}");
        }
    }

    #[test]
    fn test_round_trip_normalizes_int_under_float() {
        let schema = schema();
        let attrs = Attributes::new().with("weight", 3_i64);
        assert!(schema.validate(&attrs.clone().with("name", "x")).is_ok());
        assert_eq!(round_trip(&attrs, &schema), schema.apply_defaults(&attrs));
        assert_eq!(round_trip(&attrs, &schema).get("weight"), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_round_trip_nested_computed_fields() {
        let rule = Schema::new()
            .attribute("port", Attribute::required(Type::Int))
            .attribute("rule_id", Attribute::computed(Type::String));
        let schema = Schema::new().attribute("rules", Attribute::optional(Type::set_block(rule)));
        let attrs = Attributes::new().with(
            "rules",
            Value::set(vec![
                Value::block(Attributes::new().with("port", 22_i64).with("rule_id", "r-1")),
                Value::block(Attributes::new().with("port", 80_i64)),
            ]),
        );
        assert_eq!(round_trip(&attrs, &schema), attrs);
    }

    #[test]
    fn test_empty_single_block_expands_to_empty_array() {
        let attrs = Attributes::new().with("network", Value::list(vec![]));
        assert_eq!(expand(&attrs, &schema())["network"], json!([]));
    }

    #[test]
    fn test_single_block_expands_to_object() {
        let native = expand(&sample(), &schema());
        assert_eq!(native["network"], json!({"address": "10.0.0.1", "mtu": 1500}));
        assert!(native["rules"].is_array());
    }

    #[test]
    fn test_flatten_drops_unknown_fields() {
        let native = json!({
            "name": "web",
            "created_at": "2024-01-01",
            "network": {"address": "10.0.0.1", "gateway": "10.0.0.254"}
        });
        let attrs = flatten(&native, &schema()).unwrap();
        assert!(!attrs.contains_key("created_at"));
        assert_eq!(attrs.get_path("network.0.address"), Some(Value::from("10.0.0.1")));
        assert_eq!(attrs.get_path("network.0.gateway"), None);
    }

    #[test]
    fn test_flatten_canonicalizes_sets() {
        let a = flatten(&json!({"name": "x", "ports": [443, 80, 80]}), &schema()).unwrap();
        let b = flatten(&json!({"name": "x", "ports": [80, 443]}), &schema()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get("ports").unwrap().as_items().unwrap().len(), 2);
    }

    #[test]
    fn test_flatten_null_is_absent() {
        let attrs = flatten(&json!({"name": "x", "tags": null}), &schema()).unwrap();
        assert!(!attrs.contains_key("tags"));
    }

    #[test]
    fn test_flatten_coerces_scalars_to_string() {
        let attrs = flatten(&json!({"name": 42, "id": 9001}), &schema()).unwrap();
        assert_eq!(attrs.get("name"), Some(&Value::from("42")));
        assert_eq!(attrs.get("id"), Some(&Value::from("9001")));
    }

    #[test]
    fn test_flatten_type_mismatch_has_path() {
        let err = flatten(&json!({"name": "x", "network": {"mtu": "big"}}), &schema()).unwrap_err();
        assert_eq!(err.path, "network.0.mtu");
    }

    #[test]
    fn test_flatten_requires_object() {
        let err = flatten(&json!([1, 2]), &schema()).unwrap_err();
        assert_eq!(err.path, "<root>");
    }
}
