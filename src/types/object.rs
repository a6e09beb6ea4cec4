// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::*;

/// One row of an object column: values keyed by path.
///
/// Paths iterate in sorted order.
pub type Object = BTreeMap<String, DataValue>;

/// Separator of nested keys in a path.
pub const PATH_SEPARATOR: char = '.';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonError {
    #[error("expect a JSON object, found: {0}")]
    NotAnObject(String),
    #[error("number can not be represented: {0}")]
    InvalidNumber(String),
}

/// Convert a JSON object into an [`Object`], flattening nested objects into dotted paths.
///
/// ```
/// use shapeless::types::{object_from_json, DataValue};
///
/// let object = object_from_json(&serde_json::json!({"a": {"b": 1}, "c": [true]})).unwrap();
/// assert_eq!(object["a.b"], DataValue::Int64(1));
/// assert_eq!(object["c"], DataValue::List(vec![DataValue::Bool(true)]));
/// ```
pub fn object_from_json(json: &Value) -> Result<Object, JsonError> {
    let Value::Object(map) = json else {
        return Err(JsonError::NotAnObject(json.to_string()));
    };
    let mut object = Object::new();
    flatten_into(&mut object, None, map)?;
    Ok(object)
}

fn flatten_into(
    object: &mut Object,
    prefix: Option<&str>,
    map: &Map<String, Value>,
) -> Result<(), JsonError> {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}{PATH_SEPARATOR}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => flatten_into(object, Some(&path), inner)?,
            value => {
                object.insert(path, value_from_json(value)?);
            }
        }
    }
    Ok(())
}

/// Convert a JSON value nested in an array. Objects are kept as their JSON text.
fn value_from_json(json: &Value) -> Result<DataValue, JsonError> {
    Ok(match json {
        Value::Null => DataValue::Null,
        Value::Bool(v) => DataValue::Bool(*v),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                DataValue::Int64(v)
            } else if let Some(v) = n.as_f64() {
                DataValue::Float64(F64::from(v))
            } else {
                return Err(JsonError::InvalidNumber(n.to_string()));
            }
        }
        Value::String(v) => DataValue::String(v.clone()),
        Value::Array(items) => {
            DataValue::List(items.iter().map(value_from_json).collect::<Result<_, _>>()?)
        }
        Value::Object(_) => DataValue::String(json.to_string()),
    })
}

/// Render a value as JSON. Blobs become arrays of bytes, non-finite floats become `null`.
pub fn value_to_json(value: &DataValue) -> Value {
    match value {
        DataValue::Null => Value::Null,
        DataValue::Bool(v) => Value::Bool(*v),
        DataValue::Int64(v) => Value::Number((*v).into()),
        DataValue::Float64(v) => Number::from_f64(v.0).map_or(Value::Null, Value::Number),
        DataValue::String(v) => Value::String(v.clone()),
        DataValue::Blob(v) => Value::Array(v.iter().map(|b| Value::Number((*b).into())).collect()),
        DataValue::List(v) => Value::Array(v.iter().map(value_to_json).collect()),
    }
}

/// Render an object as a flat JSON object keyed by path.
pub fn object_to_json(object: &Object) -> Value {
    Value::Object(
        object
            .iter()
            .map(|(path, value)| (path.clone(), value_to_json(value)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flatten_nested_objects() {
        let object = object_from_json(&json!({
            "a": {"b": {"c": "x"}, "d": null},
            "e": 1.5,
            "f": [{"g": 1}],
            "h": {}
        }))
        .unwrap();
        assert_eq!(
            object.keys().collect::<Vec<_>>(),
            vec!["a.b.c", "a.d", "e", "f"]
        );
        assert_eq!(object["a.d"], DataValue::Null);
        assert_eq!(object["e"], DataValue::from(1.5));
        assert_eq!(
            object["f"],
            DataValue::List(vec![DataValue::from(r#"{"g":1}"#)])
        );
    }

    #[test]
    fn not_an_object() {
        assert!(matches!(
            object_from_json(&json!([1, 2])),
            Err(JsonError::NotAnObject(_))
        ));
    }

    #[test]
    fn to_json() {
        let object = object_from_json(&json!({"a": {"b": [1, "x"]}, "c": false})).unwrap();
        assert_eq!(object_to_json(&object), json!({"a.b": [1, "x"], "c": false}));
    }
}
