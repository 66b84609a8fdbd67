// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script parameters: JSON parameter maps, `getParameterDefinitions()` output,
//! and the conversions between JSON and interpreter values

use crate::error::{KernelError, Result};
use crate::script::{Object, Value};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};

/// One entry of a script's `getParameterDefinitions()` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub initial: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl ParameterDefinition {
    /// Read a definition object; checkboxes carry their default in `checked`
    fn from_json(entry: &Json) -> Result<Self> {
        let object = entry.as_object().ok_or_else(|| {
            KernelError::Execution(format!("parameter definition must be an object, got {}", entry))
        })?;
        let name = object
            .get("name")
            .and_then(Json::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| KernelError::Execution("parameter definition without a name".into()))?;
        let kind = object.get("type").and_then(Json::as_str).unwrap_or("text");
        let initial = ["initial", "checked", "default"]
            .iter()
            .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
            .cloned()
            .unwrap_or(Json::Null);
        let caption = ["caption", "label"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Json::as_str))
            .map(str::to_string);

        Ok(Self {
            name: name.to_string(),
            kind: kind.to_string(),
            initial,
            caption,
        })
    }
}

/// Parse the array returned by `getParameterDefinitions()`
pub fn definitions_from_json(value: &Json) -> Result<Vec<ParameterDefinition>> {
    match value {
        Json::Null => Ok(Vec::new()),
        Json::Array(entries) => entries.iter().map(ParameterDefinition::from_json).collect(),
        other => Err(KernelError::Execution(format!(
            "getParameterDefinitions must return an array, got {}",
            other
        ))),
    }
}

/// Parameter map holding every definition's initial value
pub fn defaults_from_definitions(definitions: &[ParameterDefinition]) -> Json {
    let defaults: Map<String, Json> = definitions
        .iter()
        .filter(|d| !d.initial.is_null())
        .map(|d| (d.name.clone(), d.initial.clone()))
        .collect();
    Json::Object(defaults)
}

/// Overlay `overrides` on `defaults`; non-object overrides replace the defaults entirely
pub fn merge_params(defaults: Json, overrides: Json) -> Json {
    match (defaults, overrides) {
        (Json::Object(mut base), Json::Object(top)) => {
            base.extend(top);
            Json::Object(base)
        }
        (base, Json::Null) => base,
        (_, top) => top,
    }
}

pub fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::string(s),
        Json::Array(items) => Value::array(items.iter().map(json_to_value).collect()),
        Json::Object(map) => {
            let mut object = Object::new();
            for (key, value) in map {
                object.set(key, json_to_value(value));
            }
            Value::object(object)
        }
    }
}

/// JSON form of a script value; functions, geometry and non-finite numbers become null
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Undefined | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Json::from(*n as i64),
        Value::Number(n) => Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null),
        Value::Str(s) => Json::String(s.to_string()),
        Value::Array(items) => Json::Array(items.borrow().iter().map(value_to_json).collect()),
        Value::Object(object) => Json::Object(
            object
                .borrow()
                .iter()
                .map(|(key, value)| (key.to_string(), value_to_json(value)))
                .collect(),
        ),
        Value::Function(_) | Value::Native(_) | Value::Geometry(_) => Json::Null,
    }
}
