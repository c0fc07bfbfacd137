//! JSON Processor Tool
//!
//! Parses a JSON payload and applies one of a small set of operations:
//! pretty-printing, key listing, filtering, counting or flattening.

use assistant_core::{
    error::Result,
    tool::{ParamType, ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema},
};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Processes, filters and reshapes JSON data
pub struct JsonProcessorTool;

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn pretty_print(data: &Value) -> Value {
    json!(serde_json::to_string_pretty(data).unwrap_or_default())
}

fn list_keys(data: &Value) -> Value {
    match data {
        Value::Object(map) => json!(map.keys().collect::<Vec<_>>()),
        Value::Array(items) => match items.first() {
            Some(Value::Object(map)) => json!(map.keys().collect::<Vec<_>>()),
            _ => json!("Data is not a dictionary or list of dictionaries"),
        },
        _ => json!("Data is not a dictionary or list of dictionaries"),
    }
}

fn filter(data: &Value, key: &str, value: Option<&str>) -> Value {
    match data {
        Value::Array(items) => {
            let kept: Vec<&Value> = items
                .iter()
                .filter(|item| match value {
                    Some(wanted) => item.get(key).and_then(Value::as_str) == Some(wanted),
                    None => item.get(key).is_some(),
                })
                .collect();
            json!(kept)
        }
        Value::Object(map) => match map.get(key) {
            Some(found) => json!({ key: found }),
            None => json!({}),
        },
        _ => json!("Cannot filter this data type"),
    }
}

fn count(data: &Value) -> Value {
    match data {
        Value::Array(items) => json!(items.len()),
        Value::Object(map) => json!(map.len()),
        _ => json!(1),
    }
}

fn flatten(data: &Value) -> Value {
    match data {
        Value::Array(items) => {
            let mut flat = Vec::new();
            for item in items {
                match item {
                    Value::Object(map) => {
                        for (key, value) in map {
                            flat.push(json!({ "key": key, "value": value }));
                        }
                    }
                    other => flat.push(json!({ "value": other })),
                }
            }
            json!(flat)
        }
        _ => json!("Cannot flatten non-list data"),
    }
}

#[async_trait]
impl Tool for JsonProcessorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "json_processor".into(),
            description: "Process, filter, and manipulate JSON data".into(),
            parameters: vec![
                ParameterSchema::required_string("json_data", "JSON payload to process"),
                ParameterSchema {
                    name: "operation".into(),
                    param_type: ParamType::String,
                    description: "Operation to apply".into(),
                    required: false,
                    default: Some(json!("pretty_print")),
                    enum_values: Some(vec![
                        json!("pretty_print"),
                        json!("keys"),
                        json!("filter"),
                        json!("count"),
                        json!("flatten"),
                    ]),
                },
                ParameterSchema::optional(
                    "filter_key",
                    ParamType::String,
                    "Key to filter on (filter operation only)",
                    Value::Null,
                ),
                ParameterSchema::optional(
                    "filter_value",
                    ParamType::String,
                    "Value the filter key must equal (filter operation only)",
                    Value::Null,
                ),
            ],
            category: Some("data".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let raw = call
            .arguments
            .get("json_data")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let operation = call
            .arguments
            .get("operation")
            .and_then(|v| v.as_str())
            .unwrap_or("pretty_print");
        let filter_key = call.arguments.get("filter_key").and_then(|v| v.as_str());
        let filter_value = call.arguments.get("filter_value").and_then(|v| v.as_str());

        let data: Value = match serde_json::from_str(raw) {
            Ok(data) => data,
            Err(e) => return Ok(ToolResult::failure(format!("Invalid JSON: {e}"))),
        };

        let result = match operation {
            "pretty_print" => pretty_print(&data),
            "keys" => list_keys(&data),
            "filter" => {
                let Some(key) = filter_key else {
                    return Ok(ToolResult::failure(
                        "filter_key is required for filter operation",
                    ));
                };
                filter(&data, key, filter_value)
            }
            "count" => count(&data),
            "flatten" => flatten(&data),
            other => return Ok(ToolResult::failure(format!("Unknown operation: {other}"))),
        };

        Ok(ToolResult::success(json!({
            "operation": operation,
            "result": result,
            "original_type": type_name(&data),
        })))
    }
}
