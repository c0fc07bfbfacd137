//! Unit Converter Tool
//!
//! Converts between units of length, weight and temperature. Linear units
//! go through a base unit (meters, grams); temperature scales get their own
//! affine conversions.

use assistant_core::{
    error::Result,
    tool::{ParamType, ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema},
};
use async_trait::async_trait;
use serde_json::json;

/// Factor to the category's base unit, or None for unknown units
fn length_factor(unit: &str) -> Option<f64> {
    // Base: meters
    Some(match unit {
        "mm" => 0.001,
        "cm" => 0.01,
        "m" => 1.0,
        "km" => 1000.0,
        "in" => 0.0254,
        "ft" => 0.3048,
        "yd" => 0.9144,
        "mi" => 1609.34,
        _ => return None,
    })
}

fn weight_factor(unit: &str) -> Option<f64> {
    // Base: grams
    Some(match unit {
        "mg" => 0.001,
        "g" => 1.0,
        "kg" => 1000.0,
        "oz" => 28.3495,
        "lb" => 453.592,
        _ => return None,
    })
}

fn is_temperature(unit: &str) -> bool {
    matches!(unit, "c" | "f" | "k")
}

fn convert_temperature(value: f64, from_unit: &str, to_unit: &str) -> f64 {
    let celsius = match from_unit {
        "f" => (value - 32.0) * 5.0 / 9.0,
        "k" => value - 273.15,
        _ => value,
    };
    match to_unit {
        "f" => celsius * 9.0 / 5.0 + 32.0,
        "k" => celsius + 273.15,
        _ => celsius,
    }
}

/// Converts a value between measurement units
pub struct UnitConverterTool;

impl UnitConverterTool {
    fn convert(value: f64, from_unit: &str, to_unit: &str) -> Option<(f64, &'static str)> {
        if let (Some(from), Some(to)) = (length_factor(from_unit), length_factor(to_unit)) {
            return Some((value * from / to, "length"));
        }
        if let (Some(from), Some(to)) = (weight_factor(from_unit), weight_factor(to_unit)) {
            return Some((value * from / to, "weight"));
        }
        if is_temperature(from_unit) && is_temperature(to_unit) {
            return Some((convert_temperature(value, from_unit, to_unit), "temperature"));
        }
        None
    }
}

#[async_trait]
impl Tool for UnitConverterTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "unit_converter".into(),
            description: "Convert between different units of measurement".into(),
            parameters: vec![
                ParameterSchema {
                    name: "value".into(),
                    param_type: ParamType::Number,
                    description: "Numeric value to convert".into(),
                    required: true,
                    default: None,
                    enum_values: None,
                },
                ParameterSchema::required_string(
                    "from_unit",
                    "Source unit (e.g., 'km', 'lb', 'c')",
                ),
                ParameterSchema::required_string(
                    "to_unit",
                    "Target unit (e.g., 'mi', 'kg', 'f')",
                ),
            ],
            category: Some("computation".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let Some(value) = call.arguments.get("value").and_then(serde_json::Value::as_f64)
        else {
            return Ok(ToolResult::failure("Parameter 'value' must be a number"));
        };
        let from_unit = call
            .arguments
            .get("from_unit")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_lowercase();
        let to_unit = call
            .arguments
            .get("to_unit")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_lowercase();

        match Self::convert(value, &from_unit, &to_unit) {
            Some((result, category)) => Ok(ToolResult::success(json!({
                "original_value": value,
                "from_unit": from_unit,
                "to_unit": to_unit,
                "result": result,
                "category": category,
            }))),
            None => Ok(ToolResult::failure(format!(
                "Cannot convert from '{from_unit}' to '{to_unit}'"
            ))),
        }
    }
}
