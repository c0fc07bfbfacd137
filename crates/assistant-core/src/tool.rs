//! Tool System
//!
//! Extensible tool framework for agent capabilities. Tools declare their
//! parameter schemas directly; the registry validates and executes
//! invocations by name and never lets a tool's internal failure escape as an
//! uncaught fault.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    pub arguments: HashMap<String, Value>,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: HashMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Arguments serialized as a JSON object string
    pub fn arguments_json(&self) -> String {
        serde_json::to_string(&self.arguments).unwrap_or_else(|_| "{}".into())
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether execution succeeded
    pub success: bool,

    /// Structured output (present on success)
    #[serde(default)]
    pub data: Option<Value>,

    /// Error description (present on failure)
    #[serde(default)]
    pub error: Option<String>,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Serialize for injection into a tool-role message
    pub fn to_json(&self) -> Value {
        json!({
            "success": self.success,
            "data": self.data,
            "error": self.error,
            "metadata": self.metadata,
        })
    }
}

/// Semantic parameter type (JSON Schema vocabulary)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// Semantic type
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    /// Required string parameter
    pub fn required_string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParamType::String,
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    /// Optional parameter with a default value
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: Some(default),
            enum_values: None,
        }
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions, in declaration order
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,
}

impl ToolSchema {
    /// Names of parameters without a default that the caller must supply
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Convert to the function-calling JSON shape providers consume.
    ///
    /// The `required` key is present only when non-empty.
    pub fn to_function_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), json!(param.param_type.as_str()));
            prop.insert("description".into(), json!(param.description));
            if let Some(allowed) = &param.enum_values {
                prop.insert("enum".into(), json!(allowed));
            }
            properties.insert(param.name.clone(), Value::Object(prop));

            if param.required {
                required.push(param.name.clone());
            }
        }

        let mut parameters = serde_json::Map::new();
        parameters.insert("type".into(), json!("object"));
        parameters.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            parameters.insert("required".into(), json!(required));
        }

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": Value::Object(parameters),
        })
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema. Must be pure: derivable without executing
    /// the tool, and stable across calls.
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;
}

/// Registry for available tools
///
/// Tool maps are append-only during normal operation; registration happens
/// at start-up and reads are lock-free thereafter.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    categories: HashMap<String, Vec<String>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            categories: HashMap::new(),
        }
    }

    /// Register a new tool. Fails if the name is already taken.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_boxed(Arc::new(tool))
    }

    /// Register a boxed tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let schema = tool.schema();
        if self.tools.contains_key(&schema.name) {
            return Err(AgentError::DuplicateTool(schema.name));
        }

        self.order.push(schema.name.clone());
        if let Some(category) = &schema.category {
            self.categories
                .entry(category.clone())
                .or_default()
                .push(schema.name.clone());
        }
        self.tools.insert(schema.name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Execute a tool call.
    ///
    /// Total over its input: unknown tools, missing required arguments and
    /// faults raised inside the tool body all come back as failure results.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            return ToolResult::failure(
                AgentError::ToolNotFound(call.name.clone()).to_string(),
            );
        };

        let schema = tool.schema();
        let mut arguments = call.arguments.clone();

        for param in &schema.parameters {
            if arguments.contains_key(&param.name) {
                continue;
            }
            if param.required {
                return ToolResult::failure(
                    AgentError::ToolValidation(format!(
                        "Required parameter '{}' is missing",
                        param.name
                    ))
                    .to_string(),
                );
            }
            if let Some(default) = &param.default {
                arguments.insert(param.name.clone(), default.clone());
            }
        }

        let resolved = ToolCall {
            name: call.name.clone(),
            arguments,
            id: call.id.clone(),
        };

        match tool.execute(&resolved).await {
            Ok(result) => result,
            Err(e) => ToolResult::failure(format!("Tool execution failed: {}", e)),
        }
    }

    /// All tool schemas, in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.schema())
            .collect()
    }

    /// Function-calling JSON for every registered tool
    pub fn function_schemas(&self) -> Vec<Value> {
        self.schemas()
            .iter()
            .map(ToolSchema::to_function_schema)
            .collect()
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Tool names in one category
    pub fn names_in_category(&self, category: &str) -> Vec<&str> {
        self.categories
            .get(category)
            .map(|names| names.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// DateTime tool - returns current time
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "datetime".into(),
            description: "Get the current date and time".into(),
            parameters: vec![ParameterSchema {
                name: "format".into(),
                param_type: ParamType::String,
                description: "Output format: 'iso', 'human', or 'unix'".into(),
                required: false,
                default: Some(json!("human")),
                enum_values: Some(vec![json!("iso"), json!("human"), json!("unix")]),
            }],
            category: Some("system".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let format = call
            .arguments
            .get("format")
            .and_then(|v| v.as_str())
            .unwrap_or("human");

        let now = chrono::Utc::now();

        let rendered = match format {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            _ => now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
        };

        Ok(ToolResult::success(json!({
            "format": format,
            "datetime": rendered,
        })))
    }
}

/// Calculator tool - evaluates mathematical expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculator".into(),
            description: "Evaluate a mathematical expression".into(),
            parameters: vec![ParameterSchema::required_string(
                "expression",
                "Mathematical expression to evaluate (e.g., '2 + 2', '10 * 5')",
            )],
            category: Some("computation".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let expr = call
            .arguments
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::ToolValidation("Missing expression".into()))?;

        match evaluate_expression(expr) {
            Ok(result) => Ok(ToolResult::success(json!({
                "expression": expr,
                "result": result,
            }))),
            Err(e) => Ok(ToolResult::failure(e)),
        }
    }
}

/// Simple expression evaluator (for production, use meval or fasteval)
fn evaluate_expression(expr: &str) -> std::result::Result<f64, String> {
    let expr = expr.replace(' ', "");

    // Handle parentheses recursively
    if let Some(start) = expr.rfind('(') {
        if let Some(end) = expr[start..].find(')') {
            let inner = &expr[start + 1..start + end];
            let inner_result = evaluate_expression(inner)?;
            let new_expr = format!(
                "{}{}{}",
                &expr[..start],
                inner_result,
                &expr[start + end + 1..]
            );
            return evaluate_expression(&new_expr);
        }
    }

    // Addition/subtraction (lowest precedence, evaluated last)
    for (i, c) in expr.char_indices().rev() {
        if i > 0 && (c == '+' || c == '-') {
            // Make sure it's not a unary minus
            let prev_char = expr.chars().nth(i - 1).unwrap_or(' ');
            if prev_char.is_ascii_digit() || prev_char == ')' {
                let left = evaluate_expression(&expr[..i])?;
                let right = evaluate_expression(&expr[i + 1..])?;
                return Ok(if c == '+' { left + right } else { left - right });
            }
        }
    }

    // Multiplication/division
    for (i, c) in expr.char_indices().rev() {
        if c == '*' || c == '/' {
            let left = evaluate_expression(&expr[..i])?;
            let right = evaluate_expression(&expr[i + 1..])?;
            if c == '/' && right == 0.0 {
                return Err("Division by zero".into());
            }
            return Ok(if c == '*' { left * right } else { left / right });
        }
    }

    // Power
    if let Some(i) = expr.find('^') {
        let left = evaluate_expression(&expr[..i])?;
        let right = evaluate_expression(&expr[i + 1..])?;
        return Ok(left.powf(right));
    }

    // Parse number
    expr.parse::<f64>().map_err(|e| format!("Parse error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "always_fails".into(),
                description: "Raises on every call".into(),
                parameters: vec![],
                category: None,
            }
        }

        async fn execute(&self, _call: &ToolCall) -> Result<ToolResult> {
            Err(AgentError::ToolExecution("deliberate fault".into()))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Echoes its input".into(),
                parameters: vec![
                    ParameterSchema::required_string("text", "Text to echo"),
                    ParameterSchema::optional(
                        "repeat",
                        ParamType::Integer,
                        "How many times",
                        json!(1),
                    ),
                ],
                category: Some("system".into()),
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let text = call
                .arguments
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let repeat = call
                .arguments
                .get("repeat")
                .and_then(|v| v.as_u64())
                .unwrap_or(1) as usize;
            Ok(ToolResult::success(json!({ "echo": text.repeat(repeat) })))
        }
    }

    #[test]
    fn test_calculator_expressions() {
        assert!((evaluate_expression("2 + 2").unwrap() - 4.0).abs() < f64::EPSILON);
        assert!((evaluate_expression("10 * 5").unwrap() - 50.0).abs() < f64::EPSILON);
        assert!((evaluate_expression("(2 + 3) * 4").unwrap() - 20.0).abs() < f64::EPSILON);
        assert!((evaluate_expression("2 ^ 8").unwrap() - 256.0).abs() < f64::EPSILON);
        assert!(evaluate_expression("1 / 0").is_err());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool).unwrap();
        let err = registry.register(CalculatorTool).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "calculator"));
    }

    #[test]
    fn test_registry_preserves_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(DateTimeTool).unwrap();
        registry.register(CalculatorTool).unwrap();
        registry.register(EchoTool).unwrap();

        assert_eq!(registry.names(), vec!["datetime", "calculator", "echo"]);
        assert_eq!(registry.names_in_category("system"), vec!["datetime", "echo"]);
    }

    #[test]
    fn test_schema_derivation_is_idempotent() {
        let first = EchoTool.schema().to_function_schema();
        let second = EchoTool.schema().to_function_schema();
        assert_eq!(first, second);
    }

    #[test]
    fn test_function_schema_required_only_when_nonempty() {
        let with_required = EchoTool.schema().to_function_schema();
        assert_eq!(
            with_required["parameters"]["required"],
            json!(["text"])
        );

        let without_required = FailingTool.schema().to_function_schema();
        assert!(without_required["parameters"].get("required").is_none());
        assert_eq!(without_required["parameters"]["type"], json!("object"));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool_is_failure_result() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("nope", HashMap::new());
        let result = registry.execute(&call).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "Tool not found: nope");
    }

    #[tokio::test]
    async fn test_execute_missing_required_parameter() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        let call = ToolCall::new("echo", HashMap::new());
        let result = registry.execute(&call).await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.starts_with("Tool validation error:"));
        assert!(error.contains("text"));
    }

    #[tokio::test]
    async fn test_execute_applies_defaults() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        let mut args = HashMap::new();
        args.insert("text".to_string(), json!("hi"));
        let result = registry.execute(&ToolCall::new("echo", args)).await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["echo"], json!("hi"));
    }

    #[tokio::test]
    async fn test_execute_catches_tool_fault() {
        let mut registry = ToolRegistry::new();
        registry.register(FailingTool).unwrap();

        let result = registry.execute(&ToolCall::new("always_fails", HashMap::new())).await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(!error.is_empty());
        assert!(error.contains("deliberate fault"));
    }

    #[tokio::test]
    async fn test_calculator_tool_result_shape() {
        let mut args = HashMap::new();
        args.insert("expression".to_string(), json!("2+2"));
        let result = CalculatorTool.execute(&ToolCall::new("calculator", args)).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["result"], json!(4.0));
    }
}
