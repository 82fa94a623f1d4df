//! Tool trait and the registry the executor dispatches through.
//!
//! Tools are what let the model look things up instead of guessing:
//! search contract text, list ingested documents, compute deadlines.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Applied when the registry is built without an explicit timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    pub name: String,

    pub arguments: Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    pub success: bool,

    /// Text handed back to the model
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The core Tool trait.
///
/// Implementations are registered in a [`ToolRegistry`]; the registry stamps
/// the call id onto results, so tools may leave `call_id` empty.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_contract").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with arguments that already passed schema validation.
    async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The executor uses it to:
/// 1. Get tool definitions to send to the LLM
/// 2. Validate, run and time-box the calls the LLM requests
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. A later registration under the same name wins.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Tool registered twice; replacing previous handler");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Tool definitions for the LLM, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Look up, validate and run a tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        validate_arguments(&tool.parameters_schema(), &call.arguments)?;

        let mut result = tokio::time::timeout(self.timeout, tool.execute(call.arguments.clone()))
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: self.timeout.as_secs(),
            })??;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `args` against the subset of JSON Schema that tool declarations use:
/// an object root, `required`, per-property `type` and `enum`.
/// Undeclared properties pass through; `null` counts as absent.
pub fn validate_arguments(schema: &Value, args: &Value) -> std::result::Result<(), ToolError> {
    let obj = args
        .as_object()
        .ok_or_else(|| ToolError::InvalidArguments("arguments must be a JSON object".into()))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if obj.get(field).is_none_or(Value::is_null) {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required field '{field}'"
                )));
            }
        }
    }

    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in obj {
        let Some(prop) = props.get(key) else { continue };
        if value.is_null() {
            continue;
        }
        if let Some(ty) = prop.get("type").and_then(Value::as_str)
            && !matches_type(ty, value)
        {
            return Err(ToolError::InvalidArguments(format!(
                "field '{key}' must be of type {ty}"
            )));
        }
        if let Some(allowed) = prop.get("enum").and_then(Value::as_array)
            && !allowed.contains(value)
        {
            return Err(ToolError::InvalidArguments(format!(
                "field '{key}' must be one of {}",
                Value::Array(allowed.clone())
            )));
        }
    }
    Ok(())
}

fn matches_type(ty: &str, value: &Value) -> bool {
    match ty {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        // Models sometimes emit 5.0 where 5 was meant.
        "integer" => {
            value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "times": { "type": "integer" },
                    "mode": { "type": "string", "enum": ["plain", "loud"] }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolResult::ok(text))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Never finishes in time"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: Value) -> std::result::Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ToolResult::ok("late"))
        }
    }

    struct NamedTool(&'static str, &'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            self.1
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _arguments: Value) -> std::result::Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(self.1))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NamedTool("zeta", "z")));
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(NamedTool("alpha", "a")));
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "echo", "zeta"]);
        assert_eq!(registry.names(), vec!["alpha", "echo", "zeta"]);
    }

    #[tokio::test]
    async fn duplicate_registration_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NamedTool("dup", "first")));
        registry.register(Box::new(NamedTool("dup", "second")));
        assert_eq!(registry.len(), 1);

        let call = ToolCall { id: "c1".into(), name: "dup".into(), arguments: json!({}) };
        let result = registry.execute(&call).await.unwrap();
        assert_eq!(result.output, "second");
    }

    #[tokio::test]
    async fn execute_stamps_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: json!({"text": "hello world"}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello world");
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn execute_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: json!({}),
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn execute_rejects_invalid_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let call = ToolCall { id: "c".into(), name: "echo".into(), arguments: json!({"times": 2}) };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("text")));
    }

    #[tokio::test(start_paused = true)]
    async fn execute_times_out() {
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_secs(2));
        registry.register(Box::new(SlowTool));
        let call = ToolCall { id: "c".into(), name: "slow".into(), arguments: json!({}) };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_secs: 2, .. }));
    }

    #[test]
    fn validation_checks_types_and_enums() {
        let schema = EchoTool.parameters_schema();
        assert!(validate_arguments(&schema, &json!({"text": "a"})).is_ok());
        assert!(validate_arguments(&schema, &json!({"text": "a", "times": 3.0})).is_ok());
        assert!(validate_arguments(&schema, &json!({"text": "a", "extra": true})).is_ok());
        assert!(validate_arguments(&schema, &json!({"text": "a", "mode": null})).is_ok());

        assert!(validate_arguments(&schema, &json!("text")).is_err());
        assert!(validate_arguments(&schema, &json!({"text": null})).is_err());
        assert!(validate_arguments(&schema, &json!({"text": 5})).is_err());
        assert!(validate_arguments(&schema, &json!({"text": "a", "times": 1.5})).is_err());
        assert!(validate_arguments(&schema, &json!({"text": "a", "mode": "quiet"})).is_err());
    }
}
