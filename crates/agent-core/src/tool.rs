//! Tool System
//!
//! Schema-described callables the model may invoke instead of answering.
//! Tools are registered once at startup; the registry is read-only after that
//! and is shared between sessions behind an `Arc`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Raw, not yet validated arguments
    #[serde(default)]
    pub arguments: HashMap<String, Value>,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: HashMap::new(),
            id: None,
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Outcome of a single tool invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "output", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(String),
    Failure(String),
}

/// Result from tool execution. Write-once: the executor creates it and it is
/// only ever appended to history afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID (if provided in request)
    pub id: Option<String>,

    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            outcome: ToolOutcome::Success(output.into()),
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            outcome: ToolOutcome::Failure(error.into()),
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// Success output or failure reason
    pub fn output(&self) -> &str {
        match &self.outcome {
            ToolOutcome::Success(s) | ToolOutcome::Failure(s) => s,
        }
    }
}

/// Primitive type tag of a tool parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Strict type check: numeric strings are not numbers.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

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
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    /// JSON-Schema object describing the parameters, as providers expect it.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::from(param.param_type.as_str()));
            prop.insert("description".into(), Value::from(param.description.clone()));
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::from(param.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate raw call arguments against this schema.
    ///
    /// No coercion happens: `"22"` is not a number. Optional parameters that
    /// are absent (or `null`) take their declared default. Arguments the
    /// schema does not declare are dropped.
    pub fn validate(&self, raw: &HashMap<String, Value>) -> Result<Arguments> {
        let mut values = Map::new();

        for param in &self.parameters {
            let value = raw.get(&param.name).filter(|v| !v.is_null());

            let Some(value) = value else {
                if param.required {
                    return Err(invalid(&param.name, "missing required argument"));
                }
                if let Some(default) = &param.default {
                    values.insert(param.name.clone(), default.clone());
                }
                continue;
            };

            if !param.param_type.matches(value) {
                return Err(invalid(
                    &param.name,
                    format!("expected {}, got {}", param.param_type, json_type_name(value)),
                ));
            }

            if let Some(allowed) = &param.enum_values {
                if !allowed.contains(value) {
                    return Err(invalid(&param.name, format!("{value} is not one of the allowed values")));
                }
            }

            values.insert(param.name.clone(), value.clone());
        }

        for key in raw.keys() {
            if !values.contains_key(key) && !self.parameters.iter().any(|p| &p.name == key) {
                tracing::debug!(tool = %self.name, argument = %key, "Dropping undeclared argument");
            }
        }

        Ok(Arguments { values })
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> AgentError {
    AgentError::InvalidArguments {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Arguments that passed schema validation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> std::result::Result<&str, ToolError> {
        self.opt_str(name)
            .ok_or_else(|| ToolError::Fault(format!("string argument '{name}' not declared")))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn number(&self, name: &str) -> std::result::Result<f64, ToolError> {
        self.opt_number(name)
            .ok_or_else(|| ToolError::Fault(format!("number argument '{name}' not declared")))
    }

    pub fn opt_number(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Failure returned by a tool implementation
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Bad domain input or unavailable lookup key. Reported back to the model.
    #[error("{0}")]
    Execution(String),

    /// Broken tool: aborts the exchange.
    #[error("{0}")]
    Fault(String),
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated arguments
    async fn call(&self, args: &Arguments) -> std::result::Result<String, ToolError>;
}

type ToolFn = dyn Fn(&Arguments) -> std::result::Result<String, ToolError> + Send + Sync;

/// Adapts a plain function into a [`Tool`].
struct FnTool {
    schema: ToolSchema,
    func: Box<ToolFn>,
}

#[async_trait]
impl Tool for FnTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn call(&self, args: &Arguments) -> std::result::Result<String, ToolError> {
        (self.func)(args)
    }
}

/// A registered tool: its schema, captured once, plus the implementation.
#[derive(Clone)]
pub struct ToolSpec {
    pub schema: ToolSchema,
    pub implementation: Arc<dyn Tool>,
}

impl ToolSpec {
    pub fn new<T: Tool + 'static>(tool: T) -> Self {
        Self::from_arc(Arc::new(tool))
    }

    pub fn from_arc(tool: Arc<dyn Tool>) -> Self {
        Self {
            schema: tool.schema(),
            implementation: tool,
        }
    }

    /// Wrap a plain function as a tool
    pub fn from_fn<F>(schema: ToolSchema, func: F) -> Self
    where
        F: Fn(&Arguments) -> std::result::Result<String, ToolError> + Send + Sync + 'static,
    {
        let tool = FnTool {
            schema: schema.clone(),
            func: Box::new(func),
        };
        Self {
            schema,
            implementation: Arc::new(tool),
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec").field("schema", &self.schema).finish_non_exhaustive()
    }
}

/// Registry for available tools, in registration order
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool implementing [`Tool`]
    pub fn register_tool<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register(ToolSpec::new(tool))
    }

    /// Register a tool spec; names are unique
    pub fn register(&mut self, spec: ToolSpec) -> Result<()> {
        if self.index.contains_key(spec.name()) {
            return Err(AgentError::DuplicateTool(spec.name().to_string()));
        }
        tracing::debug!(tool = %spec.name(), "Registered tool");
        self.index.insert(spec.name().to_string(), self.specs.len());
        self.specs.push(spec);
        Ok(())
    }

    /// Get a tool by name
    pub fn lookup(&self, name: &str) -> Result<&ToolSpec> {
        self.index
            .get(name)
            .map(|&i| &self.specs[i])
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    /// All specs in registration order
    pub fn list_specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(ToolSpec::name).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Markdown section describing available tools, for models that need
    /// tool calls spelled out in the system prompt.
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");

        for spec in &self.specs {
            let schema = &spec.schema;
            prompt.push_str(&format!("### {}\n{}\n", schema.name, schema.description));

            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    prompt.push_str(&format!(
                        "- `{}` ({}){}: {}\n",
                        param.name, param.param_type, required, param.description
                    ));
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}
