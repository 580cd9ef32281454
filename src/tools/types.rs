//! Tool descriptor and invocation types
//!
//! Descriptors are immutable once registered. Invocations and outcomes live
//! for a single dispatch round.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::Array => "array",
        }
    }
}

/// One typed parameter of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParameterType,

    pub description: String,

    pub required: bool,

    /// Only set on optional parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSpec {
    /// Required parameter (never carries a default)
    pub fn required(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// Optional parameter, with or without a default
    pub fn optional(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default,
        }
    }
}

/// Capability descriptor advertised to the model and to API consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ParameterSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// JSON Schema object in the completion API's `input_schema` format
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = json!({
                "type": param.param_type.as_str(),
                "description": param.description,
            });
            if let (Some(default), Some(obj)) = (&param.default, prop.as_object_mut()) {
                obj.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), prop);
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_parameters(),
        })
    }

    /// Names of required parameters, in declaration order
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// A single tool-call request, consumed by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    pub invocation_id: String,
}

impl ToolInvocation {
    /// Build from raw model input. A non-object input yields no arguments.
    pub fn new(tool_name: impl Into<String>, input: Value, invocation_id: impl Into<String>) -> Self {
        let arguments = match input {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            tool_name: tool_name.into(),
            arguments,
            invocation_id: invocation_id.into(),
        }
    }
}

/// Uniform envelope for a tool's success or failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub invocation_id: String,
    pub tool_name: String,
    pub succeeded: bool,
    pub payload: Value,
}

impl ToolOutcome {
    pub fn success(invocation_id: impl Into<String>, tool_name: impl Into<String>, payload: Value) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            tool_name: tool_name.into(),
            succeeded: true,
            payload,
        }
    }

    /// Failed outcome with payload `{"error": message}`
    pub fn failure(
        invocation_id: impl Into<String>,
        tool_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            tool_name: tool_name.into(),
            succeeded: false,
            payload: json!({ "error": message.into() }),
        }
    }

    /// Error text of a failed outcome
    pub fn error_message(&self) -> Option<&str> {
        if self.succeeded {
            return None;
        }
        self.payload.get("error").and_then(Value::as_str)
    }
}
