//! Tool registry
//!
//! Built once at startup through [`ToolRegistryBuilder`] and immutable
//! afterwards, so it can be shared behind an `Arc` and read without locking.
//!
//! Standard tools:
//! - generate_revit_code: Template-based Revit API boilerplate
//! - execute_pyrevit_script: Run a script on the automation host

use crate::bridge::ExecutionBridge;
use crate::errors::{AgentError, Result};
use crate::tools::handler::ToolHandler;
use crate::tools::implementations::{self, CodeGenerator, ScriptExecutor};
use crate::tools::types::ToolDescriptor;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Descriptor paired with its handler
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.descriptor.name)
            .finish()
    }
}

/// Startup-only registration
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Rejects duplicate names and required parameters that
    /// carry a default.
    pub fn register(
        mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self> {
        if self.tools.iter().any(|t| t.descriptor.name == descriptor.name) {
            return Err(AgentError::ConfigError(format!(
                "tool '{}' registered twice",
                descriptor.name
            )));
        }

        if let Some(param) = descriptor
            .parameters
            .iter()
            .find(|p| p.required && p.default.is_some())
        {
            return Err(AgentError::ConfigError(format!(
                "required parameter '{}' of tool '{}' has a default",
                param.name, descriptor.name
            )));
        }

        self.tools.push(RegisteredTool { descriptor, handler });
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        let index = self
            .tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.descriptor.name.clone(), i))
            .collect();

        ToolRegistry {
            tools: self.tools,
            index,
        }
    }
}

/// Read-only tool table
#[derive(Debug)]
pub struct ToolRegistry {
    /// Registration order
    tools: Vec<RegisteredTool>,

    /// Name to position in `tools`
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// Registry with the code generator and the script executor
    pub fn standard(bridge: Arc<ExecutionBridge>, default_timeout: Duration) -> Result<Self> {
        let registry = Self::builder()
            .register(
                implementations::code_generator::descriptor(),
                Arc::new(CodeGenerator::new()),
            )?
            .register(
                implementations::script_executor::descriptor(default_timeout),
                Arc::new(ScriptExecutor::new(bridge, default_timeout)),
            )?
            .build();
        Ok(registry)
    }

    /// Descriptors in registration order
    pub fn list(&self) -> Vec<&ToolDescriptor> {
        self.tools.iter().map(|t| &t.descriptor).collect()
    }

    /// Look up a tool by name
    pub fn resolve(&self, name: &str) -> Result<&RegisteredTool> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.descriptor.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
