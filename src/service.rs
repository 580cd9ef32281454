//! Code service
//!
//! Generate, execute and chat operations on top of the orchestrator and the
//! tool dispatcher. This is the surface the CLI talks to.

use crate::agent::{AgentOrchestrator, AgentRequest};
use crate::errors::{AgentError, Result};
use crate::tools::implementations::script_executor;
use crate::tools::{ToolDescriptor, ToolDispatcher, ToolInvocation, ToolOutcome};
use crate::types::{ConversationTurn, ExecutionResult, ExecutionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Fixed confidence reported with every generation
pub const GENERATION_CONFIDENCE: f64 = 0.95;

const FENCE: &str = "```";
const PYTHON_FENCE: &str = "```python";

/// Inputs of one code generation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,

    /// Host context: `active_view`, `selected_elements`, `document_info`
    #[serde(default)]
    pub context: Option<Map<String, Value>>,

    #[serde(default)]
    pub history: Vec<ConversationTurn>,

    #[serde(default)]
    pub temperature: Option<f64>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Generated code and its metadata
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedCode {
    pub code: String,
    pub explanation: Option<String>,
    pub tool_outcomes: Vec<ToolOutcome>,
    pub confidence: f64,
    pub warnings: Vec<String>,
    pub raw_response: String,
    pub model_calls: usize,
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
}

/// Outcome of one execution, always with a status
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub status: ExecutionStatus,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub host_state: Map<String, Value>,
    pub execution_time_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
}

impl ExecutionReport {
    fn from_result(result: ExecutionResult, started: Instant) -> Self {
        Self {
            status: result.status,
            output: result.output,
            error: result.error,
            host_state: result.host_state,
            execution_time_secs: started.elapsed().as_secs_f64(),
            transport: result.transport,
        }
    }

    fn error(message: impl Into<String>, started: Instant) -> Self {
        Self {
            status: ExecutionStatus::Error,
            output: String::new(),
            error: Some(message.into()),
            host_state: Map::new(),
            execution_time_secs: started.elapsed().as_secs_f64(),
            transport: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Generation followed by an optional execution
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub generation: GeneratedCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionReport>,
}

/// Code generation and execution service
pub struct CodeService {
    dispatcher: ToolDispatcher,
    orchestrator: Option<AgentOrchestrator>,
}

impl CodeService {
    /// Service without a completion client: execute and tools only
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            dispatcher,
            orchestrator: None,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: AgentOrchestrator) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    fn orchestrator(&self) -> Result<&AgentOrchestrator> {
        self.orchestrator.as_ref().ok_or_else(|| {
            AgentError::ConfigError("no completion client configured (set ANTHROPIC_API_KEY)".to_string())
        })
    }

    /// Generate Revit API code for a request
    pub async fn generate_code(&self, request: GenerateRequest) -> Result<GeneratedCode> {
        let orchestrator = self.orchestrator()?;

        let prompt = enhance_prompt(&request.prompt, request.context.as_ref());
        let mut agent_request = AgentRequest::new(prompt).with_history(request.history);
        if let Some(temperature) = request.temperature {
            agent_request = agent_request.with_temperature(temperature);
        }

        let output = orchestrator.run(agent_request).await.map_err(|e| {
            log_failure("code generation", &e);
            e
        })?;

        let code = extract_code(&output.content);
        let mut warnings = check_warnings(&code, request.context.as_ref());
        warnings.extend(output.warnings);

        info!(
            request_id = %output.request_id,
            code_len = code.len(),
            warnings = warnings.len(),
            "code generated"
        );

        Ok(GeneratedCode {
            explanation: extract_explanation(&output.content),
            code,
            tool_outcomes: output.tool_outcomes,
            confidence: GENERATION_CONFIDENCE,
            warnings,
            raw_response: output.content,
            model_calls: output.model_calls,
            request_id: output.request_id,
            generated_at: Utc::now(),
        })
    }

    /// Run code on the host through the script executor tool.
    ///
    /// Never fails: every fault becomes a report with an error status.
    pub async fn execute_code(
        &self,
        code: &str,
        timeout_secs: Option<f64>,
        capture_output: bool,
    ) -> ExecutionReport {
        let started = Instant::now();

        let mut arguments = json!({
            "code": code,
            "capture_output": capture_output,
        });
        if let Some(secs) = timeout_secs {
            arguments["timeout"] = json!(secs);
        }

        let invocation = ToolInvocation::new(
            script_executor::TOOL_NAME,
            arguments,
            Uuid::new_v4().to_string(),
        );

        let outcome = match self.dispatcher.invoke(invocation).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log_failure("code execution", &e);
                return ExecutionReport::error(e.to_string(), started);
            }
        };

        if !outcome.succeeded {
            let message = outcome.error_message().unwrap_or("Unknown error").to_string();
            return ExecutionReport::error(message, started);
        }

        match serde_json::from_value::<ExecutionResult>(outcome.payload) {
            Ok(result) => ExecutionReport::from_result(result, started),
            Err(e) => ExecutionReport::error(format!("malformed execution result: {}", e), started),
        }
    }

    /// Generate code, then optionally run it
    pub async fn chat(&self, prompt: &str, execute: bool) -> Result<ChatReply> {
        let generation = self.generate_code(GenerateRequest::new(prompt)).await?;

        let execution = if execute && !generation.code.trim().is_empty() {
            Some(self.execute_code(&generation.code, None, true).await)
        } else {
            None
        };

        Ok(ChatReply {
            generation,
            execution,
        })
    }

    /// Capability export: every registered tool, in registration order
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.dispatcher
            .registry()
            .list()
            .into_iter()
            .cloned()
            .collect()
    }
}

/// Append a context section describing the host state
pub fn enhance_prompt(prompt: &str, context: Option<&Map<String, Value>>) -> String {
    let Some(context) = context else {
        return prompt.to_string();
    };

    let mut parts = Vec::new();

    if let Some(view) = context.get("active_view") {
        parts.push(format!("Active view: {}", display_value(view)));
    }

    if let Some(selected) = context.get("selected_elements") {
        let count = match selected {
            Value::Array(items) => Some(items.len()),
            Value::Object(items) => Some(items.len()),
            _ => None,
        };
        if let Some(count) = count {
            parts.push(format!("Selected elements: {}", count));
        }
    }

    if let Some(shared) = context
        .get("document_info")
        .and_then(|info| info.get("is_workshared"))
    {
        parts.push(format!("Workshared: {}", display_value(shared)));
    }

    if parts.is_empty() {
        prompt.to_string()
    } else {
        format!("{}\n\nContext:\n{}", prompt, parts.join("\n"))
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// First fenced block, `python` fences preferred; the whole text otherwise
pub fn extract_code(response: &str) -> String {
    fenced_block(response, PYTHON_FENCE)
        .or_else(|| fenced_block(response, FENCE))
        .unwrap_or_else(|| response.trim().to_string())
}

fn fenced_block(response: &str, opening: &str) -> Option<String> {
    let start = response.find(opening)? + opening.len();
    let rest = &response[start..];

    // Drop the info string of a bare fence (```py, ```ironpython)
    let body_start = if opening == FENCE {
        match rest.find('\n') {
            Some(nl) if !rest[..nl].contains(char::is_whitespace) => nl + 1,
            _ => 0,
        }
    } else {
        0
    };

    let body = &rest[body_start..];
    let end = body.find(FENCE)?;
    Some(body[..end].trim().to_string())
}

/// Text before the first fence, else text after the last one
pub fn extract_explanation(response: &str) -> Option<String> {
    let first = response.find(FENCE)?;

    let before = response[..first].trim();
    if !before.is_empty() {
        return Some(before.to_string());
    }

    let last = response.rfind(FENCE)?;
    let line_end = last + response[last..].find('\n')?;
    let after = response[line_end..].trim();
    (!after.is_empty()).then(|| after.to_string())
}

/// Advisory warnings about generated code
pub fn check_warnings(code: &str, context: Option<&Map<String, Value>>) -> Vec<String> {
    let mut warnings = Vec::new();
    let lower = code.to_lowercase();

    if lower.contains("delete") {
        warnings.push("Code contains delete operations - ensure you have backups".to_string());
    }

    if !lower.contains("transaction") {
        warnings.push(
            "Code may not be wrapped in a transaction - changes might not persist".to_string(),
        );
    }

    if is_workshared(context) && !lower.contains("worksharing") {
        warnings.push("This is a workshared model - ensure proper element ownership".to_string());
    }

    warnings
}

fn is_workshared(context: Option<&Map<String, Value>>) -> bool {
    let Some(context) = context else {
        return false;
    };
    let flag = |v: Option<&Value>| v.and_then(Value::as_bool).unwrap_or(false);

    flag(context.get("is_workshared"))
        || flag(context.get("document_info").and_then(|i| i.get("is_workshared")))
}

/// Caller mistakes log at warn, everything else at error
fn log_failure(action: &str, e: &AgentError) {
    if e.is_user_correctable() {
        warn!(error = %e, "{} rejected", action);
    } else {
        error!(error = %e, "{} failed", action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::bridge::ExecutionBridge;
    use crate::testing::{text_response, tool_call_response, ScriptedClient};
    use crate::tools::ToolRegistry;
    use std::sync::Arc;
    use std::time::Duration;

    fn dispatcher() -> ToolDispatcher {
        let bridge = Arc::new(ExecutionBridge::with_transports(Vec::new()));
        let registry = ToolRegistry::standard(bridge, Duration::from_secs(30)).unwrap();
        ToolDispatcher::new(Arc::new(registry))
    }

    fn service(client: Arc<ScriptedClient>) -> CodeService {
        let dispatcher = dispatcher();
        let orchestrator = AgentOrchestrator::new(client, dispatcher.clone(), AgentConfig::default());
        CodeService::new(dispatcher).with_orchestrator(orchestrator)
    }

    fn context(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_enhance_prompt_with_context() {
        let ctx = context(json!({
            "active_view": "Level 1",
            "selected_elements": [1, 2, 3],
            "document_info": {"is_workshared": true}
        }));
        let prompt = enhance_prompt("Rename walls", Some(&ctx));
        assert_eq!(
            prompt,
            "Rename walls\n\nContext:\nActive view: Level 1\nSelected elements: 3\nWorkshared: true"
        );
    }

    #[test]
    fn test_enhance_prompt_without_known_keys() {
        let ctx = context(json!({"unrelated": 1}));
        assert_eq!(enhance_prompt("Do it", Some(&ctx)), "Do it");
        assert_eq!(enhance_prompt("Do it", None), "Do it");
    }

    #[test]
    fn test_extract_code_prefers_python_fence() {
        let response = "Intro\n```\nnot this\n```\n```python\nprint('hi')\n```\nDone";
        assert_eq!(extract_code(response), "print('hi')");
    }

    #[test]
    fn test_extract_code_any_fence_and_fallback() {
        assert_eq!(extract_code("```py\nx = 1\n```"), "x = 1");
        assert_eq!(extract_code("```\nx = 2\n```"), "x = 2");
        assert_eq!(extract_code("  x = 3  "), "x = 3");
        // Unclosed fence falls back to the whole text
        assert_eq!(extract_code("```python\nx = 4"), "```python\nx = 4");
    }

    #[test]
    fn test_extract_explanation() {
        assert_eq!(
            extract_explanation("This lists walls.\n```python\nx\n```").as_deref(),
            Some("This lists walls.")
        );
        assert_eq!(
            extract_explanation("```python\nx\n```\nRun it in Revit.").as_deref(),
            Some("Run it in Revit.")
        );
        assert_eq!(extract_explanation("```python\nx\n```"), None);
        assert_eq!(extract_explanation("no fences"), None);
    }

    #[test]
    fn test_check_warnings() {
        let warnings = check_warnings("doc.Delete(el.Id)", None);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("delete"));
        assert!(warnings[1].contains("transaction"));

        let ctx = context(json!({"document_info": {"is_workshared": true}}));
        let warnings = check_warnings("t = Transaction(doc, 'x')", Some(&ctx));
        assert_eq!(warnings, vec!["This is a workshared model - ensure proper element ownership"]);

        assert!(check_warnings("with Transaction(doc) as t: pass", None).is_empty());
    }

    #[tokio::test]
    async fn test_generate_code() {
        let client = Arc::new(ScriptedClient::new(vec![text_response(
            "Collects walls.\n```python\nt = Transaction(doc, 'walls')\n```",
        )]));
        let service = service(client.clone());

        let mut request = GenerateRequest::new("List walls");
        request.context = Some(context(json!({"active_view": "Level 1"})));

        let generated = service.generate_code(request).await.unwrap();
        assert_eq!(generated.code, "t = Transaction(doc, 'walls')");
        assert_eq!(generated.explanation.as_deref(), Some("Collects walls."));
        assert_eq!(generated.confidence, GENERATION_CONFIDENCE);
        assert!(generated.warnings.is_empty());
        assert!(generated.tool_outcomes.is_empty());
        assert_eq!(generated.model_calls, 1);

        let sent = client.requests();
        assert!(sent[0].messages[0].text().contains("Active view: Level 1"));
    }

    #[tokio::test]
    async fn test_generate_code_with_tool_round() {
        let client = Arc::new(ScriptedClient::new(vec![
            tool_call_response(
                "",
                &[("tu_1", "generate_revit_code", json!({"description": "list walls"}))],
            ),
            text_response("```python\nprint('walls')\n```"),
        ]));
        let generated = service(client).generate_code(GenerateRequest::new("List walls")).await.unwrap();

        assert_eq!(generated.model_calls, 2);
        assert_eq!(generated.tool_outcomes.len(), 1);
        assert!(generated.tool_outcomes[0].succeeded);
        assert_eq!(generated.code, "print('walls')");
    }

    #[tokio::test]
    async fn test_generate_requires_client() {
        let service = CodeService::new(dispatcher());
        let result = service.generate_code(GenerateRequest::new("x")).await;
        assert!(matches!(result, Err(AgentError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_execute_denied_code_reports_validation_failure() {
        let service = CodeService::new(dispatcher());
        let report = service.execute_code("eval('1')", None, true).await;
        assert_eq!(report.status, ExecutionStatus::ValidationFailed);
        assert!(report.error.unwrap().contains("eval("));
    }

    #[tokio::test]
    async fn test_execute_without_transport_reports_unavailable() {
        let service = CodeService::new(dispatcher());
        let report = service.execute_code("print('hi')", Some(5.0), true).await;
        assert_eq!(report.status, ExecutionStatus::HostUnavailable);
        assert!(!report.succeeded());
    }

    #[tokio::test]
    async fn test_execute_bad_timeout_is_an_error_report() {
        let service = CodeService::new(dispatcher());
        let report = service.execute_code("print('hi')", Some(-1.0), true).await;
        assert_eq!(report.status, ExecutionStatus::Error);
        assert!(report.error.unwrap().contains("timeout"));

        let report = service.execute_code("print('hi')", Some(1e19), true).await;
        assert_eq!(report.status, ExecutionStatus::Error);
        assert!(report.error.unwrap().contains("at most"));
    }

    #[tokio::test]
    async fn test_chat_without_execute() {
        let client = Arc::new(ScriptedClient::new(vec![text_response("```python\nx = 1\n```")]));
        let reply = service(client).chat("Set x", false).await.unwrap();
        assert!(reply.execution.is_none());
        assert_eq!(reply.generation.code, "x = 1");
    }

    #[test]
    fn test_tools_export_in_registration_order() {
        let names: Vec<String> = CodeService::new(dispatcher())
            .tools()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["generate_revit_code", "execute_pyrevit_script"]);
    }
}
