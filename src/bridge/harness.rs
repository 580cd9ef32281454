//! Output-capture harness and result recovery
//!
//! The harness runs user code with stdout/stderr redirected into buffers and
//! prints a single JSON report between two sentinel lines. Recovery looks
//! for that report first and falls back to reading raw process output.

use crate::types::{ExecutionResult, ExecutionStatus, ResultOrigin};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

pub const RESULT_START: &str = "===RESULT_START===";
pub const RESULT_END: &str = "===RESULT_END===";

const HARNESS_HEAD: &str = r#"import sys
import json
try:
    from StringIO import StringIO
except ImportError:
    from io import StringIO

_revbot_out = StringIO()
_revbot_err = StringIO()
_revbot_streams = (sys.stdout, sys.stderr)
_revbot_result = {"success": True, "output": "", "error": None, "host_state": {}}

try:
    sys.stdout = _revbot_out
    sys.stderr = _revbot_err
"#;

const HARNESS_TAIL: &str = r#"
    try:
        _revbot_result["host_state"] = {
            "active_view": str(doc.ActiveView.Name) if "doc" in globals() else None,
            "selection_count": uidoc.Selection.GetElementIds().Count if "uidoc" in globals() else 0,
        }
    except Exception:
        pass
except Exception as _revbot_exc:
    _revbot_result["success"] = False
    _revbot_result["error"] = str(_revbot_exc)
finally:
    sys.stdout, sys.stderr = _revbot_streams
    _revbot_result["output"] = _revbot_out.getvalue()
    if _revbot_err.getvalue():
        _revbot_result["stderr"] = _revbot_err.getvalue()
"#;

/// Wrap user code in the capture harness.
///
/// Every line is indented one level into the harness `try` block, so
/// multi-line string literals in the user code gain four spaces per line.
pub fn wrap(code: &str) -> String {
    let mut wrapped = String::with_capacity(code.len() + HARNESS_HEAD.len() + HARNESS_TAIL.len() + 128);
    wrapped.push_str(HARNESS_HEAD);

    for line in code.lines() {
        if !line.trim().is_empty() {
            wrapped.push_str("    ");
            wrapped.push_str(line);
        }
        wrapped.push('\n');
    }
    // Keeps the try block non-empty for blank input
    wrapped.push_str("    pass\n");

    wrapped.push_str(HARNESS_TAIL);
    wrapped.push_str(&format!(
        "\nprint(\"{}\")\nprint(json.dumps(_revbot_result))\nprint(\"{}\")\n",
        RESULT_START, RESULT_END
    ));
    wrapped
}

/// Text between the first start sentinel and the next end sentinel
pub fn extract_payload(text: &str) -> Option<&str> {
    let start = text.find(RESULT_START)? + RESULT_START.len();
    let len = text[start..].find(RESULT_END)?;
    Some(text[start..start + len].trim())
}

/// Parse the sentinel payload, if the text carries one
pub fn recover_structured(text: &str) -> Option<Result<Value, serde_json::Error>> {
    extract_payload(text).map(serde_json::from_str)
}

/// Report shape printed by the harness or returned by the socket host
#[derive(Debug, Deserialize)]
pub struct HostReport {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Text the script wrote to stderr
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default, alias = "revit_state")]
    pub host_state: Option<Map<String, Value>>,
}

impl HostReport {
    pub fn into_result(self, origin: ResultOrigin) -> ExecutionResult {
        let output = self.output.unwrap_or_default();
        let host_state = self.host_state.unwrap_or_default();
        let stderr = self.stderr.filter(|s| !s.is_empty());

        if self.success {
            let mut result = ExecutionResult::success(output, host_state, origin);
            result.error = stderr;
            result
        } else {
            let mut error = self.error.unwrap_or_else(|| "Unknown error".to_string());
            if let Some(stderr) = stderr {
                error.push('\n');
                error.push_str(&stderr);
            }
            ExecutionResult::failure(ExecutionStatus::Error, error)
                .with_output(output)
                .with_host_state(host_state)
                .with_origin(origin)
        }
    }
}

/// Result from a socket response frame
pub fn from_frame(frame: Value) -> ExecutionResult {
    if let Some(output) = frame.get("output").and_then(Value::as_str) {
        if let Some(parsed) = recover_structured(output) {
            return structured(parsed, output);
        }
    }

    match serde_json::from_value::<HostReport>(frame) {
        Ok(report) => report.into_result(ResultOrigin::HostFrame),
        Err(e) => parse_failure(e, String::new()),
    }
}

/// Result from a finished host CLI process
pub fn from_process(stdout: &str, stderr: &str, exit_code: Option<i32>) -> ExecutionResult {
    let recovered = recover_structured(stdout)
        .map(|parsed| (parsed, stdout))
        .or_else(|| recover_structured(stderr).map(|parsed| (parsed, stderr)));
    if let Some((parsed, text)) = recovered {
        return structured(parsed, text).with_exit_code(exit_code);
    }

    debug!(?exit_code, "no result sentinels in host output");
    unparsed(stdout, stderr, exit_code).with_exit_code(exit_code)
}

fn structured(parsed: Result<Value, serde_json::Error>, raw: &str) -> ExecutionResult {
    match parsed.and_then(serde_json::from_value::<HostReport>) {
        Ok(report) => report.into_result(ResultOrigin::Structured),
        Err(e) => parse_failure(e, raw.to_string()),
    }
}

fn parse_failure(e: serde_json::Error, raw: String) -> ExecutionResult {
    ExecutionResult::failure(ExecutionStatus::Error, format!("Output parsing failed: {}", e))
        .with_output(raw)
        .with_origin(ResultOrigin::RawOutput)
}

/// Heuristic result from raw output and exit code
fn unparsed(stdout: &str, stderr: &str, exit_code: Option<i32>) -> ExecutionResult {
    let code = exit_code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string());

    if exit_code == Some(0) {
        let mut result = ExecutionResult::success(stdout.to_string(), Map::new(), ResultOrigin::RawOutput);
        if !stderr.is_empty() {
            result.error = Some(stderr.to_string());
        }
        return result;
    }

    if stdout.is_empty() && stderr.is_empty() {
        return ExecutionResult::failure(
            ExecutionStatus::Error,
            format!(
                "Host executed the script but returned no response (exit code {}). \
                 Check that Revit is running, pyRevit is loaded and a document is open.",
                code
            ),
        )
        .with_output(format!("No output from host. Exit code: {}", code))
        .with_origin(ResultOrigin::RawOutput);
    }

    let error = if stderr.is_empty() {
        format!("No stderr. Exit code: {}", code)
    } else {
        stderr.to_string()
    };
    let output = if stdout.is_empty() {
        format!("Empty output. Exit code: {}", code)
    } else {
        stdout.to_string()
    };

    ExecutionResult::failure(ExecutionStatus::Error, error)
        .with_output(output)
        .with_origin(ResultOrigin::RawOutput)
}
