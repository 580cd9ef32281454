//! Revit API code generator
//!
//! Fills a fixed template with imports chosen from keywords in the request,
//! a selection-or-active-view body and an optional transaction wrapper. No
//! model call is involved.

use crate::errors::{AgentError, Result};
use crate::tools::handler::ToolHandler;
use crate::tools::types::{ParameterSpec, ParameterType, ToolDescriptor};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub const TOOL_NAME: &str = "generate_revit_code";

/// Transaction names are cut to this many characters
const TRANSACTION_NAME_LEN: usize = 50;

const BASE_IMPORTS: &[&str] = &[
    "import clr",
    "clr.AddReference('RevitAPI')",
    "clr.AddReference('RevitAPIUI')",
    "",
    "from Autodesk.Revit.DB import *",
    "from Autodesk.Revit.UI import *",
    "from Autodesk.Revit.DB.Architecture import *",
    "from Autodesk.Revit.DB.Structure import *",
    "",
    "# pyRevit imports",
    "from pyrevit import revit, DB, UI",
    "from pyrevit import script",
    "",
    "# Current document and application",
    "doc = __revit__.ActiveUIDocument.Document",
    "uidoc = __revit__.ActiveUIDocument",
    "app = __revit__.Application",
];

/// Keyword in the description -> extra import line
const KEYWORD_IMPORTS: &[(&str, &str)] = &[
    ("family", "from Autodesk.Revit.DB import FamilyInstance, Family"),
    (
        "parameter",
        "from Autodesk.Revit.DB import ParameterFilterElement, ParameterFilterRuleFactory",
    ),
    ("view", "from Autodesk.Revit.DB import ViewPlan, ViewSection, View3D"),
    ("sheet", "from Autodesk.Revit.DB import ViewSheet"),
];

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        TOOL_NAME,
        "Generate Revit API Python code based on a natural language description of what to accomplish",
        vec![
            ParameterSpec::required(
                "description",
                ParameterType::String,
                "Natural language description of what the code should do",
            ),
            ParameterSpec::optional(
                "context",
                ParameterType::Object,
                "Additional context about the Revit environment (e.g., selected elements, active view)",
                None,
            ),
            ParameterSpec::optional(
                "include_imports",
                ParameterType::Boolean,
                "Whether to include all necessary import statements",
                Some(json!(true)),
            ),
            ParameterSpec::optional(
                "include_transaction",
                ParameterType::Boolean,
                "Whether to wrap code in a Revit transaction",
                Some(json!(true)),
            ),
        ],
    )
}

/// Template-based code generator tool
#[derive(Debug, Default, Clone)]
pub struct CodeGenerator;

impl CodeGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Produce `{code, explanation, warnings}` for a description
    pub fn generate(
        &self,
        description: &str,
        context: Option<&Map<String, Value>>,
        include_imports: bool,
        include_transaction: bool,
    ) -> Value {
        let mut parts = Vec::new();

        if include_imports {
            parts.push(imports_for(description));
        }

        let body = main_body(description);
        if include_transaction {
            parts.push(wrap_in_transaction(&body, description));
        } else {
            parts.push(body);
        }

        let warnings = generation_warnings(description, context);

        json!({
            "code": parts.join("\n\n"),
            "explanation": format!("This code implements: {}", description),
            "warnings": if warnings.is_empty() { Value::Null } else { json!(warnings) },
        })
    }
}

#[async_trait]
impl ToolHandler for CodeGenerator {
    async fn call(&self, arguments: &Map<String, Value>) -> Result<Value> {
        let description = arguments
            .get("description")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Validation("description must be a string".to_string()))?;

        let context = arguments.get("context").and_then(Value::as_object);
        let include_imports = flag(arguments, "include_imports")?;
        let include_transaction = flag(arguments, "include_transaction")?;

        Ok(self.generate(description, context, include_imports, include_transaction))
    }
}

/// Boolean argument; absent counts as true
fn flag(arguments: &Map<String, Value>, name: &str) -> Result<bool> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(true),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(AgentError::Validation(format!(
            "{} must be a boolean, got {}",
            name, other
        ))),
    }
}

fn imports_for(description: &str) -> String {
    let lower = description.to_lowercase();
    let mut lines: Vec<&str> = BASE_IMPORTS.to_vec();
    lines.extend(
        KEYWORD_IMPORTS
            .iter()
            .filter(|(keyword, _)| lower.contains(keyword))
            .map(|(_, line)| *line),
    );
    lines.join("\n")
}

fn main_body(description: &str) -> String {
    let summary = one_line(description);
    format!(
        r#"# Main code logic
# Description: {summary}

# Get current selection or use active view
selection = uidoc.Selection
selected_ids = selection.GetElementIds()

if selected_ids.Count > 0:
    # Work with selected elements
    elements = [doc.GetElement(eid) for eid in selected_ids]
    print("Working with {{}} selected elements".format(len(elements)))
else:
    # Work with all elements in active view
    collector = FilteredElementCollector(doc, doc.ActiveView.Id)
    elements = collector.WhereElementIsNotElementType().ToElements()
    print("Working with {{}} elements in active view".format(len(elements)))

# Implementation for: {summary}"#
    )
}

fn wrap_in_transaction(code: &str, description: &str) -> String {
    let name: String = one_line(description)
        .chars()
        .take(TRANSACTION_NAME_LEN)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");

    let indented = code
        .lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("    {}", line) })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"# Create and execute transaction
t = Transaction(doc, "{name}")
try:
    t.Start()

{indented}

    t.Commit()
    print("Transaction completed successfully")
except Exception as e:
    t.RollBack()
    print("Error: {{}}".format(str(e)))
    raise"#
    )
}

fn generation_warnings(description: &str, context: Option<&Map<String, Value>>) -> Vec<&'static str> {
    let lower = description.to_lowercase();
    let mut warnings = Vec::new();

    if lower.contains("delete") || lower.contains("remove") {
        warnings.push("This operation will permanently modify the model. Ensure you have a backup.");
    }

    if lower.contains("all") && lower.contains("element") {
        warnings.push("Operating on all elements may be slow for large models.");
    }

    let workshared = context
        .and_then(|c| c.get("is_workshared"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if workshared {
        warnings.push("This is a workshared model. Ensure you have proper permissions.");
    }

    warnings
}

/// Collapse line breaks so the text is safe inside a comment or string literal
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
