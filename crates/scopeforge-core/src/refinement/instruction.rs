//! Structured task instructions extracted from free text.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScopeError};
use crate::llm::{generate_with_timeout, parse_model_json, GenerationOptions, TextGenerator};
use crate::rates::DEFAULT_ROLE;
use crate::scope::lenient::{string_lenient, string_list_lenient};
use crate::scope::MAX_ACTIVITY_EFFORT_DAYS;

/// Phase a new activity lands in when none is named
pub const DEFAULT_PHASE: &str = "Development";

/// Effort assumed for a new activity when none is given
pub const DEFAULT_EFFORT_DAYS: u32 = 5;

/// What to do with the matched activities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Add,
    Remove,
    Modify,
}

impl TaskAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "add" | "create" | "include" | "insert" => Some(Self::Add),
            "remove" | "delete" | "drop" | "exclude" => Some(Self::Remove),
            "modify" | "update" | "change" | "edit" => Some(Self::Modify),
            _ => None,
        }
    }
}

/// Parsed task edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstruction {
    pub action: TaskAction,
    pub activity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_days: Option<u32>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub resources_required: Vec<String>,
}

impl TaskInstruction {
    /// Safe default when extraction fails: add a small development task
    /// named after the request.
    pub fn fallback(message: &str) -> Self {
        let name = message.trim();
        Self {
            action: TaskAction::Add,
            activity_name: if name.is_empty() {
                "New Task".to_string()
            } else {
                name.to_string()
            },
            activity_description: None,
            target_phase: Some(DEFAULT_PHASE.to_string()),
            effort_days: Some(DEFAULT_EFFORT_DAYS),
            dependencies: Vec::new(),
            resources_required: vec![DEFAULT_ROLE.to_string()],
        }
    }
}

/// Wire shape the model is asked to produce; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInstruction {
    #[serde(deserialize_with = "string_lenient")]
    action: String,
    #[serde(deserialize_with = "string_lenient", alias = "activity_type")]
    activity_name: String,
    activity_description: Option<String>,
    #[serde(alias = "phase")]
    target_phase: Option<String>,
    effort_days: Option<serde_json::Value>,
    #[serde(deserialize_with = "string_list_lenient")]
    dependencies: Vec<String>,
    #[serde(deserialize_with = "string_list_lenient", alias = "resources_needed")]
    resources_required: Vec<String>,
}

impl TryFrom<RawInstruction> for TaskInstruction {
    type Error = ScopeError;

    fn try_from(raw: RawInstruction) -> Result<Self> {
        let action = TaskAction::parse(&raw.action).ok_or_else(|| {
            ScopeError::ModelOutput(format!("unknown task action '{}'", raw.action))
        })?;
        let activity_name = raw.activity_name.trim().to_string();
        if activity_name.is_empty() {
            return Err(ScopeError::ModelOutput("instruction names no activity".into()));
        }

        let effort_days = raw
            .effort_days
            .as_ref()
            .and_then(crate::scope::lenient::value_as_f64)
            .filter(|d| d.is_finite() && *d >= 1.0)
            .map(|d| d.round().min(f64::from(MAX_ACTIVITY_EFFORT_DAYS)) as u32);

        let non_empty = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Ok(Self {
            action,
            activity_name,
            activity_description: non_empty(raw.activity_description),
            target_phase: non_empty(raw.target_phase),
            effort_days,
            dependencies: raw.dependencies,
            resources_required: raw.resources_required,
        })
    }
}

/// Turns a task-edit request into a [`TaskInstruction`]
#[async_trait::async_trait]
pub trait InstructionExtractor: Send + Sync + std::fmt::Debug {
    async fn extract(&self, message: &str, scope_summary: &str) -> Result<TaskInstruction>;
}

/// Extractor backed by a language model
#[derive(Debug, Clone)]
pub struct LlmInstructionExtractor {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl LlmInstructionExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    fn prompt(message: &str, scope_summary: &str) -> String {
        format!(
            r#"You edit the activity list of a software project scope.

Current scope:
{scope_summary}

User request: "{message}"

Decide whether the user wants to add, remove or modify activities.
Return ONLY JSON:
{{
  "action": "add" | "remove" | "modify",
  "activity_name": "name, or the text to match for remove/modify",
  "activity_description": "optional description",
  "target_phase": "optional phase name",
  "effort_days": optional number of days,
  "dependencies": ["activity names"],
  "resources_required": ["roles"]
}}"#
        )
    }
}

#[async_trait::async_trait]
impl InstructionExtractor for LlmInstructionExtractor {
    async fn extract(&self, message: &str, scope_summary: &str) -> Result<TaskInstruction> {
        let text = generate_with_timeout(
            self.generator.as_ref(),
            &Self::prompt(message, scope_summary),
            GenerationOptions::structured(),
            self.timeout,
        )
        .await?;
        let raw: RawInstruction = parse_model_json(&text)?;
        let instruction = TaskInstruction::try_from(raw)?;
        debug!(?instruction, "Extracted task instruction");
        Ok(instruction)
    }
}
