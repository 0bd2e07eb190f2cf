//! Refinement Engine
//!
//! Turns a chat message into a consistent new version of a scope document:
//! classify the message, run exactly one mutation handler on a copy of the
//! scope, and return the copy with a summary of what changed.
//!
//! [`RefinementEngine::refine`] never fails. Model errors and timeouts fall
//! back to documented defaults inside the handlers.

pub mod discount;
pub mod instruction;
pub mod intent;
pub mod recalc;
pub mod resources;
pub mod tasks;
pub mod timeline;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::llm::{generate_with_timeout, parse_model_json, GenerationOptions, TextGenerator};
use crate::rates::RateCard;
use crate::scope::ScopeDocument;

pub use instruction::{InstructionExtractor, LlmInstructionExtractor, TaskAction, TaskInstruction};
pub use intent::{Classification, Intent, IntentClassifier};

/// Default bound on any single model call made during refinement
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);

const STATIC_GUIDANCE: &str = "I understand you'd like to refine the scope. Could you be more \
     specific? For example: 'Make the timeline 2 weeks shorter', 'Add security testing', \
     'Add 2 backend developers' or 'Apply a 10% discount'.";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Seconds allowed for each model call
    pub llm_timeout_secs: u64,
    /// Ask the model to label messages the keyword classifier was unsure about
    pub llm_intent_fallback: bool,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT.as_secs(),
            llm_intent_fallback: true,
        }
    }
}

/// Result of one refinement call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementOutcome {
    pub updated_scope: ScopeDocument,
    pub response: String,
    pub changes_made: Vec<String>,
    pub intent: Intent,
    /// Keyword classifier confidence for the scored message
    pub confidence: f64,
    /// The keyword match was ambiguous and the model chose `intent`
    #[serde(default)]
    pub labelled_by_model: bool,
}

/// What a handler reports back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutput {
    pub response: String,
    pub changes: Vec<String>,
}

/// `$1,234.50` style formatting for change summaries
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

#[derive(Debug, Deserialize)]
struct IntentLabel {
    #[serde(default)]
    intent: String,
}

/// Chat-driven scope refinement
#[derive(Debug, Clone)]
pub struct RefinementEngine {
    generator: Arc<dyn TextGenerator>,
    extractor: Option<Arc<dyn InstructionExtractor>>,
    classifier: IntentClassifier,
    rate_card: RateCard,
    llm_timeout: Duration,
    intent_fallback: bool,
}

impl RefinementEngine {
    /// Engine with default settings and a model-backed instruction extractor
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            extractor: None,
            classifier: IntentClassifier::new(),
            rate_card: RateCard::standard(),
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            intent_fallback: true,
        }
    }

    /// Engine configured from [`RefinementConfig`]
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &RefinementConfig) -> Self {
        Self::new(generator)
            .with_timeout(Duration::from_secs(config.llm_timeout_secs))
            .with_intent_fallback(config.llm_intent_fallback)
    }

    /// Bound every model call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_rate_card(mut self, rate_card: RateCard) -> Self {
        self.rate_card = rate_card;
        self
    }

    pub fn with_intent_fallback(mut self, enabled: bool) -> Self {
        self.intent_fallback = enabled;
        self
    }

    /// Replace the task instruction strategy
    pub fn with_extractor(mut self, extractor: Arc<dyn InstructionExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn rate_card(&self) -> &RateCard {
        &self.rate_card
    }

    /// Apply one chat instruction to a copy of `scope`.
    pub async fn refine(&self, message: &str, scope: &ScopeDocument) -> RefinementOutcome {
        let mut classification = self.classifier.classify(message);
        debug!(scores = ?classification.scores, "Scored refinement message");

        let mut labelled_by_model = false;
        if self.intent_fallback && classification.is_ambiguous() {
            if let Some(intent) = self.label_intent(message).await {
                classification.intent = intent;
                labelled_by_model = true;
            }
        }

        let intent = classification.intent;
        let mut updated = scope.clone();
        let output = match intent {
            Intent::ModifyTasks => match &self.extractor {
                Some(extractor) => {
                    tasks::modify_tasks(&mut updated, message, extractor.as_ref()).await
                }
                None => {
                    let extractor =
                        LlmInstructionExtractor::new(self.generator.clone(), self.llm_timeout);
                    tasks::modify_tasks(&mut updated, message, &extractor).await
                }
            },
            Intent::AdjustTimeline => timeline::adjust_timeline(&mut updated, message),
            Intent::ApplyDiscount => discount::apply_discount(&mut updated, message),
            Intent::ModifyResources => {
                resources::modify_resources(&mut updated, message, &self.rate_card)
            }
            Intent::Generic => self.generic(message, scope).await,
        };

        info!(
            intent = %intent,
            confidence = classification.confidence,
            labelled_by_model,
            changes = output.changes.len(),
            "Refinement applied"
        );

        RefinementOutcome {
            updated_scope: updated,
            response: output.response,
            changes_made: output.changes,
            intent,
            confidence: classification.confidence,
            labelled_by_model,
        }
    }

    /// Ask the model which handler an ambiguous message belongs to.
    async fn label_intent(&self, message: &str) -> Option<Intent> {
        let prompt = format!(
            r#"Classify this request to change a software project scope.

Request: "{message}"

Categories:
- modify_tasks: add, remove or change activities
- adjust_timeline: make the schedule shorter or longer
- apply_discount: lower the price
- modify_resources: change team headcount
- generic: anything else

Return ONLY JSON: {{"intent": "<category>"}}"#
        );

        let result = generate_with_timeout(
            self.generator.as_ref(),
            &prompt,
            GenerationOptions::new().with_temperature(0.0).with_max_tokens(50),
            self.llm_timeout,
        )
        .await
        .and_then(|text| parse_model_json::<IntentLabel>(&text));

        match result {
            Ok(label) => {
                let intent = Intent::from_label(&label.intent).filter(|i| *i != Intent::Generic);
                debug!(label = %label.intent, ?intent, "Model labelled ambiguous message");
                intent
            }
            Err(e) => {
                warn!(error = %e, "Intent labelling failed; staying generic");
                None
            }
        }
    }

    /// Conversational guidance; never touches the scope.
    async fn generic(&self, message: &str, scope: &ScopeDocument) -> HandlerOutput {
        let prompt = format!(
            "A user wants to refine a project scope.\n\n\
             User request: \"{}\"\n\n\
             Current scope:\n{}\n\n\
             Explain briefly which concrete changes could be made (timeline, activities, team, \
             pricing). Be specific and actionable. Reply in plain text, no JSON.",
            message,
            scope.summary()
        );

        let response = match generate_with_timeout(
            self.generator.as_ref(),
            &prompt,
            GenerationOptions::new().with_temperature(0.7).with_max_tokens(500),
            self.llm_timeout,
        )
        .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => STATIC_GUIDANCE.to_string(),
            Err(e) => {
                warn!(error = %e, "Guidance generation failed; using static text");
                STATIC_GUIDANCE.to_string()
            }
        };

        HandlerOutput {
            response,
            changes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{ScriptedGenerator, StalledGenerator};
    use crate::scope::{Phase, ResourceAllocation, Timeline};

    fn scope() -> ScopeDocument {
        let mut scope = ScopeDocument {
            timeline: Timeline {
                phases: vec![Phase::new("Plan", 4), Phase::new("Build", 12), Phase::new("Ship", 4)],
                ..Default::default()
            },
            resources: vec![ResourceAllocation::new("Frontend Developer", 2, 4.0, 8000.0)],
            ..Default::default()
        };
        scope.normalize();
        scope
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.5), "$999.50");
        assert_eq!(format_currency(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_currency(-9600.0), "-$9,600.00");
    }

    #[tokio::test]
    async fn generic_never_mutates() {
        let engine = RefinementEngine::new(Arc::new(ScriptedGenerator::replying(
            "You could shorten the timeline.",
        )));
        let scope = scope();
        let outcome = engine.refine("hmm, thoughts?", &scope).await;

        assert_eq!(outcome.intent, Intent::Generic);
        assert_eq!(outcome.updated_scope, scope);
        assert!(outcome.changes_made.is_empty());
        assert_eq!(outcome.response, "You could shorten the timeline.");
    }

    #[tokio::test]
    async fn generic_uses_static_guidance_on_timeout() {
        let engine = RefinementEngine::new(Arc::new(StalledGenerator))
            .with_timeout(Duration::from_millis(20));
        let outcome = engine.refine("hello there", &scope()).await;
        assert_eq!(outcome.response, STATIC_GUIDANCE);
    }

    #[tokio::test]
    async fn ambiguous_message_is_labelled_by_model() {
        // "15%" alone scores 0.5 for discount, below its 0.7 threshold.
        let engine = RefinementEngine::new(Arc::new(ScriptedGenerator::replying(
            r#"{"intent": "apply_discount"}"#,
        )));
        let outcome = engine.refine("15%", &scope()).await;

        assert_eq!(outcome.intent, Intent::ApplyDiscount);
        assert_eq!(outcome.updated_scope.cost_breakdown.total_cost, 54400.0);
        assert!(outcome.labelled_by_model);
        assert!(outcome.confidence < Intent::ApplyDiscount.threshold());
    }

    #[tokio::test]
    async fn labelling_can_be_disabled() {
        let generator = Arc::new(ScriptedGenerator::replying(r#"{"intent": "apply_discount"}"#));
        let engine = RefinementEngine::new(generator.clone()).with_intent_fallback(false);
        let outcome = engine.refine("15%", &scope()).await;

        assert_eq!(outcome.intent, Intent::Generic);
        assert!(!outcome.labelled_by_model);
        // Only the guidance prompt was sent.
        assert_eq!(generator.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn unparsable_label_stays_generic() {
        let engine = RefinementEngine::new(Arc::new(ScriptedGenerator::replying("not sure")));
        let scope = scope();
        let outcome = engine.refine("15%", &scope).await;
        assert_eq!(outcome.intent, Intent::Generic);
        assert_eq!(outcome.updated_scope, scope);
    }

    #[tokio::test]
    async fn outcome_serializes_snake_case_intent() {
        let engine = RefinementEngine::new(Arc::new(ScriptedGenerator::replying("ok")));
        let outcome = engine.refine("make it 2 weeks shorter", &scope()).await;
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["intent"], "adjust_timeline");
        assert_eq!(json["labelled_by_model"], false);
        assert_eq!(json["updated_scope"]["timeline"]["total_duration_weeks"], 16);
    }
}
