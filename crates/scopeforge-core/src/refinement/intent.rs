//! Intent Classifier
//!
//! Weighted trigger-phrase scoring. Each intent owns a weight and a phrase
//! set; a message scores `weight` for every phrase it contains and a further
//! [`WHOLE_WORD_BONUS`] when that phrase stands as whole words. The best
//! scoring intent is dispatched only if it clears its own threshold.

use serde::{Deserialize, Serialize};

use crate::rates::normalize_text;

/// Extra score for a phrase matched on word boundaries
pub const WHOLE_WORD_BONUS: f64 = 0.2;

/// Confidence reported when nothing matched
pub const GENERIC_CONFIDENCE: f64 = 0.5;

/// Refinement request category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ModifyTasks,
    AdjustTimeline,
    ApplyDiscount,
    ModifyResources,
    Generic,
}

impl Intent {
    /// Intents with a mutation handler, in tie-break order
    pub const ACTIONABLE: [Intent; 4] = [
        Intent::ModifyTasks,
        Intent::AdjustTimeline,
        Intent::ApplyDiscount,
        Intent::ModifyResources,
    ];

    /// Minimum confidence to dispatch to this intent's handler
    pub fn threshold(self) -> f64 {
        match self {
            Intent::ApplyDiscount => 0.7,
            Intent::Generic => 0.0,
            _ => 0.6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::ModifyTasks => "modify_tasks",
            Intent::AdjustTimeline => "adjust_timeline",
            Intent::ApplyDiscount => "apply_discount",
            Intent::ModifyResources => "modify_resources",
            Intent::Generic => "generic",
        }
    }

    /// Parse a snake_case or spaced intent label, as a model might write it
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase().replace([' ', '-'], "_");
        [Self::ACTIONABLE.as_slice(), &[Intent::Generic]]
            .concat()
            .into_iter()
            .find(|intent| intent.as_str() == label)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Intent to dispatch (`Generic` when the best candidate was too weak)
    pub intent: Intent,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Best scoring actionable intent, even if below its threshold
    pub top_candidate: Option<Intent>,
    /// Raw score per actionable intent, in tie-break order
    pub scores: Vec<(Intent, f64)>,
}

impl Classification {
    /// Whether the best candidate matched something but missed its threshold
    pub fn is_ambiguous(&self) -> bool {
        self.intent == Intent::Generic && self.top_candidate.is_some()
    }
}

struct IntentRule {
    intent: Intent,
    weight: f64,
    phrases: &'static [&'static str],
}

const RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::ModifyTasks,
        weight: 0.4,
        phrases: &[
            "add", "remove", "include", "exclude", "delete", "drop", "task", "activity",
            "activities", "add task", "remove activity",
        ],
    },
    IntentRule {
        intent: Intent::AdjustTimeline,
        weight: 0.35,
        phrases: &[
            "shorter", "longer", "faster", "quicker", "extend", "reduce time", "timeline",
            "deadline", "schedule", "duration", "week", "weeks", "month", "months",
        ],
    },
    IntentRule {
        intent: Intent::ApplyDiscount,
        weight: 0.5,
        phrases: &[
            "discount", "% off", "percent off", "reduce cost", "reduce price", "lower the price",
            "cheaper", "rebate", "%", "$",
        ],
    },
    IntentRule {
        intent: Intent::ModifyResources,
        weight: 0.4,
        phrases: &[
            "developer", "developers", "engineer", "engineers", "designer", "tester", "qa",
            "devops", "analyst", "headcount", "team", "resource", "resources", "staff",
            "more team", "less team", "add developer", "increase headcount", "frontend",
            "backend",
        ],
    },
];

/// Keyword/phrase intent classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Score of one rule against an already-normalized message
    fn score(rule: &IntentRule, lowered: &str, padded: &str) -> f64 {
        rule.phrases
            .iter()
            .filter(|phrase| lowered.contains(*phrase))
            .map(|phrase| {
                if padded.contains(&format!(" {} ", phrase)) {
                    rule.weight + WHOLE_WORD_BONUS
                } else {
                    rule.weight
                }
            })
            .sum()
    }

    /// Classify a free-text refinement request
    pub fn classify(&self, message: &str) -> Classification {
        let lowered = message.to_lowercase();
        let padded = format!(" {} ", normalize_text(message));

        let scores: Vec<(Intent, f64)> = RULES
            .iter()
            .map(|rule| (rule.intent, Self::score(rule, &lowered, &padded)))
            .collect();

        // Strictly greater keeps the earliest intent on ties.
        let best = scores
            .iter()
            .filter(|(_, score)| *score > 0.0)
            .fold(None::<(Intent, f64)>, |best, &(intent, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((intent, score)),
            });

        let Some((candidate, score)) = best else {
            return Classification {
                intent: Intent::Generic,
                confidence: GENERIC_CONFIDENCE,
                top_candidate: None,
                scores,
            };
        };

        let confidence = score.min(1.0);
        let intent = if confidence >= candidate.threshold() {
            candidate
        } else {
            Intent::Generic
        };

        Classification {
            intent,
            confidence,
            top_candidate: Some(candidate),
            scores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> Classification {
        IntentClassifier::new().classify(message)
    }

    #[test]
    fn task_removal() {
        let c = classify("remove testing");
        assert_eq!(c.intent, Intent::ModifyTasks);
        assert!((c.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn timeline_keywords_beat_generic_verbs() {
        assert_eq!(classify("make it 2 weeks shorter").intent, Intent::AdjustTimeline);
        assert_eq!(classify("Can we add 2 weeks?").intent, Intent::AdjustTimeline);
    }

    #[test]
    fn discount_needs_strong_evidence() {
        assert_eq!(classify("apply a 15% discount").intent, Intent::ApplyDiscount);
        // A bare percentage scores 0.5, under the 0.7 bar.
        let weak = classify("15%");
        assert_eq!(weak.intent, Intent::Generic);
        assert_eq!(weak.top_candidate, Some(Intent::ApplyDiscount));
        assert!(weak.is_ambiguous());
    }

    #[test]
    fn role_mentions_win_over_add() {
        assert_eq!(classify("add 2 backend developers").intent, Intent::ModifyResources);
        assert_eq!(classify("remove one QA engineer").intent, Intent::ModifyResources);
    }

    #[test]
    fn unmatched_message_is_generic_half_confidence() {
        let c = classify("what do you think?");
        assert_eq!(c.intent, Intent::Generic);
        assert_eq!(c.confidence, GENERIC_CONFIDENCE);
        assert_eq!(c.top_candidate, None);
    }

    #[test]
    fn substring_match_without_word_bonus() {
        // "address" contains "add" but not as a word: 0.4 < 0.6
        let c = classify("address the login flow");
        assert_eq!(c.intent, Intent::Generic);
        assert_eq!(c.top_candidate, Some(Intent::ModifyTasks));
    }

    #[test]
    fn ties_resolve_in_enumeration_order() {
        // "add" (tasks, 0.6) vs "team" (resources, 0.6)
        let c = classify("add team");
        assert_eq!(c.intent, Intent::ModifyTasks);
    }

    #[test]
    fn labels_parse_loosely() {
        assert_eq!(Intent::from_label("Adjust Timeline"), Some(Intent::AdjustTimeline));
        assert_eq!(Intent::from_label("apply-discount"), Some(Intent::ApplyDiscount));
        assert_eq!(Intent::from_label("rewrite"), None);
    }
}
