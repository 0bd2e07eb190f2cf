//! Rate card and role vocabulary.
//!
//! Maps free-text role mentions ("2 more backend devs", "a tester") onto the
//! canonical role names used in scope documents, and canonical roles onto
//! monthly rates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role used when a message names no recognizable role
pub const DEFAULT_ROLE: &str = "Developer";

/// Roles that are staffed for the whole project regardless of activity mix
pub const FULL_DURATION_ROLES: &[&str] = &["Project Manager", "Business Analyst"];

/// Monthly rate for roles missing from the card
pub const FALLBACK_MONTHLY_RATE: f64 = 8000.0;

const STANDARD_RATES: &[(&str, f64)] = &[
    ("Project Manager", 10000.0),
    ("Business Analyst", 8000.0),
    ("UI/UX Designer", 7000.0),
    ("Frontend Developer", 8000.0),
    ("Backend Developer", 8500.0),
    ("Full Stack Developer", 9000.0),
    ("QA Engineer", 7000.0),
    ("DevOps Engineer", 9000.0),
    ("Database Architect", 9500.0),
    ("Developer", 8000.0),
];

// Checked in order; multi-word keys must precede their single-word parts.
const ROLE_KEYWORDS: &[(&str, &str)] = &[
    ("full stack", "Full Stack Developer"),
    ("fullstack", "Full Stack Developer"),
    ("frontend", "Frontend Developer"),
    ("front end", "Frontend Developer"),
    ("backend", "Backend Developer"),
    ("back end", "Backend Developer"),
    ("designer", "UI/UX Designer"),
    ("ux", "UI/UX Designer"),
    ("ui", "UI/UX Designer"),
    ("qa", "QA Engineer"),
    ("tester", "QA Engineer"),
    ("devops", "DevOps Engineer"),
    ("project manager", "Project Manager"),
    ("pm", "Project Manager"),
    ("business analyst", "Business Analyst"),
    ("analyst", "Business Analyst"),
    ("ba", "Business Analyst"),
    ("architect", "Database Architect"),
    ("dba", "Database Architect"),
];

/// Whether `keyword` occurs in `text` on word boundaries. A single-word
/// keyword also matches its plural, so "testers" finds "tester".
fn mentions(text: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        return format!(" {} ", text).contains(&format!(" {} ", keyword));
    }
    text.split_whitespace()
        .any(|word| word == keyword || word.strip_suffix('s') == Some(keyword))
}

/// Lowercase and turn punctuation into spaces, keeping `/` joined words apart.
pub fn normalize_text(message: &str) -> String {
    message
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '%' || c == '$' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical role named in a message, if any
pub fn detect_role(message: &str) -> Option<&'static str> {
    let text = normalize_text(message);
    ROLE_KEYWORDS
        .iter()
        .find(|(keyword, _)| mentions(&text, keyword))
        .map(|(_, role)| *role)
}

/// Role → monthly rate lookup with optional overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateCard {
    #[serde(default)]
    overrides: HashMap<String, f64>,
}

impl RateCard {
    /// Standard rates only
    pub fn standard() -> Self {
        Self::default()
    }

    /// Standard rates with per-role overrides (e.g. from a company rate card)
    pub fn with_overrides(overrides: HashMap<String, f64>) -> Self {
        Self { overrides }
    }

    /// Monthly rate for a canonical role
    pub fn monthly_rate(&self, role: &str) -> f64 {
        if let Some(rate) = self.overrides.get(role) {
            return *rate;
        }
        STANDARD_RATES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(role))
            .map(|(_, rate)| *rate)
            .unwrap_or(FALLBACK_MONTHLY_RATE)
    }
}

/// Whether a role is always staffed for the full timeline
pub fn is_full_duration_role(role: &str) -> bool {
    FULL_DURATION_ROLES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(role))
}
