//! Project profile and document entities.

use serde::{Deserialize, Deserializer, Serialize};

use crate::scope::lenient::{string_lenient, string_list_lenient};

/// Stated project size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Moderate,
    Complex,
    Enterprise,
}

impl Complexity {
    /// Lenient parse: "medium" reads as moderate, anything unknown too.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "simple" | "low" | "basic" => Self::Simple,
            "complex" | "high" | "advanced" => Self::Complex,
            "enterprise" => Self::Enterprise,
            _ => Self::Moderate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Complexity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = string_lenient(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

/// What the user told us about the project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectProfile {
    pub name: String,
    pub domain: Option<String>,
    pub complexity: Option<Complexity>,
    pub tech_stack: Option<String>,
    pub use_cases: Option<String>,
    pub compliance: Option<String>,
    pub duration: Option<String>,
}

impl ProjectProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Domain used to filter knowledge searches, if one is known
    pub fn search_domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Fill fields the user left blank from document entities.
    pub fn merge_entities(&mut self, entities: &ExtractedEntities) {
        fn fill(slot: &mut Option<String>, value: String) {
            let blank = slot.as_deref().map_or(true, |s| s.trim().is_empty());
            if blank && !value.is_empty() && value != NOT_SPECIFIED {
                *slot = Some(value);
            }
        }

        if entities.domain != DEFAULT_DOMAIN {
            fill(&mut self.domain, entities.domain.clone());
        }
        fill(&mut self.tech_stack, entities.tech_stack.join(", "));
        fill(&mut self.use_cases, entities.key_features.join(", "));
        fill(&mut self.compliance, entities.compliance_requirements.join(", "));
        fill(&mut self.duration, entities.estimated_duration.clone());
        if self.complexity.is_none() {
            self.complexity = Some(entities.complexity);
        }
    }

    /// Labelled project lines for prompts
    pub fn describe(&self) -> String {
        let field = |value: &Option<String>| value.clone().unwrap_or_else(|| NOT_SPECIFIED.into());
        format!(
            "- Name: {}\n- Domain: {}\n- Complexity: {}\n- Tech Stack: {}\n- Use Cases: {}\n\
             - Compliance: {}\n- Duration: {}",
            self.name,
            field(&self.domain),
            self.complexity.unwrap_or_default(),
            field(&self.tech_stack),
            field(&self.use_cases),
            field(&self.compliance),
            field(&self.duration),
        )
    }
}

/// Placeholder for entity fields a document did not mention
pub const NOT_SPECIFIED: &str = "Not specified";

/// Domain assumed when none is found
pub const DEFAULT_DOMAIN: &str = "General";

fn not_specified() -> String {
    NOT_SPECIFIED.to_string()
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

/// Structured facts pulled out of an uploaded requirements document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default = "not_specified", deserialize_with = "string_lenient")]
    pub project_type: String,
    #[serde(default = "default_domain", deserialize_with = "string_lenient")]
    pub domain: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default, deserialize_with = "string_list_lenient")]
    pub deliverables: Vec<String>,
    #[serde(default, deserialize_with = "string_list_lenient")]
    pub tech_stack: Vec<String>,
    #[serde(default, deserialize_with = "string_list_lenient")]
    pub compliance_requirements: Vec<String>,
    #[serde(default = "not_specified", deserialize_with = "string_lenient")]
    pub estimated_duration: String,
    #[serde(default, deserialize_with = "string_list_lenient")]
    pub key_features: Vec<String>,
    #[serde(default, deserialize_with = "string_list_lenient")]
    pub integration_requirements: Vec<String>,
    #[serde(default, deserialize_with = "string_list_lenient")]
    pub security_requirements: Vec<String>,
    #[serde(default, deserialize_with = "string_list_lenient")]
    pub user_roles: Vec<String>,
    #[serde(default = "not_specified", deserialize_with = "string_lenient")]
    pub scalability_needs: String,
    #[serde(default = "not_specified", deserialize_with = "string_lenient")]
    pub budget_indicators: String,
}

impl Default for ExtractedEntities {
    fn default() -> Self {
        Self {
            project_type: not_specified(),
            domain: default_domain(),
            complexity: Complexity::Moderate,
            deliverables: Vec::new(),
            tech_stack: Vec::new(),
            compliance_requirements: Vec::new(),
            estimated_duration: not_specified(),
            key_features: Vec::new(),
            integration_requirements: Vec::new(),
            security_requirements: Vec::new(),
            user_roles: Vec::new(),
            scalability_needs: not_specified(),
            budget_indicators: not_specified(),
        }
    }
}
