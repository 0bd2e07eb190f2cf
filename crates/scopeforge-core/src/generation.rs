//! Scope Generation
//!
//! Entity extraction from uploaded documents, clarifying questions grounded
//! in similar historical projects, and first-draft scope generation. Every
//! model call has a fixed fallback so the project workflow never stalls on a
//! bad or missing response.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, ScopeError};
use crate::knowledge::{SearchFilters, SimilarProject, SimilaritySearch};
use crate::llm::{generate_with_timeout, parse_model_json, GenerationOptions, TextGenerator};
use crate::project::{Complexity, ExtractedEntities, ProjectProfile, DEFAULT_DOMAIN, NOT_SPECIFIED};
use crate::refinement::DEFAULT_LLM_TIMEOUT;
use crate::scope::lenient::{string_lenient, string_list_lenient};
use crate::scope::{
    round2, Activity, ActivityDependency, CostBreakdown, Overview, Phase, RagInsights,
    ResourceAllocation, Risk, ScopeDocument, ScopeMetadata, Timeline,
    DEFAULT_CONTINGENCY_PERCENTAGE,
};

/// Characters of an uploaded document sent for entity extraction
pub const ENTITY_PROMPT_CHARS: usize = 5000;

/// Characters of an uploaded document folded into the search query
pub const SEARCH_QUERY_CHARS: usize = 500;

/// Similar projects retrieved during analysis
pub const SIMILAR_PROJECT_LIMIT: usize = 3;

/// Similar projects quoted in the scope prompt
const SCOPE_PROMPT_PROJECTS: usize = 2;

/// Confidence of a scope drafted without historical references
pub const BASE_CONFIDENCE: f64 = 0.6;

const STANDARD_ASSUMPTIONS: &[&str] = &[
    "Client will provide timely feedback and approvals",
    "All required resources will be available as planned",
    "Requirements are stable and major changes will follow change management process",
    "Development environment and tools are accessible",
    "Third-party services/APIs will be available and functioning",
];

const HEALTHCARE_ASSUMPTION: &str = "HIPAA compliance requirements are clearly documented";
const FINANCE_ASSUMPTION: &str = "PCI-DSS and financial compliance standards are defined";

/// Question the user should answer before a scope is generated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClarifyingQuestion {
    #[serde(deserialize_with = "string_lenient")]
    pub id: String,
    #[serde(deserialize_with = "string_lenient")]
    pub category: String,
    #[serde(deserialize_with = "string_lenient")]
    pub question: String,
    #[serde(deserialize_with = "string_lenient")]
    pub importance: String,
    #[serde(deserialize_with = "string_list_lenient")]
    pub suggested_answers: Vec<String>,
}

impl ClarifyingQuestion {
    fn new(id: &str, category: &str, question: &str, answers: &[&str]) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            question: question.into(),
            importance: "high".into(),
            suggested_answers: answers.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// A user's answer to a clarifying question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialAnalysis {
    pub summary: String,
    pub key_challenges: Vec<String>,
    pub recommended_approach: String,
    pub estimated_complexity: Complexity,
    pub missing_information: Vec<String>,
}

/// Output of the analysis step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    pub questions: Vec<ClarifyingQuestion>,
    pub initial_analysis: InitialAnalysis,
    pub similar_projects: Vec<SimilarProject>,
    pub rag_used: bool,
}

/// Questions asked when the model cannot produce any
pub fn fallback_questions() -> Vec<ClarifyingQuestion> {
    vec![
        ClarifyingQuestion::new(
            "q1",
            "Technical Requirements",
            "What are your specific technical requirements?",
            &["Web application", "Mobile app", "Desktop software", "API/Backend"],
        ),
        ClarifyingQuestion::new(
            "q2",
            "Business Requirements",
            "What is your target user base size?",
            &["< 1000", "1K-10K", "10K-100K", "> 100K"],
        ),
        ClarifyingQuestion::new(
            "q3",
            "Timeline & Resources",
            "What is your target launch date?",
            &["< 3 months", "3-6 months", "6-12 months", "> 12 months"],
        ),
    ]
}

/// Minimal but internally consistent scope used when generation fails
pub fn fallback_scope(profile: &ProjectProfile, contingency_percentage: f64) -> ScopeDocument {
    let domain = profile.search_domain().unwrap_or("Unknown");
    let phase = |name: &str, weeks: u32, milestone: &str, activity: &str| Phase {
        milestones: vec![milestone.to_string()],
        activities: vec![activity.to_string()],
        ..Phase::new(name, weeks)
    };
    let activity = |name: &str, phase: &str, days: u32, role: &str| Activity {
        resources_needed: vec![role.to_string()],
        ..Activity::new(name, phase, days)
    };

    let mut scope = ScopeDocument {
        overview: Overview {
            project_summary: format!("Project scoping for {} in {} domain", profile.name, domain),
            key_objectives: vec![
                "Deliver quality solution".into(),
                "Meet timeline".into(),
                "Stay within budget".into(),
            ],
            success_metrics: vec![
                "Client satisfaction".into(),
                "On-time delivery".into(),
                "Budget adherence".into(),
            ],
            deliverables: vec![
                "Working software".into(),
                "Documentation".into(),
                "Training materials".into(),
            ],
        },
        timeline: Timeline {
            phases: vec![
                phase("Phase 1: Planning", 4, "Requirements complete", "Requirements Analysis"),
                phase("Phase 2: Development", 16, "Core features complete", "Implementation"),
                phase("Phase 3: Testing & Deployment", 4, "Production release", "Quality Assurance"),
            ],
            ..Default::default()
        },
        activities: vec![
            activity("Requirements Analysis", "Planning", 10, "Business Analyst"),
            activity("Implementation", "Development", 60, "Developer"),
            activity("Quality Assurance", "Testing & Deployment", 15, "QA Engineer"),
        ],
        resources: vec![
            ResourceAllocation::new("Project Manager", 1, 0.0, 10000.0),
            ResourceAllocation::new("Developer", 2, 3.7, 8000.0),
            ResourceAllocation::new("QA Engineer", 1, 1.0, 7000.0),
        ],
        cost_breakdown: CostBreakdown {
            contingency_percentage,
            ..Default::default()
        },
        risks: vec![Risk {
            risk: "Incomplete requirements".into(),
            category: "Requirements".into(),
            probability: "Medium".into(),
            impact: "High".into(),
            severity: "High".into(),
            mitigation: "Detailed discovery phase".into(),
            owner: "Project Manager".into(),
        }],
        assumptions: vec![
            "Client will provide timely feedback".into(),
            "Resources will be available as needed".into(),
        ],
        ..Default::default()
    };
    scope.normalize();
    scope
}

/// Record which historical projects informed a scope
pub fn rag_insights(similar: &[SimilarProject]) -> Option<RagInsights> {
    let best = similar.first()?;
    Some(RagInsights {
        similar_projects_count: similar.len(),
        most_similar_project: best.project_name.clone(),
        similarity_score: best.similarity_score,
        historical_reference: true,
        insights_applied: vec![
            format!("Timeline adjusted based on {} project", best.project_name),
            format!("Resource allocation informed by similar {} projects", best.domain),
            "Cost estimates validated against historical data".to_string(),
        ],
    })
}

/// `0.6 + 0.4 × mean similarity`, two decimals; `0.6` without references
pub fn confidence_score(similar: &[SimilarProject]) -> f64 {
    if similar.is_empty() {
        return BASE_CONFIDENCE;
    }
    let mean = similar.iter().map(|p| p.similarity_score).sum::<f64>() / similar.len() as f64;
    round2(BASE_CONFIDENCE + (1.0 - BASE_CONFIDENCE) * mean.clamp(0.0, 1.0))
}

/// Scope assumptions: the drafted list (or a standard set when empty) plus
/// compliance entries for regulated domains.
pub fn project_assumptions(profile: &ProjectProfile, drafted: &[String]) -> Vec<String> {
    let mut assumptions: Vec<String> = if drafted.is_empty() {
        STANDARD_ASSUMPTIONS.iter().map(|a| a.to_string()).collect()
    } else {
        drafted.to_vec()
    };

    let domain = profile.search_domain().unwrap_or_default().to_lowercase();
    let mut regulated = Vec::new();
    if domain.contains("healthcare") {
        regulated.push(HEALTHCARE_ASSUMPTION);
    }
    if domain.contains("finance") || domain.contains("fintech") {
        regulated.push(FINANCE_ASSUMPTION);
    }
    for entry in regulated {
        if !assumptions.iter().any(|a| a == entry) {
            assumptions.push(entry.to_string());
        }
    }
    assumptions
}

/// Top-level dependency list derived from each activity's own dependencies
pub fn activity_dependencies(activities: &[Activity]) -> Vec<ActivityDependency> {
    activities
        .iter()
        .filter(|a| !a.dependencies.is_empty())
        .map(|a| ActivityDependency {
            activity: a.name.clone(),
            depends_on: a.dependencies.clone(),
            phase: if a.phase.is_empty() {
                "Unknown".to_string()
            } else {
                a.phase.clone()
            },
        })
        .collect()
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

fn fill_blank(field: &mut String, default: &str) {
    if field.trim().is_empty() {
        *field = default.to_string();
    }
}

/// Model-backed generation workflow
#[derive(Debug, Clone)]
pub struct ScopeGenerator {
    generator: Arc<dyn TextGenerator>,
    knowledge: Arc<dyn SimilaritySearch>,
    timeout: Duration,
    contingency_percentage: f64,
}

impl ScopeGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, knowledge: Arc<dyn SimilaritySearch>) -> Self {
        Self {
            generator,
            knowledge,
            timeout: DEFAULT_LLM_TIMEOUT,
            contingency_percentage: DEFAULT_CONTINGENCY_PERCENTAGE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Contingency used by the fallback scope
    pub fn with_contingency(mut self, percentage: f64) -> Self {
        self.contingency_percentage = percentage;
        self
    }

    async fn ask<T: serde::de::DeserializeOwned>(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<T> {
        let text = generate_with_timeout(self.generator.as_ref(), prompt, options, self.timeout).await?;
        parse_model_json(&text)
    }

    /// Pull structured entities out of an uploaded document.
    pub async fn extract_entities(&self, text: &str) -> ExtractedEntities {
        let prompt = format!(
            r#"You analyze project documents (RFPs, SOWs, requirements).
Extract the key entities from the document below.

complexity MUST be one of: "simple", "moderate", "complex", "enterprise".

Document (first {limit} chars):
{document}

Return ONLY this JSON structure:
{{
  "project_type": "string",
  "domain": "string",
  "complexity": "simple|moderate|complex|enterprise",
  "deliverables": ["item"],
  "tech_stack": ["tech"],
  "compliance_requirements": ["standard"],
  "estimated_duration": "string",
  "key_features": ["feature"],
  "integration_requirements": ["system"],
  "security_requirements": ["requirement"],
  "user_roles": ["role"],
  "scalability_needs": "description",
  "budget_indicators": "any cost mentions"
}}"#,
            limit = ENTITY_PROMPT_CHARS,
            document = truncate_chars(text, ENTITY_PROMPT_CHARS),
        );

        match self
            .ask::<ExtractedEntities>(&prompt, GenerationOptions::structured().with_max_tokens(2048))
            .await
        {
            Ok(mut entities) => {
                fill_blank(&mut entities.project_type, NOT_SPECIFIED);
                fill_blank(&mut entities.domain, DEFAULT_DOMAIN);
                fill_blank(&mut entities.estimated_duration, NOT_SPECIFIED);
                fill_blank(&mut entities.scalability_needs, NOT_SPECIFIED);
                fill_blank(&mut entities.budget_indicators, NOT_SPECIFIED);
                info!(domain = %entities.domain, complexity = %entities.complexity, "Extracted document entities");
                entities
            }
            Err(e) => {
                warn!(error = %e, "Entity extraction failed; using defaults");
                ExtractedEntities::default()
            }
        }
    }

    fn search_query(profile: &ProjectProfile, uploaded_text: Option<&str>) -> String {
        let complexity = profile.complexity.map(|c| c.to_string());
        let mut parts: Vec<&str> = [
            Some(profile.name.as_str()),
            profile.domain.as_deref(),
            complexity.as_deref(),
            profile.tech_stack.as_deref(),
            profile.use_cases.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
        if let Some(text) = uploaded_text {
            parts.push(truncate_chars(text, SEARCH_QUERY_CHARS));
        }
        parts.join(" ")
    }

    fn similar_projects_context(similar: &[SimilarProject]) -> String {
        if similar.is_empty() {
            return "No similar historical projects found.".to_string();
        }
        let mut context = String::from("INSIGHTS FROM SIMILAR HISTORICAL PROJECTS:\n\n");
        for (i, project) in similar.iter().enumerate() {
            context.push_str(&format!(
                "Project {}: {}\nDomain: {} | Complexity: {}\nCost: ${:.0} | Duration: {} months\n\
                 Similarity: {:.2}\n",
                i + 1,
                project.project_name,
                project.domain,
                project.complexity,
                project.total_cost,
                project.duration_months,
                project.similarity_score
            ));
            for insight in &project.key_insights {
                context.push_str(&format!("  - {}\n", insight));
            }
            context.push('\n');
        }
        context
    }

    /// Find similar projects and draft clarifying questions.
    pub async fn analyze_project(
        &self,
        profile: &ProjectProfile,
        uploaded_text: Option<&str>,
    ) -> ProjectAnalysis {
        let query = Self::search_query(profile, uploaded_text);
        let filters = SearchFilters {
            domain: profile.search_domain().map(str::to_string),
        };
        let similar_projects = match self
            .knowledge
            .search(&query, &filters, SIMILAR_PROJECT_LIMIT)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Similar project search failed");
                Vec::new()
            }
        };
        debug!(hits = similar_projects.len(), "Similar project search done");

        let prompt = format!(
            r#"You are an expert project consultant. Generate 5-7 clarifying questions for this project.

PROJECT INFO:
{profile}

{context}

Return ONLY a JSON array of objects with the fields
"id", "category", "question", "importance" ("high" | "medium" | "low") and "suggested_answers" (array of strings)."#,
            profile = profile.describe(),
            context = Self::similar_projects_context(&similar_projects),
        );

        let complexity = profile.complexity.unwrap_or_default();
        let (questions, initial_analysis) = match self
            .ask::<Vec<ClarifyingQuestion>>(&prompt, GenerationOptions::new().with_temperature(0.4))
            .await
        {
            Ok(questions) if !questions.is_empty() => (
                questions,
                InitialAnalysis {
                    summary: format!(
                        "Project scoping for {} in {} domain",
                        profile.name,
                        profile.search_domain().unwrap_or("general")
                    ),
                    key_challenges: vec![
                        "Resource allocation".into(),
                        "Timeline management".into(),
                        "Quality assurance".into(),
                    ],
                    recommended_approach: "Agile methodology with 2-week sprints".into(),
                    estimated_complexity: complexity,
                    missing_information: vec![
                        "Detailed requirements".into(),
                        "Budget constraints".into(),
                    ],
                },
            ),
            result => {
                if let Err(e) = result {
                    warn!(error = %e, "Question generation failed; using fallback questions");
                }
                (
                    fallback_questions(),
                    InitialAnalysis {
                        summary: "Initial analysis pending detailed information".into(),
                        key_challenges: vec!["Requirements clarification needed".into()],
                        recommended_approach: "Agile methodology".into(),
                        estimated_complexity: complexity,
                        missing_information: vec!["Detailed requirements".into()],
                    },
                )
            }
        };

        ProjectAnalysis {
            questions,
            initial_analysis,
            rag_used: !similar_projects.is_empty(),
            similar_projects,
        }
    }

    fn scope_prompt(
        profile: &ProjectProfile,
        answers: &[QuestionAnswer],
        similar: &[SimilarProject],
    ) -> String {
        let mut context = format!("PROJECT DETAILS:\n{}\n", profile.describe());
        if !answers.is_empty() {
            context.push_str("\nCLARIFYING ANSWERS:\n");
            for qa in answers {
                context.push_str(&format!("Q: {}\nA: {}\n\n", qa.question, qa.answer));
            }
        }
        if !similar.is_empty() {
            context.push_str("\nHISTORICAL PROJECT INSIGHTS:\n");
            for project in similar.iter().take(SCOPE_PROMPT_PROJECTS) {
                context.push_str(&format!(
                    "- Similar project '{}': {} months, ${:.0}\n",
                    project.project_name, project.duration_months, project.total_cost
                ));
                for insight in project.key_insights.iter().take(2) {
                    context.push_str(&format!("  - {}\n", insight));
                }
            }
        }

        format!(
            r#"You are an expert project manager. Generate a COMPREHENSIVE project scope.

{context}

Return ONLY a JSON object with this structure:
{{
  "overview": {{"project_summary": "3-4 sentences", "key_objectives": [], "success_metrics": [], "deliverables": []}},
  "timeline": {{"total_duration_months": 6, "total_duration_weeks": 24, "phases": [
    {{"phase_name": "Phase 1: Planning & Design", "duration_weeks": 4, "start_week": 1, "end_week": 4, "milestones": [], "activities": []}}
  ]}},
  "activities": [{{"name": "Requirements Analysis", "phase": "Planning & Design", "effort_days": 10, "dependencies": [], "resources_needed": ["Business Analyst"]}}],
  "resources": [{{"role": "Project Manager", "count": 1, "effort_months": 6, "allocation_percentage": 100, "monthly_rate": 10000, "total_cost": 60000}}],
  "architecture": {{"description": "", "components": [{{"name": "", "technology": "", "description": ""}}]}},
  "cost_breakdown": {{"total_cost": 0, "subtotal": 0, "contingency_percentage": 15, "contingency_amount": 0, "discount_applied": 0}},
  "risks": [{{"risk": "", "category": "", "probability": "", "impact": "", "severity": "", "mitigation": "", "owner": ""}}],
  "assumptions": [],
  "dependencies": [{{"activity": "", "depends_on": [], "phase": ""}}]
}}

Use each role at most once in "resources"."#
        )
    }

    async fn draft_scope(
        &self,
        profile: &ProjectProfile,
        answers: &[QuestionAnswer],
        similar: &[SimilarProject],
    ) -> Result<ScopeDocument> {
        let prompt = Self::scope_prompt(profile, answers, similar);
        let scope: ScopeDocument = self
            .ask(&prompt, GenerationOptions::new().with_temperature(0.3).with_max_tokens(8192))
            .await?;
        if scope.timeline.phases.is_empty() && scope.resources.is_empty() {
            return Err(ScopeError::ModelOutput("scope has neither phases nor resources".into()));
        }
        let report = scope.validate()?;
        for warning in &report.warnings {
            debug!(%warning, "Generated scope warning");
        }
        Ok(scope)
    }

    /// Generate the first scope draft.
    ///
    /// Unusable model output (unparsable, empty, or failing validation) is
    /// replaced by [`fallback_scope`].
    pub async fn generate_scope(
        &self,
        profile: &ProjectProfile,
        answers: &[QuestionAnswer],
        similar: &[SimilarProject],
    ) -> ScopeDocument {
        let mut scope = match self.draft_scope(profile, answers, similar).await {
            Ok(scope) => scope,
            Err(e) => {
                warn!(project = %profile.name, error = %e, "Scope generation failed; using fallback scope");
                fallback_scope(profile, self.contingency_percentage)
            }
        };
        scope.rag_insights = rag_insights(similar);
        scope.assumptions = project_assumptions(profile, &scope.assumptions);
        scope.dependencies = activity_dependencies(&scope.activities);
        scope.metadata = Some(ScopeMetadata {
            confidence_score: confidence_score(similar),
            rag_sources_count: similar.len(),
            generated_at: Utc::now(),
        });
        scope.normalize();
        info!(
            project = %profile.name,
            weeks = scope.timeline.total_duration_weeks,
            total_cost = scope.cost_breakdown.total_cost,
            confidence = confidence_score(similar),
            "Scope generated"
        );
        scope
    }
}
