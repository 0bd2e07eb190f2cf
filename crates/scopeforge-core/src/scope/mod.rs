//! Scope Document Model
//!
//! The structured project plan that scope generation produces and refinement
//! mutates. Derived fields (phase offsets, totals, resource costs, contingency)
//! are maintained by [`crate::refinement::recalc`]; everything else is
//! descriptive data carried through unchanged.
//!
//! # Invariants
//!
//! - phases are contiguous from week 1: `end_week = start_week + duration_weeks - 1`
//!   and each phase starts the week after its predecessor ends
//! - `total_duration_weeks = Σ duration_weeks`, `total_duration_months = round(weeks / 4.33, 1)`
//! - `resource.total_cost = count × effort_months × monthly_rate × (1 - discount/100)`
//! - `cost_breakdown.total_cost = Σ resource.total_cost`,
//!   `contingency_amount = total_cost × contingency_percentage / 100`

pub mod lenient;
mod validation;

pub use validation::{ValidationReport, ValidationWarning};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lenient::{
    contingency_lenient, f64_lenient, string_lenient, string_list_lenient, u32_lenient,
};

/// Working weeks per calendar month used for every week/month conversion
pub const WEEKS_PER_MONTH: f64 = 4.33;

/// Contingency buffer applied when a scope does not state one
pub const DEFAULT_CONTINGENCY_PERCENTAGE: f64 = 15.0;

/// Shortest duration a phase can be compressed to
pub const MIN_PHASE_WEEKS: u32 = 2;

/// Longest timeline a scope may describe (ten years)
pub const MAX_TIMELINE_WEEKS: u32 = 520;

/// Largest effort a single activity may carry
pub const MAX_ACTIVITY_EFFORT_DAYS: u32 = 10_000;

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places (currency)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert a week count into months, rounded to one decimal
pub fn weeks_to_months(weeks: u32) -> f64 {
    round1(f64::from(weeks) / WEEKS_PER_MONTH)
}

fn default_contingency() -> f64 {
    DEFAULT_CONTINGENCY_PERCENTAGE
}

/// Structured project plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeDocument {
    pub overview: Overview,
    pub timeline: Timeline,
    pub activities: Vec<Activity>,
    pub resources: Vec<ResourceAllocation>,
    pub cost_breakdown: CostBreakdown,
    pub risks: Vec<Risk>,
    #[serde(deserialize_with = "string_list_lenient")]
    pub assumptions: Vec<String>,
    pub dependencies: Vec<ActivityDependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<Architecture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_insights: Option<RagInsights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ScopeMetadata>,
}

/// Free-form summary of the project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overview {
    #[serde(deserialize_with = "string_lenient")]
    pub project_summary: String,
    #[serde(deserialize_with = "string_list_lenient")]
    pub key_objectives: Vec<String>,
    #[serde(deserialize_with = "string_list_lenient")]
    pub success_metrics: Vec<String>,
    #[serde(deserialize_with = "string_list_lenient")]
    pub deliverables: Vec<String>,
}

/// Phased schedule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeline {
    #[serde(deserialize_with = "f64_lenient")]
    pub total_duration_months: f64,
    #[serde(deserialize_with = "u32_lenient")]
    pub total_duration_weeks: u32,
    pub phases: Vec<Phase>,
}

impl Timeline {
    /// Sum of phase durations
    pub fn phase_weeks(&self) -> u32 {
        self.phases
            .iter()
            .fold(0u32, |total, p| total.saturating_add(p.duration_weeks))
    }

    /// Re-walk phases from week 1 and refresh the totals.
    ///
    /// With no phases the stated totals are left alone.
    pub fn relayout(&mut self) {
        if self.phases.is_empty() {
            return;
        }

        let mut week = 1;
        for phase in &mut self.phases {
            phase.duration_weeks = phase.duration_weeks.max(1);
            phase.start_week = week;
            phase.end_week = week.saturating_add(phase.duration_weeks - 1);
            week = phase.end_week.saturating_add(1);
        }

        self.total_duration_weeks = self.phase_weeks();
        self.total_duration_months = weeks_to_months(self.total_duration_weeks);
    }

    /// Whether phases are contiguous and ordered starting at week 1
    pub fn is_contiguous(&self) -> bool {
        let mut expected_start = 1;
        for phase in &self.phases {
            if phase.start_week != expected_start
                || phase.end_week + 1 != phase.start_week + phase.duration_weeks
            {
                return false;
            }
            expected_start = phase.end_week + 1;
        }
        true
    }
}

/// One timeline phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Phase {
    #[serde(deserialize_with = "string_lenient")]
    pub phase_name: String,
    #[serde(deserialize_with = "u32_lenient")]
    pub duration_weeks: u32,
    #[serde(deserialize_with = "u32_lenient")]
    pub start_week: u32,
    #[serde(deserialize_with = "u32_lenient")]
    pub end_week: u32,
    #[serde(deserialize_with = "string_list_lenient")]
    pub milestones: Vec<String>,
    #[serde(deserialize_with = "string_list_lenient")]
    pub activities: Vec<String>,
}

impl Phase {
    pub fn new(name: impl Into<String>, duration_weeks: u32) -> Self {
        Self {
            phase_name: name.into(),
            duration_weeks,
            ..Default::default()
        }
    }
}

/// Unit of work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Activity {
    #[serde(deserialize_with = "string_lenient")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(deserialize_with = "string_lenient")]
    pub phase: String,
    #[serde(deserialize_with = "u32_lenient")]
    pub effort_days: u32,
    #[serde(deserialize_with = "string_list_lenient")]
    pub dependencies: Vec<String>,
    #[serde(deserialize_with = "string_list_lenient")]
    pub resources_needed: Vec<String>,
}

impl Activity {
    pub fn new(name: impl Into<String>, phase: impl Into<String>, effort_days: u32) -> Self {
        Self {
            name: name.into(),
            phase: phase.into(),
            effort_days,
            ..Default::default()
        }
    }
}

/// Staffing line for one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceAllocation {
    #[serde(deserialize_with = "string_lenient")]
    pub role: String,
    #[serde(deserialize_with = "u32_lenient")]
    pub count: u32,
    #[serde(deserialize_with = "f64_lenient")]
    pub effort_months: f64,
    #[serde(deserialize_with = "u32_lenient")]
    pub allocation_percentage: u32,
    #[serde(deserialize_with = "f64_lenient")]
    pub monthly_rate: f64,
    #[serde(deserialize_with = "f64_lenient")]
    pub total_cost: f64,
}

impl Default for ResourceAllocation {
    fn default() -> Self {
        Self {
            role: String::new(),
            count: 0,
            effort_months: 0.0,
            allocation_percentage: 100,
            monthly_rate: 0.0,
            total_cost: 0.0,
        }
    }
}

impl ResourceAllocation {
    /// Create a fully allocated line with its cost already computed
    pub fn new(role: impl Into<String>, count: u32, effort_months: f64, monthly_rate: f64) -> Self {
        let mut resource = Self {
            role: role.into(),
            count,
            effort_months,
            monthly_rate,
            ..Default::default()
        };
        resource.total_cost = round2(resource.base_cost());
        resource
    }

    /// Undiscounted cost: `count × effort_months × monthly_rate`
    pub fn base_cost(&self) -> f64 {
        f64::from(self.count) * self.effort_months * self.monthly_rate
    }
}

/// Cost rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostBreakdown {
    #[serde(deserialize_with = "f64_lenient")]
    pub total_cost: f64,
    #[serde(deserialize_with = "f64_lenient")]
    pub subtotal: f64,
    #[serde(
        default = "default_contingency",
        deserialize_with = "contingency_lenient"
    )]
    pub contingency_percentage: f64,
    #[serde(deserialize_with = "f64_lenient")]
    pub contingency_amount: f64,
    /// Cumulative discount, as a percentage of the undiscounted subtotal
    #[serde(deserialize_with = "f64_lenient")]
    pub discount_applied: f64,
}

impl Default for CostBreakdown {
    fn default() -> Self {
        Self {
            total_cost: 0.0,
            subtotal: 0.0,
            contingency_percentage: DEFAULT_CONTINGENCY_PERCENTAGE,
            contingency_amount: 0.0,
            discount_applied: 0.0,
        }
    }
}

impl CostBreakdown {
    /// Fraction of the undiscounted price still charged
    pub fn retained_fraction(&self) -> f64 {
        (1.0 - self.discount_applied / 100.0).clamp(0.0, 1.0)
    }
}

/// Risk register entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Risk {
    #[serde(deserialize_with = "string_lenient")]
    pub risk: String,
    #[serde(deserialize_with = "string_lenient")]
    pub category: String,
    #[serde(deserialize_with = "string_lenient")]
    pub probability: String,
    #[serde(deserialize_with = "string_lenient")]
    pub impact: String,
    #[serde(deserialize_with = "string_lenient")]
    pub severity: String,
    #[serde(deserialize_with = "string_lenient")]
    pub mitigation: String,
    #[serde(deserialize_with = "string_lenient")]
    pub owner: String,
}

/// Descriptive dependency note
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityDependency {
    #[serde(deserialize_with = "string_lenient")]
    pub activity: String,
    #[serde(deserialize_with = "string_list_lenient")]
    pub depends_on: Vec<String>,
    #[serde(deserialize_with = "string_lenient")]
    pub phase: String,
}

/// Proposed system architecture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Architecture {
    #[serde(deserialize_with = "string_lenient")]
    pub description: String,
    pub components: Vec<ArchitectureComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureComponent {
    #[serde(deserialize_with = "string_lenient")]
    pub name: String,
    #[serde(deserialize_with = "string_lenient")]
    pub technology: String,
    #[serde(deserialize_with = "string_lenient")]
    pub description: String,
}

/// How similar historical projects informed a generated scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagInsights {
    pub similar_projects_count: usize,
    pub most_similar_project: String,
    pub similarity_score: f64,
    pub historical_reference: bool,
    pub insights_applied: Vec<String>,
}

/// Provenance of a generated scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeMetadata {
    /// In `[0.6, 1.0]`; rises with the similarity of the projects consulted
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub rag_sources_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl ScopeDocument {
    /// Look up a resource line by exact role name
    pub fn resource(&self, role: &str) -> Option<&ResourceAllocation> {
        self.resources.iter().find(|r| r.role == role)
    }

    /// Sum of resource line costs
    pub fn resource_cost_total(&self) -> f64 {
        round2(self.resources.iter().map(|r| r.total_cost).sum())
    }

    /// Short textual summary used in prompts
    pub fn summary(&self) -> String {
        let activity_names: Vec<&str> = self
            .activities
            .iter()
            .take(8)
            .map(|a| a.name.as_str())
            .collect();

        format!(
            "Total Duration: {} months ({} weeks, {} phases)\n\
             Total Cost: ${:.2}\n\
             Activities ({}): {}\n\
             Resources: {}",
            self.timeline.total_duration_months,
            self.timeline.total_duration_weeks,
            self.timeline.phases.len(),
            self.cost_breakdown.total_cost,
            self.activities.len(),
            activity_names.join(", "),
            self.resources
                .iter()
                .map(|r| format!("{} x{}", r.role, r.count))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}
