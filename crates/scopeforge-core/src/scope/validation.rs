//! Boundary validation and normalization of scope documents.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{ScopeDocument, MAX_ACTIVITY_EFFORT_DAYS, MAX_TIMELINE_WEEKS, WEEKS_PER_MONTH};
use crate::error::ValidationError;
use crate::refinement::recalc;

/// Soft findings that do not block a scope from being used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// An activity depends on a name that is not in the activity list
    DanglingDependency { activity: String, missing: String },
    /// An activity names a phase that is not on the timeline
    UnknownPhase { activity: String, phase: String },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingDependency { activity, missing } => {
                write!(f, "'{}' depends on unknown activity '{}'", activity, missing)
            }
            Self::UnknownPhase { activity, phase } => {
                write!(f, "'{}' is assigned to unknown phase '{}'", activity, phase)
            }
        }
    }
}

/// Outcome of a successful validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn phase_matches(activity_phase: &str, phase_name: &str) -> bool {
    // Generated scopes name phases "Phase 2: Development" while activities say "Development".
    let activity_phase = activity_phase.to_lowercase();
    let phase_name = phase_name.to_lowercase();
    phase_name == activity_phase || phase_name.contains(&activity_phase)
}

impl ScopeDocument {
    /// Check hard constraints; dangling references are reported, not rejected.
    pub fn validate(&self) -> Result<ValidationReport, ValidationError> {
        for phase in &self.timeline.phases {
            if phase.duration_weeks == 0 {
                return Err(ValidationError::ZeroDurationPhase(phase.phase_name.clone()));
            }
        }
        let weeks: u64 = if self.timeline.phases.is_empty() {
            u64::from(self.timeline.total_duration_weeks)
        } else {
            self.timeline
                .phases
                .iter()
                .map(|p| u64::from(p.duration_weeks))
                .sum()
        };
        if weeks > u64::from(MAX_TIMELINE_WEEKS) {
            return Err(ValidationError::TimelineTooLong {
                weeks,
                limit: MAX_TIMELINE_WEEKS,
            });
        }

        for activity in &self.activities {
            if activity.effort_days == 0 {
                return Err(ValidationError::ZeroEffortActivity(activity.name.clone()));
            }
            if activity.effort_days > MAX_ACTIVITY_EFFORT_DAYS {
                return Err(ValidationError::EffortTooLarge {
                    activity: activity.name.clone(),
                    days: activity.effort_days,
                    limit: MAX_ACTIVITY_EFFORT_DAYS,
                });
            }
        }

        let mut roles = HashSet::new();
        for resource in &self.resources {
            if resource.allocation_percentage > 100 {
                return Err(ValidationError::AllocationOutOfRange {
                    role: resource.role.clone(),
                    value: resource.allocation_percentage,
                });
            }
            for (field, value) in [
                ("effort_months", resource.effort_months),
                ("monthly_rate", resource.monthly_rate),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ValidationError::InvalidAmount {
                        role: resource.role.clone(),
                        field,
                        value,
                    });
                }
            }
            if !roles.insert(resource.role.as_str()) {
                return Err(ValidationError::DuplicateRole(resource.role.clone()));
            }
        }

        let contingency = self.cost_breakdown.contingency_percentage;
        if !contingency.is_finite() || contingency < 0.0 {
            return Err(ValidationError::InvalidContingency(contingency));
        }

        let mut report = ValidationReport::default();
        let names: HashSet<&str> = self.activities.iter().map(|a| a.name.as_str()).collect();
        for activity in &self.activities {
            for dependency in &activity.dependencies {
                if !names.contains(dependency.as_str()) {
                    report.warnings.push(ValidationWarning::DanglingDependency {
                        activity: activity.name.clone(),
                        missing: dependency.clone(),
                    });
                }
            }

            let known_phase = activity.phase.is_empty()
                || self.timeline.phases.is_empty()
                || self
                    .timeline
                    .phases
                    .iter()
                    .any(|p| phase_matches(&activity.phase, &p.phase_name));
            if !known_phase {
                report.warnings.push(ValidationWarning::UnknownPhase {
                    activity: activity.name.clone(),
                    phase: activity.phase.clone(),
                });
            }
        }

        Ok(report)
    }

    /// Re-establish every derived field without touching entered quantities
    /// beyond what the invariants require.
    pub fn normalize(&mut self) {
        let timeline = &mut self.timeline;
        if timeline.phases.is_empty() {
            if timeline.total_duration_weeks == 0 && timeline.total_duration_months > 0.0 {
                timeline.total_duration_weeks =
                    (timeline.total_duration_months * WEEKS_PER_MONTH).round() as u32;
            } else if timeline.total_duration_weeks > 0 {
                timeline.total_duration_months =
                    super::weeks_to_months(timeline.total_duration_weeks);
            }
        } else {
            timeline.relayout();
        }

        recalc::recompute_resources(self);
    }
}
