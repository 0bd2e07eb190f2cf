//! Recalculation Engine
//!
//! Deterministic passes that re-establish the derived fields of a scope after
//! a mutation. Both passes are idempotent.

use crate::rates::is_full_duration_role;
use crate::scope::{
    round2, weeks_to_months, ScopeDocument, Timeline, MAX_TIMELINE_WEEKS, MIN_PHASE_WEEKS,
};

/// Working days in a week
pub const DAYS_PER_WEEK: f64 = 5.0;

/// Shortest timeline the activity-driven estimate produces
pub const MIN_ESTIMATED_WEEKS: u32 = 4;

const MIN_PARALLEL_STREAMS: usize = 3;
const MAX_PARALLEL_STREAMS: usize = 5;

/// Number of work streams assumed to run in parallel for `activity_count` activities
pub fn parallel_streams(activity_count: usize) -> usize {
    (activity_count / 4).clamp(MIN_PARALLEL_STREAMS, MAX_PARALLEL_STREAMS)
}

/// Calendar weeks needed for the current activity list, capped at
/// [`MAX_TIMELINE_WEEKS`]
pub fn estimate_weeks(scope: &ScopeDocument) -> u32 {
    let effort_days: u64 = scope.activities.iter().map(|a| u64::from(a.effort_days)).sum();
    let streams = parallel_streams(scope.activities.len()) as f64;
    let weeks = (effort_days as f64 / DAYS_PER_WEEK / streams).ceil();
    (weeks.min(f64::from(MAX_TIMELINE_WEEKS)) as u32).max(MIN_ESTIMATED_WEEKS)
}

/// Timeline pass: fit the phase plan to the activity effort.
///
/// Phases are rescaled proportionally (never below [`MIN_PHASE_WEEKS`]) and
/// the rounding remainder is absorbed by the longest phase, so a second pass
/// finds nothing to do.
pub fn recompute_timeline_from_activities(scope: &mut ScopeDocument) {
    let target = estimate_weeks(scope);
    let timeline = &mut scope.timeline;

    if timeline.phases.is_empty() {
        timeline.total_duration_weeks = target;
        timeline.total_duration_months = weeks_to_months(target);
        return;
    }

    timeline.relayout();
    let current = timeline.phase_weeks();
    if current != target {
        let scale = f64::from(target) / f64::from(current);
        for phase in &mut timeline.phases {
            let scaled = (f64::from(phase.duration_weeks) * scale).round() as u32;
            phase.duration_weeks = scaled.max(MIN_PHASE_WEEKS);
        }
    }
    fit_phases_to(timeline, target);
}

/// Move the longest phase so the phases sum to `target` weeks where the
/// two-week minimum allows, then re-walk the offsets.
pub fn fit_phases_to(timeline: &mut Timeline, target: u32) {
    let sum = timeline.phase_weeks();
    if let Some(longest) = timeline.phases.iter_mut().max_by_key(|p| p.duration_weeks) {
        if sum < target {
            longest.duration_weeks = longest.duration_weeks.saturating_add(target - sum);
        } else {
            let room = longest.duration_weeks.saturating_sub(MIN_PHASE_WEEKS);
            longest.duration_weeks -= (sum - target).min(room);
        }
    }
    timeline.relayout();
}

/// Resource pass: align effort with the timeline and reprice every line.
///
/// Only runs the effort adjustment when the timeline has a positive length;
/// costs are always recomputed with the scope's standing discount.
pub fn recompute_resources(scope: &mut ScopeDocument) {
    let months = scope.timeline.total_duration_months;
    if months > 0.0 {
        for resource in &mut scope.resources {
            resource.effort_months = if is_full_duration_role(&resource.role) {
                months
            } else {
                resource.effort_months.min(months)
            };
        }
    }
    reprice_resources(scope);
}

/// Recompute each line's cost from its quantities, then roll up.
pub fn reprice_resources(scope: &mut ScopeDocument) {
    let retained = scope.cost_breakdown.retained_fraction();
    for resource in &mut scope.resources {
        resource.total_cost = round2(resource.base_cost() * retained);
    }
    rollup_costs(scope);
}

/// Cost rollup: totals and contingency from the resource lines as they stand.
pub fn rollup_costs(scope: &mut ScopeDocument) {
    let subtotal: f64 = scope.resources.iter().map(|r| r.base_cost()).sum();
    let breakdown = &mut scope.cost_breakdown;
    breakdown.subtotal = round2(subtotal);
    breakdown.total_cost = round2(scope.resources.iter().map(|r| r.total_cost).sum());
    breakdown.contingency_amount =
        round2(breakdown.total_cost * breakdown.contingency_percentage / 100.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Activity, Phase, ResourceAllocation};

    fn activities(days: &[u32]) -> Vec<Activity> {
        days.iter()
            .enumerate()
            .map(|(i, d)| Activity::new(format!("Task {}", i), "Development", *d))
            .collect()
    }

    #[test]
    fn stream_count_is_clamped() {
        assert_eq!(parallel_streams(0), 3);
        assert_eq!(parallel_streams(16), 4);
        assert_eq!(parallel_streams(40), 5);
    }

    #[test]
    fn estimate_has_a_floor() {
        let scope = ScopeDocument {
            activities: activities(&[5]),
            ..Default::default()
        };
        assert_eq!(estimate_weeks(&scope), MIN_ESTIMATED_WEEKS);
    }

    #[test]
    fn timeline_without_phases_gets_totals_directly() {
        // 150 days / 5 / 3 streams = 10 weeks
        let mut scope = ScopeDocument {
            activities: activities(&[50, 50, 50]),
            ..Default::default()
        };
        recompute_timeline_from_activities(&mut scope);
        assert_eq!(scope.timeline.total_duration_weeks, 10);
        assert_eq!(scope.timeline.total_duration_months, 2.3);
    }

    #[test]
    fn phases_rescale_to_estimate_and_settle() {
        let mut scope = ScopeDocument {
            timeline: Timeline {
                phases: vec![Phase::new("Plan", 4), Phase::new("Build", 12), Phase::new("Ship", 4)],
                ..Default::default()
            },
            activities: activities(&[60, 60, 60]),
            ..Default::default()
        };
        recompute_timeline_from_activities(&mut scope);
        assert_eq!(scope.timeline.total_duration_weeks, 12);
        assert!(scope.timeline.is_contiguous());

        let once = scope.clone();
        recompute_timeline_from_activities(&mut scope);
        assert_eq!(scope, once);
    }

    #[test]
    fn many_phases_stay_at_minimum() {
        let mut scope = ScopeDocument {
            timeline: Timeline {
                phases: (0..4).map(|i| Phase::new(format!("P{}", i), 6)).collect(),
                ..Default::default()
            },
            activities: activities(&[5]),
            ..Default::default()
        };
        recompute_timeline_from_activities(&mut scope);
        assert!(scope.timeline.phases.iter().all(|p| p.duration_weeks == 2));
        let once = scope.clone();
        recompute_timeline_from_activities(&mut scope);
        assert_eq!(scope, once);
    }

    #[test]
    fn resource_pass_caps_effort_and_stretches_managers() {
        let mut scope = ScopeDocument {
            timeline: Timeline {
                total_duration_months: 3.0,
                ..Default::default()
            },
            resources: vec![
                ResourceAllocation::new("Backend Developer", 2, 5.0, 8500.0),
                ResourceAllocation::new("QA Engineer", 1, 1.5, 7000.0),
                ResourceAllocation::new("Project Manager", 1, 1.0, 10000.0),
            ],
            ..Default::default()
        };
        recompute_resources(&mut scope);

        let efforts: Vec<f64> = scope.resources.iter().map(|r| r.effort_months).collect();
        assert_eq!(efforts, vec![3.0, 1.5, 3.0]);
        assert_eq!(scope.cost_breakdown.total_cost, 51000.0 + 10500.0 + 30000.0);
        assert_eq!(scope.cost_breakdown.subtotal, scope.cost_breakdown.total_cost);
        assert_eq!(scope.cost_breakdown.contingency_amount, 13725.0);
    }

    #[test]
    fn resource_pass_keeps_effort_on_empty_timeline() {
        let mut scope = ScopeDocument {
            resources: vec![ResourceAllocation::new("Project Manager", 1, 4.0, 10000.0)],
            ..Default::default()
        };
        recompute_resources(&mut scope);
        assert_eq!(scope.resources[0].effort_months, 4.0);
        assert_eq!(scope.cost_breakdown.total_cost, 40000.0);
    }

    #[test]
    fn standing_discount_is_applied_on_reprice() {
        let mut scope = ScopeDocument {
            resources: vec![ResourceAllocation::new("Frontend Developer", 2, 4.0, 8000.0)],
            ..Default::default()
        };
        scope.cost_breakdown.discount_applied = 15.0;
        reprice_resources(&mut scope);
        assert_eq!(scope.resources[0].total_cost, 54400.0);
        assert_eq!(scope.cost_breakdown.subtotal, 64000.0);
        assert_eq!(scope.cost_breakdown.total_cost, 54400.0);
        assert_eq!(scope.cost_breakdown.contingency_amount, 8160.0);
    }

    #[test]
    fn huge_effort_saturates_instead_of_overflowing() {
        let mut scope = ScopeDocument {
            timeline: Timeline {
                phases: vec![Phase::new("Build", 8)],
                ..Default::default()
            },
            activities: activities(&[3_000_000_000, 3_000_000_000, 5]),
            ..Default::default()
        };
        assert_eq!(estimate_weeks(&scope), MAX_TIMELINE_WEEKS);

        recompute_timeline_from_activities(&mut scope);
        assert_eq!(scope.timeline.total_duration_weeks, MAX_TIMELINE_WEEKS);
        assert!(scope.timeline.is_contiguous());
    }
}
