//! Modify Tasks handler.

use tracing::warn;

use super::instruction::{
    InstructionExtractor, TaskAction, TaskInstruction, DEFAULT_EFFORT_DAYS, DEFAULT_PHASE,
};
use super::recalc;
use super::HandlerOutput;
use crate::rates::DEFAULT_ROLE;
use crate::scope::{Activity, ScopeDocument};

/// Extract an instruction for `message` and apply it to `scope`.
pub async fn modify_tasks(
    scope: &mut ScopeDocument,
    message: &str,
    extractor: &dyn InstructionExtractor,
) -> HandlerOutput {
    let (instruction, inferred) = match extractor.extract(message, &scope.summary()).await {
        Ok(instruction) => (instruction, true),
        Err(e) => {
            warn!(error = %e, "Task instruction extraction failed; adding default task");
            (TaskInstruction::fallback(message), false)
        }
    };

    let (changes, affected) = apply_instruction(scope, &instruction);
    let response = match (inferred, changes.first()) {
        (true, Some(_)) if affected == 0 => format!(
            "I couldn't find any activities matching '{}', so nothing changed.",
            instruction.activity_name
        ),
        (false, Some(change)) => format!(
            "I couldn't work out the exact change, so I added a {}-day {} task for it. {} \
             Tell me if it should be named, sized or placed differently.",
            DEFAULT_EFFORT_DAYS,
            DEFAULT_PHASE.to_lowercase(),
            change
        ),
        (true, Some(change)) => format!("Done. {}", change),
        (_, None) => "No activities were changed.".to_string(),
    };

    HandlerOutput { response, changes }
}

fn matches(activity: &Activity, needle: &str) -> bool {
    activity.name.to_lowercase().contains(needle)
}

/// Apply a parsed instruction, returning the change lines and the number of
/// activities affected. Recalculates only when activities changed.
pub fn apply_instruction(
    scope: &mut ScopeDocument,
    instruction: &TaskInstruction,
) -> (Vec<String>, usize) {
    let needle = instruction.activity_name.to_lowercase();
    let (changes, touched) = match instruction.action {
        TaskAction::Add => {
            let activity = new_activity(instruction);
            let change = format!("Added: {} ({} days)", activity.name, activity.effort_days);
            if let Some(phase) = scope
                .timeline
                .phases
                .iter_mut()
                .find(|p| p.phase_name.to_lowercase().contains(&activity.phase.to_lowercase()))
            {
                phase.activities.push(activity.name.clone());
            }
            scope.activities.push(activity);
            (vec![change], 1)
        }
        TaskAction::Remove => {
            let before = scope.activities.len();
            scope.activities.retain(|a| !matches(a, &needle));
            let removed = before - scope.activities.len();
            for phase in &mut scope.timeline.phases {
                phase.activities.retain(|name| !name.to_lowercase().contains(&needle));
            }
            (
                vec![format!(
                    "Removed {} activity(ies) matching '{}'",
                    removed, instruction.activity_name
                )],
                removed,
            )
        }
        TaskAction::Modify => {
            let mut modified = 0;
            for activity in scope.activities.iter_mut().filter(|a| matches(a, &needle)) {
                if let Some(description) = &instruction.activity_description {
                    activity.description = Some(description.clone());
                }
                if let Some(phase) = &instruction.target_phase {
                    activity.phase = phase.clone();
                }
                if let Some(days) = instruction.effort_days {
                    activity.effort_days = days;
                }
                modified += 1;
            }
            (
                vec![format!(
                    "Modified {} activity(ies) matching '{}'",
                    modified, instruction.activity_name
                )],
                modified,
            )
        }
    };

    if touched > 0 {
        recalc::recompute_timeline_from_activities(scope);
        recalc::recompute_resources(scope);
    }
    (changes, touched)
}

fn new_activity(instruction: &TaskInstruction) -> Activity {
    let resources = if instruction.resources_required.is_empty() {
        vec![DEFAULT_ROLE.to_string()]
    } else {
        instruction.resources_required.clone()
    };
    Activity {
        name: instruction.activity_name.clone(),
        description: instruction.activity_description.clone(),
        phase: instruction
            .target_phase
            .clone()
            .unwrap_or_else(|| DEFAULT_PHASE.to_string()),
        effort_days: instruction.effort_days.unwrap_or(DEFAULT_EFFORT_DAYS),
        dependencies: instruction.dependencies.clone(),
        resources_needed: resources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScopeError};
    use crate::scope::{Phase, ResourceAllocation, Timeline, MAX_TIMELINE_WEEKS};

    #[derive(Debug)]
    struct FixedExtractor(Option<TaskInstruction>);

    #[async_trait::async_trait]
    impl InstructionExtractor for FixedExtractor {
        async fn extract(&self, _message: &str, _summary: &str) -> Result<TaskInstruction> {
            self.0
                .clone()
                .ok_or_else(|| ScopeError::Generation("model unavailable".into()))
        }
    }

    fn instruction(action: TaskAction, name: &str) -> TaskInstruction {
        TaskInstruction {
            action,
            activity_name: name.into(),
            activity_description: None,
            target_phase: None,
            effort_days: None,
            dependencies: vec![],
            resources_required: vec![],
        }
    }

    fn scope() -> ScopeDocument {
        let mut scope = ScopeDocument {
            timeline: Timeline {
                phases: vec![
                    Phase::new("Phase 1: Planning", 4),
                    Phase::new("Phase 2: Development", 12),
                    Phase::new("Phase 3: Testing", 4),
                ],
                ..Default::default()
            },
            activities: vec![
                Activity::new("Backend API", "Development", 60),
                Activity::new("Unit Testing", "Testing", 10),
                Activity::new("Integration Testing", "Testing", 10),
            ],
            resources: vec![ResourceAllocation::new("Backend Developer", 2, 4.6, 8500.0)],
            ..Default::default()
        };
        scope.normalize();
        scope
    }

    #[test]
    fn remove_matches_case_insensitively() {
        let mut scope = scope();
        let (changes, _) = apply_instruction(&mut scope, &instruction(TaskAction::Remove, "testing"));
        assert_eq!(changes, vec!["Removed 2 activity(ies) matching 'testing'"]);
        assert_eq!(scope.activities.len(), 1);
        assert!(scope.timeline.is_contiguous());
    }

    #[test]
    fn remove_without_match_leaves_scope_alone() {
        let mut scope = scope();
        let before = scope.clone();
        let (changes, _) = apply_instruction(&mut scope, &instruction(TaskAction::Remove, "deploy"));
        assert_eq!(changes, vec!["Removed 0 activity(ies) matching 'deploy'"]);
        assert_eq!(scope, before);
    }

    #[test]
    fn adding_to_oversized_effort_stays_bounded() {
        let mut scope = scope();
        scope.activities = vec![
            Activity::new("A", "Development", 3_000_000_000),
            Activity::new("B", "Development", 3_000_000_000),
        ];
        let (changes, _) = apply_instruction(&mut scope, &instruction(TaskAction::Add, "C"));

        assert_eq!(changes.len(), 1);
        assert_eq!(scope.timeline.total_duration_weeks, MAX_TIMELINE_WEEKS);
        assert!(scope.timeline.is_contiguous());
    }

    #[test]
    fn add_uses_defaults_and_joins_phase() {
        let mut scope = scope();
        let mut add = instruction(TaskAction::Add, "Security Audit");
        add.target_phase = Some("Testing".into());
        let (changes, _) = apply_instruction(&mut scope, &add);

        assert_eq!(changes, vec!["Added: Security Audit (5 days)"]);
        let added = scope.activities.last().unwrap();
        assert_eq!(added.resources_needed, vec!["Developer"]);
        assert_eq!(added.effort_days, 5);
        assert!(scope.timeline.phases[2]
            .activities
            .contains(&"Security Audit".to_string()));
    }

    #[test]
    fn modify_overwrites_only_given_fields() {
        let mut scope = scope();
        let mut modify = instruction(TaskAction::Modify, "unit");
        modify.effort_days = Some(15);
        let (changes, _) = apply_instruction(&mut scope, &modify);

        assert_eq!(changes, vec!["Modified 1 activity(ies) matching 'unit'"]);
        let unit = &scope.activities[1];
        assert_eq!(unit.effort_days, 15);
        assert_eq!(unit.phase, "Testing");
    }

    #[test]
    fn recalculation_follows_activity_effort() {
        // 60 days / 5 / 3 streams = 4 weeks, but three phases cannot go below 2 weeks each
        let mut scope = scope();
        apply_instruction(&mut scope, &instruction(TaskAction::Remove, "testing"));
        assert_eq!(scope.timeline.total_duration_weeks, 6);
        assert_eq!(scope.timeline.total_duration_months, 1.4);
        assert_eq!(scope.resources[0].effort_months, 1.4);
        assert_eq!(
            scope.cost_breakdown.total_cost,
            scope.resource_cost_total()
        );
    }

    #[tokio::test]
    async fn extraction_failure_adds_default_task() {
        let mut scope = scope();
        let output = modify_tasks(&mut scope, "add load testing", &FixedExtractor(None)).await;

        assert_eq!(output.changes, vec!["Added: add load testing (5 days)"]);
        assert!(output.response.contains("couldn't work out"));
        let added = scope.activities.last().unwrap();
        assert_eq!(added.phase, DEFAULT_PHASE);
        assert_eq!(added.resources_needed, vec![DEFAULT_ROLE]);
    }
}
