//! End-to-end refinement scenarios through the public engine.

use std::sync::Arc;
use std::time::Duration;

use scopeforge_core::refinement::{InstructionExtractor, TaskAction, TaskInstruction};
use scopeforge_core::scope::{Activity, Phase, ResourceAllocation, Timeline};
use scopeforge_core::{
    GenerationOptions, Intent, RefinementEngine, ScopeDocument, TextGenerator,
};

/// Always answers with the same text
#[derive(Debug)]
struct FixedReply(String);

#[async_trait::async_trait]
impl TextGenerator for FixedReply {
    async fn generate(&self, _prompt: &str, _options: GenerationOptions) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

/// Always fails
#[derive(Debug)]
struct Offline;

#[async_trait::async_trait]
impl TextGenerator for Offline {
    async fn generate(&self, _prompt: &str, _options: GenerationOptions) -> anyhow::Result<String> {
        anyhow::bail!("connection refused")
    }
}

#[derive(Debug)]
struct Removing(&'static str);

#[async_trait::async_trait]
impl InstructionExtractor for Removing {
    async fn extract(
        &self,
        _message: &str,
        _scope_summary: &str,
    ) -> scopeforge_core::Result<TaskInstruction> {
        Ok(TaskInstruction {
            action: TaskAction::Remove,
            ..TaskInstruction::fallback(self.0)
        })
    }
}

fn engine(reply: &str) -> RefinementEngine {
    RefinementEngine::new(Arc::new(FixedReply(reply.to_string())))
        .with_timeout(Duration::from_secs(1))
}

fn scope(phases: &[u32], resources: Vec<ResourceAllocation>) -> ScopeDocument {
    let mut scope = ScopeDocument {
        timeline: Timeline {
            phases: phases
                .iter()
                .enumerate()
                .map(|(i, weeks)| Phase::new(format!("Phase {}", i + 1), *weeks))
                .collect(),
            ..Default::default()
        },
        resources,
        ..Default::default()
    };
    scope.normalize();
    scope
}

#[tokio::test]
async fn shorter_timeline_compresses_every_phase() {
    let before = scope(&[4, 12, 4], vec![]);
    let outcome = engine("unused").refine("make it 2 weeks shorter", &before).await;

    assert_eq!(outcome.intent, Intent::AdjustTimeline);
    let timeline = &outcome.updated_scope.timeline;
    let layout: Vec<(u32, u32)> = timeline
        .phases
        .iter()
        .map(|p| (p.duration_weeks, p.start_week))
        .collect();
    assert_eq!(layout, vec![(3, 1), (10, 4), (3, 14)]);
    assert_eq!(timeline.total_duration_weeks, 16);
    assert_eq!(timeline.total_duration_months, 3.7);
    assert!(!outcome.changes_made.is_empty());
    // The caller's copy is untouched.
    assert_eq!(before.timeline.total_duration_weeks, 20);
}

#[tokio::test]
async fn week_target_scales_and_floors_each_phase() {
    let before = scope(&[4, 12, 4], vec![]);
    let outcome = engine("unused").refine("make it 12 weeks", &before).await;

    assert_eq!(outcome.intent, Intent::AdjustTimeline);
    let durations: Vec<u32> = outcome
        .updated_scope
        .timeline
        .phases
        .iter()
        .map(|p| p.duration_weeks)
        .collect();
    assert_eq!(durations, vec![2, 7, 2]);
    assert_eq!(outcome.updated_scope.timeline.total_duration_weeks, 11);
}

#[tokio::test]
async fn oversized_week_target_leaves_scope_unchanged() {
    let before = scope(&[4, 12, 4], vec![]);
    let outcome = engine("unused").refine("make it 5000000000 weeks", &before).await;

    assert_eq!(outcome.intent, Intent::AdjustTimeline);
    assert_eq!(outcome.updated_scope, before);
    assert!(outcome.changes_made.is_empty());
}

#[tokio::test]
async fn unrecognized_timeline_request_is_a_no_op() {
    let before = scope(&[4, 12, 4], vec![]);
    let outcome = engine("unused").refine("what about the schedule and the deadline?", &before).await;

    assert_eq!(outcome.intent, Intent::AdjustTimeline);
    assert_eq!(outcome.updated_scope.timeline, before.timeline);
    assert!(outcome.changes_made.is_empty());
}

#[tokio::test]
async fn percentage_discount_scales_cost_lines() {
    let before = scope(
        &[4, 12, 4],
        vec![ResourceAllocation::new("Frontend Developer", 2, 4.0, 8000.0)],
    );
    assert_eq!(before.cost_breakdown.total_cost, 64000.0);

    let outcome = engine("unused").refine("Apply a 15% discount", &before).await;

    assert_eq!(outcome.intent, Intent::ApplyDiscount);
    let costs = &outcome.updated_scope.cost_breakdown;
    assert_eq!(costs.total_cost, 54400.0);
    assert_eq!(costs.discount_applied, 15.0);
    assert_eq!(costs.subtotal, 64000.0);
    assert_eq!(outcome.updated_scope.resources[0].total_cost, 54400.0);
}

#[tokio::test]
async fn oversized_flat_discount_is_rejected() {
    let before = scope(
        &[4, 16, 4],
        vec![ResourceAllocation::new("Frontend Developer", 1, 5.0, 10000.0)],
    );
    assert_eq!(before.cost_breakdown.total_cost, 50000.0);

    let outcome = engine("unused").refine("Give us a $1,000,000 discount", &before).await;

    assert_eq!(outcome.intent, Intent::ApplyDiscount);
    assert_eq!(outcome.updated_scope, before);
    assert!(outcome.changes_made.is_empty());
    assert!(!outcome.response.is_empty());
}

#[tokio::test]
async fn adding_developers_staffs_the_full_timeline() {
    let before = scope(&[4, 12, 4], vec![]);
    let outcome = engine("unused").refine("add 2 backend developers", &before).await;

    assert_eq!(outcome.intent, Intent::ModifyResources);
    let backend = outcome
        .updated_scope
        .resource("Backend Developer")
        .expect("backend developers added");
    assert_eq!(backend.count, 2);
    assert_eq!(backend.effort_months, 4.6);
    assert_eq!(backend.monthly_rate, 8500.0);
    assert_eq!(backend.total_cost, 78200.0);
    assert_eq!(outcome.updated_scope.cost_breakdown.total_cost, 78200.0);
}

#[tokio::test]
async fn removing_testing_drops_every_match() {
    let mut before = scope(&[4, 12, 4], vec![]);
    before.activities = vec![
        Activity::new("Backend API", "Development", 40),
        Activity::new("Unit Testing", "Testing", 10),
        Activity::new("Integration Testing", "Testing", 10),
    ];

    let outcome = engine(r#"{"action": "remove", "activity_name": "testing"}"#)
        .refine("remove testing", &before)
        .await;

    assert_eq!(outcome.intent, Intent::ModifyTasks);
    assert_eq!(
        outcome.changes_made,
        vec!["Removed 2 activity(ies) matching 'testing'".to_string()]
    );
    let names: Vec<&str> = outcome
        .updated_scope
        .activities
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(names, vec!["Backend API"]);
}

#[tokio::test]
async fn injected_extractor_replaces_the_model() {
    let mut before = scope(&[4, 12, 4], vec![]);
    before.activities = vec![Activity::new("Security Audit", "Testing", 10)];

    let outcome = RefinementEngine::new(Arc::new(Offline))
        .with_extractor(Arc::new(Removing("audit")))
        .refine("remove the audit task", &before)
        .await;

    assert!(outcome.updated_scope.activities.is_empty());
    assert_eq!(outcome.changes_made.len(), 1);
}

#[tokio::test]
async fn offline_model_adds_a_default_task() {
    let before = scope(&[4, 12, 4], vec![]);
    let outcome = RefinementEngine::new(Arc::new(Offline))
        .refine("add security testing", &before)
        .await;

    assert_eq!(outcome.intent, Intent::ModifyTasks);
    let added = &outcome.updated_scope.activities[0];
    assert_eq!(added.name, "add security testing");
    assert_eq!(added.effort_days, 5);
    assert_eq!(added.phase, "Development");
    assert_eq!(added.resources_needed, vec!["Developer"]);
}

#[tokio::test]
async fn unclear_message_never_mutates() {
    let before = scope(
        &[4, 12, 4],
        vec![ResourceAllocation::new("QA Engineer", 1, 3.0, 7000.0)],
    );
    let outcome = RefinementEngine::new(Arc::new(Offline))
        .refine("hello, how are you?", &before)
        .await;

    assert_eq!(outcome.intent, Intent::Generic);
    assert_eq!(outcome.updated_scope, before);
    assert!(outcome.changes_made.is_empty());
    assert!(!outcome.response.is_empty());
}
