//! Property tests: scope invariants hold across arbitrary mutation sequences.

use proptest::prelude::*;

use scopeforge_core::rates::RateCard;
use scopeforge_core::refinement::discount::apply_discount;
use scopeforge_core::refinement::resources::modify_resources;
use scopeforge_core::refinement::tasks::apply_instruction;
use scopeforge_core::refinement::timeline::adjust_timeline;
use scopeforge_core::refinement::{TaskAction, TaskInstruction};
use scopeforge_core::scope::{
    round2, Activity, Phase, ResourceAllocation, Timeline, MAX_TIMELINE_WEEKS, MIN_PHASE_WEEKS,
};
use scopeforge_core::ScopeDocument;

#[derive(Debug, Clone)]
enum Mutation {
    Timeline(&'static str),
    Discount(&'static str),
    Resources(&'static str),
    AddTask(String, u32),
    RemoveTask(String),
}

const TIMELINE_REQUESTS: &[&str] = &[
    "make it 2 weeks shorter",
    "extend the schedule",
    "deliver in 12 weeks",
    "finish in 3 months",
    "what about the deadline",
    "make it 5000000000 weeks",
];

const DISCOUNT_REQUESTS: &[&str] = &["apply a 10% discount", "$5,000 off", "discount", "$9,999,999 off"];

const RESOURCE_REQUESTS: &[&str] = &[
    "add 2 backend developers",
    "remove one qa engineer",
    "hire a designer",
    "fewer frontend developers",
    "add three devops engineers",
];

fn mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        prop::sample::select(TIMELINE_REQUESTS).prop_map(Mutation::Timeline),
        prop::sample::select(DISCOUNT_REQUESTS).prop_map(Mutation::Discount),
        prop::sample::select(RESOURCE_REQUESTS).prop_map(Mutation::Resources),
        ("[a-z]{3,8}", prop_oneof![1u32..40, Just(u32::MAX)]).prop_map(|(name, days)| Mutation::AddTask(name, days)),
        "[a-z]{1,3}".prop_map(Mutation::RemoveTask),
    ]
}

fn base_scope(phases: &[u32]) -> ScopeDocument {
    let mut scope = ScopeDocument {
        timeline: Timeline {
            phases: phases
                .iter()
                .enumerate()
                .map(|(i, w)| Phase::new(format!("Phase {}", i + 1), *w))
                .collect(),
            ..Default::default()
        },
        activities: vec![
            Activity::new("Requirements Analysis", "Planning", 10),
            Activity::new("Implementation", "Development", 60),
        ],
        resources: vec![
            ResourceAllocation::new("Project Manager", 1, 0.0, 10000.0),
            ResourceAllocation::new("Frontend Developer", 2, 3.0, 8000.0),
            ResourceAllocation::new("QA Engineer", 1, 2.0, 7000.0),
        ],
        ..Default::default()
    };
    scope.normalize();
    scope
}

fn apply(scope: &mut ScopeDocument, mutation: &Mutation, rates: &RateCard) {
    match mutation {
        Mutation::Timeline(message) => {
            adjust_timeline(scope, message);
        }
        Mutation::Discount(message) => {
            apply_discount(scope, message);
        }
        Mutation::Resources(message) => {
            modify_resources(scope, message, rates);
        }
        Mutation::AddTask(name, days) => {
            let instruction = TaskInstruction {
                effort_days: Some(*days),
                ..TaskInstruction::fallback(name)
            };
            apply_instruction(scope, &instruction);
        }
        Mutation::RemoveTask(name) => {
            let instruction = TaskInstruction {
                action: TaskAction::Remove,
                ..TaskInstruction::fallback(name)
            };
            apply_instruction(scope, &instruction);
        }
    }
}

fn assert_invariants(scope: &ScopeDocument) -> Result<(), TestCaseError> {
    let costs = &scope.cost_breakdown;
    let line_sum = round2(scope.resources.iter().map(|r| r.total_cost).sum());
    prop_assert!((costs.total_cost - line_sum).abs() < 0.01);

    let retained = costs.retained_fraction();
    for resource in &scope.resources {
        let expected = round2(resource.base_cost() * retained);
        prop_assert!(
            (resource.total_cost - expected).abs() < 0.01,
            "{} costs {} but should cost {}",
            resource.role,
            resource.total_cost,
            expected
        );
        prop_assert!(resource.effort_months <= scope.timeline.total_duration_months + 1e-9);
    }

    let mut next_start = 1;
    for phase in &scope.timeline.phases {
        prop_assert_eq!(phase.start_week, next_start);
        prop_assert_eq!(phase.end_week, phase.start_week + phase.duration_weeks - 1);
        prop_assert!(phase.duration_weeks >= MIN_PHASE_WEEKS);
        next_start = phase.end_week + 1;
    }
    prop_assert_eq!(scope.timeline.total_duration_weeks, next_start - 1);
    prop_assert!(scope.timeline.total_duration_weeks <= MAX_TIMELINE_WEEKS);
    prop_assert!(costs.discount_applied >= 0.0 && costs.discount_applied < 100.0);
    Ok(())
}

proptest! {
    #[test]
    fn invariants_hold_after_any_mutation_sequence(
        phases in prop::collection::vec(2u32..16, 1..6),
        mutations in prop::collection::vec(mutation(), 1..12),
    ) {
        let rates = RateCard::standard();
        let mut scope = base_scope(&phases);
        assert_invariants(&scope)?;

        for mutation in &mutations {
            apply(&mut scope, mutation, &rates);
            assert_invariants(&scope)?;
        }
    }

    #[test]
    fn unrecognized_timeline_request_is_idempotent(
        phases in prop::collection::vec(2u32..16, 1..6),
    ) {
        let mut scope = base_scope(&phases);
        let before = scope.clone();
        let output = adjust_timeline(&mut scope, "what about the deadline");
        prop_assert_eq!(scope, before);
        prop_assert!(output.changes.is_empty());
    }

    #[test]
    fn removing_nothing_leaves_the_scope_identical(
        phases in prop::collection::vec(2u32..16, 1..6),
    ) {
        let mut scope = base_scope(&phases);
        let before = scope.clone();
        let instruction = TaskInstruction {
            action: TaskAction::Remove,
            ..TaskInstruction::fallback("zzzz-not-present")
        };
        let (changes, affected) = apply_instruction(&mut scope, &instruction);
        prop_assert_eq!(affected, 0);
        prop_assert_eq!(changes, vec!["Removed 0 activity(ies) matching 'zzzz-not-present'".to_string()]);
        prop_assert_eq!(scope, before);
    }
}
