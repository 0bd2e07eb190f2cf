//! Modify Resources handler.

use lazy_static::lazy_static;
use regex::Regex;

use super::{format_currency, recalc, HandlerOutput};
use crate::rates::{detect_role, normalize_text, RateCard, DEFAULT_ROLE};
use crate::scope::{ResourceAllocation, ScopeDocument};

const ADD_WORDS: &[&str] = &["add", "more", "increase", "additional", "hire", "extra"];
const REMOVE_WORDS: &[&str] = &["remove", "less", "reduce", "fewer", "drop", "cut"];

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

lazy_static! {
    static ref INTEGER: Regex = Regex::new(r"\d+").unwrap();
}

/// Headcount change requested by a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadcountChange {
    pub role: &'static str,
    pub count: u32,
    pub remove: bool,
}

impl HeadcountChange {
    pub fn parse(message: &str) -> Self {
        let text = normalize_text(message);
        let words: Vec<&str> = text.split(' ').collect();
        let has = |set: &[&str]| words.iter().any(|w| set.contains(w));

        let count = INTEGER
            .find(message)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .or_else(|| {
                words.iter().find_map(|w| {
                    NUMBER_WORDS
                        .iter()
                        .find(|(name, _)| name == w)
                        .map(|(_, n)| *n)
                })
            })
            .unwrap_or(1);

        Self {
            role: detect_role(message).unwrap_or(DEFAULT_ROLE),
            count,
            remove: has(REMOVE_WORDS) && !has(ADD_WORDS),
        }
    }
}

/// Change headcount for the role named in `message`.
pub fn modify_resources(scope: &mut ScopeDocument, message: &str, rates: &RateCard) -> HandlerOutput {
    let change = HeadcountChange::parse(message);
    let role = change.role;
    let position = scope
        .resources
        .iter()
        .position(|r| r.role.eq_ignore_ascii_case(role));

    let changes = match (position, change.remove) {
        (Some(index), false) => {
            let resource = &mut scope.resources[index];
            resource.count = resource.count.saturating_add(change.count);
            vec![format!(
                "Added {} {}(s); team now has {}",
                change.count, resource.role, resource.count
            )]
        }
        (Some(index), true) => {
            let resource = &mut scope.resources[index];
            let removed = change.count.min(resource.count);
            resource.count -= removed;
            if resource.count == 0 {
                let name = scope.resources.remove(index).role;
                vec![format!("Removed {} {}(s); role no longer staffed", removed, name)]
            } else {
                vec![format!(
                    "Removed {} {}(s); team now has {}",
                    removed, resource.role, resource.count
                )]
            }
        }
        (None, false) => {
            let rate = rates.monthly_rate(role);
            let resource = ResourceAllocation::new(
                role,
                change.count,
                scope.timeline.total_duration_months,
                rate,
            );
            let line = format!(
                "Added {} x{} at {}/month for {} months",
                role,
                change.count,
                format_currency(rate),
                resource.effort_months
            );
            scope.resources.push(resource);
            vec![line]
        }
        (None, true) => {
            return HandlerOutput {
                response: format!("There is no {} on the team, so nothing was removed.", role),
                changes: Vec::new(),
            };
        }
    };

    let before = scope.cost_breakdown.total_cost;
    recalc::recompute_resources(scope);
    let after = scope.cost_breakdown.total_cost;

    HandlerOutput {
        response: format!(
            "{}. Total cost moved from {} to {}.",
            changes[0],
            format_currency(before),
            format_currency(after)
        ),
        changes,
    }
}
