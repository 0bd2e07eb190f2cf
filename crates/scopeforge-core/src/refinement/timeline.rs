//! Adjust Timeline handler.

use lazy_static::lazy_static;
use regex::Regex;

use super::recalc;
use super::HandlerOutput;
use crate::rates::normalize_text;
use crate::scope::{
    round1, weeks_to_months, ScopeDocument, Timeline, MAX_TIMELINE_WEEKS, MIN_PHASE_WEEKS,
    WEEKS_PER_MONTH,
};

/// Factor for "shorter"-style requests
pub const COMPRESS_FACTOR: f64 = 0.85;

/// Factor for "longer"-style requests
pub const EXTEND_FACTOR: f64 = 1.15;

const COMPRESS_WORDS: &[&str] = &[
    "shorter", "shorten", "faster", "quicker", "sooner", "reduce", "compress", "accelerate",
];
const EXTEND_WORDS: &[&str] = &["longer", "extend", "increase", "slower", "later", "delay", "relax"];

lazy_static! {
    static ref WEEKS: Regex = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:weeks?|wks?)\b").unwrap();
    static ref MONTHS: Regex = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*months?\b").unwrap();
}

/// How the request was interpreted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    /// Hit this many weeks in total
    TargetWeeks(f64),
    /// Hit this many months in total
    TargetMonths(f64),
    Compress,
    Extend,
    Unchanged,
}

impl Adjustment {
    /// Read an adjustment out of a message.
    ///
    /// A number next to a direction word ("2 weeks shorter") is relative and
    /// resolves through the direction; a bare number is a target.
    pub fn parse(message: &str) -> Self {
        let text = normalize_text(message);
        let has = |words: &[&str]| text.split(' ').any(|w| words.contains(&w));

        if has(COMPRESS_WORDS) {
            return Self::Compress;
        }
        if has(EXTEND_WORDS) {
            return Self::Extend;
        }
        let number = |re: &Regex| {
            re.captures(message)
                .and_then(|c| c[1].parse::<f64>().ok())
                .filter(|n| *n > 0.0)
        };
        if let Some(weeks) = number(&WEEKS) {
            return Self::TargetWeeks(weeks);
        }
        if let Some(months) = number(&MONTHS) {
            return Self::TargetMonths(months);
        }
        Self::Unchanged
    }

    /// Multiplier for the current timeline; `None` when the request cannot
    /// be applied (a target against an empty timeline).
    pub fn factor(self, timeline: &Timeline) -> Option<f64> {
        let weeks = current_weeks(timeline);
        match self {
            Self::TargetWeeks(target) if weeks > 0 => Some(target / f64::from(weeks)),
            Self::TargetMonths(target) if timeline.total_duration_months > 0.0 => {
                Some(target / timeline.total_duration_months)
            }
            Self::TargetWeeks(_) | Self::TargetMonths(_) => None,
            Self::Compress => Some(COMPRESS_FACTOR),
            Self::Extend => Some(EXTEND_FACTOR),
            Self::Unchanged => Some(1.0),
        }
    }
}

fn current_weeks(timeline: &Timeline) -> u32 {
    if timeline.phases.is_empty() {
        timeline.total_duration_weeks
    } else {
        timeline.phase_weeks()
    }
}

// Guards floor() against 11.999999 from factors like 12/20.
const FLOOR_EPSILON: f64 = 1e-9;

fn scaled_weeks(weeks: u32, factor: f64) -> u32 {
    let scaled = (f64::from(weeks) * factor + FLOOR_EPSILON)
        .floor()
        .min(f64::from(MAX_TIMELINE_WEEKS));
    (scaled as u32).max(MIN_PHASE_WEEKS)
}

/// Scale every phase by `factor` and re-walk the offsets.
pub fn scale_timeline(timeline: &mut Timeline, factor: f64) {
    if timeline.phases.is_empty() {
        if timeline.total_duration_weeks > 0 {
            timeline.total_duration_weeks = scaled_weeks(timeline.total_duration_weeks, factor);
            timeline.total_duration_months = weeks_to_months(timeline.total_duration_weeks);
        } else {
            timeline.total_duration_months = round1(timeline.total_duration_months * factor);
        }
        return;
    }
    for phase in &mut timeline.phases {
        phase.duration_weeks = scaled_weeks(phase.duration_weeks, factor);
    }
    timeline.relayout();
}

/// Compress or extend the scope's timeline as requested.
pub fn adjust_timeline(scope: &mut ScopeDocument, message: &str) -> HandlerOutput {
    let adjustment = Adjustment::parse(message);
    let empty = current_weeks(&scope.timeline) == 0 && scope.timeline.total_duration_months <= 0.0;
    let factor = match adjustment.factor(&scope.timeline) {
        Some(factor) if !empty => factor,
        _ => {
            return HandlerOutput {
                response: "The scope has no timeline yet, so there is nothing to resize. \
                           Generate or add phases first."
                    .to_string(),
                changes: Vec::new(),
            }
        }
    };

    if factor == 1.0 {
        return HandlerOutput {
            response: format!(
                "The timeline is unchanged at {} weeks ({} months). Try 'make it 2 weeks shorter' \
                 or 'deliver in 3 months'.",
                scope.timeline.total_duration_weeks, scope.timeline.total_duration_months
            ),
            changes: Vec::new(),
        };
    }

    let before_weeks = current_weeks(&scope.timeline);
    let before_months = scope.timeline.total_duration_months;
    let projected = if before_weeks > 0 {
        f64::from(before_weeks) * factor
    } else {
        before_months * factor * WEEKS_PER_MONTH
    };
    if projected > f64::from(MAX_TIMELINE_WEEKS) {
        return HandlerOutput {
            response: format!(
                "A timeline of about {:.0} weeks is beyond the {}-week limit, so the timeline is \
                 unchanged at {} weeks.",
                projected, MAX_TIMELINE_WEEKS, before_weeks
            ),
            changes: Vec::new(),
        };
    }

    scale_timeline(&mut scope.timeline, factor);
    recalc::recompute_resources(scope);

    let after_weeks = current_weeks(&scope.timeline);
    let after_months = scope.timeline.total_duration_months;
    let verb = match after_weeks
        .cmp(&before_weeks)
        .then(after_months.total_cmp(&before_months))
    {
        std::cmp::Ordering::Less => "shortened",
        std::cmp::Ordering::Greater => "extended",
        std::cmp::Ordering::Equal => "kept",
    };

    let mut changes = vec![format!(
        "Timeline {} from {} to {} weeks",
        verb, before_weeks, after_weeks
    )];
    if after_months != before_months {
        changes.push(format!(
            "Duration changed from {} to {} months",
            before_months, after_months
        ));
    }

    HandlerOutput {
        response: format!(
            "I've {} the timeline to {} weeks ({} months) and re-costed the team to match.",
            verb, after_weeks, after_months
        ),
        changes,
    }
}
