//! Apply Discount handler.

use lazy_static::lazy_static;
use regex::Regex;

use super::{format_currency, recalc, HandlerOutput};
use crate::scope::ScopeDocument;

/// Percentage applied when the message names no amount
pub const DEFAULT_DISCOUNT_PERCENTAGE: f64 = 10.0;

lazy_static! {
    static ref PERCENT: Regex = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:%|percent\b)").unwrap();
    static ref FLAT: Regex = Regex::new(r"\$\s*(\d[\d,]*(?:\.\d+)?)").unwrap();
}

/// Requested discount
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiscountRequest {
    Percentage(f64),
    Flat(f64),
}

impl DiscountRequest {
    /// Percentages win over flat amounts; neither gives the default percentage.
    pub fn parse(message: &str) -> Self {
        if let Some(pct) = PERCENT
            .captures(message)
            .and_then(|c| c[1].parse::<f64>().ok())
        {
            return Self::Percentage(pct);
        }
        if let Some(amount) = FLAT
            .captures(message)
            .and_then(|c| c[1].replace(',', "").parse::<f64>().ok())
        {
            return Self::Flat(amount);
        }
        Self::Percentage(DEFAULT_DISCOUNT_PERCENTAGE)
    }

    /// Multiplier for the current total, or the reason the request is refused
    pub fn factor(self, total_cost: f64) -> Result<f64, String> {
        match self {
            Self::Percentage(pct) if pct >= 100.0 => Err(format!(
                "A {}% discount would make the project free, so I left the pricing unchanged.",
                pct
            )),
            Self::Percentage(pct) if pct <= 0.0 => {
                Err("A discount has to be a positive amount; pricing is unchanged.".to_string())
            }
            Self::Percentage(pct) => Ok(1.0 - pct / 100.0),
            Self::Flat(amount) if amount >= total_cost => Err(format!(
                "A {} discount is not possible on a total of {}, so I left the pricing unchanged.",
                format_currency(amount),
                format_currency(total_cost)
            )),
            Self::Flat(amount) if amount <= 0.0 => {
                Err("A discount has to be a positive amount; pricing is unchanged.".to_string())
            }
            Self::Flat(amount) => Ok(1.0 - amount / total_cost),
        }
    }

    fn describe(self) -> String {
        match self {
            Self::Percentage(pct) => format!("{}%", pct),
            Self::Flat(amount) => format_currency(amount),
        }
    }
}

/// Discount every cost line; the discount persists through later repricing.
pub fn apply_discount(scope: &mut ScopeDocument, message: &str) -> HandlerOutput {
    let request = DiscountRequest::parse(message);
    let before = scope.cost_breakdown.total_cost;

    let factor = match request.factor(before) {
        Ok(factor) => factor,
        Err(reason) => {
            return HandlerOutput {
                response: reason,
                changes: Vec::new(),
            }
        }
    };

    let retained = scope.cost_breakdown.retained_fraction() * factor;
    // Four decimals keeps 15% reading as 15 rather than 15.000000000000002.
    scope.cost_breakdown.discount_applied = ((1.0 - retained) * 1_000_000.0).round() / 10_000.0;
    recalc::reprice_resources(scope);

    let after = scope.cost_breakdown.total_cost;
    let changes = vec![
        format!(
            "Applied {} discount (-{})",
            request.describe(),
            format_currency(before - after)
        ),
        format!(
            "Total cost changed from {} to {}",
            format_currency(before),
            format_currency(after)
        ),
    ];

    HandlerOutput {
        response: format!(
            "I've applied a {} discount. The total is now {} (contingency {}).",
            request.describe(),
            format_currency(after),
            format_currency(scope.cost_breakdown.contingency_amount)
        ),
        changes,
    }
}
