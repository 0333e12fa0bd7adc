//! Insight evaluation over device and aggregate state.

use crate::aggregate::aggregator::AggregateSnapshot;
use crate::insight::rules::{InsightRule, Priority, RuleCondition, default_rules};
use crate::registry::device::Device;

/// A generated advisory message.
#[derive(Debug, Clone, PartialEq)]
pub struct Insight {
    /// Rule id, suffixed with the device id for per-device matches.
    pub id: String,
    /// Human-readable advisory text.
    pub message: String,
    /// Urgency of the advisory.
    pub priority: Priority,
    /// Estimated savings, e.g. `"$12/mo"`.
    pub estimated_savings: String,
    /// Category tag for grouping.
    pub category: String,
}

/// Evaluates the rule table against current state each cycle.
///
/// Insights are regenerated fresh on every [`InsightEngine::evaluate`]
/// call and ranked by priority descending; rules earlier in the table
/// (and devices earlier in the registry) win ties.
///
/// # Examples
///
/// ```
/// use homewatt::insight::InsightEngine;
///
/// let engine = InsightEngine::default();
/// assert_eq!(engine.top_insight(), None);
/// ```
pub struct InsightEngine {
    rules: Vec<InsightRule>,
    insights: Vec<Insight>,
}

impl InsightEngine {
    /// Creates an engine over a custom rule table.
    pub fn new(rules: Vec<InsightRule>) -> Self {
        Self {
            rules,
            insights: Vec::new(),
        }
    }

    /// The rule table, in evaluation order.
    pub fn rules(&self) -> &[InsightRule] {
        &self.rules
    }

    /// Runs every rule and returns the ranked insight list.
    ///
    /// Never fails; with no devices or no matches the result is empty.
    pub fn evaluate(&mut self, devices: &[Device], snapshot: &AggregateSnapshot) -> &[Insight] {
        let mut found = Vec::new();
        for rule in &self.rules {
            match rule.condition {
                RuleCondition::CategoryOnTimeExceeds { category, hours } => {
                    for device in devices
                        .iter()
                        .filter(|d| d.is_on && d.category == category && d.on_time_today_h > hours)
                    {
                        found.push(device_insight(
                            rule,
                            device,
                            format!(
                                "{} has been on for {:.1} h today, above the {:.0} h target. \
                                 Consider a shorter schedule.",
                                device.name, device.on_time_today_h, hours
                            ),
                        ));
                    }
                }
                RuleCondition::NearPeakDraw { ratio } => {
                    for device in devices.iter().filter(|d| {
                        d.is_on
                            && d.peak_usage_w > 0.0
                            && d.current_usage_w >= ratio * d.peak_usage_w
                    }) {
                        found.push(device_insight(
                            rule,
                            device,
                            format!(
                                "{} is drawing {:.0} W, close to its {:.0} W peak.",
                                device.name, device.current_usage_w, device.peak_usage_w
                            ),
                        ));
                    }
                }
                RuleCondition::IdleDraw { max_w, min_hours } => {
                    for device in devices.iter().filter(|d| {
                        d.is_on
                            && d.current_usage_w > 0.0
                            && d.current_usage_w <= max_w
                            && d.on_time_today_h >= min_hours
                    }) {
                        found.push(device_insight(
                            rule,
                            device,
                            format!(
                                "{} has idled at {:.0} W for {:.1} h. It may have been left on.",
                                device.name, device.current_usage_w, device.on_time_today_h
                            ),
                        ));
                    }
                }
                RuleCondition::TotalLoadAbove { kw } => {
                    if snapshot.current_usage.value > kw {
                        found.push(aggregate_insight(
                            rule,
                            format!(
                                "Household load is {:.2} kW, above the {:.1} kW comfort level. \
                                 Consider shifting flexible loads.",
                                snapshot.current_usage.value, kw
                            ),
                        ));
                    }
                }
                RuleCondition::DailyCostAbove { amount } => {
                    if snapshot.todays_cost.value > amount {
                        found.push(aggregate_insight(
                            rule,
                            format!(
                                "Today's cost has reached {:.2}, above the {:.2} daily budget.",
                                snapshot.todays_cost.value, amount
                            ),
                        ));
                    }
                }
            }
        }

        // Stable sort keeps rule/device order within a priority tier.
        found.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.insights = found;
        &self.insights
    }

    /// The insight list from the most recent evaluation.
    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    /// The highest-ranked insight, or `None` when no rule fired.
    pub fn top_insight(&self) -> Option<&Insight> {
        self.insights.first()
    }
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

fn device_insight(rule: &InsightRule, device: &Device, message: String) -> Insight {
    Insight {
        id: format!("{}:{}", rule.id, device.id),
        message,
        priority: rule.priority,
        estimated_savings: rule.estimated_savings.to_string(),
        category: rule.category.to_string(),
    }
}

fn aggregate_insight(rule: &InsightRule, message: String) -> Insight {
    Insight {
        id: rule.id.to_string(),
        message,
        priority: rule.priority,
        estimated_savings: rule.estimated_savings.to_string(),
        category: rule.category.to_string(),
    }
}
