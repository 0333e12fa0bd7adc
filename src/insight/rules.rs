//! Advisory rules declared as data.
//!
//! Evaluation logic lives in the engine; this module only describes what
//! to look for and how urgent a match is, so the table can grow without
//! touching the evaluator.

use std::fmt;

use crate::registry::device::DeviceCategory;

/// Urgency of an insight, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Condition a rule checks against device and aggregate state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleCondition {
    /// An on-device of this category has exceeded its daily on-time target.
    CategoryOnTimeExceeds {
        category: DeviceCategory,
        hours: f32,
    },
    /// An on-device is drawing close to its recorded peak.
    NearPeakDraw { ratio: f32 },
    /// A device has been on for a while while drawing very little,
    /// suggesting it was left on.
    IdleDraw { max_w: f32, min_hours: f32 },
    /// Total sampled household load is above a threshold.
    TotalLoadAbove { kw: f32 },
    /// Today's running cost is above a threshold.
    DailyCostAbove { amount: f32 },
}

/// One entry of the advisory rule table.
#[derive(Debug, Clone)]
pub struct InsightRule {
    /// Stable rule identifier, used as the insight id prefix.
    pub id: &'static str,
    /// Urgency assigned to matches.
    pub priority: Priority,
    /// Estimated savings shown alongside the message.
    pub estimated_savings: &'static str,
    /// Category tag for grouping in the UI.
    pub category: &'static str,
    /// What to check.
    pub condition: RuleCondition,
}

/// The built-in rule table, in evaluation order.
pub fn default_rules() -> Vec<InsightRule> {
    vec![
        InsightRule {
            id: "cooling-runtime",
            priority: Priority::High,
            estimated_savings: "$12/mo",
            category: "Cooling",
            condition: RuleCondition::CategoryOnTimeExceeds {
                category: DeviceCategory::Cooling,
                hours: 6.0,
            },
        },
        InsightRule {
            id: "heating-runtime",
            priority: Priority::High,
            estimated_savings: "$10/mo",
            category: "Heating",
            condition: RuleCondition::CategoryOnTimeExceeds {
                category: DeviceCategory::Heating,
                hours: 6.0,
            },
        },
        InsightRule {
            id: "lighting-runtime",
            priority: Priority::Medium,
            estimated_savings: "$5/mo",
            category: "Lighting",
            condition: RuleCondition::CategoryOnTimeExceeds {
                category: DeviceCategory::Lighting,
                hours: 3.0,
            },
        },
        InsightRule {
            id: "left-on-idle",
            priority: Priority::Medium,
            estimated_savings: "$4/mo",
            category: "Standby",
            condition: RuleCondition::IdleDraw {
                max_w: 15.0,
                min_hours: 2.0,
            },
        },
        InsightRule {
            id: "peak-draw",
            priority: Priority::Low,
            estimated_savings: "$3/mo",
            category: "Load",
            condition: RuleCondition::NearPeakDraw { ratio: 0.9 },
        },
        InsightRule {
            id: "household-load",
            priority: Priority::High,
            estimated_savings: "$8/mo",
            category: "Load",
            condition: RuleCondition::TotalLoadAbove { kw: 4.0 },
        },
        InsightRule {
            id: "daily-budget",
            priority: Priority::Low,
            estimated_savings: "$6/mo",
            category: "Budget",
            condition: RuleCondition::DailyCostAbove { amount: 5.0 },
        },
    ]
}
