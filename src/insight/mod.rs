//! Advisory insight generation from device and aggregate state.

/// Rule evaluation and insight ranking.
pub mod engine;
/// The rule table, declared as data.
pub mod rules;

// Re-export the main types for convenience
pub use engine::{Insight, InsightEngine};
pub use rules::{default_rules, InsightRule, Priority, RuleCondition};
