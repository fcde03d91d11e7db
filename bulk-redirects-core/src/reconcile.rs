//! Set difference between the rules the spreadsheet wants and the rules the list has.
//!
//! The result is only used to report what a publish would change. Publishing always
//! replaces the whole list.

use serde::Serialize;

use crate::contract::RuleEntry;
use crate::matcher::RuleIndex;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleDiff {
    /// Desired rules missing from the current list.
    pub added: Vec<RuleEntry>,
    /// Current rules no longer desired.
    pub removed: Vec<RuleEntry>,
}

impl RuleDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Both sides keep the order and any repeats of their input.
pub fn diff(desired: &[RuleEntry], current: &[RuleEntry]) -> RuleDiff {
    let desired_index = RuleIndex::new(desired);
    let current_index = RuleIndex::new(current);

    RuleDiff {
        added: desired
            .iter()
            .filter(|rule| !current_index.contains(rule))
            .cloned()
            .collect(),
        removed: current
            .iter()
            .filter(|rule| !desired_index.contains(rule))
            .cloned()
            .collect(),
    }
}
