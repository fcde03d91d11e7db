//! Rule identity: two entries are the same rule when source, target and status match.

use std::collections::HashSet;

use crate::contract::RuleEntry;

pub fn rule_equals(a: &RuleEntry, b: &RuleEntry) -> bool {
    a.source_url == b.source_url && a.target_url == b.target_url && a.status_code == b.status_code
}

/// Linear scan; see [`RuleIndex`] for repeated lookups against the same list.
pub fn rule_in_list(rule: &RuleEntry, list: &[RuleEntry]) -> bool {
    list.iter().any(|candidate| rule_equals(rule, candidate))
}

/// Hash index over a borrowed rule list, answering the same question as [`rule_in_list`].
#[derive(Debug, Default)]
pub struct RuleIndex<'a> {
    rules: HashSet<&'a RuleEntry>,
}

impl<'a> RuleIndex<'a> {
    pub fn new(list: &'a [RuleEntry]) -> Self {
        RuleIndex {
            rules: list.iter().collect(),
        }
    }

    pub fn contains(&self, rule: &RuleEntry) -> bool {
        self.rules.contains(rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
