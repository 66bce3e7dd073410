//! Rule text parsing.
//!
//! Each non-blank line of rule text is one position in the candidate. A line
//! lists its alternatives separated by `|`. Every position also gets an
//! implicit empty alternative, so any position may be skipped.
//!
//! There is no escape syntax: a fragment can never contain `|`.

/// Separator between alternatives on a rule line
pub const FRAGMENT_SEPARATOR: char = '|';

/// One literal alternative within a position group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    text: String,
    len: usize,
}

impl Fragment {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            len: text.chars().count(),
        }
    }

    fn empty() -> Self {
        Self {
            text: String::new(),
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The alternatives for a single position, in rule order, ending with the empty alternative
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionGroup {
    alternatives: Vec<Fragment>,
}

impl PositionGroup {
    /// Parse a single (already line-split) rule line
    fn from_line(line: &str) -> Self {
        let mut alternatives: Vec<Fragment> = line
            .split(FRAGMENT_SEPARATOR)
            .filter(|token| !token.is_empty())
            .map(Fragment::new)
            .collect();
        alternatives.push(Fragment::empty());
        Self { alternatives }
    }

    pub fn alternatives(&self) -> &[Fragment] {
        &self.alternatives
    }

    /// Alternatives as plain strings, including the trailing empty one
    pub fn fragments(&self) -> Vec<&str> {
        self.alternatives.iter().map(Fragment::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    /// Always false: a group holds at least the empty alternative
    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }
}

/// Ordered position groups parsed from rule text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    groups: Vec<PositionGroup>,
}

impl RuleSet {
    /// Parse rule text. Never fails: any input yields some (possibly empty) rule set.
    ///
    /// Lines are split on `\n` with one trailing `\r` stripped; blank lines are dropped.
    pub fn parse(text: &str) -> Self {
        let groups = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.is_empty())
            .map(PositionGroup::from_line)
            .collect();
        Self { groups }
    }

    pub fn groups(&self) -> &[PositionGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Upper bound on complete combinations (product of group sizes), `None` on overflow
    pub fn combination_bound(&self) -> Option<u128> {
        self.groups
            .iter()
            .try_fold(1u128, |acc, group| acc.checked_mul(group.len() as u128))
    }

    /// Length in chars of the longest candidate the rules can produce
    pub fn longest_candidate(&self) -> usize {
        self.groups
            .iter()
            .map(|group| group.alternatives.iter().map(Fragment::len).max().unwrap_or(0))
            .sum()
    }
}
