//! Overlap and precedence analysis between rules.
//!
//! A rule can only be overridden by a rule with a greater `order`, since the
//! server applies the last matching rule. Overlap is decided by heuristics,
//! tried in turn:
//!
//! 1. the two patterns are the same string;
//! 2. both patterns end in the same literal extension, and one literal
//!    prefix (text before the first wildcard) contains the other;
//! 3. one of them is the catch-all `//...`;
//! 4. one pattern matches a concrete witness path built from the other.
//!
//! This is approximate. Test 2 compares literal substrings, so unrelated
//! paths that share text are flagged, and test 4 only samples one path per
//! pattern. The detector errs towards reporting: a spurious warning costs
//! less than an unnoticed shadowed rule.
//!
//! # Examples
//!
//! ```
//! use typemap_core::{conflicts_for, parse_typemap_text};
//!
//! let rules = parse_typemap_text("text //....txt\nbinary //special/....txt\n");
//! let conflicts = conflicts_for(&rules[0], &rules);
//! assert_eq!(conflicts.len(), 1);
//! assert_eq!(conflicts[0].to_string(), "overridden by rule 2 (binary)");
//! assert!(conflicts_for(&rules[1], &rules).is_empty());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::matcher::{MatchOptions, WildcardMatcher, literal_prefix, witness_path};
use crate::{Rule, RuleId};

/// The catch-all pattern that covers the whole depot namespace.
pub const CATCH_ALL_PATTERN: &str = "//...";

/// Which heuristic found the overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapReason {
    IdenticalPattern,
    SharedExtension,
    BroadWildcard,
    Witness,
}

/// What a later overlapping rule does to an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The later rule assigns a different filetype.
    Overridden,
    /// The later rule assigns the same filetype.
    Duplicated,
}

/// One later rule that overrides or duplicates the rule under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub reason: OverlapReason,
    pub by_id: RuleId,
    pub by_order: u32,
    pub by_filetype: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConflictKind::Overridden => write!(
                f,
                "overridden by rule {} ({})",
                self.by_order, self.by_filetype
            ),
            ConflictKind::Duplicated => write!(f, "duplicated by rule {}", self.by_order),
        }
    }
}

/// A rule prepared for pairwise checks.
struct Candidate<'a> {
    rule: &'a Rule,
    matcher: Option<WildcardMatcher>,
    witness: String,
}

impl<'a> Candidate<'a> {
    fn new(rule: &'a Rule, options: &MatchOptions) -> Self {
        Self {
            rule,
            matcher: WildcardMatcher::compile_lenient(&rule.pattern, options),
            witness: witness_path(&rule.pattern),
        }
    }

    fn matches(&self, path: &str) -> bool {
        self.matcher.as_ref().is_some_and(|m| m.is_match(path))
    }
}

/// Literal extension after the last `.`, if the pattern ends in one.
fn literal_extension(pattern: &str) -> Option<&str> {
    let (_, extension) = pattern.rsplit_once('.')?;
    let is_literal = !extension.is_empty()
        && !extension.contains(['/', '*', '?'])
        && !pattern.ends_with("...");
    is_literal.then_some(extension)
}

/// String-only overlap tests (1 to 3).
///
/// ```
/// use typemap_core::conflict::{OverlapReason, pattern_overlap};
///
/// assert_eq!(pattern_overlap("//....txt", "//....txt"), Some(OverlapReason::IdenticalPattern));
/// assert_eq!(pattern_overlap("//....txt", "//docs/....txt"), Some(OverlapReason::SharedExtension));
/// assert_eq!(pattern_overlap("//...", "//depot/....exe"), Some(OverlapReason::BroadWildcard));
/// assert_eq!(pattern_overlap("//....txt", "//....bin"), None);
/// ```
pub fn pattern_overlap(a: &str, b: &str) -> Option<OverlapReason> {
    if a == b {
        return Some(OverlapReason::IdenticalPattern);
    }

    if let (Some(ext_a), Some(ext_b)) = (literal_extension(a), literal_extension(b)) {
        let (prefix_a, prefix_b) = (literal_prefix(a), literal_prefix(b));
        if ext_a == ext_b && (prefix_a.contains(prefix_b) || prefix_b.contains(prefix_a)) {
            return Some(OverlapReason::SharedExtension);
        }
    }

    if a == CATCH_ALL_PATTERN || b == CATCH_ALL_PATTERN {
        return Some(OverlapReason::BroadWildcard);
    }

    None
}

fn overlap(a: &Candidate<'_>, b: &Candidate<'_>) -> Option<OverlapReason> {
    pattern_overlap(&a.rule.pattern, &b.rule.pattern).or_else(|| {
        (a.matches(&b.witness) || b.matches(&a.witness)).then_some(OverlapReason::Witness)
    })
}

fn conflicts_against(target: &Candidate<'_>, others: &[Candidate<'_>]) -> Vec<Conflict> {
    let mut conflicts: Vec<Conflict> = others
        .iter()
        .filter(|other| other.rule.order > target.rule.order)
        .filter_map(|other| {
            let reason = overlap(target, other)?;
            let kind = if other.rule.filetype == target.rule.filetype {
                ConflictKind::Duplicated
            } else {
                ConflictKind::Overridden
            };
            Some(Conflict {
                kind,
                reason,
                by_id: other.rule.id,
                by_order: other.rule.order,
                by_filetype: other.rule.filetype.clone(),
            })
        })
        .collect();
    conflicts.sort_by_key(|conflict| conflict.by_order);
    conflicts
}

/// Lists the later rules that override or duplicate `rule`, ascending by
/// their order. Uses default [`MatchOptions`].
pub fn conflicts_for(rule: &Rule, rules: &[Rule]) -> Vec<Conflict> {
    conflicts_for_with(rule, rules, &MatchOptions::default())
}

/// Like [`conflicts_for`], with explicit matcher options.
pub fn conflicts_for_with(rule: &Rule, rules: &[Rule], options: &MatchOptions) -> Vec<Conflict> {
    let target = Candidate::new(rule, options);
    let later: Vec<Candidate<'_>> = rules
        .iter()
        .filter(|other| other.order > rule.order)
        .map(|other| Candidate::new(other, options))
        .collect();
    conflicts_against(&target, &later)
}

/// Runs [`conflicts_for_with`] for every rule, compiling each pattern once.
///
/// Rules without conflicts are left out of the map.
///
/// # Examples
///
/// ```
/// use typemap_core::{MatchOptions, detect_conflicts, parse_typemap_text};
///
/// let rules = parse_typemap_text("text //depot/...\nbinary //depot/bin/...\ntext //depot/...\n");
/// let report = detect_conflicts(&rules, &MatchOptions::default());
/// let first: Vec<String> = report[&rules[0].id].iter().map(ToString::to_string).collect();
/// assert_eq!(first, vec!["overridden by rule 2 (binary)", "duplicated by rule 3"]);
/// ```
pub fn detect_conflicts(rules: &[Rule], options: &MatchOptions) -> BTreeMap<RuleId, Vec<Conflict>> {
    let candidates: Vec<Candidate<'_>> = rules
        .iter()
        .map(|rule| Candidate::new(rule, options))
        .collect();

    candidates
        .iter()
        .filter_map(|target| {
            let conflicts = conflicts_against(target, &candidates);
            (!conflicts.is_empty()).then(|| (target.rule.id, conflicts))
        })
        .collect()
}
