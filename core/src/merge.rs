//! Importing template rules into a typemap.
//!
//! Each incoming rule is matched against existing rules by exact pattern
//! text only:
//!
//! - no rule has the pattern: the incoming rule is appended (*added*);
//! - a rule with the pattern already has the same filetype: nothing
//!   happens (*skipped*);
//! - rules with the pattern exist, none with the same filetype: the incoming
//!   rule is appended anyway (*conflict*), leaving ordering and the
//!   conflict detector to settle it.
//!
//! Existing rules are never modified or removed. Lookups see rules appended
//! earlier in the same merge, so merging a template twice only produces
//! skips the second time.
//!
//! # Examples
//!
//! ```
//! use typemap_core::{Typemap, merge_template, parse_template, parse_typemap_text};
//!
//! let mut typemap = Typemap::from_rules(parse_typemap_text("text //....txt\nbinary //....png\n"));
//! let template = parse_template(Some("TypeMap:\n text //....txt\n binary+F //....png\n binary //....psd\n")).unwrap();
//!
//! let report = merge_template(&mut typemap, &template);
//! assert_eq!((report.added(), report.skipped(), report.conflicts()), (1, 1, 1));
//! assert_eq!(typemap.len(), 4);
//! assert_eq!(report.summary(), "1 added, 1 skipped, 1 conflicting");
//! ```

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::{NewRule, Rule, RuleId, Typemap};

/// Why an incoming rule was not imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SameFiletypeExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SameFiletypeExists => f.write_str("same filetype already exists"),
        }
    }
}

/// The decision taken for one incoming rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Appended as a new rule; no rule had this pattern.
    Added { id: RuleId },
    /// Not imported.
    Skipped { reason: SkipReason },
    /// Appended next to an existing rule with the same pattern and a
    /// different filetype.
    Conflict {
        id: RuleId,
        existing_filetype: String,
    },
}

/// One incoming rule and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeEntry {
    pub pattern: String,
    pub filetype: String,
    #[serde(flatten)]
    pub outcome: MergeOutcome,
}

/// Complete record of a merge, one entry per incoming rule, in the order
/// the incoming rules were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub entries: Vec<MergeEntry>,
}

impl MergeReport {
    pub fn added(&self) -> usize {
        self.count(|outcome| matches!(outcome, MergeOutcome::Added { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, MergeOutcome::Skipped { .. }))
    }

    pub fn conflicts(&self) -> usize {
        self.count(|outcome| matches!(outcome, MergeOutcome::Conflict { .. }))
    }

    /// Number of incoming rules processed. Always `added + skipped + conflicts`.
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Ids of every rule the merge appended.
    pub fn appended_ids(&self) -> Vec<RuleId> {
        self.entries
            .iter()
            .filter_map(|entry| match entry.outcome {
                MergeOutcome::Added { id } | MergeOutcome::Conflict { id, .. } => Some(id),
                MergeOutcome::Skipped { .. } => None,
            })
            .collect()
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} added, {} skipped, {} conflicting",
            self.added(),
            self.skipped(),
            self.conflicts()
        )
    }

    fn count(&self, predicate: impl Fn(&MergeOutcome) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|entry| predicate(&entry.outcome))
            .count()
    }
}

/// Merges `incoming` rules into `typemap`, in the incoming rules' order.
///
/// Appended rules get fresh ids and are flagged `from_template`. Orders are
/// renumbered afterwards.
pub fn merge_template(typemap: &mut Typemap, incoming: &[Rule]) -> MergeReport {
    let mut sorted: Vec<&Rule> = incoming.iter().collect();
    sorted.sort_by_key(|rule| rule.order);

    let mut report = MergeReport::default();
    for rule in sorted {
        let outcome = decide(typemap, rule);
        debug!(pattern = %rule.pattern, filetype = %rule.filetype, ?outcome, "Template merge decision");
        report.entries.push(MergeEntry {
            pattern: rule.pattern.clone(),
            filetype: rule.filetype.clone(),
            outcome,
        });
    }
    typemap.renumber();

    info!(
        added = report.added(),
        skipped = report.skipped(),
        conflicts = report.conflicts(),
        "Merged template rules"
    );
    report
}

fn decide(typemap: &mut Typemap, incoming: &Rule) -> MergeOutcome {
    let same_pattern: Vec<&Rule> = typemap
        .rules()
        .iter()
        .filter(|existing| existing.pattern == incoming.pattern)
        .collect();

    if same_pattern
        .iter()
        .any(|existing| existing.filetype == incoming.filetype)
    {
        return MergeOutcome::Skipped {
            reason: SkipReason::SameFiletypeExists,
        };
    }

    let existing_filetype = same_pattern.last().map(|existing| existing.filetype.clone());
    let id = typemap.create(NewRule::from(incoming).from_template()).id;
    match existing_filetype {
        None => MergeOutcome::Added { id },
        Some(existing_filetype) => MergeOutcome::Conflict {
            id,
            existing_filetype,
        },
    }
}
