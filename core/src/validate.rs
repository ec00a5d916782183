//! Rule validation.
//!
//! Checks split into two groups. *Blocking* problems would make the
//! serializer emit a line that the parser reads back differently (or not at
//! all); [`serialize`](crate::serialize) refuses to write them. *Advisory*
//! problems are reported to the caller but do not stop a save.
//!
//! # Examples
//!
//! ```
//! use typemap_core::{Rule, RuleId, validate_rules};
//!
//! let rules = vec![
//!     Rule::new(RuleId::new(1), 1, "text", "//....txt"),
//!     Rule::new(RuleId::new(2), 2, "ctext", "//depot/readme"),
//! ];
//! let errors = validate_rules(&rules);
//! assert_eq!(errors.len(), 2); // unknown base type, no wildcard
//! assert!(errors.iter().all(|e| !e.is_blocking()));
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::filetype::{Filetype, FiletypeError};
use crate::matcher::has_wildcard;
use crate::parse::COMMENT_MARKER;
use crate::{Rule, RuleId};

/// Rule validation errors.
///
/// Every per-rule variant names the rule's `order` and `id` so a caller can
/// point at the offending row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Pattern is empty or whitespace-only.
    #[error("rule {order} ({id}) has an empty pattern")]
    EmptyPattern { order: u32, id: RuleId },
    /// Filetype is empty or whitespace-only.
    #[error("rule {order} ({id}) has an empty filetype")]
    EmptyFiletype { order: u32, id: RuleId },
    /// Filetype is not a single token, or would be read as a comment.
    #[error("rule {order} ({id}) has a malformed filetype: {filetype:?}")]
    MalformedFiletype {
        order: u32,
        id: RuleId,
        filetype: String,
    },
    /// Pattern contains the `##` comment marker.
    #[error("rule {order} ({id}) pattern contains the comment marker: {pattern}")]
    PatternContainsCommentMarker {
        order: u32,
        id: RuleId,
        pattern: String,
    },
    /// A field contains a line break.
    #[error("rule {order} ({id}) contains a line break in its {field}")]
    LineBreak {
        order: u32,
        id: RuleId,
        field: &'static str,
    },
    /// Filetype base is not one of the known kinds.
    #[error("rule {order} ({id}) has an unknown base filetype: {base}")]
    UnknownBaseType { order: u32, id: RuleId, base: String },
    /// Filetype modifier list does not parse.
    #[error("rule {order} ({id}) has an invalid filetype modifier: {modifier}")]
    InvalidModifier {
        order: u32,
        id: RuleId,
        modifier: String,
    },
    /// Pattern does not start with `//`.
    #[error("rule {order} ({id}) pattern is not a depot path: {pattern}")]
    UnrootedPattern {
        order: u32,
        id: RuleId,
        pattern: String,
    },
    /// Pattern contains no wildcard token.
    #[error("rule {order} ({id}) pattern has no wildcard: {pattern}")]
    MissingWildcard {
        order: u32,
        id: RuleId,
        pattern: String,
    },
    /// Two rules share an id.
    #[error("duplicate rule id: {0}")]
    DuplicateId(RuleId),
    /// Orders are not exactly `1..=N`.
    #[error("rule orders are not contiguous: expected {expected}, found {found}")]
    OrderOutOfSequence { expected: u32, found: u32 },
}

impl ValidationError {
    /// Returns `true` for problems that make a rule unwritable.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            ValidationError::EmptyPattern { .. }
                | ValidationError::EmptyFiletype { .. }
                | ValidationError::MalformedFiletype { .. }
                | ValidationError::PatternContainsCommentMarker { .. }
                | ValidationError::LineBreak { .. }
        )
    }
}

/// Runs the blocking checks only, stopping at the first failure.
///
/// This is the precondition the serializer enforces on every rule.
pub fn check_writable(rule: &Rule) -> Result<(), ValidationError> {
    let (order, id) = (rule.order, rule.id);
    let filetype = rule.filetype.trim();
    let pattern = rule.pattern.trim();

    if pattern.is_empty() {
        return Err(ValidationError::EmptyPattern { order, id });
    }
    // `+F` has modifiers but no base.
    if filetype.is_empty() || filetype.starts_with('+') {
        return Err(ValidationError::EmptyFiletype { order, id });
    }

    let line_break = |text: &str| text.contains(['\n', '\r']);
    if line_break(&rule.filetype) {
        return Err(ValidationError::LineBreak { order, id, field: "filetype" });
    }
    if line_break(&rule.pattern) {
        return Err(ValidationError::LineBreak { order, id, field: "pattern" });
    }
    if rule.comment.as_deref().is_some_and(line_break) {
        return Err(ValidationError::LineBreak { order, id, field: "comment" });
    }

    if filetype.contains(char::is_whitespace)
        || filetype.starts_with('#')
        || filetype.contains(COMMENT_MARKER)
    {
        return Err(ValidationError::MalformedFiletype {
            order,
            id,
            filetype: rule.filetype.clone(),
        });
    }
    if pattern.contains(COMMENT_MARKER) {
        return Err(ValidationError::PatternContainsCommentMarker {
            order,
            id,
            pattern: rule.pattern.clone(),
        });
    }

    Ok(())
}

/// Validates one rule: the blocking check first, then advisory checks.
pub fn validate_rule(rule: &Rule) -> Vec<ValidationError> {
    if let Err(err) = check_writable(rule) {
        return vec![err];
    }

    let (order, id) = (rule.order, rule.id);
    let mut errors = Vec::new();

    match Filetype::parse(&rule.filetype) {
        Ok(_) => {}
        Err(FiletypeError::UnknownBase(base)) => {
            errors.push(ValidationError::UnknownBaseType { order, id, base });
        }
        Err(FiletypeError::InvalidModifier(modifier)) => {
            errors.push(ValidationError::InvalidModifier { order, id, modifier });
        }
        Err(FiletypeError::Empty) => {
            errors.push(ValidationError::EmptyFiletype { order, id });
        }
    }

    let pattern = rule.pattern.trim();
    if !pattern.starts_with("//") {
        errors.push(ValidationError::UnrootedPattern {
            order,
            id,
            pattern: rule.pattern.clone(),
        });
    }
    if !has_wildcard(pattern) {
        errors.push(ValidationError::MissingWildcard {
            order,
            id,
            pattern: rule.pattern.clone(),
        });
    }

    errors
}

/// Validates a whole rule set: every rule, id uniqueness, and the order
/// permutation.
pub fn validate_rules(rules: &[Rule]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen_ids = HashSet::new();
    for rule in rules {
        if !seen_ids.insert(rule.id) {
            errors.push(ValidationError::DuplicateId(rule.id));
        }
    }

    let mut orders: Vec<u32> = rules.iter().map(|rule| rule.order).collect();
    orders.sort_unstable();
    if let Some((expected, found)) = orders
        .iter()
        .enumerate()
        .map(|(index, order)| (index as u32 + 1, *order))
        .find(|(expected, found)| expected != found)
    {
        errors.push(ValidationError::OrderOutOfSequence { expected, found });
    }

    let mut sorted: Vec<&Rule> = rules.iter().collect();
    sorted.sort_by_key(|rule| rule.order);
    for rule in sorted {
        errors.extend(validate_rule(rule));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(order: u32, filetype: &str, pattern: &str) -> Rule {
        Rule::new(RuleId::new(u64::from(order)), order, filetype, pattern)
    }

    #[test]
    fn test_well_formed_rule_has_no_errors() {
        assert!(validate_rule(&rule(1, "binary+FS2", "//depot/....iso")).is_empty());
    }

    #[test]
    fn test_empty_fields_are_blocking() {
        let empty_pattern = rule(3, "text", "  ");
        let err = check_writable(&empty_pattern).unwrap_err();
        assert_eq!(
            err,
            ValidationError::EmptyPattern {
                order: 3,
                id: RuleId::new(3)
            }
        );
        assert!(err.is_blocking());
        assert_eq!(err.to_string(), "rule 3 (#3) has an empty pattern");

        let empty_filetype = rule(4, "", "//....txt");
        assert!(matches!(
            check_writable(&empty_filetype),
            Err(ValidationError::EmptyFiletype { order: 4, .. })
        ));
    }

    #[test]
    fn test_unwritable_text_is_blocking() {
        assert!(matches!(
            check_writable(&rule(1, "binary +F", "//....bin")),
            Err(ValidationError::MalformedFiletype { .. })
        ));
        assert!(matches!(
            check_writable(&rule(1, "#binary", "//....bin")),
            Err(ValidationError::MalformedFiletype { .. })
        ));
        assert!(matches!(
            check_writable(&rule(1, "binary", "//a##b/...")),
            Err(ValidationError::PatternContainsCommentMarker { .. })
        ));
        let multiline = rule(1, "text", "//....txt").with_comment("one\ntwo");
        assert!(matches!(
            check_writable(&multiline),
            Err(ValidationError::LineBreak { field: "comment", .. })
        ));
    }

    #[test]
    fn test_advisory_checks() {
        let errors = validate_rule(&rule(2, "binary+F2", "depot/readme"));
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ValidationError::InvalidModifier { .. }));
        assert!(matches!(errors[1], ValidationError::UnrootedPattern { .. }));
        assert!(matches!(errors[2], ValidationError::MissingWildcard { .. }));
        assert!(errors.iter().all(|e| !e.is_blocking()));
    }

    #[test]
    fn test_collection_checks() {
        let rules = vec![
            rule(1, "text", "//....txt"),
            Rule::new(RuleId::new(1), 3, "binary", "//....bin"),
        ];
        let errors = validate_rules(&rules);
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicateId(RuleId::new(1)),
                ValidationError::OrderOutOfSequence {
                    expected: 2,
                    found: 3
                },
            ]
        );
    }
}
