//! Error types for typemap operations.
//!
//! Most conditions in the engine degrade locally (malformed lines are
//! skipped, broken patterns simply do not match). The variants here are the
//! ones a caller must handle: edits that name a rule that does not exist,
//! template text that never arrived, and rules that cannot be written.

use thiserror::Error;

use crate::RuleId;
use crate::validate::ValidationError;

/// Errors that can occur while editing, loading, or writing a typemap.
#[derive(Debug, Error)]
pub enum TypemapError {
    /// An edit referenced a rule id that is not in the collection.
    #[error("no rule with id {0}")]
    UnknownRule(RuleId),

    /// The external template source produced no usable text.
    #[error("template text unavailable")]
    TemplateUnavailable,

    /// Template text was supplied but has no `TypeMap:` section.
    #[error("template text has no TypeMap: section")]
    MissingTypeMapSection,

    /// A rule failed a blocking validation check.
    #[error("invalid rule: {0}")]
    Invalid(#[from] ValidationError),

    /// A wildcard pattern could not be compiled into a matcher.
    #[error("invalid wildcard pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Convenience alias for results with [`TypemapError`].
pub type Result<T> = std::result::Result<T, TypemapError>;
