//! Rule engine for version-control server typemaps.
//!
//! A typemap is an ordered list of rules, each binding a depot-path wildcard
//! pattern to a filetype. When several patterns match a file, the rule with
//! the highest order wins. This crate covers the engine only:
//!
//! - [`Rule`] and [`Typemap`]: the model, with order normalization
//!   ([`renumber`]) and edit operations.
//! - [`parse_typemap_text`], [`parse_indexed_record`], [`parse_template`]:
//!   reading the server's text and tagged-record forms.
//! - [`matches`] and [`resolve`]: the wildcard dialect (`...`, `....`, `*`,
//!   `?`) and the "which filetype does this path get" query.
//! - [`conflicts_for`] and [`detect_conflicts`]: which later rules override
//!   or duplicate an earlier one.
//! - [`serialize`] and [`render_spec`]: writing rules back in the server's
//!   format, after [`validate`] checks.
//! - [`merge_template`]: importing a template under a conflict-aware policy.
//!
//! The engine does no I/O. Reading and writing the server's typemap, and
//! fetching template text, belong to the caller.
//!
//! # Example
//!
//! ```
//! use typemap_core::*;
//!
//! let spec = "TypeMap:\n\ttext //....txt\n\tbinary+F //depot/....zip ## archives\n";
//! let mut typemap = Typemap::from_rules(parse_typemap_text(spec));
//!
//! let opts = MatchOptions::default();
//! assert_eq!(typemap.resolve("//depot/a.zip", &opts).unwrap().filetype, "binary+F");
//!
//! let id = typemap.create(NewRule::new("binary", "//depot/docs/....txt")).id;
//! let conflicts = conflicts_for(&typemap.rules()[0], typemap.rules());
//! assert_eq!(conflicts[0].by_id, id);
//!
//! let written = render_spec(typemap.rules()).unwrap();
//! assert_eq!(parse_typemap_text(&written).len(), 3);
//! ```

pub mod conflict;
mod error;
mod filetype;
pub mod matcher;
mod merge;
mod parse;
mod rule;
mod serialize;
pub mod validate;

pub use conflict::{Conflict, ConflictKind, OverlapReason, conflicts_for, conflicts_for_with, detect_conflicts};
pub use error::{Result, TypemapError};
pub use filetype::{BaseType, Filetype, FiletypeError, Modifier};
pub use matcher::{MatchOptions, WildcardMatcher, matches, matches_with, resolve};
pub use merge::{MergeEntry, MergeOutcome, MergeReport, SkipReason, merge_template};
pub use parse::{
    COMMENT_MARKER, IndexedEntry, TYPEMAP_FIELD, decode_indexed_record, parse_indexed_entries,
    parse_indexed_record, parse_template, parse_typemap_text,
};
pub use rule::{NewRule, Rule, RuleId, Typemap, renumber};
pub use serialize::{BODY_INDENT, PREAMBLE, render_line, render_spec, serialize};
pub use validate::{ValidationError, check_writable, validate_rule, validate_rules};
