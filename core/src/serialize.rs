//! Rendering rules back into the server's spec form.
//!
//! Output is always in `order`, regardless of how the slice is arranged,
//! and always parses back to the same `(filetype, pattern, comment)` tuples.
//!
//! # Examples
//!
//! ```
//! use typemap_core::{Rule, RuleId, parse_typemap_text, serialize};
//!
//! let rules = vec![
//!     Rule::new(RuleId::new(2), 2, "binary+l", "//depot/....psd").with_comment("art"),
//!     Rule::new(RuleId::new(1), 1, "text", "//....txt"),
//! ];
//! let body = serialize(&rules).unwrap();
//! assert_eq!(body, "\ttext //....txt\n\tbinary+l //depot/....psd ## art");
//!
//! let reparsed = parse_typemap_text(&body);
//! assert_eq!(reparsed[1].wire_tuple(), ("binary+l", "//depot/....psd", Some("art")));
//! ```

use crate::Rule;
use crate::error::Result;
use crate::parse::{COMMENT_MARKER, TYPEMAP_FIELD};
use crate::validate::check_writable;

/// Leading indentation of every body line.
pub const BODY_INDENT: &str = "\t";

/// Comment block written ahead of the `TypeMap:` header.
pub const PREAMBLE: &str = "\
# Perforce File Type Mapping Specifications.
#
#  TypeMap:\ta list of filetype mappings; one per line.
#\t\tEach line has two elements:
#
#\t\tFiletype: The filetype to use on 'p4 add'.
#
#\t\tPath:     File pattern which will use this filetype.
#
# See 'p4 help typemap' for more information.
";

/// Renders one body line without indentation.
///
/// Patterns containing whitespace are wrapped in double quotes.
pub fn render_line(rule: &Rule) -> String {
    let pattern = rule.pattern.trim();
    let mut line = if pattern.contains(char::is_whitespace) {
        format!("{} \"{}\"", rule.filetype.trim(), pattern)
    } else {
        format!("{} {}", rule.filetype.trim(), pattern)
    };
    if let Some(comment) = rule.comment.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        line.push(' ');
        line.push_str(COMMENT_MARKER);
        line.push(' ');
        line.push_str(comment);
    }
    line
}

/// Renders the body lines of the `TypeMap:` field, joined with newlines.
///
/// # Errors
///
/// Returns [`TypemapError::Invalid`](crate::TypemapError::Invalid) for the
/// first rule (in order) that fails
/// [`check_writable`](crate::validate::check_writable). Nothing is rendered
/// in that case.
pub fn serialize(rules: &[Rule]) -> Result<String> {
    let mut sorted: Vec<&Rule> = rules.iter().collect();
    sorted.sort_by_key(|rule| rule.order);

    let mut lines = Vec::with_capacity(sorted.len());
    for rule in sorted {
        check_writable(rule)?;
        lines.push(format!("{BODY_INDENT}{}", render_line(rule)));
    }
    Ok(lines.join("\n"))
}

/// Renders the complete spec: preamble, `TypeMap:` header, body, and a
/// trailing newline. This is the text handed to the external write call.
pub fn render_spec(rules: &[Rule]) -> Result<String> {
    let body = serialize(rules)?;
    let mut spec = String::with_capacity(PREAMBLE.len() + body.len() + 16);
    spec.push_str(PREAMBLE);
    spec.push('\n');
    spec.push_str(TYPEMAP_FIELD);
    spec.push('\n');
    if !body.is_empty() {
        spec.push_str(&body);
        spec.push('\n');
    }
    Ok(spec)
}
