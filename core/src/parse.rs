//! Typemap parsing.
//!
//! Three inbound shapes are supported:
//!
//! - [`parse_typemap_text`]: a text block, usually the server's spec form
//!   (comment preamble, a `TypeMap:` field header, indented body lines).
//! - [`parse_indexed_record`]: a tagged record with `TypeMap0`, `TypeMap1`,
//!   ... keys and optional parallel `TypeMapComment<i>` keys.
//! - [`parse_template`]: template text, which must contain a `TypeMap:`
//!   section and yields rules flagged as template-sourced.
//!
//! Body lines have the shape `<filetype> <pattern> [## <comment>]`.
//! Malformed lines are skipped; a load never fails because of one line.

use tracing::debug;

use crate::error::{Result, TypemapError};
use crate::rule::normalize_comment;
use crate::{Rule, RuleId};

/// Header line that opens the rule section of the spec form.
pub const TYPEMAP_FIELD: &str = "TypeMap:";

/// Separates rule text from an inline comment.
pub const COMMENT_MARKER: &str = "##";

const LINE_KEY_PREFIX: &str = "TypeMap";
const COMMENT_KEY_PREFIX: &str = "TypeMapComment";

/// One line of the indexed record form, after key decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedEntry {
    /// Numeric suffix of the `TypeMap<i>` key.
    pub index: u64,
    /// Raw rule text.
    pub text: String,
    /// Value of the matching `TypeMapComment<i>` key, if any.
    pub comment: Option<String>,
}

/// Decodes `TypeMap<i>` / `TypeMapComment<i>` keys into entries sorted by
/// numeric index.
///
/// Keys that do not follow either shape are ignored, as are comments with no
/// matching rule line.
///
/// # Examples
///
/// ```
/// use typemap_core::decode_indexed_record;
///
/// let record = [
///     ("TypeMap10", "binary //....exe"),
///     ("TypeMap2", "text //....txt"),
///     ("TypeMapComment2", "## plain text"),
///     ("Update", "2024/01/01"),
/// ];
/// let entries = decode_indexed_record(record);
/// assert_eq!(entries.iter().map(|e| e.index).collect::<Vec<_>>(), vec![2, 10]);
/// assert_eq!(entries[0].comment.as_deref(), Some("## plain text"));
/// ```
pub fn decode_indexed_record<I, K, V>(record: I) -> Vec<IndexedEntry>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut lines: Vec<(u64, String)> = Vec::new();
    let mut comments: Vec<(u64, String)> = Vec::new();

    for (key, value) in record {
        let key = key.as_ref();
        if let Some(index) = indexed_suffix(key, COMMENT_KEY_PREFIX) {
            comments.push((index, value.as_ref().to_string()));
        } else if let Some(index) = indexed_suffix(key, LINE_KEY_PREFIX) {
            lines.push((index, value.as_ref().to_string()));
        }
    }

    lines.sort_by_key(|(index, _)| *index);
    lines
        .into_iter()
        .map(|(index, text)| IndexedEntry {
            index,
            text,
            comment: comments
                .iter()
                .find(|(comment_index, _)| *comment_index == index)
                .map(|(_, comment)| comment.clone()),
        })
        .collect()
}

fn indexed_suffix(key: &str, prefix: &str) -> Option<u64> {
    let digits = key.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parses a typemap text block into rules in order of appearance.
///
/// When the text has a `TypeMap:` header, only the lines of that field are
/// read; otherwise every line except unindented `Field:` headers is a
/// candidate body line. Lines starting with `#` are comments.
///
/// # Examples
///
/// ```
/// use typemap_core::parse_typemap_text;
///
/// let text = "Preamble: ignored\nTypeMap:\n\ttext //....txt ## docs\n\tbinary+Fl //depot/....zip\n\tbogus\n";
/// let rules = parse_typemap_text(text);
/// assert_eq!(rules.len(), 2);
/// assert_eq!(rules[0].comment.as_deref(), Some("docs"));
/// assert_eq!((rules[1].order, rules[1].filetype.as_str()), (2, "binary+Fl"));
/// ```
pub fn parse_typemap_text(text: &str) -> Vec<Rule> {
    let mut builder = RuleBuilder::default();
    match typemap_section(text) {
        Some(body) => body.into_iter().for_each(|line| builder.push_line(line, None)),
        None => text
            .lines()
            .filter(|line| !is_field_header(line))
            .for_each(|line| builder.push_line(line, None)),
    }
    let rules = builder.finish();
    debug!(rules = rules.len(), "Parsed typemap text");
    rules
}

/// Parses already-decoded indexed entries.
///
/// Orders are assigned by position, ignoring gaps in the key indices.
pub fn parse_indexed_entries(entries: &[IndexedEntry]) -> Vec<Rule> {
    let mut builder = RuleBuilder::default();
    for entry in entries {
        builder.push_line(&entry.text, entry.comment.as_deref());
    }
    let rules = builder.finish();
    debug!(rules = rules.len(), entries = entries.len(), "Parsed indexed typemap record");
    rules
}

/// Decodes and parses an indexed record in one step.
///
/// # Examples
///
/// ```
/// use typemap_core::parse_indexed_record;
///
/// let record = [
///     ("TypeMap1", "binary //....exe"),
///     ("TypeMap0", "text //....txt"),
///     ("TypeMapComment1", "##  executables "),
/// ];
/// let rules = parse_indexed_record(record);
/// assert_eq!(rules[0].pattern, "//....txt");
/// assert_eq!(rules[1].comment.as_deref(), Some("executables"));
/// ```
pub fn parse_indexed_record<I, K, V>(record: I) -> Vec<Rule>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    parse_indexed_entries(&decode_indexed_record(record))
}

/// Parses template text fetched from an external source.
///
/// `None` or blank text means the source could not be resolved.
///
/// # Errors
///
/// - [`TypemapError::TemplateUnavailable`] when there is no text.
/// - [`TypemapError::MissingTypeMapSection`] when the text has no
///   `TypeMap:` header.
///
/// # Examples
///
/// ```
/// use typemap_core::{TypemapError, parse_template};
///
/// let text = "# Name: Game assets\n# Version: 2\nTypeMap:\n    binary+S //....uasset\n";
/// let rules = parse_template(Some(text)).unwrap();
/// assert!(rules[0].from_template);
///
/// assert!(matches!(parse_template(None), Err(TypemapError::TemplateUnavailable)));
/// ```
pub fn parse_template(text: Option<&str>) -> Result<Vec<Rule>> {
    let text = match text {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Err(TypemapError::TemplateUnavailable),
    };
    let body = typemap_section(text).ok_or(TypemapError::MissingTypeMapSection)?;

    let mut builder = RuleBuilder {
        from_template: true,
        ..Default::default()
    };
    body.into_iter().for_each(|line| builder.push_line(line, None));
    let rules = builder.finish();
    debug!(rules = rules.len(), "Parsed template text");
    Ok(rules)
}

/// Returns the lines that belong to the `TypeMap:` field, or `None` when
/// the text has no such header.
fn typemap_section(text: &str) -> Option<Vec<&str>> {
    let mut lines = text.lines();
    lines.by_ref().find(|line| line.trim() == TYPEMAP_FIELD)?;
    Some(lines.take_while(|line| !is_field_header(line)).collect())
}

/// An unindented `Name:` line starts the next spec field.
fn is_field_header(line: &str) -> bool {
    if line.starts_with(char::is_whitespace) || line.starts_with('#') {
        return false;
    }
    let first = line.split_whitespace().next().unwrap_or_default();
    first.len() > 1
        && first.ends_with(':')
        && first[..first.len() - 1]
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric())
}

#[derive(Debug, Default)]
struct RuleBuilder {
    rules: Vec<Rule>,
    from_template: bool,
}

impl RuleBuilder {
    fn push_line(&mut self, raw: &str, sidecar_comment: Option<&str>) {
        if let Some(rule) = self.parse_line(raw, sidecar_comment) {
            self.rules.push(rule);
        }
    }

    fn parse_line(&self, raw: &str, sidecar_comment: Option<&str>) -> Option<Rule> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let (rule_text, inline_comment) = match trimmed.find(COMMENT_MARKER) {
            Some(at) => (
                &trimmed[..at],
                normalize_comment(&trimmed[at + COMMENT_MARKER.len()..]),
            ),
            None => (trimmed, None),
        };
        let comment = inline_comment.or_else(|| sidecar_comment.and_then(clean_sidecar_comment));

        let rule_text = rule_text.trim();
        let (filetype, rest) = match rule_text.split_once(char::is_whitespace) {
            Some((filetype, rest)) => (filetype, rest.trim()),
            None => (rule_text, ""),
        };
        if filetype.is_empty() {
            return None;
        }
        // Quoted patterns are kept verbatim; bare ones have whitespace runs collapsed.
        let pattern = match quoted(rest) {
            Some(inner) => inner.to_string(),
            None => rest.split_whitespace().collect::<Vec<_>>().join(" "),
        };
        if pattern.is_empty() {
            debug!(line = raw, "Skipping typemap line without a pattern");
            return None;
        }

        let order = self.rules.len() as u32 + 1;
        Some(Rule {
            id: RuleId::new(u64::from(order)),
            order,
            filetype: filetype.to_string(),
            pattern,
            comment,
            original_line: Some(raw.to_string()),
            from_template: self.from_template,
        })
    }

    fn finish(self) -> Vec<Rule> {
        self.rules
    }
}

fn clean_sidecar_comment(comment: &str) -> Option<String> {
    let trimmed = comment.trim();
    normalize_comment(trimmed.strip_prefix(COMMENT_MARKER).unwrap_or(trimmed))
}

fn quoted(text: &str) -> Option<&str> {
    text.strip_prefix('"')?.strip_suffix('"')
}
