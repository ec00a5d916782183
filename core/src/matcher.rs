//! Depot-path wildcard matching.
//!
//! Patterns use a fixed vocabulary, translated longest token first:
//!
//! | Token  | Matches                                                  |
//! |--------|----------------------------------------------------------|
//! | `....` | anything, across `/`, running into a file extension      |
//! | `...`  | anything, across `/`                                     |
//! | `*`    | anything except `/` (one path segment)                   |
//! | `?`    | exactly one character                                    |
//!
//! Everything else is literal. The whole path must match, starting at its
//! first character.
//!
//! # Examples
//!
//! ```
//! use typemap_core::matches;
//!
//! assert!(matches("//depot/foo.txt", "//....txt"));
//! assert!(!matches("//depot/foo.bin", "//....txt"));
//! assert!(matches("//depot/a/b/c", "//depot/..."));
//! assert!(!matches("//depot/a/x", "//depot/*/y"));
//! ```

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Rule;
use crate::error::{Result, TypemapError};

/// Default compiled-size ceiling for a single pattern, in bytes.
pub const DEFAULT_SIZE_LIMIT: usize = 1 << 20;

/// Matcher settings.
///
/// # Examples
///
/// ```
/// use typemap_core::{MatchOptions, matches_with};
///
/// let insensitive = MatchOptions { case_sensitive: false, ..Default::default() };
/// assert!(matches_with("//Depot/Logo.PNG", "//depot/....png", &insensitive));
/// assert!(!matches_with("//Depot/Logo.PNG", "//depot/....png", &MatchOptions::default()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Compare letters case-sensitively. Defaults to `true`.
    pub case_sensitive: bool,
    /// Compiled-size ceiling per pattern; larger patterns fail to compile.
    pub size_limit: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// `....`
    DeepExtension,
    /// `...`
    Recursive,
    /// `*`
    Segment,
    /// `?`
    Single,
    Literal(&'a str),
}

fn tokenize(pattern: &str) -> Vec<Token<'_>> {
    let bytes = pattern.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let rest = &bytes[i..];
        let wildcard = if rest.starts_with(b"....") {
            Some((Token::DeepExtension, 4))
        } else if rest.starts_with(b"...") {
            Some((Token::Recursive, 3))
        } else if rest[0] == b'*' {
            Some((Token::Segment, 1))
        } else if rest[0] == b'?' {
            Some((Token::Single, 1))
        } else {
            None
        };

        match wildcard {
            Some((token, width)) => {
                if literal_start < i {
                    tokens.push(Token::Literal(&pattern[literal_start..i]));
                }
                tokens.push(token);
                i += width;
                literal_start = i;
            }
            None => i += 1,
        }
    }
    if literal_start < bytes.len() {
        tokens.push(Token::Literal(&pattern[literal_start..]));
    }
    tokens
}

/// Translates a wildcard pattern into anchored regex source.
///
/// Literal text is escaped, so characters such as `+`, `(`, `[` and `.`
/// only ever match themselves.
///
/// ```
/// use typemap_core::matcher::translate;
///
/// assert_eq!(translate("//depot/*.c"), r"^//depot/[^/]*\.c$");
/// assert_eq!(translate("//....txt"), "^//.*txt$");
/// ```
pub fn translate(pattern: &str) -> String {
    let mut source = String::with_capacity(pattern.len() * 2 + 2);
    source.push('^');
    for token in tokenize(pattern) {
        match token {
            Token::DeepExtension | Token::Recursive => source.push_str(".*"),
            Token::Segment => source.push_str("[^/]*"),
            Token::Single => source.push('.'),
            Token::Literal(text) => source.push_str(&regex::escape(text)),
        }
    }
    source.push('$');
    source
}

/// Returns `true` if the pattern contains at least one wildcard token.
pub fn has_wildcard(pattern: &str) -> bool {
    tokenize(pattern)
        .iter()
        .any(|token| !matches!(token, Token::Literal(_)))
}

/// Literal text before the first wildcard token.
///
/// ```
/// use typemap_core::matcher::literal_prefix;
///
/// assert_eq!(literal_prefix("//depot/art/....psd"), "//depot/art/");
/// assert_eq!(literal_prefix("//....txt"), "//");
/// assert_eq!(literal_prefix("//depot/readme"), "//depot/readme");
/// ```
pub fn literal_prefix(pattern: &str) -> &str {
    match tokenize(pattern).first() {
        Some(Token::Literal(text)) => text,
        Some(_) => "",
        None => pattern,
    }
}

/// Builds a concrete path that the pattern matches, by substituting a
/// literal for every wildcard.
///
/// ```
/// use typemap_core::matcher::witness_path;
///
/// assert_eq!(witness_path("//depot/....psd"), "//depot/x.psd");
/// assert_eq!(witness_path("//depot/*/bin/..."), "//depot/x/bin/x");
/// ```
pub fn witness_path(pattern: &str) -> String {
    tokenize(pattern)
        .into_iter()
        .map(|token| match token {
            Token::DeepExtension => "x.",
            Token::Recursive | Token::Segment | Token::Single => "x",
            Token::Literal(text) => text,
        })
        .collect()
}

/// A compiled pattern.
#[derive(Debug, Clone)]
pub struct WildcardMatcher {
    pattern: String,
    regex: Regex,
}

impl WildcardMatcher {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`TypemapError::Pattern`] when the translated pattern cannot
    /// be built, e.g. because it exceeds [`MatchOptions::size_limit`].
    pub fn compile(pattern: &str, options: &MatchOptions) -> Result<Self> {
        let regex = RegexBuilder::new(&translate(pattern))
            .case_insensitive(!options.case_sensitive)
            .dot_matches_new_line(true)
            .size_limit(options.size_limit)
            .build()
            .map_err(|source| TypemapError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Like [`compile`](Self::compile), but logs a warning and returns `None`
    /// instead of an error.
    pub fn compile_lenient(pattern: &str, options: &MatchOptions) -> Option<Self> {
        match Self::compile(pattern, options) {
            Ok(matcher) => Some(matcher),
            Err(err) => {
                warn!(pattern, error = %err, "Wildcard pattern does not compile; treating as no match");
                None
            }
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Tests a path against a pattern with default options.
///
/// A pattern that fails to compile never matches.
pub fn matches(path: &str, pattern: &str) -> bool {
    matches_with(path, pattern, &MatchOptions::default())
}

/// Tests a path against a pattern.
///
/// A pattern that fails to compile never matches; a warning is logged.
pub fn matches_with(path: &str, pattern: &str, options: &MatchOptions) -> bool {
    WildcardMatcher::compile_lenient(pattern, options).is_some_and(|m| m.is_match(path))
}

/// Returns the highest-order rule whose pattern matches `path`.
///
/// # Examples
///
/// ```
/// use typemap_core::{MatchOptions, parse_typemap_text, resolve};
///
/// let rules = parse_typemap_text("text //....txt\nbinary //depot/legacy/....txt\n");
/// let opts = MatchOptions::default();
/// assert_eq!(resolve("//depot/legacy/a.txt", &rules, &opts).unwrap().filetype, "binary");
/// assert_eq!(resolve("//depot/new/a.txt", &rules, &opts).unwrap().filetype, "text");
/// assert!(resolve("//depot/a.bin", &rules, &opts).is_none());
/// ```
pub fn resolve<'a>(path: &str, rules: &'a [Rule], options: &MatchOptions) -> Option<&'a Rule> {
    rules
        .iter()
        .filter(|rule| matches_with(path, &rule.pattern, options))
        .max_by_key(|rule| rule.order)
}
