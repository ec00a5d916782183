//! Structured view of filetype text such as `binary+Fl` or `text+S10`.
//!
//! The host writes modifiers either concatenated after a single `+`
//! (`binary+Fl`) or one per `+` (`binary+F+l`). Both spellings parse to the
//! same [`Filetype`]. [`Display`](std::fmt::Display) renders the
//! concatenated form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base storage kind of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    Binary,
    Text,
    Symlink,
    Unicode,
    Utf8,
    Utf16,
}

impl BaseType {
    pub const ALL: [BaseType; 6] = [
        BaseType::Binary,
        BaseType::Text,
        BaseType::Symlink,
        BaseType::Unicode,
        BaseType::Utf8,
        BaseType::Utf16,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BaseType::Binary => "binary",
            BaseType::Text => "text",
            BaseType::Symlink => "symlink",
            BaseType::Unicode => "unicode",
            BaseType::Utf8 => "utf8",
            BaseType::Utf16 => "utf16",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseType {
    type Err = FiletypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseType::ALL
            .into_iter()
            .find(|base| base.as_str() == s)
            .ok_or_else(|| FiletypeError::UnknownBase(s.to_string()))
    }
}

/// A single filetype modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    /// Any single-letter modifier (`F`, `l`, `w`, `x`, `k`, `C`, ...).
    Flag(char),
    /// `S` keeps the head revision only; `S<n>` keeps `n` revisions.
    StoredRevisions(Option<u32>),
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Flag(letter) => write!(f, "{letter}"),
            Modifier::StoredRevisions(None) => f.write_str("S"),
            Modifier::StoredRevisions(Some(count)) => write!(f, "S{count}"),
        }
    }
}

/// Errors from [`Filetype::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FiletypeError {
    #[error("filetype cannot be empty")]
    Empty,
    #[error("unknown base filetype: {0}")]
    UnknownBase(String),
    #[error("invalid filetype modifier: {0}")]
    InvalidModifier(String),
}

/// Parsed filetype: a base plus ordered modifiers.
///
/// # Examples
///
/// ```
/// use typemap_core::{BaseType, Filetype, Modifier};
///
/// let ft = Filetype::parse("binary+FS2").unwrap();
/// assert_eq!(ft.base, BaseType::Binary);
/// assert_eq!(ft.modifiers, vec![Modifier::Flag('F'), Modifier::StoredRevisions(Some(2))]);
/// assert_eq!(ft.revision_limit(), Some(2));
/// assert_eq!(Filetype::parse("binary+F+S2").unwrap(), ft);
/// assert_eq!(ft.to_string(), "binary+FS2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filetype {
    pub base: BaseType,
    pub modifiers: Vec<Modifier>,
}

impl Filetype {
    pub fn parse(text: &str) -> Result<Self, FiletypeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FiletypeError::Empty);
        }

        let (base, rest) = match text.split_once('+') {
            Some((base, rest)) => (base, Some(rest)),
            None => (text, None),
        };
        if base.is_empty() {
            return Err(FiletypeError::Empty);
        }
        let base = base.parse::<BaseType>()?;

        let mut modifiers = Vec::new();
        if let Some(rest) = rest {
            for group in rest.split('+') {
                if group.is_empty() {
                    return Err(FiletypeError::InvalidModifier(text.to_string()));
                }
                parse_modifier_group(group, &mut modifiers)?;
            }
        }

        Ok(Self { base, modifiers })
    }

    /// Number of revisions kept, if an `S` modifier is present.
    pub fn revision_limit(&self) -> Option<u32> {
        self.modifiers.iter().find_map(|modifier| match modifier {
            Modifier::StoredRevisions(count) => Some(count.unwrap_or(1)),
            Modifier::Flag(_) => None,
        })
    }

    pub fn has_flag(&self, letter: char) -> bool {
        self.modifiers.contains(&Modifier::Flag(letter))
    }
}

impl FromStr for Filetype {
    type Err = FiletypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filetype::parse(s)
    }
}

impl fmt::Display for Filetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if !self.modifiers.is_empty() {
            f.write_str("+")?;
            for modifier in &self.modifiers {
                write!(f, "{modifier}")?;
            }
        }
        Ok(())
    }
}

fn parse_modifier_group(group: &str, out: &mut Vec<Modifier>) -> Result<(), FiletypeError> {
    let mut chars = group.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == 'S' {
            let mut digits = String::new();
            while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
                digits.push(d);
            }
            let count = if digits.is_empty() {
                None
            } else {
                let parsed = digits
                    .parse::<u32>()
                    .map_err(|_| FiletypeError::InvalidModifier(format!("S{digits}")))?;
                Some(parsed)
            };
            out.push(Modifier::StoredRevisions(count));
        } else if ch.is_ascii_alphabetic() {
            out.push(Modifier::Flag(ch));
        } else {
            return Err(FiletypeError::InvalidModifier(ch.to_string()));
        }
    }
    Ok(())
}
