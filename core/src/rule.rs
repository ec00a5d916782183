//! Rule model and the ordered rule collection.
//!
//! A [`Rule`] binds one depot-path wildcard pattern to a filetype. Rules live
//! in a [`Typemap`], which owns id allocation and keeps the `order` values a
//! dense permutation of `1..=N` across every edit. [`renumber`] is the single
//! place where orders are normalized.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypemapError};
use crate::matcher::{MatchOptions, resolve};

/// Opaque identifier of a rule, unique within one [`Typemap`].
///
/// Ids are never reused: deleting a rule does not free its id for later
/// rules created in the same collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(u64);

impl RuleId {
    /// Wraps a raw id value, e.g. one restored from a previous session.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One typemap entry.
///
/// `filetype` and `pattern` are kept as the raw text read from the server so
/// that unrelated rules survive a load/save cycle byte for byte. Use
/// [`Filetype::parse`](crate::Filetype::parse) for a structured view.
///
/// # Examples
///
/// ```
/// use typemap_core::{Rule, RuleId};
///
/// let rule = Rule::new(RuleId::new(7), 1, "binary+Fl", "//....zip")
///     .with_comment("archives");
/// assert_eq!(rule.order, 1);
/// assert_eq!(rule.comment.as_deref(), Some("archives"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Session-stable identifier.
    pub id: RuleId,
    /// Precedence rank; a later order overrides an earlier one.
    pub order: u32,
    /// Filetype text, e.g. `binary+S2`.
    pub filetype: String,
    /// Depot-path wildcard pattern, e.g. `//depot/....psd`.
    pub pattern: String,
    /// Free-text annotation carried after `##`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Raw source line the rule was parsed from. Not authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_line: Option<String>,
    /// Set when the rule was imported from a template.
    #[serde(default)]
    pub from_template: bool,
}

impl Rule {
    /// Creates a rule without comment or provenance.
    pub fn new(id: RuleId, order: u32, filetype: &str, pattern: &str) -> Self {
        Self {
            id,
            order,
            filetype: filetype.to_string(),
            pattern: pattern.to_string(),
            comment: None,
            original_line: None,
            from_template: false,
        }
    }

    /// Attaches a comment. Blank comments are stored as `None`.
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = normalize_comment(comment);
        self
    }

    /// Returns the `(filetype, pattern, comment)` tuple that the wire format
    /// carries.
    pub fn wire_tuple(&self) -> (&str, &str, Option<&str>) {
        (&self.filetype, &self.pattern, self.comment.as_deref())
    }
}

/// Fields for a rule that does not exist yet.
///
/// Passed to [`Typemap::create`], which assigns the id and order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRule {
    pub filetype: String,
    pub pattern: String,
    pub comment: Option<String>,
    pub original_line: Option<String>,
    pub from_template: bool,
}

impl NewRule {
    pub fn new(filetype: &str, pattern: &str) -> Self {
        Self {
            filetype: filetype.trim().to_string(),
            pattern: pattern.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = normalize_comment(comment);
        self
    }

    /// Marks the rule as imported from a template.
    pub fn from_template(mut self) -> Self {
        self.from_template = true;
        self
    }
}

impl From<&Rule> for NewRule {
    fn from(rule: &Rule) -> Self {
        Self {
            filetype: rule.filetype.clone(),
            pattern: rule.pattern.clone(),
            comment: rule.comment.clone(),
            original_line: rule.original_line.clone(),
            from_template: rule.from_template,
        }
    }
}

pub(crate) fn normalize_comment(comment: &str) -> Option<String> {
    let trimmed = comment.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Sorts rules by their current `order`, then reassigns `1..=N`.
///
/// The sort is stable, so rules that share an order value keep their
/// relative position in the slice.
///
/// # Examples
///
/// ```
/// use typemap_core::{Rule, RuleId, renumber};
///
/// let mut rules = vec![
///     Rule::new(RuleId::new(1), 10, "text", "//....txt"),
///     Rule::new(RuleId::new(2), 4, "binary", "//....bin"),
/// ];
/// renumber(&mut rules);
/// assert_eq!(rules[0].pattern, "//....bin");
/// assert_eq!((rules[0].order, rules[1].order), (1, 2));
/// ```
pub fn renumber(rules: &mut [Rule]) {
    rules.sort_by_key(|rule| rule.order);
    for (index, rule) in rules.iter_mut().enumerate() {
        rule.order = index as u32 + 1;
    }
}

/// Caller-owned, ordered collection of rules.
///
/// Rules are always stored sorted by `order`, and `order` is always a
/// permutation of `1..=N` after any public method returns.
///
/// # Examples
///
/// ```
/// use typemap_core::{NewRule, Typemap};
///
/// let mut typemap = Typemap::new();
/// let text = typemap.create(NewRule::new("text", "//....txt")).id;
/// let bin = typemap.create(NewRule::new("binary", "//....bin")).id;
///
/// typemap.move_up(bin).unwrap();
/// assert_eq!(typemap.get(bin).unwrap().order, 1);
/// assert_eq!(typemap.get(text).unwrap().order, 2);
///
/// typemap.delete(bin).unwrap();
/// assert_eq!(typemap.get(text).unwrap().order, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Typemap {
    rules: Vec<Rule>,
    next_id: u64,
}

impl Typemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from parsed rules.
    ///
    /// Orders are renumbered. Any id that repeats an earlier rule's id is
    /// replaced with a fresh one.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        let mut typemap = Self::new();
        typemap.replace_all(rules);
        typemap
    }

    /// Replaces the whole rule set, as on reload or revert.
    pub fn replace_all(&mut self, mut rules: Vec<Rule>) {
        renumber(&mut rules);
        let max_id = rules.iter().map(|rule| rule.id.get()).max().unwrap_or(0);
        self.next_id = self.next_id.max(max_id + 1);

        let mut seen = HashSet::new();
        for rule in &mut rules {
            if !seen.insert(rule.id) {
                rule.id = self.allocate_id();
                seen.insert(rule.id);
            }
        }
        self.rules = rules;
    }

    /// Re-normalizes orders to `1..=N`, keeping the current sequence.
    pub fn renumber(&mut self) {
        renumber(&mut self.rules);
    }

    /// Rules in ascending order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Finds the first rule with exactly this pattern, in order.
    pub fn find_by_pattern(&self, pattern: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.pattern == pattern)
    }

    /// Appends a new rule with a fresh id and the next order.
    pub fn create(&mut self, fields: NewRule) -> &Rule {
        let id = self.allocate_id();
        let order = self.rules.len() as u32 + 1;
        self.rules.push(Rule {
            id,
            order,
            filetype: fields.filetype,
            pattern: fields.pattern,
            comment: fields.comment,
            original_line: fields.original_line,
            from_template: fields.from_template,
        });
        &self.rules[self.rules.len() - 1]
    }

    /// Removes a rule and closes the gap it leaves in the order sequence.
    pub fn delete(&mut self, id: RuleId) -> Result<Rule> {
        let index = self.index_of(id)?;
        let removed = self.rules.remove(index);
        renumber(&mut self.rules);
        Ok(removed)
    }

    /// Exchanges the order values of two rules. No other rule moves.
    pub fn swap_order(&mut self, a: RuleId, b: RuleId) -> Result<()> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        let order_a = self.rules[ia].order;
        self.rules[ia].order = self.rules[ib].order;
        self.rules[ib].order = order_a;
        self.rules.sort_by_key(|rule| rule.order);
        Ok(())
    }

    /// Moves a rule one step earlier. Returns `false` if it is already first.
    pub fn move_up(&mut self, id: RuleId) -> Result<bool> {
        let index = self.index_of(id)?;
        if index == 0 {
            return Ok(false);
        }
        let neighbour = self.rules[index - 1].id;
        self.swap_order(id, neighbour)?;
        Ok(true)
    }

    /// Moves a rule one step later. Returns `false` if it is already last.
    pub fn move_down(&mut self, id: RuleId) -> Result<bool> {
        let index = self.index_of(id)?;
        if index + 1 >= self.rules.len() {
            return Ok(false);
        }
        let neighbour = self.rules[index + 1].id;
        self.swap_order(id, neighbour)?;
        Ok(true)
    }

    pub fn update_pattern(&mut self, id: RuleId, pattern: &str) -> Result<()> {
        let index = self.index_of(id)?;
        self.rules[index].pattern = pattern.trim().to_string();
        Ok(())
    }

    pub fn update_filetype(&mut self, id: RuleId, filetype: &str) -> Result<()> {
        let index = self.index_of(id)?;
        self.rules[index].filetype = filetype.trim().to_string();
        Ok(())
    }

    /// Sets or clears a comment. Blank text clears it.
    pub fn update_comment(&mut self, id: RuleId, comment: Option<&str>) -> Result<()> {
        let index = self.index_of(id)?;
        self.rules[index].comment = comment.and_then(normalize_comment);
        Ok(())
    }

    /// Returns the highest-order rule whose pattern matches `path`.
    pub fn resolve(&self, path: &str, options: &MatchOptions) -> Option<&Rule> {
        resolve(path, &self.rules, options)
    }

    fn index_of(&self, id: RuleId) -> Result<usize> {
        self.rules
            .iter()
            .position(|rule| rule.id == id)
            .ok_or(TypemapError::UnknownRule(id))
    }

    fn allocate_id(&mut self) -> RuleId {
        self.next_id = self.next_id.max(1);
        let id = RuleId::new(self.next_id);
        self.next_id += 1;
        id
    }
}
