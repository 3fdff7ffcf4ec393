//! Textual constants (`EQU`) and whole-word substitution.
//!
//! Constants are stored as raw text and substituted into every line before it
//! is parsed, in definition order, so a value may mention constants defined
//! after it. A multi-line `EQU` expands to several statements.

use mars_core::MarsConfig;

use crate::errors::ParseErrorKind;
use crate::expression::{Expression, ExpressionError};
use crate::parser;

/// Name of the constant that tracks the current instruction index.
pub const CURLINE: &str = "CURLINE";

/// Ordered table of textual constants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstantTable {
    entries: Vec<(String, String)>,
}

impl ConstantTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the simulator settings and `CURLINE = 0`.
    #[must_use]
    pub fn predefined(config: &MarsConfig) -> Self {
        let mut entries: Vec<(String, String)> = config
            .predefined_constants()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        entries.push((CURLINE.to_string(), "0".to_string()));
        Self { entries }
    }

    /// Value text of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether `name` is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of constants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a new constant.
    ///
    /// # Errors
    ///
    /// Returns [`ParseErrorKind::DuplicateConstant`] if `name` already exists.
    pub fn define(&mut self, name: &str, value: &str) -> Result<(), ParseErrorKind> {
        if self.contains(name) {
            return Err(ParseErrorKind::DuplicateConstant(name.to_string()));
        }
        self.entries.push((name.to_string(), value.to_string()));
        Ok(())
    }

    /// Appends another line to a multi-line constant.
    pub fn append_line(&mut self, name: &str, line: &str) {
        if let Some((_, value)) = self.entries.iter_mut().find(|(n, _)| n == name) {
            value.push('\n');
            value.push_str(line);
        }
    }

    /// Updates `CURLINE`.
    pub fn set_current_line(&mut self, index: usize) {
        match self.entries.iter_mut().find(|(n, _)| n == CURLINE) {
            Some((_, value)) => *value = index.to_string(),
            None => self.entries.push((CURLINE.to_string(), index.to_string())),
        }
    }

    /// Replaces every whole-word constant name in `line` with its value.
    ///
    /// The label of an `X EQU ...` line is left alone so that redefinitions
    /// are reported instead of being rewritten into garbage.
    #[must_use]
    pub fn substitute(&self, line: &str) -> String {
        let (head, mut body) = match equ_label_split(line) {
            Some(split) => (line[..split].to_string(), line[split..].to_string()),
            None => (String::new(), line.to_string()),
        };
        for (name, value) in &self.entries {
            body = replace_word(&body, name, value);
        }
        head + &body
    }

    /// Evaluates `expr` with constants as the only symbols.
    ///
    /// # Errors
    ///
    /// Propagates evaluation failures.
    pub fn evaluate(&self, expr: &Expression) -> Result<i64, ExpressionError> {
        expr.eval(&|name: &str| self.value_at_depth(name, 1).ok())
    }

    fn value_at_depth(&self, name: &str, depth: usize) -> Result<i64, ExpressionError> {
        const MAX_DEPTH: usize = 32;
        let undefined = || ExpressionError::UndefinedSymbol(name.to_string());
        let text = self.get(name).ok_or_else(undefined)?;
        if depth > MAX_DEPTH || text.contains('\n') {
            return Err(undefined());
        }
        let expr = parser::parse_expression(text).map_err(|_| undefined())?;
        expr.eval(&|inner: &str| self.value_at_depth(inner, depth + 1).ok())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte offset just past the label of an `X EQU` line.
fn equ_label_split(line: &str) -> Option<usize> {
    let start = line.len() - line.trim_start().len();
    let label_len = line[start..]
        .find(|c: char| !is_word_char(c))
        .unwrap_or(line.len() - start);
    if label_len == 0 || line[start..].starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let end = start + label_len;
    let rest = line[end..].strip_prefix(':').unwrap_or(&line[end..]);
    let keyword = rest.trim_start();
    let is_equ = keyword.len() < rest.len()
        && keyword.get(..3).is_some_and(|k| k.eq_ignore_ascii_case("EQU"))
        && !keyword[3..].starts_with(is_word_char);
    is_equ.then_some(end)
}

/// Replaces whole-word occurrences of `name` in `text`.
#[must_use]
pub fn replace_word(text: &str, name: &str, value: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start: Option<usize> = None;
    for (idx, c) in text.char_indices() {
        if is_word_char(c) {
            word_start.get_or_insert(idx);
            continue;
        }
        if let Some(start) = word_start.take() {
            push_word(&mut out, &text[start..idx], name, value);
        }
        out.push(c);
    }
    if let Some(start) = word_start {
        push_word(&mut out, &text[start..], name, value);
    }
    out
}

fn push_word(out: &mut String, word: &str, name: &str, value: &str) {
    if word == name {
        out.push_str(value);
    } else {
        out.push_str(word);
    }
}
