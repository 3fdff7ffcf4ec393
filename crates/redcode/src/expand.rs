//! `FOR`/`ROF` block collection and unrolling.
//!
//! Once a top-level `FOR` statement is parsed, following raw lines are
//! collected into a [`LoopStack`] until the matching `ROF`. Nested blocks are
//! tracked on the stack and stored inside their parent. Closing the outermost
//! block yields it for expansion, and the assembler parses each line like
//! ordinary source. Expansion is streamed line by line so the caller can cut
//! it short.
//!
//! Within the body, the loop variable is replaced by the 1-based iteration
//! number as a whole word, and `&var` is replaced by the number padded to two
//! digits so it can be glued onto labels.

use std::ops::ControlFlow;

use crate::symbols::replace_word;

#[derive(Debug, Clone, PartialEq, Eq)]
enum BodyItem {
    Line(String),
    Nested(ForLoop),
}

/// One `FOR` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoop {
    variable: Option<String>,
    count: usize,
    body: Vec<BodyItem>,
}

impl ForLoop {
    /// Starts an empty block; negative counts repeat zero times.
    #[must_use]
    pub fn new(variable: Option<String>, count: i64) -> Self {
        Self {
            variable,
            count: usize::try_from(count).unwrap_or(0),
            body: Vec::new(),
        }
    }

    /// Repeat count.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Feeds every expanded line to `visit` in order, nested blocks
    /// included. Lines are produced one at a time, so `visit` can stop a
    /// runaway expansion early by breaking or failing.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `visit`.
    pub fn expand<E>(
        &self,
        visit: &mut dyn FnMut(String) -> Result<ControlFlow<()>, E>,
    ) -> Result<ControlFlow<()>, E> {
        for iteration in 1..=self.count {
            for item in &self.body {
                let flow = match item {
                    BodyItem::Line(text) => visit(self.bind(text, iteration))?,
                    BodyItem::Nested(inner) => {
                        inner.expand(&mut |text| visit(self.bind(&text, iteration)))?
                    }
                };
                if flow.is_break() {
                    return Ok(flow);
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn bind(&self, text: &str, iteration: usize) -> String {
        let Some(variable) = &self.variable else {
            return text.to_string();
        };
        let glued = text.replace(&format!("&{variable}"), &format!("{iteration:02}"));
        replace_word(&glued, variable, &iteration.to_string())
    }
}

/// Header of a `FOR` line met while collecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForHeader {
    /// Loop variable, if the line has a label.
    pub variable: Option<String>,
    /// Unevaluated count text.
    pub count: String,
}

/// Recognizes `ROF` with optional trailing comment.
#[must_use]
pub fn is_rof(line: &str) -> bool {
    let trimmed = line.trim();
    let word = trimmed.get(..3);
    let tail = trimmed.get(3..).unwrap_or_default().trim_start();
    word.is_some_and(|w| w.eq_ignore_ascii_case("ROF")) && (tail.is_empty() || tail.starts_with(';'))
}

/// Recognizes `[var] FOR count` and splits it.
#[must_use]
pub fn for_header(line: &str) -> Option<ForHeader> {
    let (first, rest) = split_word(line.trim_start());
    let (variable, rest) = if first.eq_ignore_ascii_case("FOR") {
        (None, rest)
    } else {
        let name = first.strip_suffix(':').unwrap_or(first);
        let valid = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        let (keyword, rest) = split_word(rest.trim_start());
        if !valid || !keyword.eq_ignore_ascii_case("FOR") {
            return None;
        }
        (Some(name.to_string()), rest)
    };
    let count = rest.split(';').next().unwrap_or_default().trim().to_string();
    Some(ForHeader { variable, count })
}

fn split_word(text: &str) -> (&str, &str) {
    text.split_at(text.find(char::is_whitespace).unwrap_or(text.len()))
}

/// Blocks currently being collected, innermost last.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoopStack {
    open: Vec<ForLoop>,
}

impl LoopStack {
    /// Whether any block is open.
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        !self.open.is_empty()
    }

    /// Opens a block.
    pub fn open(&mut self, block: ForLoop) {
        self.open.push(block);
    }

    /// Adds a raw body line to the innermost block.
    pub fn push_line(&mut self, line: String) {
        if let Some(block) = self.open.last_mut() {
            block.body.push(BodyItem::Line(line));
        }
    }

    /// Closes the innermost block; returns it once the outermost one closes.
    pub fn close(&mut self) -> Option<ForLoop> {
        let block = self.open.pop()?;
        match self.open.last_mut() {
            Some(parent) => {
                parent.body.push(BodyItem::Nested(block));
                None
            }
            None => Some(block),
        }
    }
}
