//! Structured error reporting for the assembler.
//!
//! Every failure carries the 1-based line and column it was detected at and
//! the text of that line after constant substitution. Errors format to stderr
//! in the usual compiler style:
//!
//! ```text
//! imp.red:3:9: error: expression expected
//!   MOV 0,
//!         ^
//! ```

use std::fmt;

use mars_core::Opcode;
use thiserror::Error;

use crate::expression::ExpressionError;

/// A source location for error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLoc {
    /// File name, if the source came from a named input.
    pub file: Option<String>,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number (1 if unknown).
    pub column: usize,
}

impl SourceLoc {
    /// Creates a new source location.
    #[must_use]
    pub const fn new(file: Option<String>, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }

    /// Formats as `file:line:column`, or `line:column` for anonymous input.
    #[must_use]
    pub fn format_location(&self) -> String {
        match &self.file {
            Some(file) => format!("{file}:{}:{}", self.line, self.column),
            None => format!("{}:{}", self.line, self.column),
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_location())
    }
}

/// Classification of assembly errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Text that fits no statement form.
    #[error("unknown token found")]
    UnknownToken,
    /// An operand or directive needs an expression here.
    #[error("expression expected")]
    ExpressionExpected,
    /// A binary operator with nothing after it.
    #[error("right hand side of expression is missing")]
    MissingRightHandSide,
    /// A `(` without its `)`.
    #[error("')' expected")]
    ClosingParenthesisExpected,
    /// Modifier suffix that names no modifier.
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),
    /// An instruction with no operands.
    #[error("instruction {0} must have an A-operand")]
    MissingAOperand(Opcode),
    /// A single operand where two are required.
    #[error("the {0} instruction must have 2 operands")]
    MissingBOperand(Opcode),
    /// `EQU` without a label and no definition to continue.
    #[error("EQU lines must have a label")]
    EquWithoutLabel,
    /// A constant name used twice.
    #[error("constant {0} has already been defined")]
    DuplicateConstant(String),
    /// An instruction label used twice.
    #[error("label {0} has already been defined")]
    DuplicateLabel(String),
    /// `FOR` without a repeat count.
    #[error("for loop must have a fixed repeat count")]
    ForWithoutCount,
    /// Input ended inside a `FOR` block.
    #[error("for loop is missing its ROF")]
    UnterminatedFor,
    /// `ROF` outside any `FOR` block.
    #[error("ROF without a matching FOR")]
    UnexpectedRof,
    /// `;assert` whose expression is not 1.
    #[error("assert failed: {0}")]
    AssertionFailed(String),
    /// Evaluation failed while linking or expanding.
    #[error("error in expression: {0}")]
    Expression(#[from] ExpressionError),
    /// More instructions than the configured maximum length.
    #[error("program is longer than the maximum of {0} instructions")]
    ProgramTooLong(usize),
    /// The simulator configuration was rejected.
    #[error("{0}")]
    InvalidConfig(String),
    /// The source file could not be read.
    #[error("cannot read source: {0}")]
    Io(String),
}

/// An assembly error with source context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// Where it was detected.
    pub location: SourceLoc,
    /// The offending line, after constant substitution.
    pub text: String,
}

impl ParseError {
    /// Creates an error at `line`/`column` of `text`.
    #[must_use]
    pub fn new(kind: ParseErrorKind, line: usize, column: usize, text: impl Into<String>) -> Self {
        Self {
            kind,
            location: SourceLoc::new(None, line, column),
            text: text.into(),
        }
    }

    /// Attaches a file name to the location.
    #[must_use]
    pub fn with_file(mut self, file: Option<&str>) -> Self {
        self.location.file = file.map(str::to_string);
        self
    }

    /// Formats the error for stderr output, with the line and a caret.
    #[must_use]
    pub fn format_for_stderr(&self) -> String {
        let mut out = format!("{}: error: {}", self.location, self.kind);
        if !self.text.is_empty() {
            let caret = " ".repeat(self.location.column.saturating_sub(1));
            out.push_str(&format!("\n  {}\n  {caret}^", self.text));
        }
        out
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.kind)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_formats_with_and_without_file() {
        assert_eq!(SourceLoc::new(None, 3, 7).format_location(), "3:7");
        assert_eq!(
            SourceLoc::new(Some("imp.red".into()), 3, 7).to_string(),
            "imp.red:3:7"
        );
    }

    #[test]
    fn stderr_format_points_at_column() {
        let error = ParseError::new(ParseErrorKind::ExpressionExpected, 2, 8, "MOV 0, ")
            .with_file(Some("imp.red"));
        assert_eq!(
            error.format_for_stderr(),
            "imp.red:2:8: error: expression expected\n  MOV 0, \n         ^"
        );
    }

    #[test]
    fn kinds_render_instruction_names() {
        assert_eq!(
            ParseErrorKind::MissingBOperand(Opcode::Mov).to_string(),
            "the MOV instruction must have 2 operands"
        );
        assert_eq!(
            ParseErrorKind::from(ExpressionError::DivisionByZero).to_string(),
            "error in expression: division by zero"
        );
        assert_eq!(
            ParseErrorKind::ProgramTooLong(100).to_string(),
            "program is longer than the maximum of 100 instructions"
        );
    }
}
