//! Label resolution and final program construction.
//!
//! Operand expressions are evaluated once every label is known. A label's
//! value is its offset relative to the referring instruction, except inside
//! immediate operands where it is the absolute offset from the program start.
//! Results are folded into the core.

use std::collections::HashMap;

use mars_core::{fold, AddressMode, Instruction, Operand, Program};

use crate::errors::ParseErrorKind;
use crate::expression::{Expression, ExpressionError};
use crate::mnemonic::{OperandExpr, UnlinkedInstruction};

/// Where a statement came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceText {
    /// 1-indexed source line.
    pub line: usize,
    /// Text of the line after constant substitution.
    pub text: String,
}

impl SourceText {
    /// Pairs a line number with its text.
    #[must_use]
    pub fn new(line: usize, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
        }
    }
}

/// A link failure and the statement that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    /// What went wrong.
    pub error: ExpressionError,
    /// The instruction or start directive being resolved.
    pub source: SourceText,
}

impl LinkError {
    /// 1-indexed column of the undefined symbol, else of the first
    /// non-blank character.
    #[must_use]
    pub fn column(&self) -> usize {
        let text = &self.source.text;
        let symbol = match &self.error {
            ExpressionError::UndefinedSymbol(name) => find_word(text, name),
            _ => None,
        };
        let offset = symbol.unwrap_or_else(|| text.len() - text.trim_start().len());
        offset + 1
    }
}

fn find_word(text: &str, word: &str) -> Option<usize> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    text.match_indices(word).map(|(at, _)| at).find(|&at| {
        let before = text[..at].chars().next_back();
        let after = text[at + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Program under construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnlinkedProgram {
    instructions: Vec<(UnlinkedInstruction, SourceText)>,
    labels: HashMap<String, usize>,
    start: Option<(Expression, SourceText)>,
    name: Option<String>,
    author: Option<String>,
    strategy: Vec<String>,
}

impl UnlinkedProgram {
    /// Empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether no instruction was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Binds `name` to the offset of the next instruction.
    ///
    /// # Errors
    ///
    /// Returns [`ParseErrorKind::DuplicateLabel`] if the name is taken.
    pub fn add_label(&mut self, name: &str) -> Result<(), ParseErrorKind> {
        if self.labels.contains_key(name) {
            return Err(ParseErrorKind::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name.to_string(), self.instructions.len());
        Ok(())
    }

    /// Appends an instruction parsed from `source`.
    pub fn push(&mut self, instruction: UnlinkedInstruction, source: SourceText) {
        self.instructions.push((instruction, source));
    }

    /// Sets the start expression; the last one wins.
    pub fn set_start(&mut self, start: Expression, source: SourceText) {
        self.start = Some((start, source));
    }

    /// Sets the `;name` metadata.
    pub fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    /// Sets the `;author` metadata.
    pub fn set_author(&mut self, author: String) {
        self.author = Some(author);
    }

    /// Adds one `;strategy` line.
    pub fn add_strategy(&mut self, line: String) {
        self.strategy.push(line);
    }

    /// Resolves all expressions for a core of `core_size` cells.
    ///
    /// # Errors
    ///
    /// Returns the first [`LinkError`] in program order.
    pub fn link(self, core_size: usize) -> Result<Program, LinkError> {
        let instructions = self
            .instructions
            .iter()
            .enumerate()
            .map(|(index, (instruction, source))| {
                self.link_instruction(instruction, index, core_size)
                    .map_err(|error| LinkError {
                        error,
                        source: source.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let start = match &self.start {
            Some((expr, source)) => {
                let value = self.evaluate(expr, 0).map_err(|error| LinkError {
                    error,
                    source: source.clone(),
                })?;
                fold(value, core_size)
            }
            None => 0,
        };

        Ok(Program {
            instructions,
            labels: self.labels,
            start,
            name: self.name,
            author: self.author,
            strategy: (!self.strategy.is_empty()).then(|| self.strategy.join("\n")),
        })
    }

    fn link_instruction(
        &self,
        instruction: &UnlinkedInstruction,
        index: usize,
        core_size: usize,
    ) -> Result<Instruction, ExpressionError> {
        let a = self.link_operand(&instruction.a, index, core_size)?;
        let b = self.link_operand(&instruction.b, index, core_size)?;
        Ok(Instruction::new(instruction.opcode, instruction.modifier, a, b))
    }

    fn link_operand(
        &self,
        operand: &OperandExpr,
        index: usize,
        core_size: usize,
    ) -> Result<Operand, ExpressionError> {
        let origin = if operand.mode == AddressMode::Immediate {
            0
        } else {
            index
        };
        let value = self.evaluate(&operand.expr, origin)?;
        let folded = i64::try_from(fold(value, core_size)).map_err(|_| ExpressionError::Overflow)?;
        Ok(Operand::new(operand.mode, folded))
    }

    fn evaluate(&self, expr: &Expression, origin: usize) -> Result<i64, ExpressionError> {
        expr.eval(&|name: &str| {
            let offset = *self.labels.get(name)?;
            let offset = i64::try_from(offset).ok()?;
            let origin = i64::try_from(origin).ok()?;
            Some(offset - origin)
        })
    }
}
