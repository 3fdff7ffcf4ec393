//! Redcode assembler library.
//!
//! Turns ICWS'94 Redcode source into a relocatable [`mars_core::Program`]
//! ready to be loaded by [`mars_core::Scheduler::add_warrior`].

/// Top-level assembler pipeline.
pub mod assembler;
/// Structured parse/assembly error types.
pub mod errors;
/// `FOR`/`ROF` block collection and unrolling.
pub mod expand;
/// Expression trees and evaluation.
pub mod expression;
/// Label resolution and program construction.
pub mod linker;
/// Instruction completion and default modifiers.
pub mod mnemonic;
/// Statement parser.
pub mod parser;
/// Source loading and line cleanup.
pub mod source;
/// `EQU` constants and text substitution.
pub mod symbols;

pub use assembler::{assemble, assemble_file, assemble_named};
pub use errors::{ParseError, ParseErrorKind, SourceLoc};
pub use expression::{Expression, ExpressionError, Operator};
pub use symbols::ConstantTable;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
