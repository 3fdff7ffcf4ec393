//! Top-level assembler pipeline.
//!
//! 1. **Cleanup**: tabs, non-printables, the `;redcode` marker and blank lines
//!    (`source::preprocess`).
//! 2. **Collection**: raw lines inside `FOR` blocks are gathered and unrolled
//!    (`expand`).
//! 3. **Substitution and parsing**: `CURLINE` is updated, constants are
//!    substituted and every resulting line is parsed and applied.
//! 4. **Linking**: labels are resolved and operands folded into the core
//!    (`linker`).
//!
//! The entry points are [`assemble`], [`assemble_named`] and
//! [`assemble_file`].

use std::ops::ControlFlow;
use std::path::Path;

use mars_core::{MarsConfig, Program};
use tracing::{debug, trace};

use crate::errors::{ParseError, ParseErrorKind};
use crate::expand::{for_header, is_rof, ForLoop, LoopStack};
use crate::linker::{SourceText, UnlinkedProgram};
use crate::parser::{self, parse_line, Comment, Statement};
use crate::source::{load_source, preprocess};
use crate::symbols::ConstantTable;

/// Assembles anonymous source text.
///
/// # Errors
///
/// Returns [`ParseErrorKind::InvalidConfig`] if `config` fails validation,
/// otherwise the first [`ParseError`] encountered.
pub fn assemble(source: &str, config: &MarsConfig) -> Result<Program, ParseError> {
    Assembler::new(config)?.run(source)
}

/// Assembles source text, naming `file_name` in error locations.
///
/// # Errors
///
/// Returns [`ParseErrorKind::InvalidConfig`] if `config` fails validation,
/// otherwise the first [`ParseError`] encountered.
pub fn assemble_named(
    file_name: &str,
    source: &str,
    config: &MarsConfig,
) -> Result<Program, ParseError> {
    Assembler::new(config)
        .and_then(|assembler| assembler.run(source))
        .map_err(|e| e.with_file(Some(file_name)))
}

/// Reads and assembles a file.
///
/// # Errors
///
/// Returns [`ParseErrorKind::Io`] if the file cannot be read, otherwise the
/// first [`ParseError`] encountered.
pub fn assemble_file(path: &Path, config: &MarsConfig) -> Result<Program, ParseError> {
    let file_name = path.display().to_string();
    let source = load_source(path).map_err(|e| {
        ParseError::new(ParseErrorKind::Io(e.to_string()), 0, 0, "").with_file(Some(&file_name))
    })?;
    assemble_named(&file_name, &source, config)
}

struct Assembler<'c> {
    config: &'c MarsConfig,
    constants: ConstantTable,
    loops: LoopStack,
    program: UnlinkedProgram,
    last_equ_label: Option<String>,
    line_number: usize,
    finished: bool,
}

impl<'c> Assembler<'c> {
    fn new(config: &'c MarsConfig) -> Result<Self, ParseError> {
        config.validate().map_err(|e| {
            ParseError::new(ParseErrorKind::InvalidConfig(e.to_string()), 0, 0, "")
        })?;
        Ok(Self {
            config,
            constants: ConstantTable::predefined(config),
            loops: LoopStack::default(),
            program: UnlinkedProgram::new(),
            last_equ_label: None,
            line_number: 0,
            finished: false,
        })
    }

    fn run(mut self, source: &str) -> Result<Program, ParseError> {
        for line in preprocess(source) {
            if self.finished {
                break;
            }
            self.line_number = line.original_line;
            if self.loops.is_collecting() {
                self.collect(line.text)?;
            } else {
                self.process(&line.text)?;
            }
        }
        if self.loops.is_collecting() {
            return Err(self.error(ParseErrorKind::UnterminatedFor, 1, ""));
        }

        debug!(
            instructions = self.program.len(),
            constants = self.constants.len(),
            "linking program"
        );
        self.program.link(self.config.core_size).map_err(|e| {
            let column = e.column();
            ParseError::new(
                ParseErrorKind::Expression(e.error),
                e.source.line,
                column,
                e.source.text,
            )
        })
    }

    /// Routes a raw line while inside a `FOR` block.
    fn collect(&mut self, text: String) -> Result<(), ParseError> {
        if is_rof(&text) {
            if let Some(block) = self.loops.close() {
                debug!(count = block.count(), "unrolling for loop");
                let flow = block.expand::<ParseError>(&mut |unrolled| {
                    self.process(&unrolled)?;
                    Ok(if self.finished {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    })
                })?;
                if flow.is_break() {
                    trace!(line = self.line_number, "END reached inside for loop");
                }
            }
        } else if let Some(header) = for_header(&text) {
            let count = self.repeat_count(&header.count, &text)?;
            self.loops.open(ForLoop::new(header.variable, count));
        } else {
            self.loops.push_line(text);
        }
        Ok(())
    }

    /// Substitutes constants into one line and applies every resulting line.
    fn process(&mut self, text: &str) -> Result<(), ParseError> {
        self.constants.set_current_line(self.program.len());
        let substituted = self.constants.substitute(text);
        for line in substituted.split('\n') {
            if self.finished || self.loops.is_collecting() {
                break;
            }
            trace!(line = self.line_number, text = line, "parsing");
            let parsed = parse_line(line)
                .map_err(|e| self.error(e.kind, e.column, line))?;
            if let Some(statement) = parsed.statement {
                self.apply(statement, line)?;
            }
            if let Some(comment) = parsed.comment {
                self.comment(comment, line)?;
            }
        }
        Ok(())
    }

    fn apply(&mut self, statement: Statement, text: &str) -> Result<(), ParseError> {
        let is_equ = matches!(statement, Statement::Equ { .. });
        let previous_equ = if is_equ {
            self.last_equ_label.take()
        } else {
            self.last_equ_label = None;
            None
        };

        match statement {
            Statement::Label(name) => self.label(&name, text),
            Statement::Equ { label, definition } => match (label, previous_equ) {
                (Some(name), _) => {
                    self.constants
                        .define(&name, &definition)
                        .map_err(|kind| self.error(kind, 1, text))?;
                    debug!(name = name.as_str(), definition = definition.as_str(), "constant defined");
                    self.last_equ_label = Some(name);
                    Ok(())
                }
                (None, Some(previous)) => {
                    self.constants.append_line(&previous, &definition);
                    self.last_equ_label = Some(previous);
                    Ok(())
                }
                (None, None) => Err(self.error(ParseErrorKind::EquWithoutLabel, 1, text)),
            },
            Statement::For { label, count } => {
                let count = self.repeat_count(&count, text)?;
                self.loops.open(ForLoop::new(label, count));
                Ok(())
            }
            Statement::Rof => Err(self.error(ParseErrorKind::UnexpectedRof, 1, text)),
            Statement::Org { label, start } => {
                if let Some(name) = label {
                    self.label(&name, text)?;
                }
                self.program
                    .set_start(start, SourceText::new(self.line_number, text));
                Ok(())
            }
            Statement::End { label, start } => {
                if let Some(name) = label {
                    self.label(&name, text)?;
                }
                if let Some(start) = start {
                    self.program
                        .set_start(start, SourceText::new(self.line_number, text));
                }
                self.finished = true;
                Ok(())
            }
            Statement::Instruction { label, instruction } => {
                if let Some(name) = label {
                    self.label(&name, text)?;
                }
                if self.program.len() >= self.config.max_length {
                    return Err(self.error(
                        ParseErrorKind::ProgramTooLong(self.config.max_length),
                        1,
                        text,
                    ));
                }
                self.program
                    .push(instruction, SourceText::new(self.line_number, text));
                Ok(())
            }
        }
    }

    fn comment(&mut self, comment: Comment, text: &str) -> Result<(), ParseError> {
        match comment {
            Comment::Plain => {}
            Comment::Name(name) => self.program.set_name(name),
            Comment::Author(author) => self.program.set_author(author),
            Comment::Strategy(line) => self.program.add_strategy(line),
            Comment::Assert(expr) => {
                let value = self
                    .constants
                    .evaluate(&expr)
                    .map_err(|e| self.error(ParseErrorKind::Expression(e), 1, text))?;
                if value != 1 {
                    return Err(self.error(
                        ParseErrorKind::AssertionFailed(expr.to_string()),
                        1,
                        text,
                    ));
                }
            }
        }
        Ok(())
    }

    fn label(&mut self, name: &str, text: &str) -> Result<(), ParseError> {
        self.program
            .add_label(name)
            .map_err(|kind| self.error(kind, 1, text))
    }

    fn repeat_count(&self, count: &str, text: &str) -> Result<i64, ParseError> {
        let substituted = self.constants.substitute(count);
        let expr = parser::parse_expression(&substituted)
            .map_err(|_| self.error(ParseErrorKind::ForWithoutCount, 1, text))?;
        self.constants
            .evaluate(&expr)
            .map_err(|e| self.error(ParseErrorKind::Expression(e), 1, text))
    }

    fn error(&self, kind: ParseErrorKind, column: usize, text: &str) -> ParseError {
        ParseError::new(kind, self.line_number, column, text)
    }
}

#[cfg(test)]
mod tests {
    use mars_core::{AddressMode, Modifier, Opcode, Operand};

    use super::*;
    use crate::expression::ExpressionError;

    fn config() -> MarsConfig {
        MarsConfig::with_core_size(8000)
    }

    #[test]
    fn assembles_imp() {
        let program = assemble("MOV 0, 1\n", &config()).unwrap();
        assert_eq!(program.len(), 1);
        let imp = &program.instructions[0];
        assert_eq!(imp.opcode, Opcode::Mov);
        assert_eq!(imp.modifier, Modifier::I);
        assert_eq!(imp.a, Operand::direct(0));
        assert_eq!(imp.b, Operand::direct(1));
    }

    #[test]
    fn equ_is_substituted() {
        let program = assemble("STEP EQU 4\nADD #STEP, 1\n", &config()).unwrap();
        assert_eq!(program.instructions[0].a, Operand::immediate(4));
    }

    #[test]
    fn equ_redefinition_fails() {
        let err = assemble("STEP EQU 4\nSTEP EQU 5\n", &config()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateConstant("STEP".into()));
        assert_eq!(err.location.line, 2);
    }

    #[test]
    fn equ_without_label_fails() {
        let err = assemble("  EQU 5\n", &config()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EquWithoutLabel);
    }

    #[test]
    fn multi_line_equ_expands_to_instructions() {
        let source = "pair EQU MOV 0, 1\n     EQU JMP -1\npair\n";
        let program = assemble(source, &config()).unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program.instructions[1].opcode, Opcode::Jmp);
        assert_eq!(program.instructions[1].a, Operand::direct(7999));
    }

    #[test]
    fn for_block_repeats_body_with_curline() {
        let source = "FOR 3\nDAT #CURLINE\nROF\n";
        let program = assemble(source, &config()).unwrap();
        assert_eq!(program.len(), 3);
        let values: Vec<i64> = program.instructions.iter().map(|i| i.b.number).collect();
        assert_eq!(values, vec![0, 1, 2]);
    }

    #[test]
    fn unterminated_for_fails() {
        let err = assemble("FOR 2\nDAT 0\n", &config()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedFor);
    }

    #[test]
    fn stray_rof_fails() {
        let err = assemble("DAT 0\nROF\n", &config()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedRof);
    }

    #[test]
    fn end_sets_start_and_stops() {
        let source = "DAT 0\ngo JMP 0\nEND go\nthis is ignored\n";
        let program = assemble(source, &config()).unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program.start, 1);
    }

    #[test]
    fn metadata_comments_are_recorded() {
        let source = ";name Imp\n;author Dewdney\n;strategy crawl\nMOV 0, 1\n";
        let program = assemble(source, &config()).unwrap();
        assert_eq!(program.name.as_deref(), Some("Imp"));
        assert_eq!(program.author.as_deref(), Some("Dewdney"));
        assert_eq!(program.strategy.as_deref(), Some("crawl"));
    }

    #[test]
    fn failed_assert_reports_expression() {
        let err = assemble(";assert CORESIZE == 800\nDAT 0\n", &config()).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::AssertionFailed("8000 == 800".into())
        );
    }

    #[test]
    fn parse_errors_carry_position() {
        let err = assemble_named("bad.red", "MOV 0, 1\nADD.Z 1, 2\n", &config()).unwrap_err();
        assert_eq!(err.location.line, 2);
        assert_eq!(err.location.column, 5);
        assert_eq!(err.location.file.as_deref(), Some("bad.red"));
        assert_eq!(err.text, "ADD.Z 1, 2");
    }

    #[test]
    fn undefined_label_fails_at_link() {
        let err = assemble_named("w.red", "DAT 0\nJMP nowhere\n", &config()).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::Expression(ExpressionError::UndefinedSymbol("nowhere".into()))
        );
        assert_eq!(err.location.line, 2);
        assert_eq!(err.location.column, 5);
        assert_eq!(err.text, "JMP nowhere");
        assert_eq!(
            err.format_for_stderr(),
            "w.red:2:5: error: error in expression: undefined symbol 'nowhere'\n  JMP nowhere\n      ^"
        );
    }

    #[test]
    fn bad_start_expression_points_at_end_line() {
        let err = assemble("DAT 0\n  END 1/0\n", &config()).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::Expression(ExpressionError::DivisionByZero)
        );
        assert_eq!(err.location.line, 2);
        assert_eq!(err.location.column, 3);
        assert_eq!(err.text, "  END 1/0");
    }

    #[test]
    fn program_longer_than_max_length_fails() {
        let config = MarsConfig {
            max_length: 3,
            ..config()
        };
        assert!(assemble("DAT 0\nDAT 1\nDAT 2\n", &config).is_ok());
        let err = assemble("DAT 0\nDAT 1\nDAT 2\nDAT 3\n", &config).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ProgramTooLong(3));
        assert_eq!(err.location.line, 4);
    }

    #[test]
    fn runaway_for_is_cut_off_during_expansion() {
        let err = assemble("FOR 2000000000\nDAT 0\nROF\n", &config()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ProgramTooLong(100));

        let nested = "FOR 2000000000\nFOR 2000000000\nDAT 0\nROF\nROF\n";
        let err = assemble(nested, &config()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ProgramTooLong(100));
    }

    #[test]
    fn invalid_config_is_an_error() {
        let err = assemble("DAT 0\n", &MarsConfig::with_core_size(0)).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidConfig(_)));
        let err = assemble_named("w.red", "DAT 0\n", &MarsConfig::with_core_size(0)).unwrap_err();
        assert_eq!(err.location.file.as_deref(), Some("w.red"));
    }

    #[test]
    fn immediate_labels_are_absolute() {
        let source = "top DAT 0\nMOV #top, <top\n";
        let program = assemble(source, &config()).unwrap();
        let mov = &program.instructions[1];
        assert_eq!(mov.a, Operand::immediate(0));
        assert_eq!(mov.b, Operand::new(AddressMode::BPredecrement, 7999));
    }
}
