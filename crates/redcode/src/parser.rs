//! Line parser for Redcode statements.
//!
//! Each cleaned, constant-substituted line is parsed independently into a
//! [`ParsedLine`]: at most one statement plus an optional comment. The
//! grammar is:
//!
//! ```text
//! line       := comment | [label [':']] [statement] [comment]
//! statement  := EQU text | FOR text | ROF | END [expr] | ORG expr | instruction
//! instruction:= opcode ['.' modifier] operand [',' operand]
//! operand    := [mode] expr
//! expr       := term [operator expr]
//! term       := label | ['+'|'-'] number | ['+'|'-'] term | '(' expr ')'
//! ```

use mars_core::{AddressMode, Modifier, Opcode};

use crate::errors::ParseErrorKind;
use crate::expression::{Expression, ExpressionError, Operator};
use crate::mnemonic::{complete_instruction, OperandExpr, UnlinkedInstruction};

/// A parse failure within one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// Kind of error.
    pub kind: ParseErrorKind,
    /// 1-indexed column where parsing stopped.
    pub column: usize,
}

/// Comment content the assembler acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comment {
    /// Any other comment.
    Plain,
    /// `;name text`
    Name(String),
    /// `;author text`
    Author(String),
    /// `;strategy text`, one line per comment.
    Strategy(String),
    /// `;assert expr`
    Assert(Expression),
}

/// A single statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A label alone; it names the next instruction.
    Label(String),
    /// `name EQU text`, or a continuation line without a label.
    Equ {
        /// Constant name.
        label: Option<String>,
        /// Raw replacement text.
        definition: String,
    },
    /// `[var] FOR count`
    For {
        /// Loop variable name.
        label: Option<String>,
        /// Unevaluated repeat count.
        count: String,
    },
    /// `ROF`
    Rof,
    /// `ORG start`
    Org {
        /// Optional label.
        label: Option<String>,
        /// Start offset.
        start: Expression,
    },
    /// `END [start]`
    End {
        /// Optional label.
        label: Option<String>,
        /// Optional start offset.
        start: Option<Expression>,
    },
    /// An opcode line.
    Instruction {
        /// Optional label.
        label: Option<String>,
        /// The instruction with unevaluated operands.
        instruction: UnlinkedInstruction,
    },
}

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLine {
    /// The statement, if the line has one.
    pub statement: Option<Statement>,
    /// The comment, if the line has one.
    pub comment: Option<Comment>,
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    const fn column(&self) -> usize {
        self.pos + 1
    }

    fn skip_space(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn eat_identifier(&mut self) -> Option<&'a str> {
        if !self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return None;
        }
        Some(self.eat_while(is_word_char))
    }

    /// Consumes `keyword` (any case) when followed by a non-word character.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        let matches = rest
            .get(..keyword.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
            && !rest[keyword.len()..].starts_with(is_word_char);
        if matches {
            self.pos += keyword.len();
        }
        matches
    }

    fn error(&self, kind: ParseErrorKind) -> LineError {
        LineError {
            kind,
            column: self.column(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parses one line.
///
/// # Errors
///
/// Returns a [`LineError`] describing the first problem found.
pub fn parse_line(text: &str) -> Result<ParsedLine, LineError> {
    let mut cursor = Cursor::new(text);
    cursor.skip_space();
    if cursor.at_end() {
        return Ok(ParsedLine::default());
    }
    if cursor.peek() == Some(';') {
        return Ok(ParsedLine {
            statement: None,
            comment: Some(comment(&mut cursor)?),
        });
    }

    let statement = match statement(&mut cursor, None)? {
        Some(statement) => statement,
        None => {
            let Some(label) = cursor.eat_identifier() else {
                return Err(cursor.error(ParseErrorKind::UnknownToken));
            };
            cursor.eat(":");
            cursor.skip_space();
            match statement(&mut cursor, Some(label))? {
                Some(statement) => statement,
                None => Statement::Label(label.to_string()),
            }
        }
    };

    cursor.skip_space();
    let comment = if cursor.peek() == Some(';') {
        Some(comment(&mut cursor)?)
    } else {
        None
    };
    if !cursor.at_end() {
        return Err(cursor.error(ParseErrorKind::UnknownToken));
    }
    Ok(ParsedLine {
        statement: Some(statement),
        comment,
    })
}

/// Parses a complete expression; the whole text must be consumed.
///
/// # Errors
///
/// Returns a [`LineError`] for malformed or trailing text.
pub fn parse_expression(text: &str) -> Result<Expression, LineError> {
    let mut cursor = Cursor::new(text);
    cursor.skip_space();
    let Some(parsed) = expression(&mut cursor)? else {
        return Err(cursor.error(ParseErrorKind::ExpressionExpected));
    };
    cursor.skip_space();
    if !cursor.at_end() {
        return Err(cursor.error(ParseErrorKind::UnknownToken));
    }
    Ok(parsed)
}

fn comment(cursor: &mut Cursor<'_>) -> Result<Comment, LineError> {
    cursor.eat(";");
    let body_start = cursor.pos;
    let text = cursor.eat_while(|_| true);

    if let Some(name) = directive(text, "name") {
        return Ok(Comment::Name(name.trim().to_string()));
    }
    if let Some(author) = directive(text, "author") {
        return Ok(Comment::Author(author.trim().to_string()));
    }
    if let Some(strategy) = directive(text, "strategy") {
        return Ok(Comment::Strategy(strategy.to_string()));
    }
    if let Some(assertion) = directive(text, "assert") {
        let offset = body_start + "assert ".len();
        return parse_expression(assertion)
            .map(Comment::Assert)
            .map_err(|e| LineError {
                kind: e.kind,
                column: e.column + offset,
            });
    }
    Ok(Comment::Plain)
}

/// Text after `keyword ` at the start of a comment body.
fn directive<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    let head = text.get(..keyword.len())?;
    let rest = text[keyword.len()..].strip_prefix(' ')?;
    head.eq_ignore_ascii_case(keyword).then_some(rest)
}

fn statement(
    cursor: &mut Cursor<'_>,
    label: Option<&str>,
) -> Result<Option<Statement>, LineError> {
    let label = label.map(str::to_string);

    if cursor.eat_keyword("EQU") {
        cursor.skip_space();
        let definition = cursor.eat_while(|c| c != ';').trim_end().to_string();
        return Ok(Some(Statement::Equ { label, definition }));
    }
    if cursor.eat_keyword("FOR") {
        cursor.skip_space();
        let count = cursor.eat_while(|c| c != ';').trim_end().to_string();
        if count.is_empty() {
            return Err(cursor.error(ParseErrorKind::ForWithoutCount));
        }
        return Ok(Some(Statement::For { label, count }));
    }
    if cursor.eat_keyword("ROF") {
        return Ok(Some(Statement::Rof));
    }
    if cursor.eat_keyword("END") {
        cursor.skip_space();
        let start = expression(cursor)?;
        return Ok(Some(Statement::End { label, start }));
    }
    if cursor.eat_keyword("ORG") {
        cursor.skip_space();
        let Some(start) = expression(cursor)? else {
            return Err(cursor.error(ParseErrorKind::ExpressionExpected));
        };
        return Ok(Some(Statement::Org { label, start }));
    }

    let Some(opcode) = opcode(cursor) else {
        return Ok(None);
    };
    let modifier = modifier(cursor)?;
    cursor.skip_space();
    let a = operand(cursor)?;
    cursor.skip_space();
    let b = if cursor.eat(",") {
        cursor.skip_space();
        match operand(cursor)? {
            Some(b) => Some(b),
            None => return Err(cursor.error(ParseErrorKind::ExpressionExpected)),
        }
    } else {
        None
    };
    let instruction =
        complete_instruction(opcode, modifier, a, b).map_err(|kind| cursor.error(kind))?;
    Ok(Some(Statement::Instruction { label, instruction }))
}

/// An opcode mnemonic followed by `.`, whitespace or the end of the line.
fn opcode(cursor: &mut Cursor<'_>) -> Option<Opcode> {
    let start = cursor.pos;
    let word = cursor.eat_while(|c| c.is_ascii_alphabetic());
    let boundary = cursor
        .peek()
        .map_or(true, |c| c == '.' || c.is_whitespace());
    match Opcode::from_mnemonic(word) {
        Some(opcode) if boundary => Some(opcode),
        _ => {
            cursor.pos = start;
            None
        }
    }
}

fn modifier(cursor: &mut Cursor<'_>) -> Result<Option<Modifier>, LineError> {
    if !cursor.eat(".") {
        return Ok(None);
    }
    let start = cursor.pos;
    let name = cursor.eat_while(|c| c.is_ascii_alphabetic());
    Modifier::from_name(name).map(Some).ok_or_else(|| LineError {
        kind: ParseErrorKind::UnknownModifier(name.to_string()),
        column: start + 1,
    })
}

fn operand(cursor: &mut Cursor<'_>) -> Result<Option<OperandExpr>, LineError> {
    let explicit = cursor.peek().and_then(AddressMode::from_symbol);
    if explicit.is_some() {
        cursor.pos += 1;
        cursor.skip_space();
    }
    match expression(cursor)? {
        Some(expr) => Ok(Some(OperandExpr {
            mode: explicit.unwrap_or(AddressMode::Direct),
            expr,
        })),
        None if explicit.is_some() => Err(cursor.error(ParseErrorKind::ExpressionExpected)),
        None => Ok(None),
    }
}

fn expression(cursor: &mut Cursor<'_>) -> Result<Option<Expression>, LineError> {
    let Some(lhs) = term(cursor)? else {
        return Ok(None);
    };
    let before_operator = cursor.pos;
    cursor.skip_space();
    let Some(op) = Operator::parse_prefix(cursor.rest()) else {
        cursor.pos = before_operator;
        return Ok(Some(lhs));
    };
    cursor.pos += op.symbol().len();
    cursor.skip_space();
    let Some(rest) = expression(cursor)? else {
        return Err(cursor.error(ParseErrorKind::MissingRightHandSide));
    };
    Ok(Some(Expression::combine(lhs, op, rest)))
}

fn term(cursor: &mut Cursor<'_>) -> Result<Option<Expression>, LineError> {
    if let Some(name) = cursor.eat_identifier() {
        return Ok(Some(Expression::Symbol(name.to_string())));
    }

    let start = cursor.pos;
    let negative = match cursor.peek() {
        Some('-') => true,
        Some('+') => false,
        _ => return unsigned_term(cursor),
    };
    cursor.pos += 1;
    cursor.skip_space();
    let digits = cursor.eat_while(|c| c.is_ascii_digit());
    if !digits.is_empty() {
        let value = parse_number(digits, negative).ok_or_else(|| LineError {
            kind: ParseErrorKind::Expression(ExpressionError::Overflow),
            column: start + 1,
        })?;
        return Ok(Some(Expression::Number(value)));
    }
    match term(cursor)? {
        Some(inner) if negative => Ok(Some(
            Expression::binary(Operator::Sub, Expression::Number(0), inner).grouped(),
        )),
        Some(inner) => Ok(Some(inner)),
        None => {
            cursor.pos = start;
            Ok(None)
        }
    }
}

fn unsigned_term(cursor: &mut Cursor<'_>) -> Result<Option<Expression>, LineError> {
    let start = cursor.pos;
    let digits = cursor.eat_while(|c| c.is_ascii_digit());
    if !digits.is_empty() {
        let value = parse_number(digits, false).ok_or_else(|| LineError {
            kind: ParseErrorKind::Expression(ExpressionError::Overflow),
            column: start + 1,
        })?;
        return Ok(Some(Expression::Number(value)));
    }
    if !cursor.eat("(") {
        return Ok(None);
    }
    cursor.skip_space();
    let Some(inner) = expression(cursor)? else {
        return Err(cursor.error(ParseErrorKind::ExpressionExpected));
    };
    cursor.skip_space();
    if !cursor.eat(")") {
        return Err(cursor.error(ParseErrorKind::ClosingParenthesisExpected));
    }
    Ok(Some(inner.grouped()))
}

fn parse_number(digits: &str, negative: bool) -> Option<i64> {
    let magnitude: i64 = digits.parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
