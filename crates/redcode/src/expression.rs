//! Compile-time arithmetic over numbers and labels.
//!
//! The statement parser builds expressions right-leaning (`term op expr`).
//! [`Expression::combine`] then pushes the new left-hand term down the left
//! spine of the right subtree until it meets an operator that binds looser,
//! which yields conventional left-to-right evaluation with the usual
//! precedence. Parenthesized sub-expressions are never entered.

use std::fmt;

use thiserror::Error;

/// Binary operators, loosest first: `||`, `&&`, `== !=`, `< > <= >=`, `+ -`, `* / %`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operator {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Operator {
    /// Source spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }

    /// Binding strength; higher binds tighter.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 0,
            Self::And => 1,
            Self::Equal | Self::NotEqual => 2,
            Self::Less | Self::Greater | Self::LessEqual | Self::GreaterEqual => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::Mod => 5,
        }
    }

    /// Matches the longest operator at the start of `text`.
    #[must_use]
    pub fn parse_prefix(text: &str) -> Option<Self> {
        const TWO: [(&str, Operator); 6] = [
            ("==", Operator::Equal),
            ("!=", Operator::NotEqual),
            ("<=", Operator::LessEqual),
            (">=", Operator::GreaterEqual),
            ("&&", Operator::And),
            ("||", Operator::Or),
        ];
        if let Some((_, op)) = TWO.iter().find(|(s, _)| text.starts_with(s)) {
            return Some(*op);
        }
        match text.chars().next()? {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            '%' => Some(Self::Mod),
            '<' => Some(Self::Less),
            '>' => Some(Self::Greater),
            _ => None,
        }
    }
}

/// Expression evaluation failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ExpressionError {
    /// A label or constant has no value.
    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),
    /// `/` or `%` with a zero right operand.
    #[error("division by zero")]
    DivisionByZero,
    /// Intermediate value does not fit in 64 bits.
    #[error("arithmetic overflow")]
    Overflow,
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// Integer literal.
    Number(i64),
    /// Label reference.
    Symbol(String),
    /// `lhs op rhs`.
    Binary {
        /// Operator.
        op: Operator,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
        /// Written in parentheses; never re-associated.
        grouped: bool,
    },
}

impl Expression {
    /// Builds `lhs op rhs`.
    #[must_use]
    pub fn binary(op: Operator, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            grouped: false,
        }
    }

    /// Marks a binary node as parenthesized.
    #[must_use]
    pub fn grouped(self) -> Self {
        match self {
            Self::Binary { op, lhs, rhs, .. } => Self::Binary {
                op,
                lhs,
                rhs,
                grouped: true,
            },
            leaf => leaf,
        }
    }

    /// Joins a term to an already parsed right-hand side: `term op rest`.
    #[must_use]
    pub fn combine(term: Self, op: Operator, rest: Self) -> Self {
        match rest {
            Self::Binary {
                op: inner,
                lhs,
                rhs,
                grouped: false,
            } if op.precedence() >= inner.precedence() => Self::Binary {
                op: inner,
                lhs: Box::new(Self::combine(term, op, *lhs)),
                rhs,
                grouped: false,
            },
            other => Self::binary(op, term, other),
        }
    }

    /// Evaluates the tree, looking up symbols through `resolve`.
    ///
    /// Comparisons and logical operators yield 1 or 0. Division truncates
    /// toward zero.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] for unknown symbols, zero divisors and
    /// overflow.
    pub fn eval<F>(&self, resolve: &F) -> Result<i64, ExpressionError>
    where
        F: Fn(&str) -> Option<i64>,
    {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Symbol(name) => {
                resolve(name).ok_or_else(|| ExpressionError::UndefinedSymbol(name.clone()))
            }
            Self::Binary { op, lhs, rhs, .. } => {
                let l = lhs.eval(resolve)?;
                let r = rhs.eval(resolve)?;
                apply(*op, l, r)
            }
        }
    }
}

fn apply(op: Operator, l: i64, r: i64) -> Result<i64, ExpressionError> {
    let value = match op {
        Operator::Add => l.checked_add(r).ok_or(ExpressionError::Overflow)?,
        Operator::Sub => l.checked_sub(r).ok_or(ExpressionError::Overflow)?,
        Operator::Mul => l.checked_mul(r).ok_or(ExpressionError::Overflow)?,
        Operator::Div | Operator::Mod if r == 0 => return Err(ExpressionError::DivisionByZero),
        Operator::Div => l.checked_div(r).ok_or(ExpressionError::Overflow)?,
        Operator::Mod => l.checked_rem(r).ok_or(ExpressionError::Overflow)?,
        Operator::Equal => i64::from(l == r),
        Operator::NotEqual => i64::from(l != r),
        Operator::Less => i64::from(l < r),
        Operator::Greater => i64::from(l > r),
        Operator::LessEqual => i64::from(l <= r),
        Operator::GreaterEqual => i64::from(l >= r),
        Operator::And => i64::from(l != 0 && r != 0),
        Operator::Or => i64::from(l != 0 || r != 0),
    };
    Ok(value)
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Symbol(name) => f.write_str(name),
            Self::Binary {
                op,
                lhs,
                rhs,
                grouped,
            } => {
                if *grouped {
                    write!(f, "({lhs} {} {rhs})", op.symbol())
                } else {
                    write!(f, "{lhs} {} {rhs}", op.symbol())
                }
            }
        }
    }
}
