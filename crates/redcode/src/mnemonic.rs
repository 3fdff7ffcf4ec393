//! Instruction completion: implied operands and default modifiers.

use mars_core::{AddressMode, Modifier, Opcode};

use crate::errors::ParseErrorKind;
use crate::expression::Expression;

/// An operand whose number is still an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandExpr {
    /// Addressing mode.
    pub mode: AddressMode,
    /// Unevaluated number.
    pub expr: Expression,
}

impl OperandExpr {
    /// `#value`
    #[must_use]
    pub const fn immediate(value: i64) -> Self {
        Self {
            mode: AddressMode::Immediate,
            expr: Expression::Number(value),
        }
    }
}

/// A complete instruction awaiting label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkedInstruction {
    /// Operation.
    pub opcode: Opcode,
    /// Explicit or implied modifier.
    pub modifier: Modifier,
    /// A operand.
    pub a: OperandExpr,
    /// B operand.
    pub b: OperandExpr,
}

/// Fills in what the source left out.
///
/// A lone `DAT` operand becomes the B operand with `#0` as A. `JMP`, `SPL`
/// and `NOP` take `#0` as a missing B operand. Every other opcode needs both.
/// A missing modifier is derived from the opcode and both modes.
///
/// # Errors
///
/// Returns [`ParseErrorKind::MissingAOperand`] or
/// [`ParseErrorKind::MissingBOperand`].
pub fn complete_instruction(
    opcode: Opcode,
    modifier: Option<Modifier>,
    a: Option<OperandExpr>,
    b: Option<OperandExpr>,
) -> Result<UnlinkedInstruction, ParseErrorKind> {
    let Some(a) = a else {
        return Err(ParseErrorKind::MissingAOperand(opcode));
    };
    let (a, b) = match (opcode, b) {
        (_, Some(b)) => (a, b),
        (Opcode::Dat, None) => (OperandExpr::immediate(0), a),
        (Opcode::Jmp | Opcode::Spl | Opcode::Nop, None) => (a, OperandExpr::immediate(0)),
        (_, None) => return Err(ParseErrorKind::MissingBOperand(opcode)),
    };
    let modifier = modifier.unwrap_or_else(|| Modifier::default_for(opcode, a.mode, b.mode));
    Ok(UnlinkedInstruction {
        opcode,
        modifier,
        a,
        b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(value: i64) -> Option<OperandExpr> {
        Some(OperandExpr {
            mode: AddressMode::Direct,
            expr: Expression::Number(value),
        })
    }

    #[test]
    fn single_dat_operand_moves_to_b() {
        let done = complete_instruction(Opcode::Dat, None, direct(5), None).unwrap();
        assert_eq!(done.a, OperandExpr::immediate(0));
        assert_eq!(done.b, direct(5).unwrap());
        assert_eq!(done.modifier, Modifier::F);
    }

    #[test]
    fn jumps_get_immediate_zero_b() {
        for opcode in [Opcode::Jmp, Opcode::Spl, Opcode::Nop] {
            let done = complete_instruction(opcode, None, direct(-1), None).unwrap();
            assert_eq!(done.b, OperandExpr::immediate(0));
        }
    }

    #[test]
    fn two_operand_opcodes_need_b() {
        assert_eq!(
            complete_instruction(Opcode::Add, None, direct(1), None),
            Err(ParseErrorKind::MissingBOperand(Opcode::Add))
        );
        assert_eq!(
            complete_instruction(Opcode::Jmz, None, None, None),
            Err(ParseErrorKind::MissingAOperand(Opcode::Jmz))
        );
    }

    #[test]
    fn explicit_modifier_wins() {
        let done =
            complete_instruction(Opcode::Mov, Some(Modifier::X), direct(0), direct(1)).unwrap();
        assert_eq!(done.modifier, Modifier::X);
        let done = complete_instruction(Opcode::Mov, None, direct(0), direct(1)).unwrap();
        assert_eq!(done.modifier, Modifier::I);
    }
}
