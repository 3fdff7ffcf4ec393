//! Redcode instruction model: opcodes, modifiers, address modes and the
//! core-resident instruction record.

use std::fmt;
use std::str::FromStr;

/// The ICWS'94 opcode set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Opcode {
    Dat,
    Mov,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Jmp,
    Jmz,
    Jmn,
    Djn,
    Cmp,
    Seq,
    Sne,
    Slt,
    Spl,
    Nop,
}

/// Every opcode in canonical order.
pub const OPCODES: [Opcode; 17] = [
    Opcode::Dat,
    Opcode::Mov,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Jmp,
    Opcode::Jmz,
    Opcode::Jmn,
    Opcode::Djn,
    Opcode::Cmp,
    Opcode::Seq,
    Opcode::Sne,
    Opcode::Slt,
    Opcode::Spl,
    Opcode::Nop,
];

impl Opcode {
    /// Upper-case mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Dat => "DAT",
            Self::Mov => "MOV",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Jmp => "JMP",
            Self::Jmz => "JMZ",
            Self::Jmn => "JMN",
            Self::Djn => "DJN",
            Self::Cmp => "CMP",
            Self::Seq => "SEQ",
            Self::Sne => "SNE",
            Self::Slt => "SLT",
            Self::Spl => "SPL",
            Self::Nop => "NOP",
        }
    }

    /// Character used by core dumps.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Dat => 'X',
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
            Self::Mod => '%',
            Self::Mov => 'M',
            Self::Nop => '.',
            Self::Jmp
            | Self::Jmz
            | Self::Jmn
            | Self::Djn
            | Self::Cmp
            | Self::Slt
            | Self::Seq
            | Self::Sne => 'J',
            Self::Spl => '<',
        }
    }

    /// Looks up an opcode by mnemonic, ignoring case.
    #[must_use]
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        OPCODES
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(text))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Opcode modifier selecting which fields take part in an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Modifier {
    /// A-number to A-number.
    A,
    /// B-number to B-number.
    B,
    /// A-number to B-number.
    AB,
    /// B-number to A-number.
    BA,
    /// Both numbers, A to A and B to B.
    F,
    /// Both numbers crossed, A to B and B to A.
    X,
    /// The whole instruction.
    I,
}

impl Modifier {
    /// Upper-case suffix text without the leading dot.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::AB => "AB",
            Self::BA => "BA",
            Self::F => "F",
            Self::X => "X",
            Self::I => "I",
        }
    }

    /// Looks up a modifier by name, ignoring case.
    #[must_use]
    pub fn from_name(text: &str) -> Option<Self> {
        [Self::AB, Self::BA, Self::A, Self::B, Self::F, Self::X, Self::I]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(text))
    }

    /// Modifier implied when the source omits one.
    #[must_use]
    pub const fn default_for(opcode: Opcode, a_mode: AddressMode, b_mode: AddressMode) -> Self {
        let a_immediate = matches!(a_mode, AddressMode::Immediate);
        let b_immediate = matches!(b_mode, AddressMode::Immediate);
        match opcode {
            Opcode::Dat | Opcode::Nop => Self::F,
            Opcode::Mov | Opcode::Cmp => {
                if a_immediate {
                    Self::AB
                } else if b_immediate {
                    Self::B
                } else {
                    Self::I
                }
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                if a_immediate {
                    Self::AB
                } else if b_immediate {
                    Self::B
                } else {
                    Self::F
                }
            }
            Opcode::Slt => {
                if a_immediate {
                    Self::AB
                } else {
                    Self::B
                }
            }
            Opcode::Jmp | Opcode::Jmz | Opcode::Jmn | Opcode::Djn | Opcode::Spl => Self::B,
            Opcode::Seq | Opcode::Sne => Self::I,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AddressMode {
    /// `#` the number itself.
    Immediate,
    /// `$` relative address.
    Direct,
    /// `*` indirect through the A-number.
    AIndirect,
    /// `@` indirect through the B-number.
    BIndirect,
    /// `{` indirect through the pre-decremented A-number.
    APredecrement,
    /// `<` indirect through the pre-decremented B-number.
    BPredecrement,
    /// `}` indirect through the A-number, incremented afterwards.
    APostincrement,
    /// `>` indirect through the B-number, incremented afterwards.
    BPostincrement,
}

impl AddressMode {
    /// Source character for this mode.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Immediate => '#',
            Self::Direct => '$',
            Self::AIndirect => '*',
            Self::BIndirect => '@',
            Self::APredecrement => '{',
            Self::BPredecrement => '<',
            Self::APostincrement => '}',
            Self::BPostincrement => '>',
        }
    }

    /// Parses a mode character.
    #[must_use]
    pub const fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '#' => Some(Self::Immediate),
            '$' => Some(Self::Direct),
            '*' => Some(Self::AIndirect),
            '@' => Some(Self::BIndirect),
            '{' => Some(Self::APredecrement),
            '<' => Some(Self::BPredecrement),
            '}' => Some(Self::APostincrement),
            '>' => Some(Self::BPostincrement),
            _ => None,
        }
    }

    /// True for the modes that dereference an intermediate cell.
    #[must_use]
    pub const fn is_indirect(self) -> bool {
        !matches!(self, Self::Immediate | Self::Direct)
    }
}

/// Which number of an instruction a mode or operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// The A-number.
    A,
    /// The B-number.
    B,
}

/// One instruction argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Operand {
    /// Addressing mode.
    pub mode: AddressMode,
    /// Number, folded into `0..core_size` once linked.
    pub number: i64,
}

impl Operand {
    /// Creates an operand.
    #[must_use]
    pub const fn new(mode: AddressMode, number: i64) -> Self {
        Self { mode, number }
    }

    /// `#number`.
    #[must_use]
    pub const fn immediate(number: i64) -> Self {
        Self::new(AddressMode::Immediate, number)
    }

    /// `$number`.
    #[must_use]
    pub const fn direct(number: i64) -> Self {
        Self::new(AddressMode::Direct, number)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mode.symbol(), self.number)
    }
}

/// A core-resident instruction.
///
/// Instructions are data: warriors rewrite their numbers (and with `MOV.I`
/// the whole record) at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Instruction {
    /// Operation.
    pub opcode: Opcode,
    /// Field selector.
    pub modifier: Modifier,
    /// A-operand.
    pub a: Operand,
    /// B-operand.
    pub b: Operand,
    /// Pid of the warrior that last wrote this cell, 0 for none.
    pub pid: u32,
}

impl Default for Instruction {
    fn default() -> Self {
        Self::dat(0, 0)
    }
}

impl Instruction {
    /// Creates an unowned instruction.
    #[must_use]
    pub const fn new(opcode: Opcode, modifier: Modifier, a: Operand, b: Operand) -> Self {
        Self {
            opcode,
            modifier,
            a,
            b,
            pid: 0,
        }
    }

    /// `DAT.F #a, #b`, the filler for empty core cells.
    #[must_use]
    pub const fn dat(a: i64, b: i64) -> Self {
        Self::new(
            Opcode::Dat,
            Modifier::F,
            Operand::immediate(a),
            Operand::immediate(b),
        )
    }

    /// Number selected by `field`.
    #[must_use]
    pub const fn number(&self, field: Field) -> i64 {
        match field {
            Field::A => self.a.number,
            Field::B => self.b.number,
        }
    }

    /// Mutable number selected by `field`.
    pub fn number_mut(&mut self, field: Field) -> &mut i64 {
        match field {
            Field::A => &mut self.a.number,
            Field::B => &mut self.b.number,
        }
    }

    /// Dump character of the opcode.
    #[must_use]
    pub const fn glyph(&self) -> char {
        self.opcode.glyph()
    }

    /// Compares everything except ownership.
    #[must_use]
    pub fn same_code(&self, other: &Self) -> bool {
        self.opcode == other.opcode
            && self.modifier == other.modifier
            && self.a == other.a
            && self.b == other.b
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} {}, {}", self.opcode, self.modifier, self.a, self.b)
    }
}

/// Unknown mnemonic, modifier or mode text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name '{0}'")]
pub struct UnknownName(pub String);

impl FromStr for Opcode {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mnemonic(s).ok_or_else(|| UnknownName(s.to_string()))
    }
}

impl FromStr for Modifier {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_lookup_ignores_case() {
        assert_eq!("mov".parse::<Opcode>(), Ok(Opcode::Mov));
        assert_eq!("SpL".parse::<Opcode>(), Ok(Opcode::Spl));
        assert_eq!(
            "XYZ".parse::<Opcode>().unwrap_err().to_string(),
            "unknown name 'XYZ'"
        );
    }

    #[test]
    fn modifier_lookup_prefers_exact_name() {
        assert_eq!("ab".parse::<Modifier>(), Ok(Modifier::AB));
        assert_eq!("A".parse::<Modifier>(), Ok(Modifier::A));
        assert!("Q".parse::<Modifier>().is_err());
    }

    #[test]
    fn every_mode_symbol_round_trips() {
        for symbol in ['#', '$', '*', '@', '{', '<', '}', '>'] {
            let mode = AddressMode::from_symbol(symbol).expect("known symbol");
            assert_eq!(mode.symbol(), symbol);
        }
        assert_eq!(AddressMode::from_symbol('!'), None);
    }

    #[test]
    fn display_is_canonical() {
        let instr = Instruction::new(
            Opcode::Mov,
            Modifier::I,
            Operand::direct(0),
            Operand::direct(1),
        );
        assert_eq!(instr.to_string(), "MOV.I $0, $1");
        assert_eq!(Instruction::default().to_string(), "DAT.F #0, #0");
    }

    #[test]
    fn glyphs_cover_the_dump_alphabet() {
        assert_eq!(Opcode::Dat.glyph(), 'X');
        assert_eq!(Opcode::Mov.glyph(), 'M');
        assert_eq!(Opcode::Djn.glyph(), 'J');
        assert_eq!(Opcode::Spl.glyph(), '<');
        assert_eq!(Opcode::Nop.glyph(), '.');
    }

    #[test]
    fn same_code_ignores_owner() {
        let mut a = Instruction::dat(1, 2);
        let b = Instruction::dat(1, 2);
        a.pid = 7;
        assert!(a.same_code(&b));
        assert_ne!(a, b);
    }
}
