use std::collections::HashMap;

use crate::Instruction;

/// A linked, relocatable Redcode program.
///
/// Operand numbers are folded into the core size the program was linked for
/// and are relative to each instruction's own offset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Program {
    /// Instructions in load order.
    pub instructions: Vec<Instruction>,
    /// Label name to instruction offset.
    pub labels: HashMap<String, usize>,
    /// Offset of the first instruction to execute.
    pub start: usize,
    /// `;name` metadata.
    pub name: Option<String>,
    /// `;author` metadata.
    pub author: Option<String>,
    /// `;strategy` lines joined with newlines.
    pub strategy: Option<String>,
}

impl Program {
    /// Wraps bare instructions, starting at offset 0.
    #[must_use]
    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            ..Self::default()
        }
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Label defined at `offset`; the alphabetically first one if several are.
    #[must_use]
    pub fn label_at(&self, offset: usize) -> Option<&str> {
        self.labels
            .iter()
            .filter(|(_, at)| **at == offset)
            .map(|(name, _)| name.as_str())
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::Program;
    use crate::Instruction;

    #[test]
    fn label_lookup_is_reverse_of_table() {
        let mut program = Program::from_instructions(vec![Instruction::dat(0, 0); 3]);
        program.labels.insert("loop".into(), 1);
        program.labels.insert("alpha".into(), 1);
        program.labels.insert("end".into(), 2);
        assert_eq!(program.label_at(1), Some("alpha"));
        assert_eq!(program.label_at(2), Some("end"));
        assert_eq!(program.label_at(0), None);
        assert_eq!(program.len(), 3);
    }
}
