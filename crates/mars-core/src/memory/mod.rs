//! The circular instruction store shared by all warriors.

/// Wrap-around and bounds-check helpers.
pub mod access;

pub use access::{fold, validate_address};

use tracing::trace;

use crate::{CoreError, Instruction};

/// One cell as seen by a core dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CellView {
    /// Opcode glyph.
    pub glyph: char,
    /// Pid of the last writer, 0 if untouched.
    pub owner: u32,
}

/// Fixed-size circular array of instructions.
///
/// Every cell always holds a valid instruction; a fresh core is filled with
/// `DAT.F #0, #0` owned by nobody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCore {
    cells: Vec<Instruction>,
}

impl MemoryCore {
    /// Allocates a core of `size` filler cells.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for an empty core.
    pub fn new(size: usize) -> Result<Self, CoreError> {
        if size == 0 {
            return Err(CoreError::InvalidConfig("core size must be positive".into()));
        }
        Ok(Self {
            cells: vec![Instruction::default(); size],
        })
    }

    /// Number of cells.
    #[must_use]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Wraps `address` into the core.
    #[must_use]
    pub fn fold(&self, address: i64) -> usize {
        fold(address, self.size())
    }

    /// Absolute address of `base + pc + offset`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn relative_address(&self, base: usize, pc: i64, offset: i64) -> usize {
        self.fold((base as i64).wrapping_add(pc).wrapping_add(offset))
    }

    /// Reads a cell by absolute address.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfRange`] for an address outside `0..size`.
    pub fn load(&self, address: i64) -> Result<Instruction, CoreError> {
        let index = validate_address(address, self.size())?;
        Ok(self.cells[index])
    }

    /// Overwrites a cell by absolute address.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfRange`] for an address outside `0..size`.
    pub fn store(&mut self, address: i64, instruction: Instruction) -> Result<(), CoreError> {
        let index = validate_address(address, self.size())?;
        trace!(address = index, %instruction, "store");
        self.cells[index] = instruction;
        Ok(())
    }

    /// Borrows a cell by absolute address.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfRange`] for an address outside `0..size`.
    pub fn cell(&self, address: i64) -> Result<&Instruction, CoreError> {
        let index = validate_address(address, self.size())?;
        Ok(&self.cells[index])
    }

    /// Reads the cell at `base + pc + offset`.
    #[must_use]
    pub fn load_relative(&self, base: usize, pc: i64, offset: i64) -> Instruction {
        self.cells[self.relative_address(base, pc, offset)]
    }

    /// Writes the cell at `base + pc + offset`.
    pub fn store_relative(&mut self, base: usize, pc: i64, offset: i64, instruction: Instruction) {
        let index = self.relative_address(base, pc, offset);
        trace!(address = index, %instruction, "store");
        self.cells[index] = instruction;
    }

    /// Mutable access to the cell at `base + pc + offset`.
    pub fn relative_mut(&mut self, base: usize, pc: i64, offset: i64) -> &mut Instruction {
        let index = self.relative_address(base, pc, offset);
        &mut self.cells[index]
    }

    /// Copies `program` into consecutive cells from `base`, stamped with `pid`.
    pub fn load_program(&mut self, base: usize, program: &[Instruction], pid: u32) {
        for (offset, instruction) in program.iter().enumerate() {
            let index = fold_offset(base, offset, self.size());
            self.cells[index] = Instruction { pid, ..*instruction };
        }
    }

    /// Resets every cell to the filler instruction.
    pub fn clear(&mut self) {
        self.cells.fill(Instruction::default());
    }

    /// Glyph and owner of every cell, in address order.
    #[must_use]
    pub fn dump(&self) -> Vec<CellView> {
        self.cells
            .iter()
            .map(|cell| CellView {
                glyph: cell.glyph(),
                owner: cell.pid,
            })
            .collect()
    }

    /// Iterates over all cells in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.cells.iter()
    }
}

const fn fold_offset(base: usize, offset: usize, size: usize) -> usize {
    (base % size + offset % size) % size
}

#[cfg(test)]
mod tests {
    use super::MemoryCore;
    use crate::{CoreError, Instruction, Opcode};

    #[test]
    fn fresh_core_is_filled_with_unowned_dat() {
        let core = MemoryCore::new(16).unwrap();
        assert_eq!(core.size(), 16);
        assert!(core
            .iter()
            .all(|cell| cell.opcode == Opcode::Dat && cell.pid == 0));
    }

    #[test]
    fn empty_core_is_rejected() {
        assert!(matches!(
            MemoryCore::new(0),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn raw_access_is_bounds_checked() {
        let mut core = MemoryCore::new(8).unwrap();
        assert!(core.load(7).is_ok());
        assert_eq!(
            core.load(8),
            Err(CoreError::OutOfRange {
                address: 8,
                size: 8
            })
        );
        assert!(core.store(-1, Instruction::dat(1, 1)).is_err());
    }

    #[test]
    fn relative_access_wraps() {
        let mut core = MemoryCore::new(10).unwrap();
        core.store_relative(8, 1, 3, Instruction::dat(5, 5));
        assert_eq!(core.load(2).map(|cell| cell.a.number), Ok(5));
        assert_eq!(core.load_relative(0, -8, 0).a.number, 5);
    }

    #[test]
    fn program_load_stamps_owner_and_wraps() {
        let mut core = MemoryCore::new(4).unwrap();
        let program = [Instruction::dat(1, 0), Instruction::dat(2, 0)];
        core.load_program(3, &program, 2);
        assert_eq!(core.load(3).map(|cell| (cell.a.number, cell.pid)), Ok((1, 2)));
        assert_eq!(core.load(0).map(|cell| (cell.a.number, cell.pid)), Ok((2, 2)));
    }

    #[test]
    fn dump_reports_glyph_and_owner() {
        let mut core = MemoryCore::new(3).unwrap();
        core.load_program(1, &[Instruction::dat(0, 0)], 4);
        let dump = core.dump();
        assert_eq!(dump.len(), 3);
        assert_eq!(dump[1].glyph, 'X');
        assert_eq!(dump[1].owner, 4);
        assert_eq!(dump[0].owner, 0);
    }

    #[test]
    fn clear_restores_filler() {
        let mut core = MemoryCore::new(3).unwrap();
        core.load_program(0, &[Instruction::dat(9, 9)], 1);
        core.clear();
        assert!(core.iter().all(|cell| *cell == Instruction::default()));
    }
}
