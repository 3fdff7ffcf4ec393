//! Address-mode resolution.
//!
//! Resolution is split in two phases: [`resolve`] computes the pointer and
//! applies pre-decrements, [`apply_post_increment`] commits the deferred
//! post-increment once both operands of the instruction are resolved.

use crate::instruction::{AddressMode, Field, Instruction, Operand};
use crate::MemoryCore;

/// Where a task is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext {
    /// Base address of the owning warrior.
    pub base: usize,
    /// Program counter relative to `base`.
    pub pc: i64,
    /// Pid of the owning warrior.
    pub pid: u32,
}

/// A post-increment waiting to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostIncrement {
    /// Absolute address of the indirect cell.
    pub address: usize,
    /// Number to increment.
    pub field: Field,
}

/// Result of resolving one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// Folded offset of the target relative to the program counter.
    pub pointer: i64,
    /// Absolute address of the target.
    pub address: usize,
    /// Copy of the target taken at resolution time.
    pub target: Instruction,
    /// Deferred `}` or `>` side effect.
    pub post_increment: Option<PostIncrement>,
}

/// Resolves `operand` for a task, applying any pre-decrement immediately.
#[allow(clippy::cast_possible_wrap)]
pub fn resolve(operand: Operand, task: &TaskContext, core: &mut MemoryCore) -> Resolved {
    let size = core.size();
    let (pointer, post_increment) = match operand.mode {
        AddressMode::Immediate => (0, None),
        AddressMode::Direct => (operand.number, None),
        mode => {
            let field = indirect_field(mode);
            let address = core.relative_address(task.base, task.pc, operand.number);
            let cell = core.relative_mut(task.base, task.pc, operand.number);
            if matches!(mode, AddressMode::APredecrement | AddressMode::BPredecrement) {
                let number = cell.number_mut(field);
                *number = crate::memory::fold(*number - 1, size) as i64;
                cell.pid = task.pid;
            }
            let post = matches!(mode, AddressMode::APostincrement | AddressMode::BPostincrement)
                .then_some(PostIncrement { address, field });
            (operand.number + cell.number(field), post)
        }
    };
    let pointer = core.fold(pointer) as i64;
    Resolved {
        pointer,
        address: core.relative_address(task.base, task.pc, pointer),
        target: core.load_relative(task.base, task.pc, pointer),
        post_increment,
    }
}

/// Commits a deferred post-increment and stamps the cell with `pid`.
#[allow(clippy::cast_possible_wrap)]
pub fn apply_post_increment(core: &mut MemoryCore, post: PostIncrement, pid: u32) {
    let size = core.size();
    let cell = core.relative_mut(post.address, 0, 0);
    let number = cell.number_mut(post.field);
    *number = crate::memory::fold(*number + 1, size) as i64;
    cell.pid = pid;
}

const fn indirect_field(mode: AddressMode) -> Field {
    match mode {
        AddressMode::AIndirect | AddressMode::APredecrement | AddressMode::APostincrement => {
            Field::A
        }
        _ => Field::B,
    }
}
