//! Opcode engine.
//!
//! One call executes one instruction for one task:
//! 1. Resolve the A-operand, then the B-operand (pre-decrements happen here)
//! 2. Commit deferred post-increments, A first
//! 3. Apply the opcode to the B-target with the selected fields
//! 4. Report the program counters the task continues with
//!
//! A-values are read from the copy taken when the A-operand was resolved.
//! B-values are read from the live cell at the moment the opcode runs.

#![allow(
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

/// Address-mode resolution.
pub mod operand;

pub use operand::{apply_post_increment, resolve, PostIncrement, Resolved, TaskContext};

use tracing::trace;

use crate::instruction::{Field, Instruction, Modifier, Opcode};
use crate::{MemoryCore, TaskFault};

/// Outcome of executing a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The task continues at one relative program counter.
    Continue(usize),
    /// `SPL`: the task continues at `next` and a new task starts at `spawned`.
    Split {
        /// `pc + 1`.
        next: usize,
        /// The A-target.
        spawned: usize,
    },
    /// The task ends.
    Terminated(TaskFault),
}

impl ExecuteOutcome {
    /// Program counters to queue, in order.
    #[must_use]
    pub fn program_counters(&self) -> Vec<usize> {
        match *self {
            Self::Continue(pc) => vec![pc],
            Self::Split { next, spawned } => vec![next, spawned],
            Self::Terminated(_) => Vec::new(),
        }
    }
}

/// Executes the instruction at `base + pc` on behalf of warrior `pid`.
///
/// Returned program counters are relative to `base` and already folded.
pub fn execute(core: &mut MemoryCore, base: usize, pc: usize, pid: u32) -> ExecuteOutcome {
    let task = TaskContext {
        base,
        pc: pc as i64,
        pid,
    };
    let instruction = core.load_relative(base, task.pc, 0);
    trace!(pid, address = core.relative_address(base, task.pc, 0), %instruction, "execute");

    let a = resolve(instruction.a, &task, core);
    let b = resolve(instruction.b, &task, core);
    for post in [a.post_increment, b.post_increment].into_iter().flatten() {
        apply_post_increment(core, post, pid);
    }

    let next = core.fold(task.pc + 1);
    let skip = core.fold(task.pc + 2);
    let jump = core.fold(task.pc + a.pointer);
    let modifier = instruction.modifier;

    match instruction.opcode {
        Opcode::Dat => ExecuteOutcome::Terminated(TaskFault::ExecutedDat),
        Opcode::Mov => {
            let destination = core.relative_mut(b.address, 0, 0);
            if modifier == Modifier::I {
                *destination = Instruction { pid, ..a.target };
            } else {
                for &(source, target) in field_pairs(modifier) {
                    *destination.number_mut(target) = a.target.number(source);
                }
                destination.pid = pid;
            }
            ExecuteOutcome::Continue(next)
        }
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
            match arithmetic(core, instruction.opcode, modifier, &a.target, b.address, pid) {
                Ok(()) => ExecuteOutcome::Continue(next),
                Err(fault) => ExecuteOutcome::Terminated(fault),
            }
        }
        Opcode::Jmp => ExecuteOutcome::Continue(jump),
        Opcode::Jmz => {
            let target = live(core, b.address);
            let zero = tested_fields(modifier)
                .iter()
                .all(|field| target.number(*field) == 0);
            ExecuteOutcome::Continue(if zero { jump } else { next })
        }
        Opcode::Jmn => {
            let target = live(core, b.address);
            let non_zero = tested_fields(modifier)
                .iter()
                .any(|field| target.number(*field) != 0);
            ExecuteOutcome::Continue(if non_zero { jump } else { next })
        }
        Opcode::Djn => {
            let size = core.size();
            let target = core.relative_mut(b.address, 0, 0);
            for field in tested_fields(modifier) {
                let number = target.number_mut(*field);
                *number = crate::memory::fold(*number - 1, size) as i64;
            }
            target.pid = pid;
            let non_zero = tested_fields(modifier)
                .iter()
                .any(|field| target.number(*field) != 0);
            ExecuteOutcome::Continue(if non_zero { jump } else { next })
        }
        Opcode::Cmp | Opcode::Seq => {
            let equal = compare_equal(modifier, &a.target, &live(core, b.address));
            ExecuteOutcome::Continue(if equal { skip } else { next })
        }
        Opcode::Sne => {
            let equal = compare_equal(modifier, &a.target, &live(core, b.address));
            ExecuteOutcome::Continue(if equal { next } else { skip })
        }
        Opcode::Slt => {
            let target = live(core, b.address);
            let less = field_pairs(modifier)
                .iter()
                .all(|(source, dest)| a.target.number(*source) < target.number(*dest));
            ExecuteOutcome::Continue(if less { skip } else { next })
        }
        Opcode::Spl => ExecuteOutcome::Split {
            next,
            spawned: jump,
        },
        Opcode::Nop => ExecuteOutcome::Continue(next),
    }
}

/// Source/destination field pairs selected by a modifier. `I` acts like `F`.
#[must_use]
pub const fn field_pairs(modifier: Modifier) -> &'static [(Field, Field)] {
    match modifier {
        Modifier::A => &[(Field::A, Field::A)],
        Modifier::B => &[(Field::B, Field::B)],
        Modifier::AB => &[(Field::A, Field::B)],
        Modifier::BA => &[(Field::B, Field::A)],
        Modifier::F | Modifier::I => &[(Field::A, Field::A), (Field::B, Field::B)],
        Modifier::X => &[(Field::A, Field::B), (Field::B, Field::A)],
    }
}

/// Fields of the B-target examined by `JMZ`, `JMN` and `DJN`.
#[must_use]
pub const fn tested_fields(modifier: Modifier) -> &'static [Field] {
    match modifier {
        Modifier::A | Modifier::BA => &[Field::A],
        Modifier::B | Modifier::AB => &[Field::B],
        Modifier::F | Modifier::X | Modifier::I => &[Field::A, Field::B],
    }
}

fn live(core: &MemoryCore, address: usize) -> Instruction {
    core.load_relative(address, 0, 0)
}

fn compare_equal(modifier: Modifier, source: &Instruction, target: &Instruction) -> bool {
    if modifier == Modifier::I {
        return source.same_code(target);
    }
    field_pairs(modifier)
        .iter()
        .all(|(from, to)| source.number(*from) == target.number(*to))
}

fn arithmetic(
    core: &mut MemoryCore,
    opcode: Opcode,
    modifier: Modifier,
    source: &Instruction,
    address: usize,
    pid: u32,
) -> Result<(), TaskFault> {
    let size = core.size();
    let destination = core.relative_mut(address, 0, 0);
    let mut fault = None;
    for (from, to) in field_pairs(modifier) {
        let a = i128::from(source.number(*from));
        let b = i128::from(destination.number(*to));
        let value = match opcode {
            Opcode::Add => b + a,
            Opcode::Sub => b - a,
            Opcode::Mul => b * a,
            Opcode::Div | Opcode::Mod if a == 0 => {
                fault = Some(TaskFault::DivisionByZero);
                continue;
            }
            Opcode::Div => b / a,
            _ => b % a,
        };
        *destination.number_mut(*to) = value.rem_euclid(size as i128) as i64;
    }
    destination.pid = pid;
    fault.map_or(Ok(()), Err)
}
