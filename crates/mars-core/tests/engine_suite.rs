//! Opcode engine coverage: modifier defaults, field selection and side effects.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_wrap)]

use mars_core::{
    execute, fold, AddressMode, ExecuteOutcome, Instruction, MemoryCore, Modifier, Opcode,
    Operand, TaskFault,
};
use proptest::prelude::*;
use rand as _;
use rand_chacha as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

use AddressMode::{BIndirect, Direct, Immediate};

fn ins(opcode: Opcode, modifier: Modifier, a: Operand, b: Operand) -> Instruction {
    Instruction::new(opcode, modifier, a, b)
}

#[rstest]
#[case(Opcode::Mov, Immediate, Direct, Modifier::AB)]
#[case(Opcode::Mov, Direct, Immediate, Modifier::B)]
#[case(Opcode::Mov, Direct, Direct, Modifier::I)]
#[case(Opcode::Cmp, BIndirect, Direct, Modifier::I)]
#[case(Opcode::Add, Immediate, Immediate, Modifier::AB)]
#[case(Opcode::Sub, Direct, Immediate, Modifier::B)]
#[case(Opcode::Mul, Direct, BIndirect, Modifier::F)]
#[case(Opcode::Div, Direct, Direct, Modifier::F)]
#[case(Opcode::Mod, Immediate, Direct, Modifier::AB)]
#[case(Opcode::Slt, Immediate, Direct, Modifier::AB)]
#[case(Opcode::Slt, Direct, Immediate, Modifier::B)]
#[case(Opcode::Jmp, Immediate, Direct, Modifier::B)]
#[case(Opcode::Jmz, Direct, Direct, Modifier::B)]
#[case(Opcode::Jmn, Direct, Direct, Modifier::B)]
#[case(Opcode::Djn, Direct, Direct, Modifier::B)]
#[case(Opcode::Spl, Direct, Immediate, Modifier::B)]
#[case(Opcode::Seq, Immediate, Direct, Modifier::I)]
#[case(Opcode::Sne, Direct, Direct, Modifier::I)]
#[case(Opcode::Dat, Immediate, Immediate, Modifier::F)]
#[case(Opcode::Nop, Direct, Direct, Modifier::F)]
fn default_modifier_table(
    #[case] opcode: Opcode,
    #[case] a_mode: AddressMode,
    #[case] b_mode: AddressMode,
    #[case] expected: Modifier,
) {
    assert_eq!(Modifier::default_for(opcode, a_mode, b_mode), expected);
}

#[rstest]
#[case(Modifier::A, (7, 2))]
#[case(Modifier::B, (1, 8))]
#[case(Modifier::AB, (1, 7))]
#[case(Modifier::BA, (8, 2))]
#[case(Modifier::F, (7, 8))]
#[case(Modifier::X, (8, 7))]
fn mov_modifiers_select_fields(#[case] modifier: Modifier, #[case] expected: (i64, i64)) {
    let mut core = MemoryCore::new(50).unwrap();
    core.load_program(
        0,
        &[
            ins(Opcode::Mov, modifier, Operand::direct(1), Operand::direct(2)),
            Instruction::dat(7, 8),
            Instruction::dat(1, 2),
        ],
        0,
    );
    execute(&mut core, 0, 0, 1);
    let target = core.load(2).expect("in range");
    assert_eq!((target.a.number, target.b.number), expected);
    assert_eq!(target.pid, 1);
}

#[rstest]
#[case(Opcode::Add, (3, 12))]
#[case(Opcode::Sub, (49, 8))]
#[case(Opcode::Mul, (2, 20))]
#[case(Opcode::Div, (0, 5))]
#[case(Opcode::Mod, (1, 0))]
fn arithmetic_f_acts_on_both_fields(#[case] opcode: Opcode, #[case] expected: (i64, i64)) {
    let mut core = MemoryCore::new(50).unwrap();
    core.load_program(
        0,
        &[
            ins(opcode, Modifier::F, Operand::direct(1), Operand::direct(2)),
            Instruction::dat(2, 2),
            Instruction::dat(1, 10),
        ],
        0,
    );
    assert_eq!(execute(&mut core, 0, 0, 1), ExecuteOutcome::Continue(1));
    let target = core.load(2).expect("in range");
    assert_eq!((target.a.number, target.b.number), expected);
}

#[test]
fn add_ab_immediate_touches_only_its_own_b_field() {
    let mut core = MemoryCore::new(8000).unwrap();
    core.load_program(
        0,
        &[ins(
            Opcode::Add,
            Modifier::AB,
            Operand::immediate(4),
            Operand::direct(0),
        )],
        0,
    );
    let before: Vec<Instruction> = core.iter().copied().collect();

    let outcome = execute(&mut core, 0, 0, 1);

    assert_eq!(outcome, ExecuteOutcome::Continue(1));
    let cell = core.load(0).expect("in range");
    assert_eq!(cell.b.number, before[0].b.number + 4);
    assert_eq!(cell.a, before[0].a);
    assert_eq!(cell.pid, 1);
    for (address, (now, then)) in core.iter().zip(before.iter()).enumerate().skip(1) {
        assert_eq!(now, then, "cell {address} changed");
    }
}

#[test]
fn post_increments_apply_a_before_b() {
    let mut core = MemoryCore::new(50).unwrap();
    core.load_program(
        0,
        &[
            ins(
                Opcode::Mov,
                Modifier::I,
                Operand::new(AddressMode::BPostincrement, 1),
                Operand::new(AddressMode::BPostincrement, 1),
            ),
            Instruction::dat(0, 3),
        ],
        0,
    );
    execute(&mut core, 0, 0, 2);
    let pointer = core.load(1).expect("in range");
    assert_eq!(pointer.b.number, 5);
    assert_eq!(pointer.pid, 2);
}

#[test]
fn division_fault_is_reported_not_raised() {
    let mut core = MemoryCore::new(50).unwrap();
    core.load_program(
        0,
        &[ins(
            Opcode::Mod,
            Modifier::AB,
            Operand::immediate(0),
            Operand::direct(1),
        )],
        0,
    );
    assert_eq!(
        execute(&mut core, 0, 0, 1),
        ExecuteOutcome::Terminated(TaskFault::DivisionByZero)
    );
}

#[test]
fn execution_relative_to_base_wraps_the_core() {
    let mut core = MemoryCore::new(10).unwrap();
    core.load_program(
        9,
        &[ins(
            Opcode::Mov,
            Modifier::I,
            Operand::direct(0),
            Operand::direct(1),
        )],
        0,
    );
    assert_eq!(execute(&mut core, 9, 0, 1), ExecuteOutcome::Continue(1));
    assert_eq!(core.load(0).map(|cell| cell.opcode), Ok(Opcode::Mov));
}

proptest! {
    #[test]
    fn property_fold_is_total_and_idempotent(x in any::<i64>(), size in 1usize..100_000) {
        let once = fold(x, size);
        prop_assert!(once < size);
        prop_assert_eq!(fold(once as i64, size), once);
    }

    #[test]
    fn property_spl_yields_next_then_target(offset in -200i64..200) {
        let mut core = MemoryCore::new(100).unwrap();
        core.load_program(
            0,
            &[ins(Opcode::Spl, Modifier::B, Operand::direct(fold(offset, 100) as i64), Operand::immediate(0))],
            0,
        );
        let outcome = execute(&mut core, 0, 0, 1);
        prop_assert_eq!(outcome.program_counters(), vec![1, fold(offset, 100)]);
    }
}
