use std::collections::VecDeque;

use tracing::warn;

use crate::Program;

/// One competing program: identity, placement and live threads.
///
/// Program counters in the task queue are relative to the base address. A
/// warrior is alive while its queue is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warrior {
    name: String,
    pid: u32,
    program: Program,
    base_address: Option<usize>,
    task_queue: VecDeque<usize>,
    max_tasks: Option<usize>,
}

impl Warrior {
    /// Creates an unplaced warrior with an empty queue.
    #[must_use]
    pub fn new(name: impl Into<String>, pid: u32, program: Program) -> Self {
        Self {
            name: name.into(),
            pid,
            program,
            base_address: None,
            task_queue: VecDeque::new(),
            max_tasks: None,
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based pid in registration order.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// The program this warrior loads.
    #[must_use]
    pub const fn program(&self) -> &Program {
        &self.program
    }

    /// Number of instructions in the program.
    #[must_use]
    pub fn size(&self) -> usize {
        self.program.len()
    }

    /// Absolute load address, `None` while unplaced.
    #[must_use]
    pub const fn base_address(&self) -> Option<usize> {
        self.base_address
    }

    /// Relative program counters in execution order.
    #[must_use]
    pub const fn task_queue(&self) -> &VecDeque<usize> {
        &self.task_queue
    }

    /// Task ceiling, `None` for unlimited.
    #[must_use]
    pub const fn max_tasks(&self) -> Option<usize> {
        self.max_tasks
    }

    /// Sets the task ceiling.
    pub fn set_max_tasks(&mut self, max_tasks: Option<usize>) {
        self.max_tasks = max_tasks;
    }

    /// Records placement and seeds the queue with the program start.
    pub fn place(&mut self, base_address: usize) {
        self.base_address = Some(base_address);
        self.task_queue.clear();
        self.task_queue.push_back(self.program.start);
    }

    /// Forgets placement and drops all tasks.
    pub fn unplace(&mut self) {
        self.base_address = None;
        self.task_queue.clear();
    }

    /// Swaps in a new program; the warrior must be placed again.
    pub fn replace_program(&mut self, program: Program) {
        self.program = program;
        self.unplace();
    }

    /// Removes and returns the front task.
    pub fn next_task(&mut self) -> Option<usize> {
        self.task_queue.pop_front()
    }

    /// Appends tasks in order; returns how many were dropped by the ceiling.
    ///
    /// When the queue is full the newest entries are discarded.
    pub fn append_tasks(&mut self, tasks: &[usize]) -> usize {
        let mut dropped = 0;
        for &task in tasks {
            if self
                .max_tasks
                .is_some_and(|limit| self.task_queue.len() >= limit)
            {
                dropped += 1;
                continue;
            }
            self.task_queue.push_back(task);
        }
        if dropped > 0 {
            warn!(pid = self.pid, dropped, "task limit reached, spawn dropped");
        }
        dropped
    }

    /// Whether at least one thread is live.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.task_queue.is_empty()
    }

    /// Absolute program counters in queue order; empty while unplaced.
    #[must_use]
    pub fn absolute_program_counters(&self, core_size: usize) -> Vec<usize> {
        self.base_address.map_or_else(Vec::new, |base| {
            self.task_queue
                .iter()
                .map(|pc| (base + pc) % core_size)
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Warrior;
    use crate::{Instruction, Program};

    fn warrior() -> Warrior {
        let mut program = Program::from_instructions(vec![Instruction::dat(0, 0); 4]);
        program.start = 2;
        Warrior::new("imp", 1, program)
    }

    #[test]
    fn placement_seeds_start_task() {
        let mut w = warrior();
        assert!(!w.is_alive());
        w.place(10);
        assert_eq!(w.base_address(), Some(10));
        assert_eq!(w.task_queue().iter().copied().collect::<Vec<_>>(), vec![2]);
        assert!(w.is_alive());
    }

    #[test]
    fn queue_is_fifo() {
        let mut w = warrior();
        w.place(0);
        w.append_tasks(&[5, 6]);
        assert_eq!(w.next_task(), Some(2));
        assert_eq!(w.next_task(), Some(5));
        assert_eq!(w.next_task(), Some(6));
        assert_eq!(w.next_task(), None);
        assert!(!w.is_alive());
    }

    #[test]
    fn ceiling_drops_newest_spawn() {
        let mut w = warrior();
        w.set_max_tasks(Some(2));
        w.place(0);
        assert_eq!(w.append_tasks(&[3, 4]), 1);
        assert_eq!(w.task_queue().iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn absolute_counters_wrap() {
        let mut w = warrior();
        w.place(7);
        assert_eq!(w.absolute_program_counters(8), vec![1]);
    }

    #[test]
    fn replacing_program_unplaces() {
        let mut w = warrior();
        w.place(3);
        w.replace_program(Program::from_instructions(vec![Instruction::dat(0, 0)]));
        assert_eq!(w.base_address(), None);
        assert!(!w.is_alive());
        assert_eq!(w.size(), 1);
    }
}
