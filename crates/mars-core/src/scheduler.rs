//! Warrior placement and the round-robin cycle loop.

use std::collections::BTreeSet;
use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

use crate::execute::{execute, ExecuteOutcome};
use crate::{
    CancellationToken, CoreError, HaltReason, MarsConfig, MemoryCore, Program, RunOutcome,
    SchedulerState, StepReport, TraceEvent, TraceSink, Warrior, WarriorStats,
};

/// Owns the core and every warrior, and drives execution one cycle at a time.
///
/// A cycle executes exactly one instruction for every live warrior, in
/// registration order. Within a warrior, tasks are time-sliced through its
/// FIFO queue.
pub struct Scheduler {
    config: MarsConfig,
    core: MemoryCore,
    warriors: Vec<Warrior>,
    stats: Vec<WarriorStats>,
    cycle: u64,
    breakpoints: BTreeSet<usize>,
    rng: ChaCha8Rng,
    trace_sink: Option<Box<dyn TraceSink>>,
    state: SchedulerState,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("warriors", &self.warriors)
            .field("cycle", &self.cycle)
            .field("breakpoints", &self.breakpoints)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler with an empty core.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] when `config` fails validation.
    pub fn new(config: MarsConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let rng = config
            .seed
            .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        Ok(Self {
            core: MemoryCore::new(config.core_size)?,
            config,
            warriors: Vec::new(),
            stats: Vec::new(),
            cycle: 0,
            breakpoints: BTreeSet::new(),
            rng,
            trace_sink: None,
            state: SchedulerState::Idle,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MarsConfig {
        &self.config
    }

    /// Registers a warrior, places it and loads its program into the core.
    ///
    /// Returns the absolute base address. The first warrior placed always
    /// lands at address 0; later ones get a random address keeping at least
    /// `min_distance` free cells on both sides of every other warrior.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyProgram`], [`CoreError::ProgramTooLong`] or
    /// [`CoreError::PlacementFailed`]. A failed load leaves the scheduler and
    /// the already loaded warriors untouched.
    pub fn add_warrior(&mut self, name: &str, program: Program) -> Result<usize, CoreError> {
        self.check_program(name, &program)?;
        let base = self.find_base_address(program.len()).ok_or_else(|| {
            warn!(name, "no room in core for warrior");
            CoreError::PlacementFailed {
                name: name.to_string(),
                attempts: self.config.placement_attempts,
            }
        })?;

        let pid = u32::try_from(self.warriors.len() + 1)
            .map_err(|_| CoreError::InvalidConfig("too many warriors".into()))?;
        let mut warrior = Warrior::new(name, pid, program);
        warrior.set_max_tasks(Some(self.config.max_processes));
        self.install(&mut warrior, base);
        info!(pid, name, base, "warrior loaded");

        self.warriors.push(warrior);
        self.stats.push(WarriorStats::new());
        if self.state == SchedulerState::Idle {
            self.state = SchedulerState::Placed;
        }
        Ok(base)
    }

    /// Clears the core and re-places every registered warrior.
    ///
    /// Returns the placement failures; a warrior that could not be placed
    /// stays registered but dead.
    pub fn restart(&mut self) -> Vec<CoreError> {
        self.core.clear();
        self.cycle = 0;
        self.stats.iter_mut().for_each(WarriorStats::reset);
        self.warriors.iter_mut().for_each(Warrior::unplace);

        let mut failures = Vec::new();
        for index in 0..self.warriors.len() {
            let size = self.warriors[index].size();
            match self.find_base_address(size) {
                Some(base) => {
                    let mut warrior = self.warriors[index].clone();
                    self.install(&mut warrior, base);
                    debug!(pid = warrior.pid(), base, "warrior re-placed");
                    self.warriors[index] = warrior;
                }
                None => {
                    let name = self.warriors[index].name().to_string();
                    warn!(name = name.as_str(), "no room in core for warrior");
                    failures.push(CoreError::PlacementFailed {
                        name,
                        attempts: self.config.placement_attempts,
                    });
                }
            }
        }

        self.state = if self.warriors.is_empty() {
            SchedulerState::Idle
        } else {
            SchedulerState::Placed
        };
        failures
    }

    /// Replaces the program of warrior `pid` and restarts the simulation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownWarrior`] or a program size error; in
    /// that case nothing changes.
    pub fn reload_warrior(&mut self, pid: u32, program: Program) -> Result<Vec<CoreError>, CoreError> {
        let index = self.index_of(pid)?;
        let name = self.warriors[index].name().to_string();
        self.check_program(&name, &program)?;
        self.warriors[index].replace_program(program);
        Ok(self.restart())
    }

    /// Executes one cycle.
    pub fn step(&mut self) -> StepReport {
        let size = self.core.size();
        let mut report = StepReport::default();

        for index in 0..self.warriors.len() {
            let warrior = &mut self.warriors[index];
            let Some(base) = warrior.base_address() else {
                continue;
            };
            let Some(pc) = warrior.next_task() else {
                continue;
            };
            let pid = warrior.pid();
            let address = (base + pc) % size;
            trace!(pid, address, cycle = self.cycle, "executing");
            let text = self
                .trace_sink
                .as_ref()
                .map(|_| self.core.load_relative(address, 0, 0).to_string());

            let outcome = execute(&mut self.core, base, pc, pid);
            let stats = &mut self.stats[index];
            stats.record_instruction();
            report.executed += 1;

            match outcome {
                ExecuteOutcome::Terminated(fault) => {
                    stats.record_fault(fault);
                    info!(pid, address, cycle = self.cycle, "task ended: {}", fault.label());
                    if let Some(sink) = self.trace_sink.as_mut() {
                        sink.on_event(&TraceEvent::TaskEnded {
                            cycle: self.cycle,
                            pid,
                            address,
                            fault,
                        });
                    }
                }
                ExecuteOutcome::Split { .. } => {
                    let dropped = warrior.append_tasks(&outcome.program_counters());
                    stats.record_spawn(dropped > 0);
                }
                ExecuteOutcome::Continue(_) => {
                    warrior.append_tasks(&outcome.program_counters());
                }
            }

            if !warrior.is_alive() {
                info!(pid, name = warrior.name(), cycle = self.cycle, "warrior died");
                report.died.push(pid);
            }

            if let (Some(sink), Some(instruction)) = (self.trace_sink.as_mut(), text) {
                sink.on_event(&TraceEvent::Executed {
                    cycle: self.cycle,
                    pid,
                    address,
                    instruction,
                    program_counters: warrior.absolute_program_counters(size),
                });
            }
        }

        self.cycle += 1;
        report.cycle = self.cycle;
        report.breakpoints_hit = self.breakpoint_hits();
        if !self.warriors.is_empty() {
            self.state = SchedulerState::Running;
        }
        report
    }

    /// Runs up to `max_cycles` cycles, stopping early on a halt condition.
    ///
    /// Cancellation and breakpoints are only observed between cycles.
    pub fn run(&mut self, max_cycles: u64, cancel: &CancellationToken) -> RunOutcome {
        let mut cycles_run = 0;
        let halt = loop {
            if self.alive_count() == 0 {
                break HaltReason::AllDead;
            }
            if cycles_run >= max_cycles {
                break HaltReason::CycleLimit;
            }

            let report = self.step();
            cycles_run += 1;

            if self.alive_count() == 0 {
                break HaltReason::AllDead;
            }
            if let Some(pid) = self.last_survivor() {
                break HaltReason::LastSurvivor(pid);
            }
            if !report.breakpoints_hit.is_empty() {
                break HaltReason::Breakpoint(report.breakpoints_hit);
            }
            if cancel.is_cancelled() {
                break HaltReason::Interrupted;
            }
        };

        debug!(cycles_run, ?halt, "run halted");
        self.state = SchedulerState::Halted(halt.clone());
        RunOutcome { cycles_run, halt }
    }

    /// Runs until the configured `max_cycles` total is reached or a halt
    /// condition fires.
    pub fn run_to_completion(&mut self, cancel: &CancellationToken) -> RunOutcome {
        let remaining = self.config.max_cycles.saturating_sub(self.cycle);
        self.run(remaining, cancel)
    }

    /// Adds a breakpoint at an absolute address.
    pub fn add_breakpoint(&mut self, address: usize) {
        let address = address % self.core.size();
        self.breakpoints.insert(address);
    }

    /// Removes a breakpoint; returns whether one was set.
    pub fn remove_breakpoint(&mut self, address: usize) -> bool {
        let address = address % self.core.size();
        self.breakpoints.remove(&address)
    }

    /// Flips a breakpoint; returns whether it is now set.
    pub fn toggle_breakpoint(&mut self, address: usize) -> bool {
        if self.remove_breakpoint(address) {
            false
        } else {
            self.add_breakpoint(address);
            true
        }
    }

    /// All breakpoint addresses, ascending.
    #[must_use]
    pub const fn breakpoints(&self) -> &BTreeSet<usize> {
        &self.breakpoints
    }

    /// Attaches a trace sink, replacing any previous one.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace_sink = Some(sink);
    }

    /// Detaches the trace sink.
    pub fn clear_trace_sink(&mut self) {
        self.trace_sink = None;
    }

    /// Cycles executed since the last restart.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Registered warriors in pid order.
    #[must_use]
    pub fn warriors(&self) -> &[Warrior] {
        &self.warriors
    }

    /// Warrior registered under `pid`.
    #[must_use]
    pub fn warrior(&self, pid: u32) -> Option<&Warrior> {
        self.index_of(pid).ok().map(|index| &self.warriors[index])
    }

    /// Execution counters of warrior `pid`.
    #[must_use]
    pub fn stats(&self, pid: u32) -> Option<&WarriorStats> {
        self.index_of(pid).ok().map(|index| &self.stats[index])
    }

    /// Absolute program counters of warrior `pid`, in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownWarrior`] for an unregistered pid.
    pub fn program_counters(&self, pid: u32) -> Result<Vec<usize>, CoreError> {
        let index = self.index_of(pid)?;
        Ok(self.warriors[index].absolute_program_counters(self.core.size()))
    }

    /// Absolute program counters of every warrior.
    #[must_use]
    pub fn all_program_counters(&self) -> Vec<usize> {
        self.warriors
            .iter()
            .flat_map(|warrior| warrior.absolute_program_counters(self.core.size()))
            .collect()
    }

    /// Whether warrior `pid` has at least one task; false for unknown pids.
    #[must_use]
    pub fn is_alive(&self, pid: u32) -> bool {
        self.warrior(pid).is_some_and(Warrior::is_alive)
    }

    /// Number of warriors with at least one task.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.warriors.iter().filter(|w| w.is_alive()).count()
    }

    /// The shared core.
    #[must_use]
    pub const fn memory(&self) -> &MemoryCore {
        &self.core
    }

    /// Resolves an absolute address to the owning warrior's label, if any.
    #[must_use]
    pub fn label_for(&self, address: usize) -> Option<(u32, &str)> {
        let size = self.core.size();
        self.warriors.iter().find_map(|warrior| {
            let base = warrior.base_address()?;
            let offset = (address % size + size - base) % size;
            if offset >= warrior.size() {
                return None;
            }
            warrior
                .program()
                .label_at(offset)
                .map(|label| (warrior.pid(), label))
        })
    }

    fn check_program(&self, name: &str, program: &Program) -> Result<(), CoreError> {
        if program.is_empty() {
            return Err(CoreError::EmptyProgram {
                name: name.to_string(),
            });
        }
        if program.len() > self.config.max_length {
            return Err(CoreError::ProgramTooLong {
                name: name.to_string(),
                length: program.len(),
                max_length: self.config.max_length,
            });
        }
        Ok(())
    }

    fn install(&mut self, warrior: &mut Warrior, base: usize) {
        self.core
            .load_program(base, &warrior.program().instructions, warrior.pid());
        warrior.place(base);
    }

    fn index_of(&self, pid: u32) -> Result<usize, CoreError> {
        self.warriors
            .iter()
            .position(|warrior| warrior.pid() == pid)
            .ok_or(CoreError::UnknownWarrior(pid))
    }

    fn last_survivor(&self) -> Option<u32> {
        if !self.config.stop_on_last_survivor || self.warriors.len() < 2 {
            return None;
        }
        let mut alive = self.warriors.iter().filter(|w| w.is_alive());
        match (alive.next(), alive.next()) {
            (Some(survivor), None) => Some(survivor.pid()),
            _ => None,
        }
    }

    fn breakpoint_hits(&self) -> Vec<usize> {
        if self.breakpoints.is_empty() {
            return Vec::new();
        }
        let counters: BTreeSet<usize> = self.all_program_counters().into_iter().collect();
        self.breakpoints.intersection(&counters).copied().collect()
    }

    fn find_base_address(&mut self, length: usize) -> Option<usize> {
        let size = self.core.size();
        let placed: Vec<(usize, usize)> = self
            .warriors
            .iter()
            .filter_map(|w| w.base_address().map(|base| (base, w.size())))
            .collect();
        if placed.is_empty() {
            return (length <= size).then_some(0);
        }

        for _ in 0..self.config.placement_attempts {
            let candidate = self.rng.gen_range(0..size);
            if fits(candidate, length, &placed, size, self.config.min_distance) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Whether a program of `length` cells at `start` keeps `min_distance` free
/// cells between itself and every placed span, measured around the circle.
///
/// A gap of exactly `min_distance` is allowed. The program body itself may
/// not wrap past the end of the core.
fn fits(
    start: usize,
    length: usize,
    placed: &[(usize, usize)],
    size: usize,
    min_distance: usize,
) -> bool {
    if start + length > size {
        return false;
    }
    placed.iter().all(|&(base, other_length)| {
        let offset = (start + size - base) % size;
        offset >= other_length + min_distance && offset + length + min_distance <= size
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Instruction, Modifier, Opcode, Operand};

    fn config(core_size: usize) -> MarsConfig {
        MarsConfig {
            seed: Some(7),
            min_distance: 10,
            max_length: 10,
            ..MarsConfig::with_core_size(core_size)
        }
    }

    fn imp() -> Program {
        Program::from_instructions(vec![Instruction::new(
            Opcode::Mov,
            Modifier::I,
            Operand::direct(0),
            Operand::direct(1),
        )])
    }

    fn dat() -> Program {
        Program::from_instructions(vec![Instruction::dat(0, 0)])
    }

    #[test]
    fn fits_rejects_wrapping_bodies() {
        assert!(!fits(95, 10, &[], 100, 0));
        assert!(fits(90, 10, &[], 100, 0));
    }

    #[test]
    fn fits_measures_gaps_on_both_sides() {
        let placed = [(0, 5)];
        assert!(!fits(14, 1, &placed, 100, 10));
        assert!(fits(15, 1, &placed, 100, 10));
        assert!(fits(89, 1, &placed, 100, 10));
        assert!(!fits(90, 1, &placed, 100, 10));
    }

    #[test]
    fn first_warrior_goes_to_zero() {
        let mut scheduler = Scheduler::new(config(200)).expect("valid config");
        assert_eq!(scheduler.add_warrior("imp", imp()), Ok(0));
        assert_eq!(scheduler.state(), &SchedulerState::Placed);
        assert_eq!(scheduler.memory().load(0).map(|c| c.pid), Ok(1));
    }

    #[test]
    fn too_long_program_is_refused() {
        let mut scheduler = Scheduler::new(config(200)).expect("valid config");
        let program = Program::from_instructions(vec![Instruction::dat(0, 0); 11]);
        assert!(matches!(
            scheduler.add_warrior("big", program),
            Err(CoreError::ProgramTooLong { length: 11, .. })
        ));
        assert!(scheduler.warriors().is_empty());
    }

    #[test]
    fn crowded_core_reports_placement_failure() {
        let mut cfg = config(30);
        cfg.min_distance = 20;
        let mut scheduler = Scheduler::new(cfg).expect("valid config");
        scheduler.add_warrior("a", imp()).expect("first fits");
        assert!(matches!(
            scheduler.add_warrior("b", imp()),
            Err(CoreError::PlacementFailed { .. })
        ));
        assert_eq!(scheduler.warriors().len(), 1);
    }

    #[test]
    fn dat_warrior_dies_on_first_turn() {
        let mut scheduler = Scheduler::new(config(200)).expect("valid config");
        scheduler.add_warrior("dat", dat()).expect("placed");
        let report = scheduler.step();
        assert_eq!(report.died, vec![1]);
        assert!(!scheduler.is_alive(1));
        assert_eq!(scheduler.stats(1).map(|s| s.dat_deaths), Some(1));
    }

    #[test]
    fn breakpoint_halts_run() {
        let mut scheduler = Scheduler::new(config(200)).expect("valid config");
        scheduler.add_warrior("imp", imp()).expect("placed");
        assert!(scheduler.toggle_breakpoint(3));
        let outcome = scheduler.run(100, &CancellationToken::new());
        assert_eq!(outcome.halt, HaltReason::Breakpoint(vec![3]));
        assert_eq!(outcome.cycles_run, 3);
        assert!(!scheduler.toggle_breakpoint(3));
    }

    #[test]
    fn cancelled_token_stops_after_one_cycle() {
        let mut scheduler = Scheduler::new(config(200)).expect("valid config");
        scheduler.add_warrior("imp", imp()).expect("placed");
        let token = CancellationToken::new();
        token.cancel();
        let outcome = scheduler.run(100, &token);
        assert_eq!(outcome.halt, HaltReason::Interrupted);
        assert_eq!(outcome.cycles_run, 1);
    }

    #[test]
    fn last_survivor_mode_stops_early() {
        let mut cfg = config(200);
        cfg.stop_on_last_survivor = true;
        let mut scheduler = Scheduler::new(cfg).expect("valid config");
        scheduler.add_warrior("imp", imp()).expect("placed");
        scheduler.add_warrior("dat", dat()).expect("placed");
        let outcome = scheduler.run(100, &CancellationToken::new());
        assert_eq!(outcome.halt, HaltReason::LastSurvivor(1));
        assert_eq!(outcome.cycles_run, 1);
    }

    #[test]
    fn restart_clears_core_and_replaces() {
        let mut scheduler = Scheduler::new(config(200)).expect("valid config");
        scheduler.add_warrior("imp", imp()).expect("placed");
        scheduler.run(5, &CancellationToken::new());
        assert_eq!(scheduler.cycles(), 5);
        let failures = scheduler.restart();
        assert!(failures.is_empty());
        assert_eq!(scheduler.cycles(), 0);
        assert_eq!(scheduler.program_counters(1), Ok(vec![0]));
        assert_eq!(scheduler.memory().load(5).map(|c| c.opcode), Ok(Opcode::Dat));
    }

    #[test]
    fn reload_swaps_program() {
        let mut scheduler = Scheduler::new(config(200)).expect("valid config");
        scheduler.add_warrior("w", imp()).expect("placed");
        let failures = scheduler.reload_warrior(1, dat()).expect("known pid");
        assert!(failures.is_empty());
        assert_eq!(scheduler.memory().load(0).map(|c| c.opcode), Ok(Opcode::Dat));
        assert_eq!(
            scheduler.reload_warrior(9, dat()),
            Err(CoreError::UnknownWarrior(9))
        );
    }

    #[test]
    fn labels_resolve_through_placement() {
        let mut scheduler = Scheduler::new(config(200)).expect("valid config");
        let mut program = imp();
        program.labels.insert("start".into(), 0);
        scheduler.add_warrior("imp", program).expect("placed");
        assert_eq!(scheduler.label_for(0), Some((1, "start")));
        assert_eq!(scheduler.label_for(1), None);
    }
}
