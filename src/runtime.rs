use std::mem;

use crate::{
    effect::Effect,
    error::ExecError,
    exec::instruction_effect,
    program::Program,
    state::ProcessorState,
};

/// Executed step, kept so that it can be undone.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct HistoryEntry {
    /// State before the effect was applied
    pub pre: ProcessorState,
    pub effect: Effect,
}

/// Result of attempting a single step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepOutcome {
    /// One instruction was executed. Also returned by `run` when the step limit is reached.
    Executed,
    /// Processor is halted, nothing was executed.
    Halted,
    /// Program counter does not point at an instruction, nothing was executed.
    OutOfProgram,
}

/// Drives a program, one effect at a time.
///
/// Every executed step may be recorded, so that it can be undone with [`Runtime::step_back`] and
/// replayed with [`Runtime::redo`].
pub struct Runtime {
    program: Program,
    /// Must not be mutated.
    initial: ProcessorState,
    state: ProcessorState,
    history: Vec<HistoryEntry>,
    /// Undone steps, most recently undone last
    redo: Vec<HistoryEntry>,
    recording: bool,
    /// Instructions executed since the initial state, accounting for undo
    instruction_count: usize,
}

impl Runtime {
    pub fn new(program: Program) -> Self {
        Self::with_state(program, ProcessorState::initialize())
    }

    pub fn with_state(program: Program, initial: ProcessorState) -> Self {
        Self {
            program,
            state: initial.clone(),
            initial,
            history: Vec::new(),
            redo: Vec::new(),
            recording: true,
            instruction_count: 0,
        }
    }

    /// Stop keeping history. Steps executed while not recording cannot be undone.
    ///
    /// Turning recording off discards existing history, since earlier entries would no longer
    /// invert against the current state.
    pub fn set_recording(&mut self, recording: bool) {
        if !recording {
            self.history.clear();
            self.redo.clear();
        }
        self.recording = recording;
    }

    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    pub fn can_step_back(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Fetch the instruction at pc, then compute and apply its effect.
    ///
    /// State is left untouched on error.
    pub fn step(&mut self) -> Result<StepOutcome, ExecError> {
        if self.state.halted {
            return Ok(StepOutcome::Halted);
        }
        let Some(instruction) = self.program.instruction(self.state.pc) else {
            return Ok(StepOutcome::OutOfProgram);
        };

        let effect = instruction_effect(&self.state, self.program.labels(), instruction)?;
        let next = effect.apply(&self.state)?;
        let pre = mem::replace(&mut self.state, next);

        // A fresh step invalidates anything which was undone
        self.redo.clear();
        if self.recording {
            self.history.push(HistoryEntry { pre, effect });
        }
        self.instruction_count += 1;
        Ok(StepOutcome::Executed)
    }

    /// Step until halted or pc leaves the program, or until `limit` instructions have been
    /// executed.
    ///
    /// Returns [`StepOutcome::Executed`] only if the limit was reached.
    pub fn run(&mut self, limit: Option<usize>) -> Result<StepOutcome, ExecError> {
        let mut count = 0;
        loop {
            if limit.is_some_and(|limit| count >= limit) {
                return Ok(StepOutcome::Executed);
            }
            match self.step()? {
                StepOutcome::Executed => count += 1,
                outcome => return Ok(outcome),
            }
        }
    }

    /// Undo the most recent recorded step, by applying its inverse.
    ///
    /// Returns `false` if there is nothing to undo.
    pub fn step_back(&mut self) -> Result<bool, ExecError> {
        let Some(entry) = self.history.pop() else {
            return Ok(false);
        };
        let inverse = entry.effect.invert(&entry.pre);
        let restored = match inverse.apply(&self.state) {
            Ok(restored) => restored,
            Err(err) => {
                self.history.push(entry);
                return Err(err);
            }
        };
        debug_assert_eq!(
            restored, entry.pre,
            "inverse effect did not restore the previous state"
        );

        self.state = restored;
        self.redo.push(entry);
        self.instruction_count = self.instruction_count.saturating_sub(1);
        Ok(true)
    }

    /// Re-apply the most recently undone step.
    ///
    /// Returns `false` if there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, ExecError> {
        let Some(entry) = self.redo.pop() else {
            return Ok(false);
        };
        let next = match entry.effect.apply(&self.state) {
            Ok(next) => next,
            Err(err) => {
                self.redo.push(entry);
                return Err(err);
            }
        };
        debug_assert_eq!(self.state, entry.pre, "redo from a diverged state");

        self.state = next;
        self.history.push(entry);
        self.instruction_count += 1;
        Ok(true)
    }

    /// Restore the initial state and forget all history.
    pub fn reset(&mut self) {
        self.state = self.initial.clone();
        self.history.clear();
        self.redo.clear();
        self.instruction_count = 0;
    }
}
