//! Reversible state transitions.
//!
//! Every execution step is described by an [`Effect`]: a plain data record of which parts of the
//! processor change. Applying an effect produces a new [`ProcessorState`], and inverting it
//! against the state it was applied to produces a second effect which restores that state.

use crate::error::ExecError;
use crate::state::{check_address, Flags, ProcessorState, Register};

/// Flags to overwrite. Absent flags keep their previous value.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub struct FlagUpdate {
    pub zero: Option<bool>,
    pub carry: Option<bool>,
    pub negative: Option<bool>,
    pub overflow: Option<bool>,
}

impl FlagUpdate {
    /// Overwrite every flag.
    pub fn all(flags: Flags) -> Self {
        Self {
            zero: Some(flags.zero),
            carry: Some(flags.carry),
            negative: Some(flags.negative),
            overflow: Some(flags.overflow),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn merge(&self, flags: Flags) -> Flags {
        Flags {
            zero: self.zero.unwrap_or(flags.zero),
            carry: self.carry.unwrap_or(flags.carry),
            negative: self.negative.unwrap_or(flags.negative),
            overflow: self.overflow.unwrap_or(flags.overflow),
        }
    }

    /// Each flag present in `self` carries its value from `original`.
    fn invert(&self, original: Flags) -> Self {
        Self {
            zero: self.zero.map(|_| original.zero),
            carry: self.carry.map(|_| original.carry),
            negative: self.negative.map(|_| original.negative),
            overflow: self.overflow.map(|_| original.overflow),
        }
    }
}

/// Single byte memory write.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Write {
    pub addr: u16,
    pub value: u8,
}

/// Single register update.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RegUpdate {
    pub reg: Register,
    pub value: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StackOp {
    Push(usize),
    /// Remove the top entry. No-op on an empty stack.
    Pop,
}

/// Description of a pending state delta. Every field is independent.
///
/// When `jump` is absent, the program counter advances to the next instruction.
#[derive(Clone, Default, PartialEq, Eq, Hash, Debug)]
pub struct Effect {
    pub flags: FlagUpdate,
    pub write: Option<Write>,
    pub reg_update: Option<RegUpdate>,
    pub jump: Option<usize>,
    pub stack: Option<StackOp>,
    pub halt: Option<bool>,
}

impl Effect {
    /// Effect which only advances the program counter.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_flags(mut self, flags: FlagUpdate) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_write(mut self, addr: u16, value: u8) -> Self {
        self.write = Some(Write { addr, value });
        self
    }

    pub fn with_reg(mut self, reg: Register, value: u8) -> Self {
        self.reg_update = Some(RegUpdate { reg, value });
        self
    }

    pub fn with_jump(mut self, pc: usize) -> Self {
        self.jump = Some(pc);
        self
    }

    pub fn with_stack(mut self, op: StackOp) -> Self {
        self.stack = Some(op);
        self
    }

    pub fn with_halt(mut self, halt: bool) -> Self {
        self.halt = Some(halt);
        self
    }

    /// Produce the state after this effect.
    ///
    /// `state` is never modified, so on error the caller still holds the untouched state.
    pub fn apply(&self, state: &ProcessorState) -> Result<ProcessorState, ExecError> {
        // Validate before building anything
        let write = match self.write {
            Some(write) => Some((check_address(write.addr)?, write.value)),
            None => None,
        };

        let mut next = state.clone();
        next.flags = self.flags.merge(state.flags);
        if let Some((index, value)) = write {
            next.memory[index] = value;
        }
        if let Some(RegUpdate { reg, value }) = self.reg_update {
            next.registers[reg.index()] = value;
        }
        match self.stack {
            Some(StackOp::Push(pc)) => next.call_stack.push(pc),
            Some(StackOp::Pop) => {
                next.call_stack.pop();
            }
            None => (),
        }
        next.pc = self.jump.unwrap_or(state.pc.wrapping_add(1));
        if let Some(halt) = self.halt {
            next.halted = halt;
        }
        Ok(next)
    }

    /// Build the effect which undoes `self`.
    ///
    /// Must be called with the state *before* `self` was applied, since it captures the values
    /// which are about to be overwritten.
    pub fn invert(&self, pre: &ProcessorState) -> Effect {
        let flags = self.flags.invert(pre.flags);
        // An out of range write fails to apply, so its inverse is never used
        let write = self.write.map(|write| Write {
            addr: write.addr,
            value: pre.memory.get(write.addr as usize).copied().unwrap_or(0),
        });
        let reg_update = self.reg_update.map(|update| RegUpdate {
            reg: update.reg,
            value: pre.reg(update.reg),
        });
        let stack = match self.stack {
            Some(StackOp::Push(_)) => Some(StackOp::Pop),
            // Popping an empty stack did nothing, so there is nothing to restore
            Some(StackOp::Pop) => pre.call_stack.last().map(|&top| StackOp::Push(top)),
            None => None,
        };
        // Only a truthy halt is undone, a forward `Some(false)` inverts to absent
        let halt = match self.halt {
            Some(true) => Some(false),
            _ => None,
        };

        Effect {
            flags,
            write,
            reg_update,
            jump: Some(pre.pc),
            stack,
            halt,
        }
    }
}

/// Free function form of [`Effect::apply`].
pub fn apply(state: &ProcessorState, effect: &Effect) -> Result<ProcessorState, ExecError> {
    effect.apply(state)
}

/// Free function form of [`Effect::invert`].
pub fn invert(pre: &ProcessorState, effect: &Effect) -> Effect {
    effect.invert(pre)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_register_update() {
        let state = ProcessorState::initialize();
        let next = Effect::none().with_reg(Register::R2, 42).apply(&state).unwrap();
        assert_eq!(next.registers[2], 42);
        assert_eq!(next.pc, 1);
        // Original untouched
        assert_eq!(state.registers[2], 0);
    }

    #[test]
    fn pc_wraps_at_end_of_address_space() {
        let state = ProcessorState {
            pc: usize::MAX,
            ..ProcessorState::initialize()
        };
        let next = Effect::none().apply(&state).unwrap();
        assert_eq!(next.pc, 0);
        let back = Effect::none().invert(&state).apply(&next).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn writes_to_memory() {
        let state = ProcessorState::initialize();
        let next = Effect::none().with_write(10, 0x7b).apply(&state).unwrap();
        assert_eq!(next.memory[10], 0x7b);
    }

    #[test]
    fn merges_partial_flags() {
        let mut state = ProcessorState::initialize();
        state.flags.carry = true;
        let effect = Effect::none().with_flags(FlagUpdate {
            zero: Some(true),
            negative: Some(false),
            ..Default::default()
        });
        let next = effect.apply(&state).unwrap();
        assert!(next.flags.zero);
        assert!(!next.flags.negative);
        assert!(next.flags.carry);
        assert!(!next.flags.overflow);
    }

    #[test]
    fn jumps_and_halts() {
        let state = ProcessorState::initialize();
        let next = Effect::none()
            .with_jump(100)
            .with_halt(true)
            .apply(&state)
            .unwrap();
        assert_eq!(next.pc, 100);
        assert!(next.halted);
    }

    #[test]
    fn applies_multiple_fields_at_once() {
        let mut state = ProcessorState::initialize();
        state.registers[1] = 5;
        state.memory[20] = 0x99;
        let effect = Effect::none()
            .with_reg(Register::R1, 42)
            .with_write(20, 0x55)
            .with_flags(FlagUpdate {
                zero: Some(true),
                carry: Some(false),
                ..Default::default()
            })
            .with_jump(200)
            .with_halt(true);

        let next = effect.apply(&state).unwrap();
        assert_eq!(next.registers[1], 42);
        assert_eq!(next.memory[20], 0x55);
        assert!(next.flags.zero);
        assert!(!next.flags.carry);
        assert_eq!(next.pc, 200);
        assert!(next.halted);
    }

    #[test]
    fn stack_push_and_pop() {
        let state = ProcessorState::initialize();
        let pushed = Effect::none()
            .with_stack(StackOp::Push(7))
            .apply(&state)
            .unwrap();
        assert_eq!(pushed.call_stack, vec![7]);
        let popped = Effect::none()
            .with_stack(StackOp::Pop)
            .apply(&pushed)
            .unwrap();
        assert!(popped.call_stack.is_empty());
    }

    #[test]
    fn pop_on_empty_stack_is_noop() {
        let state = ProcessorState::initialize();
        let effect = Effect::none().with_stack(StackOp::Pop);
        let next = effect.apply(&state).unwrap();
        assert!(next.call_stack.is_empty());
        assert_eq!(next.pc, 1);
        // Nothing to restore
        assert_eq!(effect.invert(&state).stack, None);
    }

    #[test]
    fn out_of_range_write_fails() {
        let state = ProcessorState::initialize();
        let effect = Effect::none().with_reg(Register::R0, 1).with_write(256, 1);
        assert_eq!(
            effect.apply(&state),
            Err(ExecError::OutOfRange { addr: 256 })
        );
        assert_eq!(state, ProcessorState::initialize());
        // Last valid address is accepted
        assert!(Effect::none().with_write(255, 1).apply(&state).is_ok());
    }

    #[test]
    fn inverts_write() {
        let mut state = ProcessorState::initialize();
        state.memory[50] = 123;
        state.pc = 4;
        let effect = Effect::none().with_write(50, 231);
        let inverse = effect.invert(&state);
        assert_eq!(inverse.write, Some(Write { addr: 50, value: 123 }));
        assert_eq!(inverse.jump, Some(4));
        assert!(inverse.flags.is_empty());
        assert_eq!(inverse.reg_update, None);
        assert_eq!(inverse.halt, None);
    }

    #[test]
    fn inverts_only_present_flags() {
        let mut state = ProcessorState::initialize();
        state.flags.zero = true;
        state.flags.overflow = true;
        let effect = Effect::none().with_flags(FlagUpdate {
            zero: Some(false),
            carry: Some(true),
            ..Default::default()
        });
        let inverse = effect.invert(&state);
        assert_eq!(
            inverse.flags,
            FlagUpdate {
                zero: Some(true),
                carry: Some(false),
                negative: None,
                overflow: None,
            }
        );
    }

    #[test]
    fn inverts_stack_ops() {
        let mut state = ProcessorState::initialize();
        state.call_stack = vec![3, 30];
        assert_eq!(
            Effect::none().with_stack(StackOp::Pop).invert(&state).stack,
            Some(StackOp::Push(30))
        );
        assert_eq!(
            Effect::none().with_stack(StackOp::Push(9)).invert(&state).stack,
            Some(StackOp::Pop)
        );
    }

    #[test]
    fn inverts_halt() {
        let state = ProcessorState::initialize();
        assert_eq!(Effect::none().with_halt(true).invert(&state).halt, Some(false));
        assert_eq!(Effect::none().with_halt(false).invert(&state).halt, None);
        assert_eq!(Effect::none().invert(&state).halt, None);
    }

    #[test]
    fn round_trip_restores_state() {
        let mut state = ProcessorState::initialize();
        state.registers = [1, 2, 3, 4, 5, 6, 7, 8];
        state.memory[0x80] = 0xAA;
        state.flags.negative = true;
        state.call_stack = vec![12];
        state.pc = 3;

        let effect = Effect::none()
            .with_reg(Register::R4, 0)
            .with_write(0x80, 0x11)
            .with_flags(FlagUpdate::all(Flags::default()))
            .with_stack(StackOp::Pop)
            .with_jump(12)
            .with_halt(true);

        let next = apply(&state, &effect).unwrap();
        let restored = apply(&next, &invert(&state, &effect)).unwrap();
        assert_eq!(restored, state);
    }
}
