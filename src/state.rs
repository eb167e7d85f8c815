use std::fmt;
use std::str::FromStr;

use crate::error::ExecError;

/// Amount of general purpose registers.
pub const REGISTER_COUNT: usize = 8;
/// The processor can address 256 bytes of memory.
pub const MEMORY_SIZE: usize = 0x100;

/// Represents the general purpose registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl Register {
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Register {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Register::ALL.get(value as usize).copied().ok_or(())
    }
}

impl FromStr for Register {
    type Err = ();

    /// Accepts `r0`..`r7`, case insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('r')
            .or_else(|| s.strip_prefix('R'))
            .ok_or(())?;
        // Reject `r01`, `r+1` and similar
        if digits.len() != 1 {
            return Err(());
        }
        let index: u8 = digits.parse().map_err(|_| ())?;
        Register::try_from(index)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.index())
    }
}

/// Condition flags, set by arithmetic and comparison instructions.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub struct Flags {
    pub zero: bool,
    pub carry: bool,
    pub negative: bool,
    pub overflow: bool,
}

/// Represents complete processor state at a point in execution.
///
/// A state is never updated in place by the engine. Each step produces a new value with
/// [`Effect::apply`](crate::effect::Effect::apply), so the previous state is always available to
/// compute an inverse.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ProcessorState {
    /// 8x 8-bit registers
    pub registers: [u8; REGISTER_COUNT],
    /// System memory, separate from the instruction sequence
    pub memory: [u8; MEMORY_SIZE],
    /// Condition flags
    pub flags: Flags,
    /// Index into the instruction sequence, not a memory address
    pub pc: usize,
    /// Return addresses saved by `call`, top is last
    pub call_stack: Vec<usize>,
    pub halted: bool,
}

impl ProcessorState {
    /// All registers, memory and flags zeroed, pc at the first instruction.
    pub fn initialize() -> Self {
        Self {
            registers: [0; REGISTER_COUNT],
            memory: [0; MEMORY_SIZE],
            flags: Flags::default(),
            pc: 0,
            call_stack: Vec::new(),
            halted: false,
        }
    }

    #[inline]
    pub fn reg(&self, reg: Register) -> u8 {
        self.registers[reg.index()]
    }

    /// Bounds-checked memory read.
    pub fn mem(&self, addr: u16) -> Result<u8, ExecError> {
        let index = check_address(addr)?;
        Ok(self.memory[index])
    }
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self::initialize()
    }
}

/// Shared bound check for memory reads and writes.
pub fn check_address(addr: u16) -> Result<usize, ExecError> {
    let index = addr as usize;
    if index >= MEMORY_SIZE {
        return Err(ExecError::OutOfRange { addr });
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialized_state_is_zeroed() {
        let state = ProcessorState::initialize();
        assert!(state.registers.iter().all(|&r| r == 0));
        assert!(state.memory.iter().all(|&m| m == 0));
        assert_eq!(state.flags, Flags::default());
        assert_eq!(state.pc, 0);
        assert!(state.call_stack.is_empty());
        assert!(!state.halted);
    }

    #[test]
    fn register_from_str() {
        assert_eq!("r0".parse(), Ok(Register::R0));
        assert_eq!("R7".parse(), Ok(Register::R7));
        assert_eq!("r8".parse::<Register>(), Err(()));
        assert_eq!("r01".parse::<Register>(), Err(()));
        assert_eq!("x1".parse::<Register>(), Err(()));
        assert_eq!("r".parse::<Register>(), Err(()));
    }

    #[test]
    fn address_bounds() {
        assert_eq!(check_address(0), Ok(0));
        assert_eq!(check_address(0xFF), Ok(0xFF));
        assert_eq!(
            check_address(0x100),
            Err(ExecError::OutOfRange { addr: 0x100 })
        );
        let state = ProcessorState::initialize();
        assert!(state.mem(0x100).is_err());
        assert_eq!(state.mem(0xFF), Ok(0));
    }
}
