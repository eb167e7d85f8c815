use std::str::FromStr;

use crate::state::{Flags, ProcessorState, Register};

/// Decoded instruction, as produced by the assembler.
///
/// Branch and call targets are label names, resolved against the program's label table when the
/// instruction is executed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Instruction {
    /// Load a byte from memory into `dest`
    Ldr { dest: Register, src: Address },
    /// Store `src` into memory
    Str { dest: Address, src: Register },
    /// Jump to `label` if `cond` holds against the current flags
    Branch { cond: Condition, label: String },
    /// Push the return address and jump to `label`
    Call { label: String },
    /// Pop a return address and jump to it
    Ret,
    Hlt,
    Nop,
    /// Set flags from `a - b`, discarding the result
    Cmp { a: Register, b: Value },
    /// `mov`, `neg` or `not`
    Unary {
        op: Opcode,
        dest: Register,
        src: Value,
    },
    /// Three operand arithmetic/logic: `dest = a <op> b`
    Arith {
        op: Opcode,
        dest: Register,
        a: Register,
        b: Value,
    },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Ldr { .. } => Opcode::Ldr,
            Self::Str { .. } => Opcode::Str,
            Self::Branch { .. } => Opcode::B,
            Self::Call { .. } => Opcode::Call,
            Self::Ret => Opcode::Ret,
            Self::Hlt => Opcode::Hlt,
            Self::Nop => Opcode::Nop,
            Self::Cmp { .. } => Opcode::Cmp,
            Self::Unary { op, .. } | Self::Arith { op, .. } => *op,
        }
    }

    /// Label referenced by a branch or call.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Branch { label, .. } | Self::Call { label } => Some(label),
            _ => None,
        }
    }
}

/// Register or 8-bit immediate operand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Value {
    Reg(Register),
    Imm(u8),
}

impl Value {
    pub fn resolve(&self, state: &ProcessorState) -> u8 {
        match self {
            Self::Reg(reg) => state.reg(*reg),
            Self::Imm(val) => *val,
        }
    }
}

/// Register-indirect or absolute memory address.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Address {
    Reg(Register),
    Abs(u8),
}

impl Address {
    pub fn resolve(&self, state: &ProcessorState) -> u16 {
        match self {
            Self::Reg(reg) => state.reg(*reg) as u16,
            Self::Abs(addr) => *addr as u16,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    Ldr,
    Str,
    B,
    Call,
    Ret,
    Hlt,
    Nop,
    Cmp,
    Mov,
    Neg,
    Not,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Lsl,
    Lsr,
    Asr,
    Rol,
    Ror,
}

impl Opcode {
    const MNEMONICS: [(Opcode, &'static str); 21] = [
        (Opcode::Ldr, "ldr"),
        (Opcode::Str, "str"),
        (Opcode::B, "b"),
        (Opcode::Call, "call"),
        (Opcode::Ret, "ret"),
        (Opcode::Hlt, "hlt"),
        (Opcode::Nop, "nop"),
        (Opcode::Cmp, "cmp"),
        (Opcode::Mov, "mov"),
        (Opcode::Neg, "neg"),
        (Opcode::Not, "not"),
        (Opcode::Add, "add"),
        (Opcode::Sub, "sub"),
        (Opcode::And, "and"),
        (Opcode::Or, "or"),
        (Opcode::Xor, "xor"),
        (Opcode::Lsl, "lsl"),
        (Opcode::Lsr, "lsr"),
        (Opcode::Asr, "asr"),
        (Opcode::Rol, "rol"),
        (Opcode::Ror, "ror"),
    ];

    pub fn mnemonic(self) -> &'static str {
        Self::MNEMONICS
            .iter()
            .find(|(op, _)| *op == self)
            .map(|(_, name)| *name)
            .unwrap_or("???")
    }

    /// Takes a single value operand, written as `op dest, src`.
    pub fn is_unary(self) -> bool {
        matches!(self, Opcode::Mov | Opcode::Neg | Opcode::Not)
    }

    /// Takes a register and a value operand, written as `op dest, a, b`.
    pub fn is_arith(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::And
                | Opcode::Or
                | Opcode::Xor
                | Opcode::Lsl
                | Opcode::Lsr
                | Opcode::Asr
                | Opcode::Rol
                | Opcode::Ror
        )
    }
}

impl FromStr for Opcode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::MNEMONICS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(op, _)| *op)
            .ok_or(())
    }
}

/// Named predicate over the flags, gating conditional branches.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Condition {
    /// Always
    Al,
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Signed greater than
    Gt,
    /// Signed less than
    Lt,
    /// Signed greater or equal
    Ge,
    /// Signed less or equal
    Le,
    /// Unsigned higher
    Hi,
    /// Unsigned lower
    Lo,
    /// Unsigned higher or same
    Hs,
    /// Unsigned lower or same
    Ls,
    /// Plus (non-negative)
    Pl,
    /// Minus (negative)
    Mi,
    /// Overflow set
    Vs,
    /// Overflow clear
    Vc,
}

impl Condition {
    pub const ALL: [Condition; 15] = [
        Condition::Al,
        Condition::Eq,
        Condition::Ne,
        Condition::Gt,
        Condition::Lt,
        Condition::Ge,
        Condition::Le,
        Condition::Hi,
        Condition::Lo,
        Condition::Hs,
        Condition::Ls,
        Condition::Pl,
        Condition::Mi,
        Condition::Vs,
        Condition::Vc,
    ];

    pub fn holds(self, flags: Flags) -> bool {
        let Flags {
            zero,
            carry,
            negative,
            overflow,
        } = flags;
        match self {
            Self::Al => true,
            Self::Eq => zero,
            Self::Ne => !zero,
            Self::Gt => !zero && negative == overflow,
            Self::Lt => negative != overflow,
            Self::Ge => negative == overflow,
            Self::Le => zero || negative != overflow,
            Self::Hi => carry && !zero,
            Self::Lo => !carry,
            Self::Hs => carry,
            Self::Ls => !carry || zero,
            Self::Pl => !negative,
            Self::Mi => negative,
            Self::Vs => overflow,
            Self::Vc => !overflow,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Al => "al",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Le => "le",
            Self::Hi => "hi",
            Self::Lo => "lo",
            Self::Hs => "hs",
            Self::Ls => "ls",
            Self::Pl => "pl",
            Self::Mi => "mi",
            Self::Vs => "vs",
            Self::Vc => "vc",
        }
    }
}

impl FromStr for Condition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|cond| cond.mnemonic().eq_ignore_ascii_case(s))
            .copied()
            .ok_or(())
    }
}
