use std::fmt::{self, Display, Write};

use crate::{
    isa::{Address, Condition, Instruction, Opcode, Value},
    program::{Line, LineKind},
};

impl Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Reg(reg) => write!(f, "{reg}"),
            Value::Imm(val) => write!(f, "{val}"),
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Reg(reg) => write!(f, "[{reg}]"),
            Address::Abs(addr) => write!(f, "[{addr}]"),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Ldr { dest, src } => write!(f, "ldr {dest}, {src}"),
            Instruction::Str { dest, src } => write!(f, "str {dest}, {src}"),
            Instruction::Branch {
                cond: Condition::Al,
                label,
            } => write!(f, "b {label}"),
            Instruction::Branch { cond, label } => write!(f, "b{cond} {label}"),
            Instruction::Call { label } => write!(f, "call {label}"),
            Instruction::Ret => f.write_str("ret"),
            Instruction::Hlt => f.write_str("hlt"),
            Instruction::Nop => f.write_str("nop"),
            Instruction::Cmp { a, b } => write!(f, "cmp {a}, {b}"),
            Instruction::Unary { op, dest, src } => write!(f, "{op} {dest}, {src}"),
            // Shorthand when the destination is also the first operand
            Instruction::Arith { op, dest, a, b } if dest == a => write!(f, "{op} {dest}, {b}"),
            Instruction::Arith { op, dest, a, b } => write!(f, "{op} {dest}, {a}, {b}"),
        }
    }
}

impl Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.comment) {
            (LineKind::Instruction(instr), None) => write!(f, " {instr}"),
            (LineKind::Instruction(instr), Some(comment)) => write!(f, " {instr} ;{comment}"),
            (LineKind::Label(label), None) => write!(f, "{label}:"),
            (LineKind::Label(label), Some(comment)) => write!(f, "{label}: ;{comment}"),
            (LineKind::Empty, None) => Ok(()),
            (LineKind::Empty, Some(comment)) => write!(f, ";{comment}"),
        }
    }
}

/// Render lines back into assembly source. Instructions are indented by one space.
pub fn print_lines(lines: &[Line]) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        // Writing to a `String` cannot fail
        let _ = write!(out, "{line}");
    }
    out
}
