//! Instruction executor: maps one decoded instruction to the [`Effect`] it causes.
//!
//! Nothing in here modifies state. Arithmetic is performed in a widened integer so the
//! carry can be read off the bits above the low byte.

use crate::effect::{Effect, FlagUpdate, StackOp};
use crate::error::ExecError;
use crate::isa::{Address, Condition, Instruction, Opcode, Value};
use crate::program::Labels;
use crate::state::{Flags, ProcessorState, Register};

/// Compute the effect of executing `instruction` against `state`.
pub fn instruction_effect(
    state: &ProcessorState,
    labels: &Labels,
    instruction: &Instruction,
) -> Result<Effect, ExecError> {
    match instruction {
        Instruction::Ldr { dest, src } => ldr(state, *dest, *src),
        Instruction::Str { dest, src } => Ok(str(state, *dest, *src)),
        Instruction::Branch { cond, label } => branch(state, labels, *cond, label),
        Instruction::Call { label } => call(state, labels, label),
        Instruction::Ret => Ok(ret(state)),
        Instruction::Hlt => Ok(Effect::none().with_halt(true)),
        Instruction::Nop => Ok(Effect::none()),
        Instruction::Cmp { a, b } => Ok(cmp(state, *a, *b)),
        Instruction::Unary { op, dest, src } => unary(state, *op, *dest, *src),
        Instruction::Arith { op, dest, a, b } => arith(state, *op, *dest, *a, *b),
    }
}

fn ldr(state: &ProcessorState, dest: Register, src: Address) -> Result<Effect, ExecError> {
    let value = state.mem(src.resolve(state))?;
    Ok(Effect::none().with_reg(dest, value))
}

fn str(state: &ProcessorState, dest: Address, src: Register) -> Effect {
    // Bound checked when the write is applied
    Effect::none().with_write(dest.resolve(state), state.reg(src))
}

fn resolve_label(labels: &Labels, label: &str) -> Result<usize, ExecError> {
    labels
        .get(label)
        .copied()
        .ok_or_else(|| ExecError::UnknownLabel {
            label: label.to_string(),
        })
}

fn branch(
    state: &ProcessorState,
    labels: &Labels,
    cond: Condition,
    label: &str,
) -> Result<Effect, ExecError> {
    if !cond.holds(state.flags) {
        return Ok(Effect::none());
    }
    Ok(Effect::none().with_jump(resolve_label(labels, label)?))
}

fn call(state: &ProcessorState, labels: &Labels, label: &str) -> Result<Effect, ExecError> {
    let target = resolve_label(labels, label)?;
    Ok(Effect::none()
        .with_jump(target)
        .with_stack(StackOp::Push(state.pc.wrapping_add(1))))
}

fn ret(state: &ProcessorState) -> Effect {
    match state.call_stack.last() {
        Some(&return_addr) => Effect::none()
            .with_jump(return_addr)
            .with_stack(StackOp::Pop),
        None => Effect::none(),
    }
}

fn cmp(state: &ProcessorState, a: Register, b: Value) -> Effect {
    let a = state.reg(a);
    let b = negate(b.resolve(state));
    let c = a as u16 + b as u16;
    Effect::none().with_flags(FlagUpdate::all(operation_flags(a, b, c)))
}

fn unary(
    state: &ProcessorState,
    op: Opcode,
    dest: Register,
    src: Value,
) -> Result<Effect, ExecError> {
    let src = src.resolve(state);
    let value = match op {
        Opcode::Mov => return Ok(Effect::none().with_reg(dest, src)),
        Opcode::Neg => negate(src),
        Opcode::Not => !src,
        _ => return Err(unsupported(op, "dest, src")),
    };
    Ok(Effect::none()
        .with_reg(dest, value)
        .with_flags(FlagUpdate::all(Flags {
            zero: value == 0,
            carry: false,
            negative: value >= 0x80,
            overflow: false,
        })))
}

fn arith(
    state: &ProcessorState,
    op: Opcode,
    dest: Register,
    a: Register,
    b: Value,
) -> Result<Effect, ExecError> {
    let a = state.reg(a);
    let b = b.resolve(state);
    // Subtraction is addition of the two's complement
    let b = if op == Opcode::Sub { negate(b) } else { b };

    let c: u16 = match op {
        Opcode::Add | Opcode::Sub => a as u16 + b as u16,
        Opcode::And => (a & b) as u16,
        Opcode::Or => (a | b) as u16,
        Opcode::Xor => (a ^ b) as u16,
        Opcode::Lsl => lsl(a, b) as u16,
        Opcode::Lsr => lsr(a, b) as u16,
        Opcode::Asr => asr(a, b) as u16,
        Opcode::Rol => rol(a, b) as u16,
        Opcode::Ror => ror(a, b) as u16,
        _ => return Err(unsupported(op, "dest, a, b")),
    };

    Ok(Effect::none()
        .with_reg(dest, (c & 0xFF) as u8)
        .with_flags(FlagUpdate::all(operation_flags(a, b, c))))
}

fn unsupported(op: Opcode, form: &str) -> ExecError {
    let name = op.mnemonic();
    ExecError::UnsupportedInstruction {
        reason: format!("`{name}` cannot be used in the form `{name} {form}`"),
    }
}

/// Two's complement negation, `(-x) & 0xFF`.
#[inline]
pub fn negate(x: u8) -> u8 {
    x.wrapping_neg()
}

/// Flags for raw result `c` of an operation on `a` and `b`, where `b` is already in addition
/// form (negated for subtraction and comparison).
pub fn operation_flags(a: u8, b: u8, c: u16) -> Flags {
    let result = (c & 0xFF) as u8;
    let sign = |x: u8| x & 0x80 != 0;
    Flags {
        zero: result == 0,
        carry: c & !0xFF != 0,
        negative: sign(result),
        overflow: sign(a) == sign(b) && sign(result) != sign(a),
    }
}

#[inline]
fn lsl(a: u8, n: u8) -> u8 {
    a.checked_shl(n as u32).unwrap_or(0)
}

/// Logical, vacated bits are zero.
#[inline]
fn lsr(a: u8, n: u8) -> u8 {
    a.checked_shr(n as u32).unwrap_or(0)
}

/// Arithmetic, bit 7 is replicated into vacated bits.
#[inline]
fn asr(a: u8, n: u8) -> u8 {
    // Shifting an i8 by 7 already fills every bit with the sign
    ((a as i8) >> n.min(7)) as u8
}

#[inline]
fn rol(a: u8, n: u8) -> u8 {
    a.rotate_left(n as u32 % 8)
}

#[inline]
fn ror(a: u8, n: u8) -> u8 {
    a.rotate_right(n as u32 % 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::RegUpdate;

    fn labels(entries: &[(&str, usize)]) -> Labels {
        entries
            .iter()
            .map(|(name, pc)| (name.to_string(), *pc))
            .collect()
    }

    fn run(state: &ProcessorState, instruction: Instruction) -> Effect {
        instruction_effect(state, &Labels::default(), &instruction).unwrap()
    }

    fn arith_instr(op: Opcode, b: Value) -> Instruction {
        Instruction::Arith {
            op,
            dest: Register::R3,
            a: Register::R1,
            b,
        }
    }

    fn flags(zero: bool, carry: bool, negative: bool, overflow: bool) -> FlagUpdate {
        FlagUpdate::all(Flags {
            zero,
            carry,
            negative,
            overflow,
        })
    }

    #[test]
    fn loads_register_from_memory() {
        let mut state = ProcessorState::initialize();
        state.memory[0] = 0xa3;
        let effect = run(
            &state,
            Instruction::Ldr {
                dest: Register::R3,
                src: Address::Abs(0),
            },
        );
        assert_eq!(effect, Effect::none().with_reg(Register::R3, 0xa3));
    }

    #[test]
    fn loads_register_indirect() {
        let mut state = ProcessorState::initialize();
        state.registers[2] = 0xFF;
        state.memory[0xFF] = 9;
        let effect = run(
            &state,
            Instruction::Ldr {
                dest: Register::R0,
                src: Address::Reg(Register::R2),
            },
        );
        assert_eq!(effect, Effect::none().with_reg(Register::R0, 9));
    }

    #[test]
    fn stores_register_to_memory() {
        let mut state = ProcessorState::initialize();
        state.registers[1] = 0x5f;
        state.registers[4] = 10;
        let effect = run(
            &state,
            Instruction::Str {
                dest: Address::Reg(Register::R4),
                src: Register::R1,
            },
        );
        assert_eq!(effect, Effect::none().with_write(10, 0x5f));
    }

    #[test]
    fn moves_constant_to_register() {
        let state = ProcessorState::initialize();
        let effect = run(
            &state,
            Instruction::Unary {
                op: Opcode::Mov,
                dest: Register::R2,
                src: Value::Imm(42),
            },
        );
        // `mov` does not touch flags
        assert_eq!(effect, Effect::none().with_reg(Register::R2, 42));
    }

    #[test]
    fn branches_if_condition_met() {
        let mut state = ProcessorState::initialize();
        state.flags.zero = true;
        let labels = labels(&[("label1", 10)]);
        let instr = Instruction::Branch {
            cond: Condition::Eq,
            label: "label1".into(),
        };
        assert_eq!(
            instruction_effect(&state, &labels, &instr),
            Ok(Effect::none().with_jump(10))
        );

        state.flags.zero = false;
        assert_eq!(
            instruction_effect(&state, &labels, &instr),
            Ok(Effect::none())
        );
    }

    #[test]
    fn branch_to_unknown_label() {
        let state = ProcessorState::initialize();
        let instr = Instruction::Branch {
            cond: Condition::Al,
            label: "nowhere".into(),
        };
        assert_eq!(
            instruction_effect(&state, &Labels::default(), &instr),
            Err(ExecError::UnknownLabel {
                label: "nowhere".into()
            })
        );
        // Not taken, so the label is never looked up
        let instr = Instruction::Branch {
            cond: Condition::Eq,
            label: "nowhere".into(),
        };
        assert_eq!(
            instruction_effect(&state, &Labels::default(), &instr),
            Ok(Effect::none())
        );
    }

    #[test]
    fn call_pushes_return_address() {
        let state = ProcessorState::initialize();
        let labels = labels(&[("label1", 10)]);
        let instr = Instruction::Call {
            label: "label1".into(),
        };
        assert_eq!(
            instruction_effect(&state, &labels, &instr),
            Ok(Effect::none().with_jump(10).with_stack(StackOp::Push(1)))
        );
        assert!(instruction_effect(&state, &Labels::default(), &instr).is_err());
    }

    #[test]
    fn ret_pops_return_address() {
        let mut state = ProcessorState::initialize();
        state.call_stack = vec![30];
        assert_eq!(
            run(&state, Instruction::Ret),
            Effect::none().with_jump(30).with_stack(StackOp::Pop)
        );
        assert_eq!(
            run(&ProcessorState::initialize(), Instruction::Ret),
            Effect::none()
        );
    }

    #[test]
    fn halt_and_nop() {
        let state = ProcessorState::initialize();
        assert_eq!(run(&state, Instruction::Hlt), Effect::none().with_halt(true));
        assert_eq!(run(&state, Instruction::Nop), Effect::none());
    }

    #[test]
    fn add_without_flags() {
        let mut state = ProcessorState::initialize();
        state.registers[1] = 5;
        state.registers[2] = 10;
        let effect = run(&state, arith_instr(Opcode::Add, Value::Reg(Register::R2)));
        assert_eq!(effect.reg_update, Some(RegUpdate { reg: Register::R3, value: 15 }));
        assert_eq!(effect.flags, flags(false, false, false, false));
    }

    #[test]
    fn add_signed_overflow() {
        let mut state = ProcessorState::initialize();
        state.registers[1] = 127;
        state.registers[2] = 1;
        let effect = run(&state, arith_instr(Opcode::Add, Value::Reg(Register::R2)));
        assert_eq!(effect.reg_update, Some(RegUpdate { reg: Register::R3, value: 0x80 }));
        assert_eq!(effect.flags, flags(false, false, true, true));
    }

    #[test]
    fn add_carry_out() {
        let mut state = ProcessorState::initialize();
        state.registers[1] = 0xFF;
        let effect = run(&state, arith_instr(Opcode::Add, Value::Imm(1)));
        assert_eq!(effect.reg_update.map(|u| u.value), Some(0));
        assert_eq!(effect.flags, flags(true, true, false, false));

        // -128 + -1 overflows into a positive result
        state.registers[1] = 0x80;
        let effect = run(&state, arith_instr(Opcode::Add, Value::Imm(0xFF)));
        assert_eq!(effect.reg_update.map(|u| u.value), Some(0x7F));
        assert_eq!(effect.flags, flags(false, true, false, true));
    }

    #[test]
    fn sub_is_twos_complement_addition() {
        let mut state = ProcessorState::initialize();
        state.registers[1] = 5;
        let effect = run(&state, arith_instr(Opcode::Sub, Value::Imm(3)));
        assert_eq!(effect.reg_update.map(|u| u.value), Some(2));
        // No borrow sets carry
        assert_eq!(effect.flags, flags(false, true, false, false));

        let effect = run(&state, arith_instr(Opcode::Sub, Value::Imm(6)));
        assert_eq!(effect.reg_update.map(|u| u.value), Some(0xFF));
        assert_eq!(effect.flags, flags(false, false, true, false));

        // Subtracting zero negates to zero, so no carry is produced
        let effect = run(&state, arith_instr(Opcode::Sub, Value::Imm(0)));
        assert_eq!(effect.reg_update.map(|u| u.value), Some(5));
        assert_eq!(effect.flags, flags(false, false, false, false));
    }

    #[test]
    fn cmp_only_sets_flags() {
        let mut state = ProcessorState::initialize();
        state.registers[0] = 7;
        let effect = run(
            &state,
            Instruction::Cmp {
                a: Register::R0,
                b: Value::Imm(7),
            },
        );
        assert_eq!(effect.reg_update, None);
        assert_eq!(effect.write, None);
        assert_eq!(effect.flags, flags(true, true, false, false));

        let effect = run(
            &state,
            Instruction::Cmp {
                a: Register::R0,
                b: Value::Imm(9),
            },
        );
        assert!(Condition::Lt.holds(effect.apply_flags()));
        assert!(Condition::Lo.holds(effect.apply_flags()));
    }

    #[test]
    fn neg_and_not() {
        let mut state = ProcessorState::initialize();
        state.registers[1] = 1;
        let neg = run(
            &state,
            Instruction::Unary {
                op: Opcode::Neg,
                dest: Register::R0,
                src: Value::Reg(Register::R1),
            },
        );
        assert_eq!(neg.reg_update.map(|u| u.value), Some(0xFF));
        assert_eq!(neg.flags, flags(false, false, true, false));

        let not = run(
            &state,
            Instruction::Unary {
                op: Opcode::Not,
                dest: Register::R0,
                src: Value::Imm(0xFF),
            },
        );
        assert_eq!(not.reg_update.map(|u| u.value), Some(0));
        assert_eq!(not.flags, flags(true, false, false, false));
    }

    #[test]
    fn logic_ops() {
        let mut state = ProcessorState::initialize();
        state.registers[1] = 0b1100_1010;
        let cases = [
            (Opcode::And, 0b1010_0110, 0b1000_0010),
            (Opcode::Or, 0b0000_0101, 0b1100_1111),
            (Opcode::Xor, 0b1100_1010, 0),
        ];
        for (op, b, expected) in cases {
            let effect = run(&state, arith_instr(op, Value::Imm(b)));
            assert_eq!(effect.reg_update.map(|u| u.value), Some(expected), "{op:?}");
            assert_eq!(effect.flags.carry, Some(false), "{op:?}");
        }
    }

    #[test]
    fn rotate_left() {
        let mut state = ProcessorState::initialize();
        state.registers[1] = 0b0110_1001;
        let effect = run(&state, arith_instr(Opcode::Rol, Value::Imm(2)));
        assert_eq!(effect.reg_update, Some(RegUpdate { reg: Register::R3, value: 0b1010_0101 }));
        assert_eq!(effect.flags, flags(false, false, true, true));
    }

    #[test]
    fn shifts_and_rotates() {
        #[rustfmt::skip]
        let cases: &[(Opcode, u8, u8, u8)] = &[
            // (op, a, n, expected)
            (Opcode::Lsl, 0b1000_0001, 1, 0b0000_0010),
            (Opcode::Lsl, 0xFF, 8, 0x00),
            (Opcode::Lsl, 0xFF, 200, 0x00),
            (Opcode::Lsr, 0b1000_0001, 1, 0b0100_0000),
            (Opcode::Lsr, 0x80, 7, 0x01),
            (Opcode::Lsr, 0x80, 8, 0x00),
            (Opcode::Asr, 0b1000_0000, 1, 0b1100_0000),
            (Opcode::Asr, 0b1000_0000, 3, 0b1111_0000),
            (Opcode::Asr, 0b0100_0000, 3, 0b0000_1000),
            (Opcode::Asr, 0x80, 9, 0xFF),
            (Opcode::Asr, 0x7F, 9, 0x00),
            (Opcode::Rol, 0b1000_0001, 1, 0b0000_0011),
            (Opcode::Rol, 0b1000_0001, 9, 0b0000_0011),
            (Opcode::Rol, 0b1000_0001, 8, 0b1000_0001),
            (Opcode::Ror, 0b1000_0001, 1, 0b1100_0000),
            (Opcode::Ror, 0b0110_1001, 2, 0b0101_1010),
            (Opcode::Ror, 0b0000_0001, 10, 0b0100_0000),
        ];
        for &(op, a, n, expected) in cases {
            let mut state = ProcessorState::initialize();
            state.registers[1] = a;
            let effect = run(&state, arith_instr(op, Value::Imm(n)));
            assert_eq!(
                effect.reg_update.map(|u| u.value),
                Some(expected),
                "{op:?} 0b{a:08b} by {n}"
            );
            // Shifts are masked before flags are computed
            assert_eq!(effect.flags.carry, Some(false));
        }
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let state = ProcessorState::initialize();
        let instr = Instruction::Unary {
            op: Opcode::Add,
            dest: Register::R0,
            src: Value::Imm(1),
        };
        assert!(matches!(
            instruction_effect(&state, &Labels::default(), &instr),
            Err(ExecError::UnsupportedInstruction { .. })
        ));
        let instr = Instruction::Arith {
            op: Opcode::Mov,
            dest: Register::R0,
            a: Register::R0,
            b: Value::Imm(1),
        };
        assert!(matches!(
            instruction_effect(&state, &Labels::default(), &instr),
            Err(ExecError::UnsupportedInstruction { .. })
        ));
    }

    impl Effect {
        /// Flags after applying this effect to all-clear flags.
        fn apply_flags(&self) -> Flags {
            self.apply(&ProcessorState::initialize()).unwrap().flags
        }
    }
}
