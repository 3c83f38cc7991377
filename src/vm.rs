//! # Interpreter
//!
//! A fetch/decode/dispatch loop over a single contiguous word stack with
//! Wirth-style nested-frame bookkeeping. `base(hops)` walks the static
//! link chain; `Call`/`Ret`/`Retf` build and tear down activation frames
//! per the layout in `crate::code`.

use crate::code::{Instruction, Opcode, FRAME_OLD_BP, FRAME_RET_ADDR, FRAME_RET_VAL};
use crate::error::RuntimeError;

/// Word width used for shift-count wraparound: shift counts are taken
/// modulo the word width rather than overflowing or panicking.
const WORD_BITS: u32 = 32;

pub struct Vm {
    code: Vec<Instruction>,
    stack: Vec<i32>,
    capacity: usize,
    pc: usize,
    bp: usize,
    /// -1 means empty; kept as `i64` so the empty sentinel and frame
    /// arithmetic never need a signed/unsigned dance.
    sp: i64,
}

impl Vm {
    /// Build a fresh machine over `code`, with a data stack pre-sized to
    /// `stack_words` (default 512). Reserves the synthetic caller frame
    /// `stack[0..4] = 0` so the main block's `Ret` sets `pc = 0` and
    /// terminates.
    pub fn new(code: Vec<Instruction>, stack_words: usize) -> Self {
        let capacity = stack_words.max(4);
        let mut stack = vec![0; capacity];
        stack[0] = 0;
        stack[1] = 0;
        stack[2] = 0;
        stack[3] = 0;
        Self { code, stack, capacity, pc: 0, bp: 0, sp: 3 }
    }

    /// Run to completion: either the main block's `Ret` drives `pc` back
    /// to 0, or `Halt` executes, or a `RuntimeError` aborts the machine.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let mut first_cycle = true;
        loop {
            if self.pc == 0 && !first_cycle {
                return Ok(());
            }
            first_cycle = false;
            if self.step()? {
                return Ok(());
            }
        }
    }

    /// Execute one instruction. Returns `Ok(true)` if `Halt` was executed.
    fn step(&mut self) -> Result<bool, RuntimeError> {
        if self.pc >= self.code.len() {
            return Err(RuntimeError::PcOutOfRange { pc: self.pc as i64, len: self.code.len() });
        }
        let instr = self.code[self.pc];
        tracing::trace!(
            pc = self.pc,
            bp = self.bp,
            sp = self.sp,
            op = instr.op.mnemonic(),
            level = instr.level,
            addr = instr.addr,
            "register dump"
        );
        self.pc += 1;

        match instr.op {
            Opcode::PushConst => self.push(instr.addr)?,
            Opcode::PushVar => {
                let base = self.base(instr.level)?;
                self.push((base + instr.addr as i64) as i32)?;
            }
            Opcode::Eval => {
                let addr = self.peek()?;
                let value = self.read(addr as i64)?;
                self.set_top(value)?;
            }
            Opcode::Assign => {
                let addr = self.pop()?;
                let value = self.pop()?;
                self.write(addr as i64, value)?;
            }
            Opcode::Call => self.do_call(instr.level, instr.addr)?,
            Opcode::Enter => self.grow(instr.addr)?,
            Opcode::Ret => self.do_ret(instr.addr)?,
            Opcode::Retf => {
                let retval = self.read(self.bp as i64 + FRAME_RET_VAL as i64)?;
                self.do_ret(instr.addr)?;
                self.push(retval)?;
            }
            Opcode::Jump => self.pc = instr.addr as usize,
            Opcode::Jneq => {
                if self.pop()? == 0 {
                    self.pc = instr.addr as usize;
                }
            }
            Opcode::Halt => return Ok(true),

            Opcode::Neg => self.unary(|v| v.wrapping_neg())?,
            Opcode::Not => self.unary(|v| i32::from(v == 0))?,
            Opcode::Comp => self.unary(|v| !v)?,

            Opcode::Add => self.binary(i32::wrapping_add)?,
            Opcode::Sub => self.binary(i32::wrapping_sub)?,
            Opcode::Mul => self.binary(i32::wrapping_mul)?,
            Opcode::Div => self.checked_binary(|lhs, rhs| {
                if rhs == 0 {
                    Err(RuntimeError::DivideByZero)
                } else {
                    Ok(lhs.wrapping_div(rhs))
                }
            })?,
            Opcode::Mod => self.checked_binary(|lhs, rhs| {
                if rhs == 0 {
                    Err(RuntimeError::DivideByZero)
                } else {
                    Ok(lhs.wrapping_rem(rhs))
                }
            })?,
            Opcode::BAnd => self.binary(|a, b| a & b)?,
            Opcode::BOr => self.binary(|a, b| a | b)?,
            Opcode::BXor => self.binary(|a, b| a ^ b)?,
            Opcode::Shl => self.binary(|a, b| a.wrapping_shl(b.rem_euclid(WORD_BITS as i32) as u32))?,
            Opcode::Shr => self.binary(|a, b| a.wrapping_shr(b.rem_euclid(WORD_BITS as i32) as u32))?,
            Opcode::LOr => self.binary(|a, b| i32::from(a != 0 || b != 0))?,
            Opcode::LAnd => self.binary(|a, b| i32::from(a != 0 && b != 0))?,

            Opcode::Eq => self.binary(|a, b| i32::from(a == b))?,
            Opcode::Neq => self.binary(|a, b| i32::from(a != b))?,
            Opcode::Lt => self.binary(|a, b| i32::from(a < b))?,
            Opcode::Leq => self.binary(|a, b| i32::from(a <= b))?,
            Opcode::Gt => self.binary(|a, b| i32::from(a > b))?,
            Opcode::Geq => self.binary(|a, b| i32::from(a >= b))?,
        }

        Ok(false)
    }

    /// `base(hops)` starts at `bp` and repeats `b := stack[b]` `hops`
    /// times; tolerates `hops == 0` by returning `bp` unchanged.
    fn base(&self, hops: u8) -> Result<i64, RuntimeError> {
        let mut b = self.bp as i64;
        for _ in 0..hops {
            b = self.read(b)?;
        }
        Ok(b)
    }

    fn do_call(&mut self, level: u8, addr: i32) -> Result<(), RuntimeError> {
        let link = self.base(level)?;
        let frame_base = self.sp + 1;
        self.push(link as i32)?;
        self.push(self.bp as i32)?;
        self.push(self.pc as i32)?;
        self.push(0)?;
        self.bp = frame_base as usize;
        self.pc = addr as usize;
        Ok(())
    }

    fn do_ret(&mut self, nargs: i32) -> Result<(), RuntimeError> {
        let ret_addr = self.read(self.bp as i64 + FRAME_RET_ADDR as i64)?;
        let old_bp = self.read(self.bp as i64 + FRAME_OLD_BP as i64)?;
        self.sp = self.bp as i64 - 1;
        self.pc = ret_addr as usize;
        self.bp = old_bp as usize;
        self.sp -= nargs as i64;
        Ok(())
    }

    fn grow(&mut self, dx: i32) -> Result<(), RuntimeError> {
        let next_sp = self.sp + (dx as i64 - crate::code::FRAME_HEADER_SIZE as i64);
        if next_sp as usize >= self.capacity {
            return Err(RuntimeError::StackOverflow { capacity: self.capacity });
        }
        self.sp = next_sp;
        Ok(())
    }

    fn unary(&mut self, f: impl Fn(i32) -> i32) -> Result<(), RuntimeError> {
        let v = self.peek()?;
        self.set_top(f(v))
    }

    fn binary(&mut self, f: impl Fn(i32, i32) -> i32) -> Result<(), RuntimeError> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        self.push(f(lhs, rhs))
    }

    fn checked_binary(
        &mut self,
        f: impl Fn(i32, i32) -> Result<i32, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        self.push(f(lhs, rhs)?)
    }

    fn push(&mut self, v: i32) -> Result<(), RuntimeError> {
        let next_sp = self.sp + 1;
        if next_sp < 0 || next_sp as usize >= self.capacity {
            return Err(RuntimeError::StackOverflow { capacity: self.capacity });
        }
        self.sp = next_sp;
        self.stack[self.sp as usize] = v;
        Ok(())
    }

    fn pop(&mut self) -> Result<i32, RuntimeError> {
        if self.sp < 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        let v = self.stack[self.sp as usize];
        self.sp -= 1;
        Ok(v)
    }

    fn peek(&self) -> Result<i32, RuntimeError> {
        if self.sp < 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(self.stack[self.sp as usize])
    }

    fn set_top(&mut self, v: i32) -> Result<(), RuntimeError> {
        if self.sp < 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        self.stack[self.sp as usize] = v;
        Ok(())
    }

    fn read(&self, idx: i64) -> Result<i32, RuntimeError> {
        if idx < 0 || idx as usize >= self.capacity {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(self.stack[idx as usize])
    }

    fn write(&mut self, idx: i64, v: i32) -> Result<(), RuntimeError> {
        if idx < 0 || idx as usize >= self.capacity {
            return Err(RuntimeError::StackUnderflow);
        }
        self.stack[idx as usize] = v;
        Ok(())
    }

    /// Read a word directly off the stack, for inspection after `run`
    /// returns (tests, and the driver's `-v` dump).
    pub fn peek_word(&self, idx: usize) -> Option<i32> {
        self.stack.get(idx).copied()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::compiler::Compiler;

    #[rstest]
    #[case(Opcode::Add, 4, 3, 7)]
    #[case(Opcode::Sub, 4, 3, 1)]
    #[case(Opcode::Mul, 4, 3, 12)]
    #[case(Opcode::Div, 12, 4, 3)]
    #[case(Opcode::Mod, 13, 4, 1)]
    #[case(Opcode::BAnd, 6, 3, 2)]
    #[case(Opcode::BOr, 6, 1, 7)]
    #[case(Opcode::BXor, 6, 3, 5)]
    #[case(Opcode::LOr, 0, 5, 1)]
    #[case(Opcode::LAnd, 0, 5, 0)]
    #[case(Opcode::Eq, 3, 3, 1)]
    #[case(Opcode::Lt, 2, 3, 1)]
    #[case(Opcode::Geq, 2, 3, 0)]
    fn binary_opcodes_compute_the_expected_stack_effect(
        #[case] op: Opcode,
        #[case] lhs: i32,
        #[case] rhs: i32,
        #[case] expected: i32,
    ) {
        let code = vec![
            Instruction::simple(Opcode::PushConst, lhs),
            Instruction::simple(Opcode::PushConst, rhs),
            Instruction::simple(op, 0),
            Instruction::simple(Opcode::Halt, 0),
        ];
        let mut vm = Vm::new(code, 64);
        vm.run().expect("runtime error");
        assert_eq!(vm.peek_word(4), Some(expected));
    }

    fn run(src: &str) -> Vm {
        let out = Compiler::new(src).compile();
        assert!(out.errors.is_empty(), "unexpected compile errors: {:?}", out.errors);
        let mut vm = Vm::new(out.code, 512);
        vm.run().expect("runtime error");
        vm
    }

    #[test]
    fn scenario_1_arithmetic_into_main_frame_slot() {
        let vm = run("var i; i = 1 + 2 * 3 .");
        assert_eq!(vm.peek_word(4), Some(7));
    }

    #[test]
    fn scenario_2_constant_occupies_no_stack_space() {
        let vm = run("const n = 5; var f; procedure set() f = n; set() .");
        assert_eq!(vm.peek_word(4), Some(5));
    }

    #[test]
    fn scenario_3_function_return_value_matches_side_effect() {
        let vm = run("var x; function sq(a) x = a * a; sq(4) .");
        assert_eq!(vm.peek_word(4), Some(16));
    }

    #[test]
    fn scenario_4_while_loop_counts_to_three() {
        let vm = run("var i; begin i = 0; while i < 3 do i = i + 1 end.");
        assert_eq!(vm.peek_word(4), Some(3));
    }

    #[test]
    fn scenario_5_repeat_runs_body_at_least_once() {
        let vm = run("var i; begin i = 0; repeat i = i + 1 until i >= 2 end.");
        assert_eq!(vm.peek_word(4), Some(2));
    }

    #[test]
    fn scenario_6_unbounded_recursion_overflows_the_stack() {
        let out = Compiler::new("procedure p() p(); p() .").compile();
        assert!(out.errors.is_empty());
        let mut vm = Vm::new(out.code, 64);
        let err = vm.run().unwrap_err();
        assert!(matches!(err, RuntimeError::StackOverflow { .. }));
    }

    #[test]
    fn divide_by_zero_is_a_runtime_error() {
        let out = Compiler::new("var x; x = 1 / 0 .").compile();
        let mut vm = Vm::new(out.code, 512);
        assert_eq!(vm.run().unwrap_err(), RuntimeError::DivideByZero);
    }

    #[test]
    fn shift_counts_wrap_modulo_word_width() {
        let vm = run("var x; x = 1 << 33 .");
        assert_eq!(vm.peek_word(4), Some(1 << 1));
    }

    #[test]
    fn arithmetic_wraps_on_overflow() {
        let vm = run("var x; x = 2147483647 + 1 .");
        assert_eq!(vm.peek_word(4), Some(i32::MIN));
    }

    #[test]
    fn function_returns_value_assigned_to_its_own_name() {
        let vm = run("var r; function sq(a) sq = a * a; r = sq(4) .");
        assert_eq!(vm.peek_word(4), Some(16));
    }

    #[test]
    fn base_zero_hops_returns_current_frame() {
        let vm = run("var x; x = 1 .");
        assert_eq!(vm.base(0).unwrap(), vm.bp as i64);
    }
}
