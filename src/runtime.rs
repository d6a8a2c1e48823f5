use crate::error::RunError;
use crate::ops::{Choice, JsrTarget, Op, Register};
use crate::state::RunState;
use crate::term::Terminal;

/// Instructions executed between checks for a host interrupt.
const INTERRUPT_CHECK_INTERVAL: u64 = 0x1000;

/// What the loop should do after an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Halt,
}

/// Machine state together with the terminal it talks to.
pub struct RunEnvironment<T: Terminal> {
    pub(crate) state: RunState,
    pub(crate) term: T,
    running: bool,
    steps: u64,
}

impl<T: Terminal> RunEnvironment<T> {
    pub fn new(state: RunState, term: T) -> Self {
        Self {
            state,
            term,
            running: true,
            steps: 0,
        }
    }

    /// Run until the program halts or faults.
    pub fn run(&mut self) -> Result<(), RunError> {
        while self.running {
            if self.steps % INTERRUPT_CHECK_INTERVAL == 0 {
                self.term.service_interrupts()?;
            }
            self.step()?;
        }
        Ok(())
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// Does nothing once the machine has halted.
    pub fn step(&mut self) -> Result<Signal, RunError> {
        if !self.running {
            return Ok(Signal::Halt);
        }
        let addr = self.state.pc;
        let instr = self.state.mem.read(addr, &mut self.term)?;
        // PC incremented before instruction is performed
        self.state.pc = addr.wrapping_add(1);
        self.steps += 1;

        let op = Op::decode(instr).ok_or(RunError::InvalidOpcode { pc: addr, instr })?;
        let signal = self.execute(op)?;
        if signal == Signal::Halt {
            self.running = false;
        }
        Ok(signal)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of instructions fetched so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RunState {
        &mut self.state
    }

    pub fn terminal(&self) -> &T {
        &self.term
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.term
    }

    pub fn into_parts(self) -> (RunState, T) {
        (self.state, self.term)
    }

    fn execute(&mut self, op: Op) -> Result<Signal, RunError> {
        match op {
            Op::ADD {
                dest_r,
                src_r_1,
                src_r_2,
            } => self.add(dest_r, src_r_1, src_r_2),
            Op::AND {
                dest_r,
                src_r_1,
                src_r_2,
            } => self.and(dest_r, src_r_1, src_r_2),
            Op::NOT { dest_r, src_r } => self.not(dest_r, src_r),
            Op::BR { cc, pc_offset9 } => self.br(cc, pc_offset9),
            Op::JMP { base_r } => self.jmp(base_r),
            Op::JSR { target } => self.jsr(target),
            Op::LD { dest_r, pc_offset9 } => self.ld(dest_r, pc_offset9)?,
            Op::LDI { dest_r, pc_offset9 } => self.ldi(dest_r, pc_offset9)?,
            Op::LDR {
                dest_r,
                base_r,
                offset6,
            } => self.ldr(dest_r, base_r, offset6)?,
            Op::LEA { dest_r, pc_offset9 } => self.lea(dest_r, pc_offset9),
            Op::ST { src_r, pc_offset9 } => self.st(src_r, pc_offset9),
            Op::STI { src_r, pc_offset9 } => self.sti(src_r, pc_offset9)?,
            Op::STR {
                src_r,
                base_r,
                offset6,
            } => self.str(src_r, base_r, offset6),
            Op::TRAP { vector } => {
                self.state.reg[7] = self.state.pc;
                return self.trap(vector);
            }
        }
        Ok(Signal::Continue)
    }

    #[inline]
    fn reg(&self, reg: Register) -> u16 {
        self.state.reg[reg.index()]
    }

    #[inline]
    fn mem(&mut self, addr: u16) -> Result<u16, RunError> {
        Ok(self.state.mem.read(addr, &mut self.term)?)
    }

    #[inline]
    fn pc_relative(&self, offset: u16) -> u16 {
        self.state.pc.wrapping_add(offset)
    }

    fn operand(&self, choice: Choice) -> u16 {
        match choice {
            Choice::Reg(reg) => self.reg(reg),
            Choice::Imm5(imm) => imm,
        }
    }

    fn add(&mut self, dr: Register, sr: Register, choice: Choice) {
        let res = self.reg(sr).wrapping_add(self.operand(choice));
        self.state.write_reg(dr.index(), res);
    }

    fn and(&mut self, dr: Register, sr: Register, choice: Choice) {
        let res = self.reg(sr) & self.operand(choice);
        self.state.write_reg(dr.index(), res);
    }

    fn not(&mut self, dr: Register, sr: Register) {
        let res = !self.reg(sr);
        self.state.write_reg(dr.index(), res);
    }

    fn br(&mut self, cc: u16, offset: u16) {
        if self.state.flag.matches(cc) {
            self.state.pc = self.pc_relative(offset);
        }
    }

    fn jmp(&mut self, br: Register) {
        self.state.pc = self.reg(br);
    }

    fn jsr(&mut self, target: JsrTarget) {
        self.state.reg[7] = self.state.pc;
        self.state.pc = match target {
            JsrTarget::Offset(offset) => self.pc_relative(offset),
            JsrTarget::Reg(br) => self.reg(br),
        };
    }

    fn ld(&mut self, dr: Register, offset: u16) -> Result<(), RunError> {
        let val = self.mem(self.pc_relative(offset))?;
        self.state.write_reg(dr.index(), val);
        Ok(())
    }

    fn ldi(&mut self, dr: Register, offset: u16) -> Result<(), RunError> {
        let ptr = self.mem(self.pc_relative(offset))?;
        let val = self.mem(ptr)?;
        self.state.write_reg(dr.index(), val);
        Ok(())
    }

    fn ldr(&mut self, dr: Register, br: Register, offset: u16) -> Result<(), RunError> {
        let val = self.mem(self.reg(br).wrapping_add(offset))?;
        self.state.write_reg(dr.index(), val);
        Ok(())
    }

    fn lea(&mut self, dr: Register, offset: u16) {
        let val = self.pc_relative(offset);
        self.state.write_reg(dr.index(), val);
    }

    fn st(&mut self, sr: Register, offset: u16) {
        let addr = self.pc_relative(offset);
        let val = self.reg(sr);
        self.state.mem.write(addr, val);
    }

    fn sti(&mut self, sr: Register, offset: u16) -> Result<(), RunError> {
        let ptr = self.mem(self.pc_relative(offset))?;
        let val = self.reg(sr);
        self.state.mem.write(ptr, val);
        Ok(())
    }

    fn str(&mut self, sr: Register, br: Register, offset: u16) {
        let addr = self.reg(br).wrapping_add(offset);
        let val = self.reg(sr);
        self.state.mem.write(addr, val);
    }
}
