/// General purpose register index, always in `0..8`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Register(u8);

impl Register {
    /// Read the 3-bit register field starting at bit `shift`.
    fn from_bits(instr: u16, shift: u32) -> Self {
        Self(((instr >> shift) & 0b111) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Second operand of ADD and AND.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Choice {
    Reg(Register),
    /// Already sign-extended from 5 bits
    Imm5(u16),
}

/// Target of JSR (offset from PC) or JSRR (base register).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JsrTarget {
    /// Already sign-extended from 11 bits
    Offset(u16),
    Reg(Register),
}

/// Decoded instruction. Offsets are sign-extended during decoding.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Add SR1 with SR2 or an immediate and store in DR
    ADD {
        dest_r: Register,
        src_r_1: Register,
        src_r_2: Choice,
    },
    /// Bitwise-and SR1 with SR2 or an immediate and store in DR
    AND {
        dest_r: Register,
        src_r_1: Register,
        src_r_2: Choice,
    },
    /// Bitwise complement of SR stored in DR
    NOT { dest_r: Register, src_r: Register },
    /// Branch if any of the `nzp` bits match the current condition code
    BR { cc: u16, pc_offset9: u16 },
    /// Set PC to BR. `RET` is `JMP R7`
    JMP { base_r: Register },
    /// Store PC in R7 and jump
    JSR { target: JsrTarget },
    LD { dest_r: Register, pc_offset9: u16 },
    LDI { dest_r: Register, pc_offset9: u16 },
    LDR {
        dest_r: Register,
        base_r: Register,
        offset6: u16,
    },
    LEA { dest_r: Register, pc_offset9: u16 },
    ST { src_r: Register, pc_offset9: u16 },
    STI { src_r: Register, pc_offset9: u16 },
    STR {
        src_r: Register,
        base_r: Register,
        offset6: u16,
    },
    TRAP { vector: u8 },
}

impl Op {
    /// Decode a single instruction word.
    ///
    /// Returns `None` for the reserved opcodes `0x8` (RTI) and `0xD`.
    pub fn decode(instr: u16) -> Option<Op> {
        let dest_r = Register::from_bits(instr, 9);
        let base_r = Register::from_bits(instr, 6);
        let pc_offset9 = sign_extend(instr, 9);
        let offset6 = sign_extend(instr, 6);

        let op = match instr >> 12 {
            0x0 => Op::BR {
                cc: (instr >> 9) & 0b111,
                pc_offset9,
            },
            0x1 => Op::ADD {
                dest_r,
                src_r_1: base_r,
                src_r_2: Choice::decode(instr),
            },
            0x2 => Op::LD { dest_r, pc_offset9 },
            0x3 => Op::ST {
                src_r: dest_r,
                pc_offset9,
            },
            0x4 => Op::JSR {
                target: if instr & 0x800 == 0 {
                    JsrTarget::Reg(base_r)
                } else {
                    JsrTarget::Offset(sign_extend(instr, 11))
                },
            },
            0x5 => Op::AND {
                dest_r,
                src_r_1: base_r,
                src_r_2: Choice::decode(instr),
            },
            0x6 => Op::LDR {
                dest_r,
                base_r,
                offset6,
            },
            0x7 => Op::STR {
                src_r: dest_r,
                base_r,
                offset6,
            },
            0x9 => Op::NOT {
                dest_r,
                src_r: base_r,
            },
            0xA => Op::LDI { dest_r, pc_offset9 },
            0xB => Op::STI {
                src_r: dest_r,
                pc_offset9,
            },
            0xC => Op::JMP { base_r },
            0xE => Op::LEA { dest_r, pc_offset9 },
            0xF => Op::TRAP {
                vector: (instr & 0xFF) as u8,
            },
            // RTI and the reserved opcode
            _ => return None,
        };
        Some(op)
    }
}

impl Choice {
    fn decode(instr: u16) -> Self {
        if instr & 0b100000 == 0 {
            Choice::Reg(Register::from_bits(instr, 0))
        } else {
            Choice::Imm5(sign_extend(instr, 5))
        }
    }
}

/// Widen the low `bits` bits of `val` to a signed 16-bit word.
///
/// Any bits of `val` above the field are ignored.
pub fn sign_extend(val: u16, bits: u32) -> u16 {
    debug_assert!(bits > 0 && bits < 16);
    // Sign bit
    let sign = val & (1u16 << (bits - 1));
    // Bits lower than sign bit
    let magnitude = val & ((1u16 << bits) - 1);
    // Positive input: all bits unset; 0x0000
    // Negative input: sign bit and above will be set, lower bits will be reset
    //      Eg. bits=14 -> 0xE000
    let sign_extension = (!sign).wrapping_add(1); // sign * -1
    magnitude | sign_extension
}
