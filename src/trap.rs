use crate::error::RunError;
use crate::runtime::{RunEnvironment, Signal};
use crate::term::Terminal;

/// Printed by `IN` before waiting for a key.
pub const IN_PROMPT: &str = "Enter a character: ";
/// Printed by `HALT`.
pub const HALT_NOTICE: &str = "HALT";

/// Service routines reachable through `TRAP`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapVector {
    /// Read a character without echo
    Getc = 0x20,
    /// Write the character in R0
    Out = 0x21,
    /// Write the string of one character per word at R0
    Puts = 0x22,
    /// Prompt for a character and echo it
    In = 0x23,
    /// Write the string of two characters per word at R0
    Putsp = 0x24,
    Halt = 0x25,
}

impl TryFrom<u8> for TrapVector {
    type Error = ();
    fn try_from(vector: u8) -> Result<Self, Self::Error> {
        Ok(match vector {
            0x20 => Self::Getc,
            0x21 => Self::Out,
            0x22 => Self::Puts,
            0x23 => Self::In,
            0x24 => Self::Putsp,
            0x25 => Self::Halt,
            _ => return Err(()),
        })
    }
}

impl<T: Terminal> RunEnvironment<T> {
    /// Run a trap routine. R7 must already hold the return address.
    ///
    /// Unknown vectors do nothing.
    pub(crate) fn trap(&mut self, vector: u8) -> Result<Signal, RunError> {
        let Ok(vector) = TrapVector::try_from(vector) else {
            return Ok(Signal::Continue);
        };
        match vector {
            TrapVector::Getc => {
                let ch = self.term.read_byte()?;
                self.state.write_reg(0, ch as u16);
            }
            TrapVector::Out => {
                let ch = (self.state.reg[0] & 0xFF) as u8;
                self.term.write_bytes(&[ch])?;
                self.term.flush()?;
            }
            TrapVector::Puts => {
                let string: Vec<u8> = self
                    .state
                    .mem
                    .string_from(self.state.reg[0])
                    .map(|word| (word & 0xFF) as u8)
                    .collect();
                self.term.write_bytes(&string)?;
                self.term.flush()?;
            }
            TrapVector::In => {
                self.term.write_bytes(IN_PROMPT.as_bytes())?;
                self.term.flush()?;
                let ch = self.term.read_byte()?;
                self.term.write_bytes(&[ch])?;
                self.state.write_reg(0, ch as u16);
                self.term.flush()?;
            }
            TrapVector::Putsp => {
                let mut string = Vec::new();
                for word in self.state.mem.string_from(self.state.reg[0]) {
                    string.push((word & 0xFF) as u8);
                    let high = (word >> 8) as u8;
                    if high != 0 {
                        string.push(high);
                    }
                }
                self.term.write_bytes(&string)?;
                self.term.flush()?;
            }
            TrapVector::Halt => {
                self.term.write_bytes(HALT_NOTICE.as_bytes())?;
                self.term.write_bytes(b"\n")?;
                self.term.flush()?;
                return Ok(Signal::Halt);
            }
        }
        Ok(Signal::Continue)
    }
}
