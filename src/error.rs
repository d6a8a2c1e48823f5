use std::fmt;
use std::io;

use miette::{miette, Report, Severity};

use crate::image::ImageError;

/// Fault which stops the machine.
#[derive(Debug)]
pub enum RunError {
    /// Reserved opcode fetched from `pc`
    InvalidOpcode { pc: u16, instr: u16 },
    /// Host terminal failed, or input ended while a trap was waiting for it
    Terminal(io::Error),
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Terminal(e) => Some(e),
            Self::InvalidOpcode { .. } => None,
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOpcode { pc, instr } => write!(
                f,
                "invalid opcode 0x{:x} in instruction 0x{:04x} at address 0x{:04x}",
                instr >> 12,
                instr,
                pc
            ),
            Self::Terminal(e) => write!(f, "terminal i/o failed: {}", e),
        }
    }
}

impl From<io::Error> for RunError {
    fn from(e: io::Error) -> Self {
        Self::Terminal(e)
    }
}

// Diagnostics

pub fn image_load(e: ImageError) -> Report {
    let help = match &e {
        ImageError::Open { source, .. } => format!("could not read file: {source}"),
        ImageError::Empty { .. } => "images must begin with a 16-bit origin address".to_string(),
        ImageError::Misaligned { len, .. } => {
            format!("file is {len} bytes long, but images are made of 16-bit words")
        }
    };
    miette!(
        severity = Severity::Error,
        code = "load::image",
        help = help,
        "{e}",
    )
}

pub fn run_fault(e: RunError) -> Report {
    match e {
        RunError::InvalidOpcode { .. } => miette!(
            severity = Severity::Error,
            code = "run::invalid_opcode",
            help = "opcodes 0x8 (RTI) and 0xD are reserved; the program may have run into data",
            "{e}",
        ),
        RunError::Terminal(_) => miette!(
            severity = Severity::Error,
            code = "run::terminal",
            help = "input may have ended while the program was waiting for a character",
            "{e}",
        ),
    }
}

pub fn terminal_setup(e: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::raw_mode",
        "Could not configure terminal: {e}",
    )
}
