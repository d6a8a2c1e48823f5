use std::path::PathBuf;

use clap::Parser;
use miette::Result;

use lc3vm::error;
use lc3vm::output::{self, file_message, message, MsgColor};
use lc3vm::term::{HostTerminal, RawMode};
use lc3vm::{Image, RunEnvironment, RunState};

/// Run binary LC3 images in the terminal.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// `.obj` images to load, in order. Later images may overwrite earlier ones
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Address to start executing from, as hex (`0x3000`, `x3000`) or decimal
    #[arg(short, long, default_value = "0x3000", value_parser = parse_address)]
    start: u16,
    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long)]
    minimal: bool,
}

fn main() -> Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    output::set_minimal(args.minimal);

    let mut state = RunState::new();
    for path in &args.images {
        file_message(Cyan, "Loading", path);
        let image = Image::read(path).map_err(error::image_load)?;
        state.load(&image);
    }
    state.set_pc(args.start);

    message(Green, "Running", format_args!("from 0x{:04x}", args.start));
    let term = RawMode::enter(HostTerminal::new()).map_err(error::terminal_setup)?;
    let mut program = RunEnvironment::new(state, term);
    let result = program.run();
    let steps = program.steps();
    // Restore terminal before reporting anything
    drop(program);

    match result {
        Ok(()) => {
            message(Green, "Completed", format_args!("{steps} instructions"));
            Ok(())
        }
        Err(e) => {
            message(Red, "Faulted", format_args!("after {steps} instructions"));
            Err(error::run_fault(e))
        }
    }
}

fn parse_address(arg: &str) -> Result<u16, String> {
    let hex = arg
        .strip_prefix("0x")
        .or_else(|| arg.strip_prefix("0X"))
        .or_else(|| arg.strip_prefix('x'))
        .or_else(|| arg.strip_prefix('X'));
    let parsed = match hex {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => arg.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid address '{arg}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc3vm::PC_START;

    #[test]
    fn parses_addresses() {
        assert_eq!(parse_address("0x3000"), Ok(PC_START));
        assert_eq!(parse_address("x3000"), Ok(0x3000));
        assert_eq!(parse_address("X4a0F"), Ok(0x4a0f));
        assert_eq!(parse_address("12288"), Ok(0x3000));
        assert!(parse_address("0x10000").is_err());
        assert!(parse_address("start").is_err());
        assert!(parse_address("").is_err());
    }
}
