use std::cell::RefCell;
use std::fmt::Display;
use std::path::Path;

use colored::Colorize;

/// Colour of the left column of a status line.
#[derive(Clone, Copy, Debug)]
pub enum MsgColor {
    Green,
    Cyan,
    Red,
}

thread_local! {
    static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
}

/// Suppress status lines. Returns the previous value.
pub fn set_minimal(new_value: bool) -> bool {
    IS_MINIMAL.with(|value| value.replace(new_value))
}

pub fn is_minimal() -> bool {
    IS_MINIMAL.with(|value| *value.borrow())
}

/// Print a right-aligned, coloured status line to stderr.
///
/// Program output owns stdout, so status never interleaves with it.
pub fn message(color: MsgColor, left: &str, right: impl Display) {
    if is_minimal() {
        return;
    }
    eprintln!("{} {right}", status_label(color, left));
}

pub fn file_message(color: MsgColor, left: &str, path: &Path) {
    message(color, left, format_args!("target {}", path.display()));
}

fn status_label(color: MsgColor, left: &str) -> String {
    let left = format!("{left:>12}");
    match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    }
    .bold()
    .to_string()
}
