// Machine
mod ops;
pub use ops::{sign_extend, Choice, JsrTarget, Op, Register};
mod memory;
pub use memory::{Memory, KBDR, KBSR, MEMORY_MAX};
mod state;
pub use state::{RunFlag, RunState, PC_START};

// Running
mod runtime;
pub use runtime::{RunEnvironment, Signal};
mod trap;
pub use trap::TrapVector;
pub mod term;

// Loading
mod image;
pub use image::{Image, ImageError};

pub mod error;
pub use error::RunError;
pub mod output;
