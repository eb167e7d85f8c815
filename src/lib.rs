// Processor core
pub mod effect;
pub mod exec;
pub mod isa;
pub mod state;
pub use effect::{apply, invert, Effect};
pub use error::ExecError;
pub use exec::instruction_effect;
pub use state::ProcessorState;

// Parsing
mod lexer;
mod parser;
pub use parser::{parse_file, AsmParser};
pub mod printer;
pub mod program;
pub use program::{Labels, Line, LineKind, Program};

// Running
pub mod runtime;
pub use runtime::{Runtime, StepOutcome};
#[macro_use]
pub mod output;
mod debugger;
pub use debugger::{Debugger, DebuggerOptions};

mod error;
mod span;

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
