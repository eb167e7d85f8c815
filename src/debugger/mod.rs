mod breakpoint;
mod command;
mod error;
mod source;

pub use self::breakpoint::Breakpoints;
use self::command::{Command, Location, PcLocation};
use self::source::{SourceMode, SourceReader};
use crate::output::{Condition, Kind, Output};
use crate::program::Line;
use crate::runtime::{Runtime, StepOutcome};

/// Leave this as a struct, in case more options are added in the future.
#[derive(Debug, Default)]
pub struct DebuggerOptions {
    /// Commands to run, separated by `;` or newline. Read from stdin if `None`.
    pub command: Option<String>,
}

/// Interactive step-back debugger.
///
/// Every executed instruction is recorded by the runtime, so execution can be walked backwards
/// with `back` and forwards again with `redo`.
pub struct Debugger<'a> {
    runtime: Runtime,
    asm_source: AsmSource<'a>,
    command_source: SourceMode,
    breakpoints: Breakpoints,
    /// Whether pc should be displayed before the next command.
    should_echo_pc: bool,
}

/// Reference to assembly source code.
///
/// Used by `source` and `break list` commands.
struct AsmSource<'a> {
    lines: Vec<Line>,
    src: &'a str,
}

impl<'a> Debugger<'a> {
    pub fn new(opts: DebuggerOptions, mut runtime: Runtime, lines: Vec<Line>, src: &'a str) -> Self {
        runtime.set_recording(true);
        Self {
            runtime,
            asm_source: AsmSource { lines, src },
            command_source: SourceMode::from(opts.command),
            breakpoints: Breakpoints::default(),
            should_echo_pc: true,
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Read and execute commands until `quit` or end of input.
    pub fn run(&mut self) {
        loop {
            Output::Debugger(Condition::Always, Kind::Normal).start_new_line();
            if self.should_echo_pc {
                dprintln!(
                    Sometimes,
                    Info,
                    "Program counter at: {}.",
                    self.runtime.state().pc
                );
                self.should_echo_pc = false;
            }

            // Treat end of input as `quit`
            let command = self.next_command().unwrap_or(Command::Quit);
            if command == Command::Quit {
                break;
            }
            self.run_command(command);
        }
    }

    fn run_command(&mut self, command: Command) {
        match command {
            Command::Quit => (),
            Command::Help => {
                dprintln!(Always, Special, "{}", include_str!("./help.txt"));
            }

            Command::Step { count } => self.execute(Some(count)),
            Command::Continue => {
                dprintln!(Always, Info, "Continuing...");
                self.execute(None);
            }
            Command::Back { count } => self.step_back(count),
            Command::Redo { count } => self.redo(count),

            Command::Registers => {
                dprintln!(Sometimes, Info, "Registers:");
                Output::Debugger(Condition::Always, Kind::Normal)
                    .print_registers(self.runtime.state());
            }

            Command::Get { location } => {
                let state = self.runtime.state();
                let value = match location {
                    Location::Register(register) => {
                        dprintln!(Sometimes, Info, "Register {}:", register);
                        state.reg(register)
                    }
                    Location::Memory(address) => {
                        dprintln!(Sometimes, Info, "Memory at address {}:", address);
                        state.memory[address as usize]
                    }
                };
                Output::Debugger(Condition::Always, Kind::Normal).print_integer(value);
            }

            Command::BreakAdd { location } => {
                let Some(pc) = self.resolve_location(&location) else {
                    return;
                };
                if self.breakpoints.insert(pc) {
                    dprintln!(Always, Warning, "Added breakpoint at pc {}.", pc);
                } else {
                    dprintln!(Always, Error, "Breakpoint already exists at pc {}.", pc);
                }
            }
            Command::BreakRemove { location } => {
                let Some(pc) = self.resolve_location(&location) else {
                    return;
                };
                if self.breakpoints.remove(pc) {
                    dprintln!(Always, Warning, "Removed breakpoint at pc {}.", pc);
                } else {
                    dprintln!(Always, Error, "No breakpoint exists at pc {}.", pc);
                }
            }
            Command::BreakList => self.list_breakpoints(),

            Command::Source { location } => {
                let pc = match location {
                    Some(location) => self.resolve_location(&location),
                    None => Some(self.runtime.state().pc),
                };
                if let Some(pc) = pc {
                    self.asm_source.show_line_context(&self.runtime, pc);
                }
            }

            Command::Reset => {
                self.runtime.reset();
                self.should_echo_pc = true;
                dprintln!(Always, Warning, "Reset program to initial state.");
            }
        }
    }

    /// Execute up to `count` instructions, or until something interrupts execution.
    ///
    /// A breakpoint at the current pc is passed, so that repeated `continue` makes progress.
    fn execute(&mut self, count: Option<usize>) {
        let mut executed = 0;
        loop {
            if count.is_some_and(|count| executed >= count) {
                break;
            }
            let pc = self.runtime.state().pc;
            if executed > 0 && self.breakpoints.contains(pc) {
                dprintln!(Always, Warning, "Reached breakpoint. Pausing execution.");
                break;
            }

            match self.runtime.step() {
                Ok(StepOutcome::Executed) => executed += 1,
                Ok(StepOutcome::Halted) => {
                    dprintln!(
                        Always,
                        Error,
                        "Program has halted. Use `back` or `reset` to continue."
                    );
                    break;
                }
                Ok(StepOutcome::OutOfProgram) => {
                    dprintln!(Always, Warning, "Reached end of program. Pausing execution.");
                    break;
                }
                Err(error) => {
                    dprintln!(Always, Error, "Execution failed at pc {}: {}.", pc, error);
                    break;
                }
            }

            if self.runtime.state().halted {
                dprintln!(Always, Warning, "Reached `hlt`. Pausing execution.");
                break;
            }
        }

        if executed > 0 {
            self.should_echo_pc = true;
            dprintln!(
                Always,
                Info,
                "Executed {} instruction{}.",
                executed,
                plural(executed)
            );
        }
    }

    fn step_back(&mut self, count: usize) {
        let mut undone = 0;
        while undone < count {
            match self.runtime.step_back() {
                Ok(true) => undone += 1,
                Ok(false) => {
                    dprintln!(Always, Warning, "Reached start of recorded history.");
                    break;
                }
                Err(error) => {
                    dprintln!(Always, Error, "Failed to step back: {}.", error);
                    break;
                }
            }
        }
        if undone > 0 {
            self.should_echo_pc = true;
            dprintln!(
                Always,
                Info,
                "Stepped back {} instruction{}.",
                undone,
                plural(undone)
            );
        }
    }

    fn redo(&mut self, count: usize) {
        let mut redone = 0;
        while redone < count {
            match self.runtime.redo() {
                Ok(true) => redone += 1,
                Ok(false) => {
                    dprintln!(Always, Warning, "Nothing left to redo.");
                    break;
                }
                Err(error) => {
                    dprintln!(Always, Error, "Failed to redo: {}.", error);
                    break;
                }
            }
        }
        if redone > 0 {
            self.should_echo_pc = true;
            dprintln!(
                Always,
                Info,
                "Redid {} instruction{}.",
                redone,
                plural(redone)
            );
        }
    }

    fn list_breakpoints(&self) {
        if self.breakpoints.is_empty() {
            dprintln!(Always, Info, "No breakpoints exist.");
            return;
        }
        dprintln!(Always, Info, "Breakpoints:");
        for (i, pc) in self.breakpoints.iter().enumerate() {
            if Output::is_minimal() {
                dprintln!(Always, Info, "{}", pc);
                continue;
            }
            let branch = if i + 1 == self.breakpoints.len() {
                "╰─"
            } else {
                "├─"
            };
            dprint!(Always, Info, "{} {:<4} ──  ", branch, pc);
            self.asm_source.show_single_line(&self.runtime, pc);
            dprintln!(Always);
        }
    }

    /// Returns `None` on EOF.
    fn next_command(&mut self) -> Option<Command> {
        // Loop until valid command or EOF
        loop {
            let line = self.command_source.read()?.trim();
            if line.is_empty() {
                continue;
            }
            match Command::try_from(line) {
                Ok(command) => return Some(command),
                Err(error) => {
                    dprintln!(Always, Error, "{}", error);
                    dprintln!(Always, Error, "Type `help` for a list of commands.");
                }
            }
        }
    }

    /// Program counter of an instruction, printing an error if there is none.
    fn resolve_location(&self, location: &PcLocation) -> Option<usize> {
        let program = self.runtime.program();
        let pc = match location {
            PcLocation::Pc(pc) => *pc,
            PcLocation::Label(label) => {
                let Some(pc) = program.labels().get(label) else {
                    dprintln!(Always, Error, "Label not found named `{}`.", label);
                    return None;
                };
                dprintln!(Sometimes, Info, "Label `{}` is at pc {}.", label, pc);
                *pc
            }
        };
        if pc >= program.len() {
            dprintln!(
                Always,
                Error,
                "Pc {} does not correspond to an instruction. Program has {} instruction{}.",
                pc,
                program.len(),
                plural(program.len())
            );
            return None;
        }
        Some(pc)
    }
}

impl AsmSource<'_> {
    fn show_line_context(&self, runtime: &Runtime, pc: usize) {
        let Some(line) = self.get_source_line(runtime, pc) else {
            return;
        };
        if Output::is_minimal() {
            dprintln!(Always, Normal, "{}", &self.src[line.span.offs()..line.span.end()]);
            return;
        }
        let report = miette::miette!(
            severity = miette::Severity::Advice,
            labels = vec![miette::LabeledSpan::at(line.span, format!("At pc {}", pc))],
            "",
        )
        .with_source_code(self.src.to_string());
        eprintln!("{:?}", report);
    }

    fn show_single_line(&self, runtime: &Runtime, pc: usize) {
        let Some(line) = self.get_source_line(runtime, pc) else {
            return;
        };
        dprint!(
            Always,
            Normal,
            "{}",
            &self.src[line.span.offs()..line.span.end()]
        );
    }

    fn get_source_line(&self, runtime: &Runtime, pc: usize) -> Option<&Line> {
        let line = runtime
            .program()
            .pc_to_line(pc)
            .and_then(|index| self.lines.get(index));
        if line.is_none() {
            dprintln!(Always, Info, "Pc {} does not correspond to an instruction.", pc);
        }
        line
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
