use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

use backstep::output::Output;
use backstep::{parse_file, printer, Debugger, DebuggerOptions, Line, Program, Runtime, StepOutcome};

/// Backstep assembles and runs programs for a small reversible 8-bit processor.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.s` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an assembly file to completion and print the final registers
    Run {
        /// File to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Run an assembly file with the step-back debugger
    Debug {
        /// File to run
        name: PathBuf,
        /// Read debugger commands from argument
        #[arg(short, long)]
        command: Option<String>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Check an assembly file without running it
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print an assembly file in canonical formatting
    Fmt {
        /// File to format
        name: PathBuf,
    },
}

fn main() -> Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    backstep::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(backstep::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            return run(&path, false);
        }
        println!("\n~ backstep v{VERSION} ~");
        println!("{SHORT_INFO}");
        return Ok(());
    };

    match command {
        Command::Run { name, minimal } => run(&name, minimal),
        Command::Debug {
            name,
            command,
            minimal,
        } => debug(&name, DebuggerOptions { command }, minimal),
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let src = read_source(&name)?;
            let lines = parse_file(&src)?;
            let program = Program::from_lines(&lines);
            message(
                Green,
                "Success",
                &format!("no errors found, {} instructions", program.len()),
            );
            Ok(())
        }
        Command::Fmt { name } => {
            let src = read_source(&name)?;
            let lines = parse_file(&src)?;
            println!("{}", printer::print_lines(&lines));
            Ok(())
        }
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn read_source(name: &Path) -> Result<String> {
    fs::read_to_string(name).into_diagnostic()
}

/// Parse source into lines and a program ready to execute
fn assemble(name: &Path, src: &str) -> Result<(Vec<Line>, Program)> {
    file_message(MsgColor::Green, "Assembling", name);
    let lines = parse_file(src)?;
    let program = Program::from_lines(&lines);
    Ok((lines, program))
}

fn run(name: &Path, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    let src = read_source(name)?;
    let (_, program) = assemble(name, &src)?;

    let mut runtime = Runtime::new(program);
    runtime.set_recording(backstep::env::is_history_enabled());

    message(MsgColor::Green, "Running", "assembled program");
    let outcome = runtime.run(backstep::env::step_limit()).into_diagnostic();
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(error) => {
            message(
                MsgColor::Red,
                "Failed",
                &format!("at pc {}", runtime.state().pc),
            );
            Output::Normal.print_registers(runtime.state());
            return Err(error);
        }
    };

    match outcome {
        StepOutcome::Halted => message(MsgColor::Green, "Halted", "reached hlt"),
        StepOutcome::OutOfProgram => message(MsgColor::Cyan, "Finished", "end of program"),
        StepOutcome::Executed => message(MsgColor::Red, "Stopped", "step limit reached"),
    }
    if minimal && outcome == StepOutcome::Halted {
        println!("Halted");
    }
    Output::Normal.print_registers(runtime.state());

    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

fn debug(name: &Path, opts: DebuggerOptions, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    let src = read_source(name)?;
    let (lines, program) = assemble(name, &src)?;

    message(MsgColor::Green, "Debugging", "assembled program");
    let mut debugger = Debugger::new(opts, Runtime::new(program), lines, &src);
    debugger.run();

    let count = debugger.runtime().instruction_count();
    message(
        MsgColor::Green,
        "Completed",
        &format!("{count} instructions from initial state"),
    );
    Ok(())
}

const SHORT_INFO: &str = r"
Welcome to backstep, an assembler and step-back debugger for a small 8-bit
processor whose every instruction can be undone.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
