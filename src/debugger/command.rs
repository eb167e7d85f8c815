use std::fmt;
use std::str::SplitWhitespace;

use super::error::{ArgumentError, CommandError, ValueError};
use crate::lexer::{is_id, is_id_start};
use crate::state::{Register, MEMORY_SIZE};

#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Step { count: usize },
    Back { count: usize },
    Redo { count: usize },
    Continue,
    Quit,
    BreakList,
    BreakAdd { location: PcLocation },
    BreakRemove { location: PcLocation },
    Get { location: Location },
    Registers,
    Reset,
    /// Show source line of an instruction, current one if `None`
    Source { location: Option<PcLocation> },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandName {
    Help,
    Step,
    Back,
    Redo,
    Continue,
    Quit,
    BreakList,
    BreakAdd,
    BreakRemove,
    Get,
    Registers,
    Reset,
    Source,
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Help => "help",
            Self::Step => "step",
            Self::Back => "back",
            Self::Redo => "redo",
            Self::Continue => "continue",
            Self::Quit => "quit",
            Self::BreakList => "break list",
            Self::BreakAdd => "break add",
            Self::BreakRemove => "break remove",
            Self::Get => "get",
            Self::Registers => "registers",
            Self::Reset => "reset",
            Self::Source => "source",
        };
        f.write_str(name)
    }
}

/// Register or memory address.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Location {
    Register(Register),
    Memory(u8),
}

/// Position in the instruction sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum PcLocation {
    Pc(usize),
    Label(String),
}

#[rustfmt::skip]
const COMMANDS: &[(CommandName, &[&str])] = &[
    (CommandName::Help,      &["help", "--help", "h", "-h"]),
    (CommandName::Step,      &["step", "s"]),
    (CommandName::Back,      &["back", "b"]),
    (CommandName::Redo,      &["redo"]),
    (CommandName::Continue,  &["continue", "cont", "c"]),
    (CommandName::Quit,      &["quit", "q", "exit"]),
    (CommandName::Get,       &["get", "g"]),
    (CommandName::Registers, &["registers", "reg", "r"]),
    (CommandName::Reset,     &["reset"]),
    (CommandName::Source,    &["source", "src"]),
];
const BREAK_COMMAND: &[&str] = &["break", "br"];
#[rustfmt::skip]
const BREAK_SUBCOMMANDS: &[(CommandName, &[&str])] = &[
    (CommandName::BreakList,   &["list", "l"]),
    (CommandName::BreakAdd,    &["add", "a"]),
    (CommandName::BreakRemove, &["remove", "r"]),
];

fn find_match(name: &str, commands: &[(CommandName, &[&str])]) -> Option<CommandName> {
    commands
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name)))
        .map(|(command, _)| *command)
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    /// Assumes line is non-empty.
    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let mut iter = ArgIter {
            words: line.split_whitespace(),
            count: 0,
        };
        let command_name = iter.command_name()?;
        Command::parse_arguments(command_name, &mut iter).map_err(|error| {
            CommandError::InvalidArgument {
                command_name,
                error,
            }
        })
    }
}

impl Command {
    fn parse_arguments(name: CommandName, iter: &mut ArgIter) -> Result<Self, ArgumentError> {
        let mut expected_args = 0;

        let command = match name {
            // Allow trailing arguments
            CommandName::Help => return Ok(Self::Help),

            CommandName::Continue => Self::Continue,
            CommandName::Quit => Self::Quit,
            CommandName::Registers => Self::Registers,
            CommandName::Reset => Self::Reset,
            CommandName::BreakList => Self::BreakList,

            CommandName::Step | CommandName::Back | CommandName::Redo => {
                expected_args = 1;
                let count = iter.next_count("count")?;
                match name {
                    CommandName::Step => Self::Step { count },
                    CommandName::Back => Self::Back { count },
                    _ => Self::Redo { count },
                }
            }

            CommandName::Get => {
                expected_args = 1;
                let location = iter.next_location("location")?;
                Self::Get { location }
            }

            CommandName::BreakAdd => {
                expected_args = 1;
                let location = iter.next_pc_location("location")?;
                Self::BreakAdd { location }
            }
            CommandName::BreakRemove => {
                expected_args = 1;
                let location = iter.next_pc_location("location")?;
                Self::BreakRemove { location }
            }
            CommandName::Source => {
                expected_args = 1;
                let location = iter.next_optional_pc_location("location")?;
                Self::Source { location }
            }
        };

        iter.expect_end(expected_args)?;
        Ok(command)
    }
}

/// Whitespace-separated words of a command line.
struct ArgIter<'a> {
    words: SplitWhitespace<'a>,
    /// Arguments consumed, excluding command name
    count: usize,
}

impl<'a> ArgIter<'a> {
    fn command_name(&mut self) -> Result<CommandName, CommandError> {
        // Command source never yields blank lines
        let name = self.words.next().unwrap_or("");

        if let Some(command) = find_match(name, COMMANDS) {
            return Ok(command);
        }

        if BREAK_COMMAND.iter().any(|alias| alias.eq_ignore_ascii_case(name)) {
            let command_name = BREAK_COMMAND[0];
            let Some(subname) = self.words.next() else {
                return Err(CommandError::MissingSubcommand { command_name });
            };
            return find_match(subname, BREAK_SUBCOMMANDS).ok_or_else(|| {
                CommandError::InvalidSubcommand {
                    command_name,
                    subcommand_name: subname.to_string(),
                }
            });
        }

        Err(CommandError::InvalidCommand {
            command_name: name.to_string(),
        })
    }

    fn next_arg(&mut self) -> Option<&'a str> {
        let arg = self.words.next()?;
        self.count += 1;
        Some(arg)
    }

    /// Positive count, defaulting to 1.
    fn next_count(&mut self, argument_name: &'static str) -> Result<usize, ArgumentError> {
        let Some(arg) = self.next_arg() else {
            return Ok(1);
        };
        let count = parse_integer(arg, usize::MAX)
            .map_err(|error| ArgumentError::InvalidValue { argument_name, error })?;
        if count == 0 {
            return Err(ArgumentError::InvalidValue {
                argument_name,
                error: ValueError::ZeroCount,
            });
        }
        Ok(count)
    }

    fn next_location(&mut self, argument_name: &'static str) -> Result<Location, ArgumentError> {
        let Some(arg) = self.next_arg() else {
            return Err(ArgumentError::MissingArgument { argument_name });
        };
        let location = if let Ok(register) = arg.parse::<Register>() {
            Ok(Location::Register(register))
        } else if arg.starts_with(|ch: char| ch.is_ascii_digit()) {
            parse_integer(arg, MEMORY_SIZE - 1).map(|address| Location::Memory(address as u8))
        } else {
            Err(ValueError::MismatchedType {
                expected_type: "register or address",
            })
        };
        location.map_err(|error| ArgumentError::InvalidValue { argument_name, error })
    }

    fn next_pc_location(&mut self, argument_name: &'static str) -> Result<PcLocation, ArgumentError> {
        self.next_optional_pc_location(argument_name)?
            .ok_or(ArgumentError::MissingArgument { argument_name })
    }

    fn next_optional_pc_location(
        &mut self,
        argument_name: &'static str,
    ) -> Result<Option<PcLocation>, ArgumentError> {
        let Some(arg) = self.next_arg() else {
            return Ok(None);
        };
        parse_pc_location(arg)
            .map(Some)
            .map_err(|error| ArgumentError::InvalidValue { argument_name, error })
    }

    fn expect_end(&mut self, expected_count: usize) -> Result<(), ArgumentError> {
        let extra = self.words.by_ref().count();
        if extra == 0 {
            return Ok(());
        }
        Err(ArgumentError::TooManyArguments {
            expected_count,
            actual_count: self.count + extra,
        })
    }
}

fn parse_pc_location(arg: &str) -> Result<PcLocation, ValueError> {
    if arg.starts_with(|ch: char| ch.is_ascii_digit()) {
        return parse_integer(arg, usize::MAX).map(PcLocation::Pc);
    }
    let mut chars = arg.chars();
    let valid = chars.next().is_some_and(is_id_start) && chars.all(is_id);
    if !valid {
        return Err(ValueError::MalformedLabel);
    }
    Ok(PcLocation::Label(arg.to_string()))
}

/// Decimal or `0x` hex integer, no greater than `max`.
fn parse_integer(arg: &str, max: usize) -> Result<usize, ValueError> {
    let (digits, radix) = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (arg, 10),
    };
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_digit(radix)) {
        return Err(ValueError::MalformedInteger);
    }
    match usize::from_str_radix(digits, radix) {
        Ok(value) if value <= max => Ok(value),
        // Digits were checked above, so failure is overflow
        _ => Err(ValueError::IntegerTooLarge { max }),
    }
}
