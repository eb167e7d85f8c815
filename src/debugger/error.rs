use std::{error::Error, fmt};

use super::command::CommandName;

/// Error parsing a command.
#[derive(Debug, PartialEq)]
pub enum CommandError {
    InvalidCommand {
        command_name: String,
    },
    MissingSubcommand {
        command_name: &'static str,
    },
    InvalidSubcommand {
        command_name: &'static str,
        subcommand_name: String,
    },
    InvalidArgument {
        command_name: CommandName,
        error: ArgumentError,
    },
}

/// Error parsing command arguments.
#[derive(Debug, PartialEq)]
pub enum ArgumentError {
    MissingArgument {
        argument_name: &'static str,
    },
    TooManyArguments {
        expected_count: usize,
        actual_count: usize,
    },
    InvalidValue {
        argument_name: &'static str,
        error: ValueError,
    },
}

/// Error parsing an argument value.
#[derive(Debug, PartialEq)]
pub enum ValueError {
    /// Expected one kind of value, eg. a register, but found something else
    MismatchedType { expected_type: &'static str },
    MalformedInteger,
    MalformedLabel,
    IntegerTooLarge { max: usize },
    /// Counts must be at least 1
    ZeroCount,
}

impl Error for CommandError {}
impl Error for ArgumentError {}
impl Error for ValueError {}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommand { command_name } => {
                write!(f, "Not a command: `{}`", command_name)
            }
            Self::InvalidSubcommand {
                command_name,
                subcommand_name,
            } => write!(
                f,
                "Invalid subcommand `{}` for command `{}`",
                subcommand_name, command_name
            ),
            Self::MissingSubcommand { command_name } => {
                write!(f, "Missing subcommand for `{}`", command_name)
            }
            Self::InvalidArgument {
                command_name,
                error,
            } => {
                write!(f, "In command `{}`: {}", command_name, error)
            }
        }
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument { argument_name } => {
                write!(f, "Missing argument `{}`", argument_name)
            }
            Self::TooManyArguments {
                expected_count,
                actual_count,
            } => write!(
                f,
                "Too many arguments (expected at most {}, found {})",
                expected_count, actual_count
            ),
            Self::InvalidValue {
                argument_name,
                error,
            } => write!(f, "For argument `{}`: {}", argument_name, error),
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MismatchedType { expected_type } => {
                write!(f, "Incorrect value type (expected {})", expected_type)
            }
            Self::MalformedInteger => write!(f, "Malformed integer"),
            Self::MalformedLabel => write!(f, "Malformed label"),
            Self::IntegerTooLarge { max } => write!(f, "Integer too large (maximum {})", max),
            Self::ZeroCount => write!(f, "Count must be at least 1"),
        }
    }
}
