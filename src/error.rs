use std::{error::Error, fmt};

use miette::{miette, LabeledSpan, Report, Severity};

use crate::lexer::Token;
use crate::span::Span;

/// Failure while decoding an instruction or applying an effect.
///
/// Every failure is atomic: no effect is produced and no state is modified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecError {
    /// Memory access beyond the addressable range.
    OutOfRange { addr: u16 },
    /// Branch or call target missing from the label table.
    UnknownLabel { label: String },
    /// Instruction shape which the executor cannot decode.
    UnsupportedInstruction { reason: String },
}

impl Error for ExecError {}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { addr } => {
                write!(f, "Attempted to access out of bounds address {}", addr)
            }
            Self::UnknownLabel { label } => write!(f, "Unknown label `{}`", label),
            Self::UnsupportedInstruction { reason } => {
                write!(f, "Unsupported instruction: {}", reason)
            }
        }
    }
}

// Lexer errors

pub fn lex_unknown(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::unknown",
        help = "operands are registers like r0, literals like 12 or 0xff, and addresses like [r1]",
        labels = vec![LabeledSpan::at(span, "unknown token")],
        "Encountered an unknown token",
    )
    .with_source_code(src.to_string())
}

pub fn lex_invalid_lit(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::bad_lit",
        help = "literals are decimal like 42 or hex like 0x2a, with an optional leading -",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an invalid literal",
    )
    .with_source_code(src.to_string())
}

// Parser errors

pub fn parse_unknown_opcode(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::opcode",
        help = "check the list of available instructions in the documentation.",
        labels = vec![LabeledSpan::at(span, "unknown opcode")],
        "Encountered an unknown instruction",
    )
    .with_source_code(src.to_string())
}

pub fn parse_duplicate_label(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::duplicate_label",
        help = "labels are only allowed once per file",
        labels = vec![LabeledSpan::at(span, "duplicate label")],
        "Duplicate label"
    )
    .with_source_code(src.to_string())
}

pub fn parse_undefined_label(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::undefined_label",
        help = "define the label with `name:` on its own line",
        labels = vec![LabeledSpan::at(span, "undefined label")],
        "Reference to a label which is never defined"
    )
    .with_source_code(src.to_string())
}

pub fn parse_generic_unexpected(src: &str, expected: &str, found: Token) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::unexpected_token",
        help = "check the operands for this instruction",
        labels = vec![LabeledSpan::at(found.span, "unexpected token")],
        "Expected {expected}, found {}",
        found.kind
    )
    .with_source_code(src.to_string())
}
