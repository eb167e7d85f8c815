use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::state::{ProcessorState, Register};

/// Print to the debugger channel (stderr).
///
/// `dprint!(Always, Info, "pc at {}", pc)`
#[macro_export]
macro_rules! dprint {
    ( $cond:expr, $kind:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Condition::*, Kind::*};
        let s = format!(
            $fmt
            $($tt)*
        );
        $crate::output::Output::Debugger($cond, $kind).print_str(&s);
    }};
}

#[macro_export]
macro_rules! dprintln {
    ( $cond:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Condition::*, Kind::*};
        $crate::output::Output::Debugger($cond, Normal).print_str("\n");
    }};
    ( $cond:expr, $kind:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Condition::*, Kind::*};
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Debugger($cond, $kind).print_str(&s);
    }};
}

#[derive(Clone, Copy, Debug)]
pub enum Output {
    /// Program output, stdout
    Normal,
    /// Debugger messages, stderr
    Debugger(Condition, Kind),
}

/// Whether a debugger message survives `--minimal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Decorative, dropped in minimal mode
    Sometimes,
}

/// Colour of a debugger message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Kind {
    #[default]
    Normal,
    Info,
    Warning,
    Error,
    Special,
}

impl Kind {
    fn paint(self, string: &str) -> ColoredString {
        let string = ColoredString::from(string);
        match self {
            Kind::Normal => string,
            Kind::Info => string.blue(),
            Kind::Warning => string.yellow(),
            Kind::Error => string.red(),
            Kind::Special => string.magenta(),
        }
    }
}

impl Output {
    thread_local! {
        static IS_LINE_START: RefCell<bool> = const { RefCell::new(true) };
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_line_start(new_value: bool) -> bool {
        Self::IS_LINE_START.with(|value| value.replace(new_value))
    }
    fn is_line_start() -> bool {
        Self::IS_LINE_START.with(|value| *value.borrow())
    }
    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    fn set_line_start_from_str(string: &str) {
        if let Some(ch) = Decolored::new(string).last() {
            Output::set_line_start(ch == '\n');
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                if Self::is_minimal() {
                    print!("{}", Decolored::new(string).collect::<String>());
                } else {
                    print!("{}", string);
                }
                Self::set_line_start_from_str(string);
            }
            Self::Debugger(condition, kind) => match (Self::is_minimal(), *condition) {
                (false, _) => {
                    eprint!("{}", kind.paint(string));
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Always) => {
                    eprint!("{}", Decolored::new(string).collect::<String>());
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Sometimes) => (),
            },
        }
    }

    pub fn start_new_line(&self) {
        if !Self::is_line_start() {
            self.print_str("\n");
        }
    }

    pub fn print_registers(&self, state: &ProcessorState) {
        let flags = state.flags;
        let bit = |flag: bool| flag as u8;

        if Self::is_minimal() {
            for reg in Register::ALL {
                self.print_str(&format!("R{} {}\n", reg.index(), state.reg(reg)));
            }
            self.print_str(&format!("PC {}\n", state.pc));
            self.print_str(&format!(
                "FLAGS Z{} C{} N{} V{}\n",
                bit(flags.zero),
                bit(flags.carry),
                bit(flags.negative),
                bit(flags.overflow),
            ));
            self.print_str(&format!("STACK {:?}\n", state.call_stack));
            return;
        }

        self.print_str("\x1b[2m┌───────────────────────────────┐\x1b[0m\n");
        self.print_str("\x1b[2m│       \x1b[3mhex   int  uint  char\x1b[0m\x1b[2m │\x1b[0m\n");
        for reg in Register::ALL {
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(&format!(" \x1b[1mR{}\x1b[0m  ", reg.index()));
            self.print_integer(state.reg(reg));
            self.print_str(" \x1b[2m│\x1b[0m\n");
        }
        self.print_str("\x1b[2m│\x1b[0m");
        self.print_str(&format!(" \x1b[1mPC\x1b[0m  {:<6}", state.pc));
        self.print_str(&format!(
            "    \x1b[1mZCNV\x1b[0m  {}{}{}{}",
            bit(flags.zero),
            bit(flags.carry),
            bit(flags.negative),
            bit(flags.overflow),
        ));
        self.print_str("    \x1b[2m│\x1b[0m\n");
        self.print_str("\x1b[2m└───────────────────────────────┘\x1b[0m\n");
        if !state.call_stack.is_empty() {
            self.print_str(&format!(
                " \x1b[1mStack\x1b[0m {:?}\n",
                state.call_stack
            ));
        }
    }

    /// Hex, signed, unsigned and character views of a byte. Unsigned only if `--minimal`.
    pub fn print_integer(&self, value: u8) {
        if Self::is_minimal() {
            self.print_str(&format!("{}", value));
            return;
        }
        self.print_str(&format!("0x{:02x}  ", value));
        self.print_str(&format!("{:>4}  ", value as i8));
        self.print_str(&format!("{:>4}  ", value));
        self.print_char_display(value);
    }

    fn print_char_display(&self, value: u8) {
        // Always 4 characters wide
        match value {
            0x00 => self.print_str(" NUL"),
            0x09 => self.print_str("  HT"),
            0x0a => self.print_str("  LF"),
            0x0d => self.print_str("  CR"),
            0x1b => self.print_str(" ESC"),
            0x7f => self.print_str(" DEL"),
            0x20 => self.print_str(" [_]"),
            0x21..=0x7e => self.print_str(&format!("{:>4}", value as char)),
            0x00..=0x7f => self.print_str("\x1b[2m ───\x1b[0m"),
            0x80.. => self.print_str("\x1b[2m ┄┄┄\x1b[0m"),
        }
    }
}

/// Characters of a string, skipping ANSI colour sequences.
struct Decolored<'a> {
    chars: Chars<'a>,
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl Iterator for Decolored<'_> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}
