use std::io::{self, IsTerminal, Read, Write};

use console::{Key, Term};


/// Where debugger commands come from.
#[allow(private_interfaces)]
#[derive(Debug)]
pub enum SourceMode {
    Argument(Argument),
    Stdin(Stdin),
    Terminal(Terminal),
}

/// Must be ASCII, so that byte length matches visible width
const PROMPT: &str = "backstep> ";

/// Command-line argument, commands separated by newline or `;`
#[derive(Debug)]
struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

/// Stdin which is not attached to a terminal, i.e. piped
#[derive(Debug)]
struct Stdin {
    stdin: io::Stdin,
    /// Command must be stored somewhere to be referenced
    buffer: String,
}

/// Interactive unbuffered terminal
#[derive(Debug)]
struct Terminal {
    term: Term,
    /// Line being edited, may contain several `;`-separated commands
    buffer: String,
    /// Byte index of next command in a submitted line, 0 if a new line must be read
    cursor: usize,
    history: Vec<String>,
    /// Focused item in history, or new entry if index==length
    history_index: usize,
    /// Visible line cursor in terminal
    visible_cursor: usize,
}

pub trait SourceReader {
    /// `None` indicates EOF.
    /// Returned string slice MAY include leading or trailing whitespace.
    fn read(&mut self) -> Option<&str>;
}

impl SourceMode {
    pub fn from(argument: Option<String>) -> Self {
        if let Some(argument) = argument {
            return SourceMode::Argument(Argument::from(argument));
        }
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return SourceMode::Terminal(Terminal::new());
        }
        SourceMode::Stdin(Stdin::from(stdin))
    }
}

impl SourceReader for SourceMode {
    fn read(&mut self) -> Option<&str> {
        let command = match self {
            Self::Argument(argument) => argument.read(),
            Self::Stdin(stdin) => stdin.read(),
            // Terminal echoes as it is typed
            Self::Terminal(terminal) => return terminal.read(),
        };
        if command.is_some_and(|command| !command.trim().is_empty()) {
            dprint!(Sometimes, Special, "\x1b[1m{}\x1b[0m", PROMPT);
            dprintln!(Sometimes, Normal, "{}", command.unwrap_or("").trim());
        }
        command
    }
}

impl Argument {
    pub fn from(source: String) -> Self {
        Self {
            buffer: source,
            cursor: 0,
        }
    }
}

impl SourceReader for Argument {
    fn read(&mut self) -> Option<&str> {
        if self.cursor >= self.buffer.len() {
            return None;
        }
        let rest = &self.buffer[self.cursor..];
        let end = rest.find(|ch: char| ch == '\n' || ch == ';').unwrap_or(rest.len());
        // Skip delimiter
        self.cursor += end + 1;
        Some(&rest[..end])
    }
}

impl Stdin {
    pub fn from(stdin: io::Stdin) -> Self {
        Self {
            stdin,
            buffer: String::new(),
        }
    }

    /// `None` indicates EOF, or a failed read
    fn read_char(&mut self) -> Option<char> {
        let mut buffer = [0; 1];
        match self.stdin.read(&mut buffer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(buffer[0] as char),
        }
    }
}

impl SourceReader for Stdin {
    fn read(&mut self) -> Option<&str> {
        self.buffer.clear();
        loop {
            let Some(ch) = self.read_char() else {
                if self.buffer.is_empty() {
                    return None;
                }
                break;
            };
            if ch == '\n' || ch == ';' {
                break;
            }
            self.buffer.push(ch);
        }
        Some(&self.buffer)
    }
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            buffer: String::new(),
            cursor: 0,
            history: Vec::new(),
            history_index: 0,
            visible_cursor: 0,
        }
    }

    fn is_next(&self) -> bool {
        self.history_index >= self.history.len()
    }

    /// If focused on a historic item, copy it into the buffer before editing
    fn update_next(&mut self) {
        if let Some(historic) = self.history.get(self.history_index) {
            self.buffer = historic.clone();
            self.history_index = self.history.len();
        }
    }

    fn current(&self) -> &str {
        self.history
            .get(self.history_index)
            .map(String::as_str)
            .unwrap_or(&self.buffer)
    }

    fn print_prompt(&mut self) -> io::Result<()> {
        self.term.clear_line()?;
        let current = self.current().to_string();
        write!(self.term, "\x1b[1;35m{}\x1b[0m{}", PROMPT, current)?;
        self.term
            .move_cursor_left(current.len().saturating_sub(self.visible_cursor))?;
        self.term.flush()
    }

    /// Returns `true` once a non-empty line is submitted
    fn read_key(&mut self) -> io::Result<bool> {
        match self.term.read_key()? {
            Key::Enter | Key::Char('\n') => {
                if self.is_next() && self.buffer.trim().is_empty() {
                    self.buffer.clear();
                    self.visible_cursor = 0;
                    writeln!(self.term)?;
                } else {
                    self.update_next();
                    return Ok(true);
                }
            }
            // Ignore ASCII control characters
            Key::Char('\x00'..='\x1f' | '\x7f') => (),
            Key::Char(ch) if ch.is_ascii() => {
                self.update_next();
                self.buffer.insert(self.visible_cursor, ch);
                self.visible_cursor += 1;
            }
            Key::Backspace => {
                self.update_next();
                if self.visible_cursor > 0 {
                    self.buffer.remove(self.visible_cursor - 1);
                    self.visible_cursor -= 1;
                }
            }
            Key::Del => {
                self.update_next();
                if self.visible_cursor < self.buffer.len() {
                    self.buffer.remove(self.visible_cursor);
                }
            }
            Key::ArrowLeft => self.visible_cursor = self.visible_cursor.saturating_sub(1),
            Key::ArrowRight => {
                if self.visible_cursor < self.current().len() {
                    self.visible_cursor += 1;
                }
            }
            Key::ArrowUp => {
                if self.history_index > 0 {
                    self.history_index -= 1;
                    self.visible_cursor = self.current().len();
                }
            }
            Key::ArrowDown => {
                if self.history_index < self.history.len() {
                    self.history_index += 1;
                    self.visible_cursor = self.current().len();
                }
            }
            _ => (),
        }
        Ok(false)
    }

    fn read_line(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.visible_cursor = 0;
        loop {
            self.print_prompt()?;
            if self.read_key()? {
                break;
            }
        }
        writeln!(self.term)?;

        if self.history.last() != Some(&self.buffer) {
            self.history.push(self.buffer.clone());
        }
        self.history_index = self.history.len();
        Ok(())
    }

    /// Next command from the submitted line
    fn next_command(&mut self) -> &str {
        let rest = &self.buffer[self.cursor..];
        match rest.find(';') {
            Some(index) => {
                self.cursor += index + 1;
                &rest[..index]
            }
            None => {
                self.cursor = 0;
                rest
            }
        }
    }
}

impl SourceReader for Terminal {
    fn read(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            // Terminal failure ends the session, like EOF
            self.read_line().ok()?;
        }
        Some(self.next_command())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_splits_commands() {
        let mut argument = Argument::from("step 2; registers\nback\n".to_string());
        assert_eq!(argument.read(), Some("step 2"));
        assert_eq!(argument.read(), Some(" registers"));
        assert_eq!(argument.read(), Some("back"));
        assert_eq!(argument.read(), None);
    }

    #[test]
    fn argument_without_trailing_delimiter() {
        let mut argument = Argument::from("continue".to_string());
        assert_eq!(argument.read(), Some("continue"));
        assert_eq!(argument.read(), None);
        assert_eq!(Argument::from(String::new()).read(), None);
    }
}
