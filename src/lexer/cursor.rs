// Heavily inspired by `rustc_lexer` and adapted to suit the project.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

/// Peekable iterator over a char sequence.
#[derive(Clone)]
pub struct Cursor<'a> {
    len_remaining: usize,
    /// Byte offset of the first character of the current token
    token_start: usize,
    chars: Chars<'a>,
}

pub(crate) const EOF_CHAR: char = '\0';

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            len_remaining: input.len(),
            token_start: 0,
            chars: input.chars(),
        }
    }

    /// Peek the next character without consuming it. `EOF_CHAR` if none.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    /// File is finished parsing
    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Move to the next character.
    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    /// Eat characters while predicate returns true or until EOF.
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while predicate(self.first()) && !self.is_eof() {
            self.bump();
        }
    }

    /// Bytes consumed since the current token started.
    pub fn pos_in_token(&self) -> usize {
        self.len_remaining - self.chars.as_str().len()
    }

    /// Byte offset of the current token in source.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Start a new token at the current position.
    pub fn reset_pos(&mut self) {
        self.token_start += self.pos_in_token();
        self.len_remaining = self.chars.as_str().len();
    }
}
