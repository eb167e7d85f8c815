use std::fmt;

use crate::lexer::cursor::Cursor;
use crate::span::{Idx, Span};

pub mod cursor;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LiteralKind {
    /// `42`, `-7`
    Dec,
    /// `0x2a`, `-0x10`
    Hex,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Opcodes, registers and labels
    Ident,
    Lit(LiteralKind),
    Comma,
    Colon,
    LBracket,
    RBracket,
    /// `;` until end of line
    Comment,
    Newline,
    /// Spaces and tabs
    Whitespace,
    Unknown,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Ident => "identifier",
            TokenKind::Lit(_) => "numeric literal",
            TokenKind::Comma => "comma",
            TokenKind::Colon => "colon",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Comment => "comment",
            TokenKind::Newline => "end of line",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Unknown => "unknown token",
            TokenKind::Eof => "end of file",
        };
        f.write_str(name)
    }
}

/// Lazily split source into tokens. The final token is always `Eof`.
pub fn tokenize(input: &str) -> impl Iterator<Item = Token> + '_ {
    let mut cursor = Cursor::new(input);
    let mut finished = false;
    std::iter::from_fn(move || {
        if finished {
            return None;
        }
        let token = cursor.advance_token();
        finished = token.kind == TokenKind::Eof;
        Some(token)
    })
}

/// Test if a character is considered to be whitespace, excluding newlines.
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

pub(crate) fn is_id_start(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_')
}

pub(crate) fn is_id(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> Token {
        let first_char = match self.bump() {
            Some(c) => c,
            None => {
                return Token::new(TokenKind::Eof, Span::new(Idx(self.token_start()), 0));
            }
        };
        let kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                TokenKind::Comment
            }
            '\n' => TokenKind::Newline,
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                TokenKind::Whitespace
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '-' if self.first().is_ascii_digit() => {
                let first = self.bump().unwrap_or('0');
                self.number(first)
            }
            c if c.is_ascii_digit() => self.number(c),
            c if is_id_start(c) => {
                self.take_while(is_id);
                TokenKind::Ident
            }
            _ => TokenKind::Unknown,
        };
        let token = Token::new(
            kind,
            Span::new(Idx(self.token_start()), self.pos_in_token()),
        );
        self.reset_pos();
        token
    }

    /// Digits following `first`. Trailing identifier characters are kept in the token so that
    /// `12ab` is reported as one malformed literal.
    fn number(&mut self, first: char) -> TokenKind {
        if first == '0' && matches!(self.first(), 'x' | 'X') {
            self.bump();
            self.take_while(is_id);
            return TokenKind::Lit(LiteralKind::Hex);
        }
        self.take_while(is_id);
        TokenKind::Lit(LiteralKind::Dec)
    }
}

/// Parse the text of a literal token. `None` if malformed.
pub fn parse_literal(text: &str, kind: LiteralKind) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match kind {
        LiteralKind::Dec => digits.parse::<i64>().ok()?,
        LiteralKind::Hex => {
            let hex = digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))?;
            i64::from_str_radix(hex, 16).ok()?
        }
    };
    Some(if negative { -magnitude } else { magnitude })
}
