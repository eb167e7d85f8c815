use std::{iter::Peekable, vec::IntoIter};

use fxhash::FxHashSet;
use miette::Result;

use crate::{
    error,
    isa::{Address, Condition, Instruction, Opcode, Value},
    lexer::{parse_literal, tokenize, LiteralKind, Token, TokenKind},
    program::{Line, LineKind},
    span::{Idx, Span},
    state::Register,
};

/// Transforms token stream into assembly lines
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    /// Peekable iterator over tokens, without whitespace
    toks: Peekable<IntoIter<Token>>,
    /// Span of the most recently consumed token
    last: Span,
    lines: Vec<Line>,
    /// Labels defined so far
    defined: FxHashSet<String>,
    /// Labels referenced by branches and calls, checked once every line is parsed
    references: Vec<(String, Span)>,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Result<Self> {
        let mut toks = Vec::new();
        for tok in tokenize(src) {
            match tok.kind {
                TokenKind::Whitespace => continue,
                TokenKind::Unknown => return Err(error::lex_unknown(tok.span, src)),
                _ => toks.push(tok),
            }
        }
        Ok(AsmParser {
            src,
            toks: toks.into_iter().peekable(),
            last: Span::dummy(),
            lines: Vec::new(),
            defined: FxHashSet::default(),
            references: Vec::new(),
        })
    }

    fn get_span(&self, span: Span) -> &'a str {
        &self.src[span.offs()..span.end()]
    }

    /// Create lines out of token stream
    pub fn parse(mut self) -> Result<Vec<Line>> {
        while self.peek_kind() != TokenKind::Eof {
            let line = self.parse_line()?;
            self.lines.push(line);
        }

        // No forward references can be left unresolved at runtime
        for (label, span) in &self.references {
            if !self.defined.contains(label) {
                return Err(error::parse_undefined_label(*span, self.src));
            }
        }
        Ok(self.lines)
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.toks
            .peek()
            .map(|tok| tok.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn next(&mut self) -> Token {
        let eof = Token::new(TokenKind::Eof, Span::new(Idx(self.src.len()), 0));
        let tok = self.toks.next().unwrap_or(eof);
        self.last = tok.span;
        tok
    }

    fn parse_line(&mut self) -> Result<Line> {
        let (kind, span) = match self.peek_kind() {
            TokenKind::Ident => {
                let tok = self.next();
                if self.peek_kind() == TokenKind::Colon {
                    self.next();
                    let name = self.get_span(tok.span);
                    if !self.defined.insert(name.to_string()) {
                        return Err(error::parse_duplicate_label(tok.span, self.src));
                    }
                    (LineKind::Label(name.to_string()), tok.span.join(self.last))
                } else {
                    let instruction = self.parse_instr(tok)?;
                    (LineKind::Instruction(instruction), tok.span.join(self.last))
                }
            }
            TokenKind::Comment | TokenKind::Newline | TokenKind::Eof => {
                (LineKind::Empty, Span::dummy())
            }
            _ => {
                let tok = self.next();
                return Err(error::parse_generic_unexpected(
                    self.src,
                    "instruction or label",
                    tok,
                ));
            }
        };

        let comment = if self.peek_kind() == TokenKind::Comment {
            let tok = self.next();
            // Drop leading `;`
            Some(self.get_span(tok.span)[1..].to_string())
        } else {
            None
        };

        match self.peek_kind() {
            TokenKind::Newline => {
                self.next();
            }
            TokenKind::Eof => (),
            _ => {
                let tok = self.next();
                return Err(error::parse_generic_unexpected(
                    self.src,
                    "end of line",
                    tok,
                ));
            }
        }

        Ok(Line {
            kind,
            comment,
            span,
        })
    }

    /// Process several tokens to form a valid instruction
    fn parse_instr(&mut self, tok: Token) -> Result<Instruction> {
        let name = self.get_span(tok.span);
        let op = match name.parse::<Opcode>() {
            Ok(op) => op,
            Err(()) => {
                // `b` followed directly by a condition code, eg. `bne`
                let cond = name
                    .get(..1)
                    .filter(|b| b.eq_ignore_ascii_case("b"))
                    .and_then(|_| name[1..].parse::<Condition>().ok());
                return match cond {
                    Some(cond) => {
                        let label = self.expect_label()?;
                        Ok(Instruction::Branch { cond, label })
                    }
                    None => Err(error::parse_unknown_opcode(tok.span, self.src)),
                };
            }
        };

        let instr = match op {
            Opcode::Ldr => {
                let dest = self.expect_reg()?;
                self.expect(TokenKind::Comma)?;
                let src = self.expect_address()?;
                Instruction::Ldr { dest, src }
            }
            Opcode::Str => {
                let dest = self.expect_address()?;
                self.expect(TokenKind::Comma)?;
                let src = self.expect_reg()?;
                Instruction::Str { dest, src }
            }
            Opcode::B => Instruction::Branch {
                cond: Condition::Al,
                label: self.expect_label()?,
            },
            Opcode::Call => Instruction::Call {
                label: self.expect_label()?,
            },
            Opcode::Ret => Instruction::Ret,
            Opcode::Hlt => Instruction::Hlt,
            Opcode::Nop => Instruction::Nop,
            Opcode::Cmp => {
                let a = self.expect_reg()?;
                self.expect(TokenKind::Comma)?;
                let b = self.expect_value()?;
                Instruction::Cmp { a, b }
            }
            Opcode::Mov | Opcode::Neg | Opcode::Not => {
                let dest = self.expect_reg()?;
                self.expect(TokenKind::Comma)?;
                let src = self.expect_value()?;
                Instruction::Unary { op, dest, src }
            }
            Opcode::Add
            | Opcode::Sub
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Lsl
            | Opcode::Lsr
            | Opcode::Asr
            | Opcode::Rol
            | Opcode::Ror => {
                let dest = self.expect_reg()?;
                self.expect(TokenKind::Comma)?;
                let first = self.expect_value()?;
                let first_span = self.last;
                if self.peek_kind() == TokenKind::Comma {
                    self.next();
                    // Three operand form, middle operand must be a register
                    let Value::Reg(a) = first else {
                        return Err(error::parse_generic_unexpected(
                            self.src,
                            "register",
                            Token::new(TokenKind::Lit(LiteralKind::Dec), first_span),
                        ));
                    };
                    let b = self.expect_value()?;
                    Instruction::Arith { op, dest, a, b }
                } else {
                    // `op rD, b` is short for `op rD, rD, b`
                    Instruction::Arith {
                        op,
                        dest,
                        a: dest,
                        b: first,
                    }
                }
            }
        };
        Ok(instr)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        let tok = self.next();
        if tok.kind == expected {
            Ok(tok)
        } else {
            Err(error::parse_generic_unexpected(
                self.src,
                &expected.to_string(),
                tok,
            ))
        }
    }

    fn expect_reg(&mut self) -> Result<Register> {
        let tok = self.next();
        match self.as_reg(tok) {
            Some(reg) => Ok(reg),
            None => Err(error::parse_generic_unexpected(self.src, "register", tok)),
        }
    }

    fn as_reg(&self, tok: Token) -> Option<Register> {
        if tok.kind != TokenKind::Ident {
            return None;
        }
        self.get_span(tok.span).parse().ok()
    }

    fn expect_label(&mut self) -> Result<String> {
        let tok = self.next();
        if tok.kind != TokenKind::Ident {
            return Err(error::parse_generic_unexpected(self.src, "label", tok));
        }
        let label = self.get_span(tok.span).to_string();
        self.references.push((label.clone(), tok.span));
        Ok(label)
    }

    fn expect_value(&mut self) -> Result<Value> {
        let tok = self.next();
        match tok.kind {
            TokenKind::Lit(kind) => Ok(Value::Imm(self.literal(tok, kind)?)),
            _ => match self.as_reg(tok) {
                Some(reg) => Ok(Value::Reg(reg)),
                None => Err(error::parse_generic_unexpected(
                    self.src,
                    "register or numeric literal",
                    tok,
                )),
            },
        }
    }

    fn expect_address(&mut self) -> Result<Address> {
        self.expect(TokenKind::LBracket)?;
        let tok = self.next();
        let addr = match tok.kind {
            TokenKind::Lit(kind) => Address::Abs(self.literal(tok, kind)?),
            _ => match self.as_reg(tok) {
                Some(reg) => Address::Reg(reg),
                None => {
                    return Err(error::parse_generic_unexpected(
                        self.src,
                        "register or numeric literal",
                        tok,
                    ))
                }
            },
        };
        self.expect(TokenKind::RBracket)?;
        Ok(addr)
    }

    /// Reduce a literal modulo 256, negative values become two's complement.
    fn literal(&self, tok: Token, kind: LiteralKind) -> Result<u8> {
        let Some(value) = parse_literal(self.get_span(tok.span), kind) else {
            return Err(error::lex_invalid_lit(tok.span, self.src));
        };
        Ok((value & 0xFF) as u8)
    }
}

/// Parse a whole source file into lines.
pub fn parse_file(src: &str) -> Result<Vec<Line>> {
    AsmParser::new(src)?.parse()
}
