// src/parser.rs
use crate::errors::{Error, Result};
use crate::value::Value;

/// Character cursor shared by the fragment grammar.
pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    pub fn error(&self, msg: impl AsRef<str>) -> Error {
        Error::Syntax(format!("{} at offset {}", msg.as_ref(), self.i))
    }

    pub fn pos(&self) -> usize {
        self.i
    }

    pub fn reset(&mut self, pos: usize) {
        self.i = pos;
    }

    pub fn parse_identifier(&mut self) -> Result<String> {
        let start = self.i;
        if let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                return Err(self.error("identifier expected"));
            }
        }
        while let Some(c) = self.peek_char() {
            if is_ident_char(c) {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        if self.i == start {
            return Err(self.error("identifier expected"));
        }
        Ok(self.s[start..self.i].to_string())
    }

    pub fn peek_identifier(&self) -> bool {
        self.peek_char().map(|c| c == '_' || c.is_alphabetic()).unwrap_or(false)
    }

    /// Unsigned int or float literal; the sign is handled by the grammar.
    pub fn parse_number_literal(&mut self) -> Result<Value> {
        let start = self.i;
        self.eat_digits();
        let mut is_float = false;
        if self.peek_char() == Some('.')
            && self.s[self.i + 1..].chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            is_float = true;
            self.i += 1;
            self.eat_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let save = self.i;
            self.i += 1;
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.i += 1;
            }
            if self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                is_float = true;
                self.eat_digits();
            } else {
                self.i = save;
            }
        }
        let s = &self.s[start..self.i];
        if s.is_empty() {
            return Err(self.error("number expected"));
        }
        if is_float {
            let f: f64 = s.parse().map_err(|_| self.error("bad float"))?;
            Ok(Value::Float(f))
        } else {
            let i: i64 = s.parse().map_err(|_| self.error("bad int"))?;
            Ok(Value::Int(i))
        }
    }

    fn eat_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.i += 1;
            } else {
                break;
            }
        }
    }

    pub fn parse_quoted_string(&mut self) -> Result<String> {
        let quote = self.peek_char().ok_or_else(|| self.error("string expected"))?;
        if quote != '\'' && quote != '"' {
            return Err(self.error("expected quoted string"));
        }
        self.i += 1;
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            self.i += c.len_utf8();
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                if let Some(nc) = self.peek_char() {
                    self.i += nc.len_utf8();
                    match nc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' => out.push('\\'),
                        '"' => out.push('"'),
                        '\'' => out.push('\''),
                        _ => {
                            out.push('\\');
                            out.push(nc);
                        }
                    }
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        Err(self.error("unterminated string"))
    }

    pub fn expect(&mut self, c: char) -> Result<()> {
        self.skip_ws();
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn consume_str(&mut self, lit: &str) -> bool {
        if self.peek_str(lit) {
            self.i += lit.len();
            true
        } else {
            false
        }
    }

    /// Consume `op` only when it is not immediately followed by `unless`,
    /// e.g. `+` but not `+=`.
    pub fn consume_op(&mut self, op: &str, unless: char) -> bool {
        if self.peek_str(op) && self.s[self.i + op.len()..].chars().next() != Some(unless) {
            self.i += op.len();
            true
        } else {
            false
        }
    }

    /// Consume a keyword that is not the prefix of a longer identifier.
    pub fn consume_keyword(&mut self, kw: &str) -> bool {
        if self.peek_keyword(kw) {
            self.i += kw.len();
            true
        } else {
            false
        }
    }

    pub fn peek_keyword(&self, kw: &str) -> bool {
        self.peek_str(kw)
            && !self.s[self.i + kw.len()..].chars().next().map(is_ident_char).unwrap_or(false)
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    /// Skips whitespace and `#` comments running to the end of the line.
    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else if c == '#' {
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.i += c.len_utf8();
                }
            } else {
                break;
            }
        }
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}
