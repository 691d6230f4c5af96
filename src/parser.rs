// src/parser.rs
use crate::errors::{EvalError, Result};
use serde_json::Value;

/// Character scanner underneath the expression parser.
pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

pub fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

pub fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    pub fn pos(&self) -> usize {
        self.i
    }

    pub fn error(&self, msg: impl Into<String>) -> EvalError {
        EvalError::Syntax {
            msg: msg.into(),
            offset: self.i,
        }
    }

    pub fn parse_identifier(&mut self) -> Result<&'a str> {
        let start = self.i;
        match self.peek_char() {
            Some(c) if is_ident_start(c) => self.i += c.len_utf8(),
            _ => return Err(self.error("identifier expected")),
        }
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        Ok(&self.s[start..self.i])
    }

    pub fn parse_number_literal(&mut self) -> Result<Value> {
        let start = self.i;
        self.skip_digits();
        let mut is_float = false;
        if self.peek_char() == Some('.') {
            is_float = true;
            self.i += 1;
            self.skip_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            self.i += 1;
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.i += 1;
            }
            let exp_start = self.i;
            self.skip_digits();
            if self.i == exp_start {
                return Err(self.error("invalid decimal literal"));
            }
        }
        let s = &self.s[start..self.i];
        if s.is_empty() || s == "." {
            return Err(self.error("number expected"));
        }
        if self.peek_char().map(is_ident_start).unwrap_or(false) {
            return Err(self.error("invalid decimal literal"));
        }
        if is_float {
            let f: f64 = s.parse().map_err(|_| self.error("bad float"))?;
            if !f.is_finite() {
                return Err(EvalError::Overflow(format!("float literal {s} is out of range")));
            }
            Ok(Value::from(f))
        } else {
            let i: i64 = s
                .parse()
                .map_err(|_| EvalError::Overflow(format!("integer literal {s} is too large")))?;
            Ok(Value::from(i))
        }
    }

    fn skip_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.i += 1;
            } else {
                break;
            }
        }
    }

    pub fn parse_quoted_string(&mut self) -> Result<String> {
        let start = self.i;
        let quote = self
            .peek_char()
            .ok_or_else(|| self.error("string expected"))?;
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
            if c == '\n' {
                break;
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
        Err(EvalError::Syntax {
            msg: "unterminated string literal".into(),
            offset: start,
        })
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

    /// True if `kw` is next and is not merely the prefix of a longer name.
    pub fn peek_keyword(&self, kw: &str) -> bool {
        self.peek_str(kw)
            && !self.s[self.i + kw.len()..]
                .chars()
                .next()
                .map(is_ident_continue)
                .unwrap_or(false)
    }

    pub fn consume_keyword(&mut self, kw: &str) -> bool {
        if self.peek_keyword(kw) {
            self.i += kw.len();
            true
        } else {
            false
        }
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}
