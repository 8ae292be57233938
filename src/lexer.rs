//! Byte-level scanning of a mangled name.

use crate::error::{expected, malformed, Malformed, Result};

/// Returned by `peek` past the end of input. Never part of a valid mangling.
pub const EOT: u8 = 0;

pub const MANGLING_PREFIX: &[u8] = b"_T";

// Swift 4's `_T0` prefix introduced the newer mangling.
const NEWER_MANGLING_PREFIX: &[u8] = b"_T0";

/// The fast-reject check: everything else is plain text. `_T0` symbols belong
/// to the newer mangling and are rejected too.
pub fn is_mangled_name(input: &[u8]) -> bool {
    input.starts_with(MANGLING_PREFIX) && !input.starts_with(NEWER_MANGLING_PREFIX)
}

// Longer digit runs cannot fit into a u64.
const MAX_NATURAL_DIGITS: usize = 20;

pub struct Cursor<'input> {
    input: &'input [u8],
    pos: usize,
}

impl<'input> Cursor<'input> {
    pub fn new(input: &'input [u8]) -> Cursor<'input> {
        Cursor { input, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    pub fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    pub fn peek_at(&self, offset: usize) -> u8 {
        self.input.get(self.pos + offset).cloned().unwrap_or(EOT)
    }

    pub fn next(&mut self) -> Result<u8> {
        match self.input.get(self.pos) {
            Some(&c) => {
                self.pos += 1;
                Ok(c)
            }
            None => malformed(self.pos, Malformed::UnexpectedEnd),
        }
    }

    pub fn next_if(&mut self, c: u8) -> bool {
        if !self.at_end() && self.peek() == c {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn next_if_str(&mut self, s: &[u8]) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, c: u8, what: &'static str) -> Result<()> {
        if self.next_if(c) {
            Ok(())
        } else {
            let found = if self.at_end() { None } else { Some(self.peek()) };
            expected(self.pos, what, found)
        }
    }

    /// Consumes `len` bytes.
    pub fn take(&mut self, len: u64) -> Result<&'input [u8]> {
        let available = self.remaining();
        if len > available as u64 {
            return malformed(
                self.pos,
                Malformed::TruncatedIdentifier {
                    declared: len,
                    available,
                },
            );
        }

        let start = self.pos;
        self.pos += len as usize;
        Ok(&self.input[start..self.pos])
    }

    /// natural ::= [0-9]+
    pub fn natural(&mut self) -> Result<u64> {
        if !self.peek().is_ascii_digit() || self.at_end() {
            let found = if self.at_end() { None } else { Some(self.peek()) };
            return expected(self.pos, "digit", found);
        }

        let start = self.pos;
        let mut value: u64 = 0;

        while !self.at_end() && self.peek().is_ascii_digit() {
            if self.pos - start >= MAX_NATURAL_DIGITS {
                return malformed(start, Malformed::Overflow);
            }

            let digit = (self.peek() - b'0') as u64;
            value = match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                Some(value) => value,
                None => return malformed(start, Malformed::Overflow),
            };
            self.pos += 1;
        }

        Ok(value)
    }

    /// index ::= '_'            # 0
    /// index ::= natural '_'    # natural + 1
    pub fn index(&mut self) -> Result<u64> {
        if self.next_if(b'_') {
            return Ok(0);
        }

        let start = self.pos;
        let n = self.natural()?;
        self.expect(b'_', "'_'")?;

        match n.checked_add(1) {
            Some(index) => Ok(index),
            None => malformed(start, Malformed::Overflow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn prefix_check() {
        assert!(is_mangled_name(b"_TtSi"));
        assert!(!is_mangled_name(b"hello"));
        assert!(!is_mangled_name(b""));
        assert!(!is_mangled_name(b"_"));
        assert!(!is_mangled_name(b"_T0SiD"));
        assert!(!is_mangled_name(b"$sSiD"));
    }

    #[test]
    fn naturals_and_indices() {
        let mut c = Cursor::new(b"123abc");
        assert_eq!(c.natural().unwrap(), 123);
        assert_eq!(c.peek(), b'a');

        let mut c = Cursor::new(b"_4_x");
        assert_eq!(c.index().unwrap(), 0);
        assert_eq!(c.index().unwrap(), 5);
        assert_eq!(c.peek(), b'x');
        assert!(c.next_if(b'x'));
        assert!(c.at_end());
        assert_eq!(c.peek(), EOT);
    }

    #[test]
    fn natural_overflow_fails() {
        let mut c = Cursor::new(b"18446744073709551615");
        assert_eq!(c.natural().unwrap(), u64::max_value());

        let mut c = Cursor::new(b"18446744073709551616");
        match c.natural() {
            Err(Error::MalformedGrammar {
                reason: Malformed::Overflow,
                ..
            }) => {}
            other => panic!("{:?}", other),
        }

        let mut c = Cursor::new(b"000000000000000000000001");
        assert!(c.natural().is_err());
    }

    #[test]
    fn take_is_bounds_checked() {
        let mut c = Cursor::new(b"abc");
        match c.take(10) {
            Err(Error::MalformedGrammar {
                reason: Malformed::TruncatedIdentifier {
                    declared: 10,
                    available: 3,
                },
                ..
            }) => {}
            other => panic!("{:?}", other),
        }
        assert_eq!(c.take(2).unwrap(), b"ab");
        assert_eq!(c.pos(), 2);
    }
}
