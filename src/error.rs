use crate::ast::Kind;
use thiserror::Error;

/// Why a symbol that looked mangled could not be decoded.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Malformed {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("expected {expected}, found {found:?}")]
    Expected { expected: &'static str, found: char },
    #[error("number does not fit into 64 bits")]
    Overflow,
    #[error("identifier declares {declared} bytes but only {available} remain")]
    TruncatedIdentifier { declared: u64, available: usize },
    #[error("identifier is not valid UTF-8")]
    InvalidUtf8,
    #[error("could not decode punycode identifier {0:?}")]
    InvalidPunycode(String),
    #[error("invalid operator character {0:?}")]
    InvalidOperator(char),
    #[error("back reference {index} is out of range of {len} substitutions")]
    BadBackReference { index: u64, len: usize },
    #[error("unexpected {0} node")]
    UnexpectedKind(Kind),
    #[error("empty argument list")]
    EmptyList,
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("not a mangled Swift symbol")]
    NotMangled,
    #[error("malformed mangling at offset {offset}: {reason}")]
    MalformedGrammar { offset: usize, reason: Malformed },
    #[error("nesting exceeds {limit} levels")]
    DepthExceeded { limit: usize },
    #[error("unexpected {kind} node with {children} children")]
    UnknownNodeShape { kind: Kind, children: usize },
}

pub type Result<T> = ::std::result::Result<T, Error>;

pub fn malformed<T>(offset: usize, reason: Malformed) -> Result<T> {
    Err(Error::MalformedGrammar { offset, reason })
}

pub fn expected<T>(offset: usize, expected: &'static str, found: Option<u8>) -> Result<T> {
    match found {
        Some(c) => malformed(
            offset,
            Malformed::Expected {
                expected,
                found: c as char,
            },
        ),
        None => malformed(offset, Malformed::UnexpectedEnd),
    }
}
