//! Formula parse error types.
use thiserror::Error;

/// Why a formula could not be reduced to a reference set.
///
/// A parse error never stops a validation run: the cell stays in the graph as an
/// isolated node and the error is reported as a finding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("formula is empty")]
    Empty,
    #[error("formula exceeds {limit} characters")]
    TooLong { limit: usize },
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unterminated string literal starting at position {pos}")]
    UnterminatedString { pos: usize },
    #[error("unterminated sheet name starting at position {pos}")]
    UnterminatedSheet { pos: usize },
    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("unknown function {0}")]
    UnknownFunction(String),
    #[error("unsupported name '{0}'")]
    UnknownName(String),
    #[error("range {0} spans two sheets")]
    CrossSheetRange(String),
    #[error("nesting deeper than {limit} levels")]
    DepthExceeded { limit: usize },
}
