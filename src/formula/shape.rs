//! Canonical rendering of a token stream.
//!
//! `A1` mode gives the normalized formula text. `Relative` mode rewrites every
//! non-absolute reference component as an offset from the host cell (R1C1 style),
//! so `=B4*2` in C4 and `=C4*2` in D4 render identically.
use super::lexer::Token;
use crate::store::types::{column_letters, quote_sheet};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    A1,
    Relative { row: u32, column: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormulaShape {
    pub text: String,
    /// Reads a cell to its left on the same row (a roll-forward such as `=B4*(1+g)`),
    /// which needs a seed value in the first period.
    pub rolls_forward: bool,
    /// Reads a cell above it in the same column (a running total such as `=B9+C10`
    /// laid out downwards), which needs a seed value in the first row.
    pub rolls_down: bool,
}

pub(crate) fn render(tokens: &[Token], mode: RenderMode) -> FormulaShape {
    let mut text = String::new();
    let mut rolls_forward = false;
    let mut rolls_down = false;
    if tokens.is_empty() {
        return FormulaShape { text, rolls_forward, rolls_down };
    }
    text.push('=');

    let mut qualified = false;
    for token in tokens {
        let _ = match token {
            Token::Number(n) => write!(text, "{}", n),
            Token::Text(s) => write!(text, "\"{}\"", s.replace('"', "\"\"")),
            Token::Bool(b) => write!(text, "{}", if *b { "TRUE" } else { "FALSE" }),
            Token::ErrorLit(e) | Token::Ident(e) => write!(text, "{}", e),
            Token::Sheet(name) => write!(text, "{}!", quote_sheet(&name.key())),
            Token::Op(op) => write!(text, "{}", op.symbol()),
            Token::Colon => write!(text, ":"),
            Token::Comma => write!(text, ","),
            Token::LParen => write!(text, "("),
            Token::RParen => write!(text, ")"),
            Token::Cell(cell) => match mode {
                RenderMode::A1 => write!(
                    text,
                    "{}{}{}{}",
                    if cell.col_abs { "$" } else { "" },
                    column_letters(cell.column),
                    if cell.row_abs { "$" } else { "" },
                    cell.row
                ),
                RenderMode::Relative { row, column } => {
                    let dr = cell.row as i64 - row as i64;
                    let dc = cell.column as i64 - column as i64;
                    if !qualified && !cell.row_abs && !cell.col_abs {
                        rolls_forward |= dr == 0 && dc < 0;
                        rolls_down |= dc == 0 && dr < 0;
                    }
                    write_axis(&mut text, 'R', cell.row_abs, cell.row, dr);
                    write_axis(&mut text, 'C', cell.col_abs, cell.column, dc);
                    Ok(())
                }
            },
            Token::Column(col) => match mode {
                RenderMode::A1 => write!(text, "{}{}", if col.abs { "$" } else { "" }, column_letters(col.column)),
                RenderMode::Relative { column, .. } => {
                    write_axis(&mut text, 'C', col.abs, col.column, col.column as i64 - column as i64);
                    Ok(())
                }
            },
        };
        qualified = matches!(token, Token::Sheet(_));
    }
    FormulaShape { text, rolls_forward, rolls_down }
}

fn write_axis(out: &mut String, axis: char, absolute: bool, value: u32, offset: i64) {
    let _ = if absolute {
        write!(out, "{}{}", axis, value)
    } else {
        write!(out, "{}[{}]", axis, offset)
    };
}

#[cfg(test)]
mod tests {
    use crate::formula::parse;

    #[test]
    fn test_copied_formulas_share_a_shape() {
        let c = parse("=B4*(1+Assumptions!$B$30)").shape(4, 3).unwrap();
        let d = parse("=C4*(1+Assumptions!$B$30)").shape(4, 4).unwrap();
        assert_eq!(c, d);
        assert_eq!(c.text, "=R[0]C[-1]*(1+ASSUMPTIONS!R30C2)");
        assert!(c.rolls_forward);
        assert!(!c.rolls_down);
    }

    #[test]
    fn test_running_total_down_a_column() {
        let shape = parse("=C9+B10").shape(10, 3).unwrap();
        assert_eq!(shape.text, "=R[-1]C[0]+R[0]C[-1]");
        assert!(shape.rolls_down);
        assert!(shape.rolls_forward);
    }

    #[test]
    fn test_shifted_reference_changes_shape() {
        let c = parse("=C4*2").shape(6, 3).unwrap();
        let d = parse("=D5*2").shape(6, 4).unwrap();
        assert_ne!(c, d);
        assert!(!c.rolls_forward);
    }

    #[test]
    fn test_mixed_anchors() {
        let shape = parse("=$A4+B$1").shape(4, 3).unwrap();
        assert_eq!(shape.text, "=R[0]C1+R1C[-1]");
        // An anchored column is not a roll-forward.
        assert!(!shape.rolls_forward);
    }

    #[test]
    fn test_failed_formula_has_no_shape() {
        assert!(parse("=SUM(").shape(1, 1).is_none());
    }
}
