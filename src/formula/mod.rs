//! Formula text to normalized reference sets.
//!
//! This is the only place that understands formula syntax. Everything downstream
//! works with [`ParsedFormula`]: its references, its canonical text and its
//! position-independent shape.
pub mod error;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod reference;
pub mod shape;

pub use error::ParseError;
pub use parser::{parse, ParsedFormula, Parser, ParserOptions};
pub use reference::{CellRef, RangeRef, RefTarget, Reference, SheetName};
pub use shape::FormulaShape;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Randomly re-cases a formula and sprinkles spaces between tokens.
    fn respell(formula: &str, flips: &[bool], spaces: &[u8]) -> String {
        let mut out = String::from("=");
        let mut in_string = false;
        for (i, c) in formula.chars().skip(1).enumerate() {
            if c == '"' {
                in_string = !in_string;
            }
            let flip = flips.get(i % flips.len().max(1)).copied().unwrap_or(false);
            let c = if !in_string && flip { c.to_ascii_lowercase() } else { c };
            if !in_string && matches!(c, '+' | '*' | '(' | ',' | ')') {
                let n = spaces.get(i % spaces.len().max(1)).copied().unwrap_or(0) as usize;
                out.push_str(&" ".repeat(n));
                out.push(c);
                out.push_str(&" ".repeat(n));
            } else {
                out.push(c);
            }
        }
        out
    }

    proptest! {
        #[test]
        fn prop_whitespace_and_case_do_not_change_references(
            template in prop::sample::select(vec![
                "=SUM(B4:D4)*Assumptions!$B$30",
                "=IF(C5>0,C5*(1+Projections!B7),MAX(A1,A2))",
                "=AVERAGE('Balance Sheet'!B10:B12)+B17*B18",
                "=NPV(Valuation!B4,Projections!B15:G15)+\"Note\"",
            ]),
            flips in prop::collection::vec(any::<bool>(), 1..16),
            spaces in prop::collection::vec(0u8..3, 1..16),
        ) {
            let original = parse(template);
            let respelled = parse(&respell(template, &flips, &spaces));
            prop_assert!(respelled.is_ok(), "{:?}", respelled.error);
            prop_assert_eq!(original.reference_set(), respelled.reference_set());
        }
    }
}
