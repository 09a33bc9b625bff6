//! Normalized cell and range references produced by the parser.
use crate::store::types::{column_letters, quote_sheet, sheet_key, MAX_ROWS};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A sheet qualifier as written in a formula.
///
/// Equality, ordering and hashing ignore case, matching the host; `Display`
/// keeps the original spelling for messages.
#[derive(Debug, Clone)]
pub struct SheetName(String);

impl SheetName {
    pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn key(&self) -> String { sheet_key(&self.0) }
}

impl PartialEq for SheetName {
    fn eq(&self, other: &Self) -> bool { self.key() == other.key() }
}

impl Eq for SheetName {}

impl Hash for SheetName {
    fn hash<H: Hasher>(&self, state: &mut H) { self.key().hash(state) }
}

impl PartialOrd for SheetName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for SheetName {
    fn cmp(&self, other: &Self) -> Ordering { self.key().cmp(&other.key()) }
}

impl fmt::Display for SheetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote_sheet(&self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub sheet: Option<SheetName>,
    pub row: u32,
    pub column: u32,
    pub row_abs: bool,
    pub col_abs: bool,
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", sheet)?;
        }
        write!(
            f,
            "{}{}{}{}",
            if self.col_abs { "$" } else { "" },
            column_letters(self.column),
            if self.row_abs { "$" } else { "" },
            self.row
        )
    }
}

/// A rectangular block, corners normalized so `start <= end` on both axes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeRef {
    pub sheet: Option<SheetName>,
    pub start_row: u32,
    pub start_column: u32,
    pub end_row: u32,
    pub end_column: u32,
}

impl RangeRef {
    pub fn new(sheet: Option<SheetName>, a: (u32, u32), b: (u32, u32)) -> Self {
        Self {
            sheet,
            start_row: a.0.min(b.0),
            start_column: a.1.min(b.1),
            end_row: a.0.max(b.0),
            end_column: a.1.max(b.1),
        }
    }

    pub fn cell_count(&self) -> u64 {
        (self.end_row - self.start_row + 1) as u64 * (self.end_column - self.start_column + 1) as u64
    }

    pub fn contains(&self, row: u32, column: u32) -> bool {
        (self.start_row..=self.end_row).contains(&row)
            && (self.start_column..=self.end_column).contains(&column)
    }

    /// Covered `(row, column)` pairs in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.start_row..=self.end_row)
            .flat_map(move |r| (self.start_column..=self.end_column).map(move |c| (r, c)))
    }

    fn is_whole_column(&self) -> bool {
        self.start_row == 1 && self.end_row == MAX_ROWS
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", sheet)?;
        }
        if self.is_whole_column() {
            write!(f, "{}:{}", column_letters(self.start_column), column_letters(self.end_column))
        } else {
            write!(
                f,
                "{}{}:{}{}",
                column_letters(self.start_column),
                self.start_row,
                column_letters(self.end_column),
                self.end_row
            )
        }
    }
}

/// One operand of a formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reference {
    Cell(CellRef),
    /// A range small enough to be expanded into its covered addresses.
    Range(RangeRef),
    /// A range over the expansion bound, kept as a single reference.
    OpaqueRange(RangeRef),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Cell(c) => c.fmt(f),
            Reference::Range(r) | Reference::OpaqueRange(r) => r.fmt(f),
        }
    }
}

/// What a reference points at, with `$` markers and spelling stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefTarget {
    Cell { sheet: Option<SheetName>, row: u32, column: u32 },
    Opaque(RangeRef),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_names_compare_case_insensitively() {
        assert_eq!(SheetName::new("Assumptions"), SheetName::new("ASSUMPTIONS"));
        assert_eq!(SheetName::new("Football Field").to_string(), "'Football Field'");
    }

    #[test]
    fn test_range_normalizes_corners() {
        let r = RangeRef::new(None, (5, 7), (4, 2));
        assert_eq!((r.start_row, r.start_column, r.end_row, r.end_column), (4, 2, 5, 7));
        assert_eq!(r.cell_count(), 12);
        assert_eq!(r.cells().next(), Some((4, 2)));
        assert!(r.contains(5, 7));
        assert!(!r.contains(6, 7));
    }
}
