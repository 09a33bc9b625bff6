//! Recursive-descent recognizer for the reference grammar.
//!
//! The parser does not build an expression tree: it checks the formula against
//! the grammar and collects every operand reference along the way. Precedence
//! (lowest to highest): comparison, `&`, `+ -`, `* /`, `^`, unary `+ -`,
//! postfix `%`, range `:`, primary.
use super::error::ParseError;
use super::functions;
use super::lexer::{parse_column_token, tokenize, ColumnToken, Operator, Token};
use super::reference::{CellRef, RangeRef, RefTarget, Reference, SheetName};
use super::shape::{render, FormulaShape, RenderMode};
use crate::store::types::{FORMULA_MARKER, MAX_ROWS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Guards against pathological formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Ranges covering more cells than this are kept as one opaque reference.
    pub max_range_cells: u64,
    /// Maximum nesting of parentheses, function calls and unary operators.
    pub max_depth: usize,
    /// Longer formula text is rejected outright.
    pub max_formula_len: usize,
    /// Function names accepted in addition to the built-in set.
    pub extra_functions: Vec<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_range_cells: 10_000,
            max_depth: 64,
            max_formula_len: 8_192,
            extra_functions: Vec::new(),
        }
    }
}

/// The reference set of one formula, or the reason it has none.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedFormula {
    /// Distinct references in order of first appearance.
    pub references: Vec<Reference>,
    pub error: Option<ParseError>,
    tokens: Vec<Token>,
}

impl ParsedFormula {
    pub fn is_ok(&self) -> bool { self.error.is_none() }

    /// Every address the formula reads, ranges expanded, `$` markers ignored.
    pub fn reference_set(&self) -> BTreeSet<RefTarget> {
        let mut set = BTreeSet::new();
        for reference in &self.references {
            match reference {
                Reference::Cell(c) => {
                    set.insert(RefTarget::Cell { sheet: c.sheet.clone(), row: c.row, column: c.column });
                }
                Reference::Range(r) => {
                    for (row, column) in r.cells() {
                        set.insert(RefTarget::Cell { sheet: r.sheet.clone(), row, column });
                    }
                }
                Reference::OpaqueRange(r) => {
                    set.insert(RefTarget::Opaque(r.clone()));
                }
            }
        }
        set
    }

    /// Normalized A1 text without whitespace, e.g. `=SUM(B4:B9)*'BALANCE SHEET'!$C$2`.
    pub fn canonical(&self) -> Option<String> {
        self.is_ok().then(|| render(&self.tokens, RenderMode::A1).text)
    }

    /// The formula with references rewritten relative to `(row, column)`.
    ///
    /// Two cells whose formulas "do the same thing" to their neighbours share a shape.
    pub fn shape(&self, row: u32, column: u32) -> Option<FormulaShape> {
        if !self.is_ok() || self.tokens.is_empty() {
            return None;
        }
        Some(render(&self.tokens, RenderMode::Relative { row, column }))
    }

    fn failed(error: ParseError) -> Self {
        Self { references: Vec::new(), error: Some(error), tokens: Vec::new() }
    }
}

/// Parses with the default guards.
pub fn parse(raw: &str) -> ParsedFormula {
    Parser::new(&ParserOptions::default()).parse(raw)
}

pub struct Parser<'o> {
    options: &'o ParserOptions,
}

impl<'o> Parser<'o> {
    pub fn new(options: &'o ParserOptions) -> Self { Self { options } }

    /// Literal text (no leading `=`) yields an empty, successful reference set.
    pub fn parse(&self, raw: &str) -> ParsedFormula {
        let Some(body) = raw.trim_start().strip_prefix(FORMULA_MARKER) else {
            return ParsedFormula::default();
        };
        if body.chars().count() > self.options.max_formula_len {
            return ParsedFormula::failed(ParseError::TooLong { limit: self.options.max_formula_len });
        }
        let tokens = match tokenize(body) {
            Ok(tokens) => tokens,
            Err(e) => return ParsedFormula::failed(e),
        };
        if tokens.is_empty() {
            return ParsedFormula::failed(ParseError::Empty);
        }

        let (tokens, positions): (Vec<Token>, Vec<usize>) = tokens.into_iter().unzip();
        let mut state = State {
            tokens,
            positions,
            cursor: 0,
            depth: 0,
            options: self.options,
            references: Vec::new(),
        };
        match state.formula() {
            Ok(()) => ParsedFormula { references: state.references, error: None, tokens: state.tokens },
            Err(e) => ParsedFormula::failed(e),
        }
    }
}

struct State<'o> {
    tokens: Vec<Token>,
    positions: Vec<usize>,
    cursor: usize,
    depth: usize,
    options: &'o ParserOptions,
    references: Vec<Reference>,
}

impl State<'_> {
    fn formula(&mut self) -> Result<(), ParseError> {
        self.expression()?;
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected()),
        }
    }

    // --- Token helpers ---

    fn peek(&self) -> Option<&Token> { self.tokens.get(self.cursor) }
    fn peek_at(&self, offset: usize) -> Option<&Token> { self.tokens.get(self.cursor + offset) }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        self.cursor += 1;
        token
    }

    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::UnexpectedToken {
                found: token.describe(),
                pos: self.positions.get(self.cursor).copied().unwrap_or(0),
            },
            None => ParseError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        if self.peek() == Some(expected) {
            self.cursor += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(ParseError::DepthExceeded { limit: self.options.max_depth });
        }
        Ok(())
    }

    fn leave(&mut self) { self.depth -= 1; }

    fn peek_op(&self, accepted: &[Operator]) -> bool {
        matches!(self.peek(), Some(Token::Op(op)) if accepted.contains(op))
    }

    // --- Precedence levels ---

    fn expression(&mut self) -> Result<(), ParseError> {
        self.enter()?;
        self.binary_level(0)?;
        self.leave();
        Ok(())
    }

    /// Left-associative binary levels, lowest precedence first.
    fn binary_level(&mut self, level: usize) -> Result<(), ParseError> {
        const LEVELS: &[&[Operator]] = &[
            &[
                Operator::Equal,
                Operator::NotEqual,
                Operator::Less,
                Operator::LessEqual,
                Operator::Greater,
                Operator::GreaterEqual,
            ],
            &[Operator::Ampersand],
            &[Operator::Plus, Operator::Minus],
            &[Operator::Star, Operator::Slash],
            &[Operator::Caret],
        ];
        let Some(operators) = LEVELS.get(level) else {
            return self.unary();
        };
        self.binary_level(level + 1)?;
        while self.peek_op(operators) {
            self.cursor += 1;
            self.binary_level(level + 1)?;
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<(), ParseError> {
        if self.peek_op(&[Operator::Plus, Operator::Minus]) {
            self.cursor += 1;
            self.enter()?;
            self.unary()?;
            self.leave();
            return Ok(());
        }
        self.primary()?;
        while self.peek_op(&[Operator::Percent]) {
            self.cursor += 1;
        }
        Ok(())
    }

    fn primary(&mut self) -> Result<(), ParseError> {
        match self.peek().cloned() {
            Some(Token::Number(_) | Token::Text(_) | Token::Bool(_) | Token::ErrorLit(_)) => {
                self.cursor += 1;
                Ok(())
            }
            Some(Token::LParen) => {
                self.cursor += 1;
                self.expression()?;
                self.expect(&Token::RParen)
            }
            Some(Token::Ident(name)) if self.peek_at(1) == Some(&Token::LParen) => self.call(name),
            Some(Token::Sheet(_) | Token::Cell(_) | Token::Ident(_)) => self.reference(),
            Some(_) => Err(self.unexpected()),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn call(&mut self, name: String) -> Result<(), ParseError> {
        if !functions::is_known(&name, &self.options.extra_functions) {
            return Err(ParseError::UnknownFunction(name));
        }
        self.cursor += 2; // name and '('
        self.enter()?;
        if self.peek() == Some(&Token::RParen) {
            self.cursor += 1;
            self.leave();
            return Ok(());
        }
        loop {
            // Empty arguments (`IF(A1,,0)`) are allowed.
            if !matches!(self.peek(), Some(Token::Comma | Token::RParen)) {
                self.expression()?;
            }
            match self.bump() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(_) => {
                    self.cursor -= 1;
                    return Err(self.unexpected());
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
        self.leave();
        Ok(())
    }

    // --- References ---

    fn reference(&mut self) -> Result<(), ParseError> {
        let sheet = self.sheet_prefix();
        let start = self.atom()?;

        if self.peek() != Some(&Token::Colon) {
            return match start {
                Atom::Cell(cell) => {
                    self.push_reference(Reference::Cell(CellRef {
                        sheet,
                        row: cell.row,
                        column: cell.column,
                        row_abs: cell.row_abs,
                        col_abs: cell.col_abs,
                    }));
                    Ok(())
                }
                Atom::Column(_) => Err(ParseError::UnknownName(self.previous_text())),
            };
        }
        self.cursor += 1;

        if let Some(Token::Sheet(end_sheet)) = self.peek().cloned() {
            self.cursor += 1;
            let same = sheet.as_ref().map_or(false, |s| *s == end_sheet);
            if !same {
                let label = format!("{}:{}!…", sheet.map(|s| s.to_string()).unwrap_or_default(), end_sheet);
                return Err(ParseError::CrossSheetRange(label));
            }
        }
        let end = self.atom()?;

        let range = match (start, end) {
            (Atom::Cell(a), Atom::Cell(b)) => RangeRef::new(sheet, (a.row, a.column), (b.row, b.column)),
            (Atom::Column(a), Atom::Column(b)) => RangeRef::new(sheet, (1, a.column), (MAX_ROWS, b.column)),
            _ => return Err(self.unexpected_previous()),
        };
        let reference = if range.cell_count() > self.options.max_range_cells {
            Reference::OpaqueRange(range)
        } else {
            Reference::Range(range)
        };
        self.push_reference(reference);
        Ok(())
    }

    fn sheet_prefix(&mut self) -> Option<SheetName> {
        if let Some(Token::Sheet(name)) = self.peek().cloned() {
            self.cursor += 1;
            return Some(name);
        }
        None
    }

    /// A cell, or a bare column name when it is the operand of `:`.
    fn atom(&mut self) -> Result<Atom, ParseError> {
        match self.peek().cloned() {
            Some(Token::Cell(cell)) => {
                self.cursor += 1;
                Ok(Atom::Cell(cell))
            }
            Some(Token::Ident(word)) => {
                let beside_colon = self.peek_at(1) == Some(&Token::Colon)
                    || (self.cursor > 0 && self.tokens[self.cursor - 1] == Token::Colon);
                match parse_column_token(&word) {
                    Some(column) if beside_colon => {
                        self.tokens[self.cursor] = Token::Column(column);
                        self.cursor += 1;
                        Ok(Atom::Column(column))
                    }
                    _ => Err(ParseError::UnknownName(word)),
                }
            }
            Some(_) => Err(self.unexpected()),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn push_reference(&mut self, reference: Reference) {
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
    }

    fn previous_text(&self) -> String {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(Token::describe)
            .unwrap_or_default()
    }

    fn unexpected_previous(&self) -> ParseError {
        let idx = self.cursor.saturating_sub(1);
        ParseError::UnexpectedToken {
            found: self.previous_text(),
            pos: self.positions.get(idx).copied().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Atom {
    Cell(super::lexer::CellToken),
    Column(ColumnToken),
}
