//! Tokenizer for formula text (the part after the `=` marker).
//!
//! Whitespace is dropped and names are upper-cased here, so everything downstream
//! sees one spelling per formula.
use super::error::ParseError;
use super::reference::SheetName;
use crate::store::types::{column_index, MAX_ROWS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Caret => "^",
            Operator::Percent => "%",
            Operator::Ampersand => "&",
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
        }
    }
}

/// An A1 reference as scanned; `$` markers are preserved for shape comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellToken {
    pub row: u32,
    pub column: u32,
    pub row_abs: bool,
    pub col_abs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnToken {
    pub column: u32,
    pub abs: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Text(String),
    Bool(bool),
    ErrorLit(String),
    /// Upper-cased function name or bare word.
    Ident(String),
    Cell(CellToken),
    /// Whole-column operand of a range such as `B:B`. Produced by the parser.
    Column(ColumnToken),
    /// Sheet qualifier, without quotes and the trailing `!`.
    Sheet(SheetName),
    Op(Operator),
    Colon,
    Comma,
    LParen,
    RParen,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Text(_) => "string".to_string(),
            Token::Bool(b) => format!("{}", if *b { "TRUE" } else { "FALSE" }),
            Token::ErrorLit(e) => e.clone(),
            Token::Ident(name) => format!("'{}'", name),
            Token::Cell(_) | Token::Column(_) => "reference".to_string(),
            Token::Sheet(s) => format!("sheet {}", s),
            Token::Op(op) => format!("'{}'", op.symbol()),
            Token::Colon => "':'".to_string(),
            Token::Comma => "','".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

const ERROR_LITERALS: &[&str] = &["#DIV/0!", "#N/A", "#NAME?", "#NULL!", "#NUM!", "#REF!", "#VALUE!"];

/// Tokens paired with the character offset they started at.
pub fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    Lexer { chars: input.chars().collect(), pos: 0 }.run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn run(mut self) -> Result<Vec<(Token, usize)>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else { break };
            let start = self.pos;
            let token = match c {
                '+' => self.single(Token::Op(Operator::Plus)),
                '-' => self.single(Token::Op(Operator::Minus)),
                '*' => self.single(Token::Op(Operator::Star)),
                '/' => self.single(Token::Op(Operator::Slash)),
                '^' => self.single(Token::Op(Operator::Caret)),
                '%' => self.single(Token::Op(Operator::Percent)),
                '&' => self.single(Token::Op(Operator::Ampersand)),
                '=' => self.single(Token::Op(Operator::Equal)),
                ':' => self.single(Token::Colon),
                ',' => self.single(Token::Comma),
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '<' => {
                    self.pos += 1;
                    match self.peek() {
                        Some('=') => self.single(Token::Op(Operator::LessEqual)),
                        Some('>') => self.single(Token::Op(Operator::NotEqual)),
                        _ => Token::Op(Operator::Less),
                    }
                }
                '>' => {
                    self.pos += 1;
                    match self.peek() {
                        Some('=') => self.single(Token::Op(Operator::GreaterEqual)),
                        _ => Token::Op(Operator::Greater),
                    }
                }
                '"' => self.string()?,
                '\'' => self.quoted_sheet()?,
                '#' => self.error_literal()?,
                c if c.is_ascii_digit() || (c == '.' && self.peek_at(1).map_or(false, |d| d.is_ascii_digit())) => {
                    self.number()
                }
                c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.word(),
                other => return Err(ParseError::UnexpectedChar { ch: other, pos: start }),
            };
            tokens.push((token, start));
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> { self.chars.get(self.pos).copied() }
    fn peek_at(&self, offset: usize) -> Option<char> { self.chars.get(self.pos + offset).copied() }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn next_non_whitespace(&self) -> Option<char> {
        self.chars[self.pos..].iter().copied().find(|c| !c.is_whitespace())
    }

    fn string(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnterminatedString { pos: start }),
                Some('"') if self.peek_at(1) == Some('"') => {
                    s.push('"');
                    self.pos += 2;
                }
                Some('"') => {
                    self.pos += 1;
                    return Ok(Token::Text(s));
                }
                Some(c) => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn quoted_sheet(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut name = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnterminatedSheet { pos: start }),
                Some('\'') if self.peek_at(1) == Some('\'') => {
                    name.push('\'');
                    self.pos += 2;
                }
                Some('\'') => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.pos += 1;
                }
            }
        }
        match self.peek() {
            Some('!') => {
                self.pos += 1;
                Ok(Token::Sheet(SheetName::new(name)))
            }
            Some(c) => Err(ParseError::UnexpectedChar { ch: c, pos: self.pos }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn error_literal(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        for lit in ERROR_LITERALS {
            let len = lit.chars().count();
            let candidate: String = self.chars[self.pos..].iter().take(len).collect();
            if candidate.eq_ignore_ascii_case(lit) {
                self.pos += len;
                return Ok(Token::ErrorLit(lit.to_string()));
            }
        }
        Err(ParseError::UnexpectedChar { ch: '#', pos: start })
    }

    fn number(&mut self) -> Token {
        let start = self.pos;
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') {
            self.pos += 1;
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && (self.peek_at(1).map_or(false, |c| c.is_ascii_digit())
                || (matches!(self.peek_at(1), Some('+' | '-'))
                    && self.peek_at(2).map_or(false, |c| c.is_ascii_digit())))
        {
            self.pos += 2;
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::Number(text.parse().unwrap_or(0.0))
    }

    /// Sheet qualifier, boolean, cell reference or identifier.
    fn word(&mut self) -> Token {
        let start = self.pos;
        while self.peek().map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();

        if self.peek() == Some('!') {
            self.pos += 1;
            return Token::Sheet(SheetName::new(text));
        }

        let upper = text.to_uppercase();
        let is_call = self.next_non_whitespace() == Some('(');
        if !is_call {
            if upper == "TRUE" || upper == "FALSE" {
                return Token::Bool(upper == "TRUE");
            }
            if let Some(cell) = parse_cell_token(&upper) {
                return Token::Cell(cell);
            }
        }
        Token::Ident(upper)
    }
}

/// `[$]COL[$]ROW` within the grid.
pub fn parse_cell_token(text: &str) -> Option<CellToken> {
    let bytes = text.as_bytes();
    let mut i = 0;
    let col_abs = bytes.first() == Some(&b'$');
    if col_abs {
        i += 1;
    }
    let letters_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let column = column_index(&text[letters_start..i])?;
    let row_abs = bytes.get(i) == Some(&b'$');
    if row_abs {
        i += 1;
    }
    let digits = &text[i..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || digits.starts_with('0') {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    (row <= MAX_ROWS).then_some(CellToken { row, column, row_abs, col_abs })
}

/// `[$]COL` for whole-column ranges.
pub fn parse_column_token(text: &str) -> Option<ColumnToken> {
    let (abs, letters) = match text.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    column_index(letters).map(|column| ColumnToken { column, abs })
}
