//! Byte-level reader over the query source.
//!
//! The parser only ever touches the source through these primitives:
//! peek, advance, match-literal (non-consuming on failure), skip
//! whitespace and comments. Commas count as whitespace in GraphQL.

use crate::error::QueryError;

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

pub(crate) fn is_name_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

pub(crate) fn is_name_char(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    pub fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Consumes `b` if it is next; leaves the cursor alone otherwise.
    pub fn match_byte(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_byte(&mut self, b: u8) -> Result<(), QueryError> {
        if self.match_byte(b) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Consumes `keyword` only when it is followed by a non-name byte, so
    /// `online` never matches the keyword `on`.
    pub fn match_keyword(&mut self, keyword: &str) -> bool {
        let bytes = keyword.as_bytes();
        if !self.src[self.pos..].starts_with(bytes) {
            return false;
        }
        if let Some(&after) = self.src.get(self.pos + bytes.len()) {
            if is_name_char(after) {
                return false;
            }
        }
        self.pos += bytes.len();
        true
    }

    /// Skips whitespace (space, tab, CR, LF, comma) and `#` line comments.
    pub fn skip_ignored(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') | Some(b',') => {
                    self.pos += 1;
                }
                Some(b'#') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return,
            }
        }
    }

    pub fn read_name(&mut self) -> Result<&'a str, QueryError> {
        let start = self.pos;
        match self.peek() {
            Some(b) if is_name_start(b) => self.pos += 1,
            _ => return Err(self.unexpected()),
        }
        while let Some(b) = self.peek() {
            if !is_name_char(b) {
                break;
            }
            self.pos += 1;
        }
        // Names are ASCII by construction.
        Ok(std::str::from_utf8(&self.src[start..self.pos]).unwrap_or(""))
    }

    /// Reads an int or float literal per the October 2021 grammar.
    pub fn read_number(&mut self) -> Result<crate::values::Value, QueryError> {
        use crate::values::Value;

        let start = self.pos;
        self.match_byte(b'-');
        match self.peek() {
            Some(b'0') => {
                self.pos += 1;
            }
            Some(b) if b.is_ascii_digit() => self.read_digits()?,
            _ => return Err(self.unexpected()),
        }

        let mut is_float = false;
        if self.match_byte(b'.') {
            is_float = true;
            self.read_digits()?;
        }
        if self.peek() == Some(b'e') || self.peek() == Some(b'E') {
            is_float = true;
            self.pos += 1;
            if !self.match_byte(b'+') {
                self.match_byte(b'-');
            }
            self.read_digits()?;
        }

        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
        if is_float {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| QueryError::Parse(format!("invalid float literal {}", text)))
        } else {
            match text.parse::<i64>() {
                Ok(i) => Ok(Value::Int(i)),
                // Out-of-range integers degrade to floats rather than fail.
                Err(_) => text
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| QueryError::Parse(format!("invalid int literal {}", text))),
            }
        }
    }

    fn read_digits(&mut self) -> Result<(), QueryError> {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => {}
            _ => return Err(self.unexpected()),
        }
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Reads a `"…"` string literal; the opening quote must be next.
    pub fn read_string(&mut self) -> Result<String, QueryError> {
        self.expect_byte(b'"')?;
        let mut out: Vec<u8> = Vec::new();
        loop {
            match self.advance() {
                None => return Err(QueryError::UnexpectedEof),
                Some(b'"') => return Ok(String::from_utf8_lossy(&out).into_owned()),
                Some(b'\\') => self.read_escape(&mut out)?,
                Some(b'\n') => {
                    return Err(QueryError::Parse("unterminated string literal".to_owned()))
                }
                // Raw bytes pass through; multi-byte UTF-8 sequences
                // arrive one byte at a time.
                Some(b) => out.push(b),
            }
        }
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) -> Result<(), QueryError> {
        let b = self.advance().ok_or(QueryError::UnexpectedEof)?;
        match b {
            b'"' | b'\\' | b'/' => out.push(b),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'u' => {
                let unit = self.read_hex4()?;
                let c = if (0xD800..0xDC00).contains(&unit) {
                    // Leading surrogate; a trailing \uXXXX must follow.
                    if self.match_byte(b'\\') && self.match_byte(b'u') {
                        let low = self.read_hex4()?;
                        let combined =
                            0x10000 + (((unit - 0xD800) as u32) << 10) + (low - 0xDC00) as u32;
                        char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                } else {
                    char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
                };
                let mut encoded = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut encoded).as_bytes());
            }
            other => {
                return Err(QueryError::Parse(format!(
                    "unknown escape sequence \\{}",
                    other as char
                )))
            }
        }
        Ok(())
    }

    fn read_hex4(&mut self) -> Result<u16, QueryError> {
        let mut value: u16 = 0;
        for _ in 0..4 {
            let b = self.advance().ok_or(QueryError::UnexpectedEof)?;
            let digit = (b as char).to_digit(16).ok_or_else(|| {
                QueryError::Parse(format!("invalid hex digit {} in \\u escape", b as char))
            })?;
            value = (value << 4) | digit as u16;
        }
        Ok(value)
    }

    pub fn unexpected(&self) -> QueryError {
        match self.peek() {
            Some(b) => QueryError::UnexpectedByte {
                offset: self.pos,
                byte: b as char,
            },
            None => QueryError::UnexpectedEof,
        }
    }
}
