//! Permissive object-literal parser for row data.
//!
//! Accepts what models actually write: bare or quoted keys, single or double
//! quoted values, bare numbers, trailing commas, and stray quote characters
//! inside values. A quote only closes a string when the next non-blank
//! character is `,` or `}` (or the input ends); otherwise it is kept as text.
//! A backslash escapes the following character.

use crate::cell::CellValue;

/// Parse `{key: value, ...}`. Returns `None` when the text is not an object
/// or a string value never closes.
pub fn parse_loose_object(raw: &str) -> Option<Vec<(String, CellValue)>> {
    let mut cursor = Cursor { chars: raw.chars().collect(), pos: 0 };
    cursor.parse_object()
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace() || c == ',') {
            self.pos += 1;
        }
    }

    fn parse_object(&mut self) -> Option<Vec<(String, CellValue)>> {
        self.skip_ws();
        if self.bump()? != '{' {
            return None;
        }

        let mut entries = Vec::new();
        loop {
            self.skip_separators();
            if self.peek()? == '}' {
                self.pos += 1;
                return Some(entries);
            }
            let key = self.parse_key()?;
            self.skip_ws();
            if self.bump()? != ':' {
                return None;
            }
            self.skip_ws();
            let value = self.parse_value()?;
            entries.push((key, value));
        }
    }

    fn parse_key(&mut self) -> Option<String> {
        match self.peek()? {
            q @ ('"' | '\'') => {
                self.pos += 1;
                let mut key = String::new();
                loop {
                    let c = self.bump()?;
                    if c == q {
                        break;
                    }
                    key.push(c);
                }
                Some(key.trim().to_string())
            }
            _ => {
                let mut key = String::new();
                while let Some(c) = self.peek() {
                    if c == ':' || c == ',' || c == '}' {
                        break;
                    }
                    key.push(c);
                    self.pos += 1;
                }
                let key = key.trim();
                if key.is_empty() {
                    None
                } else {
                    Some(key.to_string())
                }
            }
        }
    }

    fn parse_value(&mut self) -> Option<CellValue> {
        match self.peek()? {
            q @ ('"' | '\'') => {
                self.pos += 1;
                self.parse_quoted(q).map(CellValue::from_text)
            }
            '{' | '[' => Some(CellValue::from_text(self.take_nested())),
            ',' | '}' => Some(CellValue::Empty),
            _ => {
                let mut text = String::new();
                while let Some(c) = self.peek() {
                    if c == ',' || c == '}' {
                        break;
                    }
                    text.push(c);
                    self.pos += 1;
                }
                Some(bare_value(text.trim()))
            }
        }
    }

    fn parse_quoted(&mut self, quote: char) -> Option<String> {
        let mut out = String::new();
        loop {
            match self.bump()? {
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    other => out.push(other),
                },
                c if c == quote => {
                    if self.closes_here() {
                        return Some(out);
                    }
                    out.push(c);
                }
                c => out.push(c),
            }
        }
    }

    /// True when the next non-blank character ends a value.
    fn closes_here(&self) -> bool {
        self.chars[self.pos..]
            .iter()
            .find(|c| !c.is_whitespace())
            .map_or(true, |&c| c == ',' || c == '}')
    }

    fn take_nested(&mut self) -> String {
        let mut depth = 0usize;
        let mut out = String::new();
        while let Some(c) = self.bump() {
            out.push(c);
            match c {
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        out
    }
}

fn bare_value(text: &str) -> CellValue {
    match text {
        "" | "null" | "undefined" => CellValue::Empty,
        _ => match text.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(text.to_string()),
        },
    }
}
