//! Parser for the COS-style object syntax embedded in `btdk` text data:
//! dictionaries `<< /key value >>`, arrays `[..]`, `(strings)` with
//! backslash escapes, `<hex strings>`, numbers, booleans and null.
//!
//! Dictionary keys are names; the text-document records key their entries
//! with numeric names, so tree access goes through numeric index paths that
//! resolve as array indices or stringified object keys.

use std::collections::BTreeMap;

use crate::error::{VetraError, VetraResult};

#[derive(Clone, Debug, Default, PartialEq)]
pub enum CosValue {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<CosValue>),
    Object(BTreeMap<String, CosValue>),
}

impl CosValue {
    /// Resolves a numeric index path: arrays index by position, objects by
    /// the stringified index as key.
    pub fn get_path(&self, path: &[usize]) -> Option<&CosValue> {
        let mut cur = self;
        for &idx in path {
            cur = match cur {
                CosValue::Array(items) => items.get(idx)?,
                CosValue::Object(map) => map.get(&idx.to_string())?,
                _ => return None,
            };
        }
        Some(cur)
    }

    pub fn number_at(&self, path: &[usize]) -> Option<f64> {
        match self.get_path(path)? {
            CosValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn string_at(&self, path: &[usize]) -> Option<&str> {
        match self.get_path(path)? {
            CosValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn bool_at(&self, path: &[usize]) -> Option<bool> {
        match self.get_path(path)? {
            CosValue::Boolean(b) => Some(*b),
            // Some writers store flags as 0/1 numbers.
            CosValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    pub fn array_at(&self, path: &[usize]) -> Option<&[CosValue]> {
        match self.get_path(path)? {
            CosValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

pub struct CosParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CosParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn parse(mut self) -> VetraResult<CosValue> {
        let value = self.parse_value()?;
        Ok(value)
    }

    fn err(&self, msg: &str) -> VetraError {
        VetraError::parse(format!("cos: {msg} at offset {}", self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, token: &[u8]) -> bool {
        if self.data[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn parse_value(&mut self) -> VetraResult<CosValue> {
        self.skip_whitespace();
        match self.peek().ok_or_else(|| self.err("unexpected end"))? {
            b'<' if self.data[self.pos..].starts_with(b"<<") => self.parse_object(),
            b'<' => self.parse_hex_string(),
            b'[' => self.parse_array(),
            b'(' => self.parse_string(),
            b't' | b'f' => self.parse_boolean(),
            b'n' if self.eat(b"null") => Ok(CosValue::Null),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.parse_number(),
            other => Err(self.err(&format!("unexpected byte {:#04x}", other))),
        }
    }

    fn parse_boolean(&mut self) -> VetraResult<CosValue> {
        if self.eat(b"true") {
            Ok(CosValue::Boolean(true))
        } else if self.eat(b"false") {
            Ok(CosValue::Boolean(false))
        } else {
            Err(self.err("invalid keyword"))
        }
    }

    fn parse_number(&mut self) -> VetraResult<CosValue> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .map(CosValue::Number)
            .ok_or_else(|| self.err("invalid number"))
    }

    fn parse_name(&mut self) -> VetraResult<String> {
        self.skip_whitespace();
        if self.bump() != Some(b'/') {
            return Err(self.err("expected name"));
        }
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || matches!(b, b'/' | b'<' | b'>' | b'[' | b']' | b'(') {
                break;
            }
            self.pos += 1;
        }
        Ok(String::from_utf8_lossy(&self.data[start..self.pos]).into_owned())
    }

    fn parse_string(&mut self) -> VetraResult<CosValue> {
        self.bump(); // (
        let mut out = Vec::new();
        let mut depth = 1;
        loop {
            match self.bump().ok_or_else(|| self.err("unterminated string"))? {
                b'\\' => {
                    let esc = self.bump().ok_or_else(|| self.err("unterminated escape"))?;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'0'..=b'7' => {
                            let mut v = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        v = v * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push(v as u8);
                        }
                        other => out.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(b'(');
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b')');
                }
                b => out.push(b),
            }
        }
        Ok(CosValue::String(decode_text(&out)))
    }

    fn parse_hex_string(&mut self) -> VetraResult<CosValue> {
        self.bump(); // <
        let mut bytes = Vec::new();
        let mut nibble: Option<u8> = None;
        loop {
            match self.bump().ok_or_else(|| self.err("unterminated hex string"))? {
                b'>' => break,
                b if b.is_ascii_whitespace() => {}
                b => {
                    let v = (b as char)
                        .to_digit(16)
                        .ok_or_else(|| self.err("invalid hex digit"))?
                        as u8;
                    match nibble.take() {
                        Some(hi) => bytes.push(hi << 4 | v),
                        None => nibble = Some(v),
                    }
                }
            }
        }
        if let Some(hi) = nibble {
            bytes.push(hi << 4);
        }
        Ok(CosValue::String(decode_text(&bytes)))
    }

    fn parse_array(&mut self) -> VetraResult<CosValue> {
        self.bump(); // [
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b']') {
                self.pos += 1;
                break;
            }
            if self.peek().is_none() {
                return Err(self.err("unterminated array"));
            }
            items.push(self.parse_value()?);
        }
        Ok(CosValue::Array(items))
    }

    fn parse_object(&mut self) -> VetraResult<CosValue> {
        self.pos += 2; // <<
        let mut map = BTreeMap::new();
        loop {
            self.skip_whitespace();
            if self.eat(b">>") {
                break;
            }
            if self.peek().is_none() {
                return Err(self.err("unterminated object"));
            }
            let key = self.parse_name()?;
            let value = self.parse_value()?;
            map.insert(key, value);
        }
        Ok(CosValue::Object(map))
    }
}

/// Strings are UTF-16 with a BOM when the document contains non-ASCII text,
/// plain bytes otherwise.
fn decode_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && (bytes[..2] == [0xfe, 0xff] || bytes[..2] == [0xff, 0xfe]) {
        let be = bytes[0] == 0xfe;
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| {
                if be {
                    u16::from_be_bytes([c[0], c[1]])
                } else {
                    u16::from_le_bytes([c[0], c[1]])
                }
            })
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> CosValue {
        CosParser::new(text.as_bytes()).parse().unwrap()
    }

    #[test]
    fn parses_scalars() {
        assert_eq!(parse("42"), CosValue::Number(42.0));
        assert_eq!(parse("-1.5"), CosValue::Number(-1.5));
        assert_eq!(parse("true"), CosValue::Boolean(true));
        assert_eq!(parse("null"), CosValue::Null);
        assert_eq!(parse("(hello)"), CosValue::String("hello".into()));
    }

    #[test]
    fn string_escapes_and_nesting() {
        assert_eq!(parse(r"(a\(b\)c)"), CosValue::String("a(b)c".into()));
        assert_eq!(parse("(a(b)c)"), CosValue::String("a(b)c".into()));
        assert_eq!(parse(r"(\110i)"), CosValue::String("Hi".into()));
    }

    #[test]
    fn utf16_string_with_bom() {
        let cos = CosParser::new(b"(\xfe\xff\x00h\x00i)").parse().unwrap();
        assert_eq!(cos, CosValue::String("hi".into()));
    }

    #[test]
    fn parses_nested_structure() {
        let v = parse("<< /0 << /0 (text) /5 [<< /0 1 >>] >> /1 [0 1 2] >>");
        assert_eq!(v.string_at(&[0, 0]), Some("text"));
        assert_eq!(v.number_at(&[0, 5, 0, 0]), Some(1.0));
        assert_eq!(v.number_at(&[1, 2]), Some(2.0));
    }

    #[test]
    fn index_path_misses_are_none() {
        let v = parse("<< /0 [1 2] >>");
        assert_eq!(v.number_at(&[0, 5]), None);
        assert_eq!(v.number_at(&[7]), None);
        assert_eq!(v.string_at(&[0, 0]), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(CosParser::new(b"<< /0").parse().is_err());
        assert!(CosParser::new(b"}").parse().is_err());
    }
}
