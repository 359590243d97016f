//! Tokenizer for formula strings.

use crate::error::GridError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    /// `**`
    Power,
    LParen,
    RParen,
    Comma,
    Dot,
    End,
}

/// A token plus its byte offset in the source (for error messages).
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Split a formula into tokens, terminated by `Token::End`.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, GridError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let token = match c {
            b'0'..=b'9' => {
                pos = scan_number(bytes, pos);
                let text = &src[start..pos];
                let value = text.parse::<f64>().map_err(|_| GridError::Parse {
                    offset: start,
                    message: format!("invalid number literal \"{text}\""),
                })?;
                Token::Number(value)
            }
            b'.' if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                pos = scan_number(bytes, pos);
                let text = &src[start..pos];
                let value = text.parse::<f64>().map_err(|_| GridError::Parse {
                    offset: start,
                    message: format!("invalid number literal \"{text}\""),
                })?;
                Token::Number(value)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                    pos += 1;
                }
                Token::Ident(src[start..pos].to_string())
            }
            b'*' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 2;
                Token::Power
            }
            _ => {
                pos += 1;
                match c {
                    b'+' => Token::Plus,
                    b'-' => Token::Minus,
                    b'*' => Token::Star,
                    b'/' => Token::Slash,
                    b'(' => Token::LParen,
                    b')' => Token::RParen,
                    b',' => Token::Comma,
                    b'.' => Token::Dot,
                    _ => {
                        let ch = src[start..].chars().next().unwrap_or('?');
                        return Err(GridError::Parse {
                            offset: start,
                            message: format!("unexpected character '{ch}'"),
                        });
                    }
                }
            }
        };
        out.push(Spanned { token, offset: start });
    }

    out.push(Spanned {
        token: Token::End,
        offset: src.len(),
    });
    Ok(out)
}

/// Digits, optional fraction, optional exponent. Returns the end offset.
fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut look = pos + 1;
        if look < bytes.len() && (bytes[look] == b'+' || bytes[look] == b'-') {
            look += 1;
        }
        if look < bytes.len() && bytes[look].is_ascii_digit() {
            pos = look;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}
