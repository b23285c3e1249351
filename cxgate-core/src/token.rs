//! A minimal streaming JSON tokenizer.
//!
//! The parser walks CX documents token by token: structural delimiters
//! and object keys come out of [`Tokenizer::next_token`], while complete
//! values (element objects, metadata records) are captured raw with
//! [`Tokenizer::read_raw_value`] and handed to serde_json for typed
//! decoding. Commas and colons are filler: they are consumed silently on
//! the way to the next token or value, which matches how a CX grammar
//! walker wants to see the stream.
//!
//! Skipping stays string-aware. [`Tokenizer::skip_value`] tracks nesting
//! depth across objects and arrays but walks string literals with their
//! escapes, so braces inside element text never unbalance the scan, and a
//! bare scalar is skipped in one step.

use std::io::{self, Read};

/// Low-level tokenizer failures. The parser wraps these with the grammar
/// position it was at.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("unexpected end of input")]
    Eof,

    #[error("{0}")]
    Syntax(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One structural token or atomic value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    ArrayOpen,
    ArrayClose,
    ObjectOpen,
    ObjectClose,
    /// A decoded string value (object key or string element).
    Str(String),
    /// Any other atomic value, kept raw for diagnostics.
    Scalar(String),
}

impl Token {
    /// Render the token for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::ArrayOpen => "'['".to_string(),
            Token::ArrayClose => "']'".to_string(),
            Token::ObjectOpen => "'{'".to_string(),
            Token::ObjectClose => "'}'".to_string(),
            Token::Str(s) => format!("string {s:?}"),
            Token::Scalar(s) => s.clone(),
        }
    }
}

/// Streaming tokenizer over a byte reader.
///
/// Callers should hand in buffered input; the tokenizer reads one byte at
/// a time.
pub struct Tokenizer<R: Read> {
    reader: R,
    peeked: Option<u8>,
}

impl<R: Read> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Tokenizer {
            reader,
            peeked: None,
        }
    }

    /// Produce the next token, consuming any filler before it.
    pub fn next_token(&mut self) -> Result<Token, TokenError> {
        self.skip_filler()?;
        let byte = self.peek_byte()?.ok_or(TokenError::Eof)?;
        match byte {
            b'[' => {
                self.advance()?;
                Ok(Token::ArrayOpen)
            }
            b']' => {
                self.advance()?;
                Ok(Token::ArrayClose)
            }
            b'{' => {
                self.advance()?;
                Ok(Token::ObjectOpen)
            }
            b'}' => {
                self.advance()?;
                Ok(Token::ObjectClose)
            }
            b'"' => {
                let mut raw = Vec::new();
                self.string_literal(&mut Some(&mut raw))?;
                let decoded: String = serde_json::from_slice(&raw)
                    .map_err(|e| TokenError::Syntax(format!("invalid string literal: {e}")))?;
                Ok(Token::Str(decoded))
            }
            b',' | b':' => Err(TokenError::Syntax(format!(
                "unexpected {:?} where a token was expected",
                byte as char
            ))),
            _ => {
                let mut raw = Vec::new();
                self.scalar(&mut Some(&mut raw))?;
                let text = String::from_utf8(raw)
                    .map_err(|_| TokenError::Syntax("invalid UTF-8 in value".to_string()))?;
                Ok(Token::Scalar(text))
            }
        }
    }

    /// Whether the enclosing array or object has another entry. Peeks
    /// without consuming anything but whitespace.
    pub fn more(&mut self) -> Result<bool, TokenError> {
        self.skip_whitespace()?;
        match self.peek_byte()? {
            None | Some(b']') | Some(b'}') => Ok(false),
            Some(_) => Ok(true),
        }
    }

    /// Append the next complete JSON value, raw, to `out`.
    pub fn read_raw_value(&mut self, out: &mut Vec<u8>) -> Result<(), TokenError> {
        self.value(&mut Some(out))
    }

    /// Discard the next complete JSON value.
    pub fn skip_value(&mut self) -> Result<(), TokenError> {
        self.value(&mut None)
    }

    /// True once nothing but whitespace remains.
    pub fn at_end(&mut self) -> Result<bool, TokenError> {
        self.skip_whitespace()?;
        Ok(self.peek_byte()?.is_none())
    }

    fn value(&mut self, keep: &mut Option<&mut Vec<u8>>) -> Result<(), TokenError> {
        self.skip_filler()?;
        let byte = self.peek_byte()?.ok_or(TokenError::Eof)?;
        match byte {
            b'"' => self.string_literal(keep),
            b'{' | b'[' => self.composite(keep),
            b',' | b':' | b']' | b'}' => Err(TokenError::Syntax(format!(
                "unexpected {:?} where a value was expected",
                byte as char
            ))),
            _ => self.scalar(keep),
        }
    }

    /// Walk a `{…}` or `[…]` value by nesting depth, stepping over string
    /// literals whole.
    fn composite(&mut self, keep: &mut Option<&mut Vec<u8>>) -> Result<(), TokenError> {
        let mut depth = 0usize;
        loop {
            let byte = self.advance()?.ok_or(TokenError::Eof)?;
            emit(keep, byte);
            match byte {
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| TokenError::Syntax("unbalanced delimiters".to_string()))?;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                b'"' => self.finish_string(keep)?,
                _ => {}
            }
        }
    }

    /// Consume a full string literal including the opening quote.
    fn string_literal(&mut self, keep: &mut Option<&mut Vec<u8>>) -> Result<(), TokenError> {
        match self.advance()? {
            Some(b'"') => emit(keep, b'"'),
            _ => return Err(TokenError::Syntax("expected a string literal".to_string())),
        }
        self.finish_string(keep)
    }

    /// Consume the rest of a string literal whose opening quote has
    /// already been taken.
    fn finish_string(&mut self, keep: &mut Option<&mut Vec<u8>>) -> Result<(), TokenError> {
        loop {
            let byte = self.advance()?.ok_or(TokenError::Eof)?;
            emit(keep, byte);
            match byte {
                b'\\' => {
                    let escaped = self.advance()?.ok_or(TokenError::Eof)?;
                    emit(keep, escaped);
                }
                b'"' => return Ok(()),
                _ => {}
            }
        }
    }

    /// Consume a number, boolean, or null up to the next boundary.
    fn scalar(&mut self, keep: &mut Option<&mut Vec<u8>>) -> Result<(), TokenError> {
        let mut any = false;
        while let Some(byte) = self.peek_byte()? {
            if byte.is_ascii_whitespace() || matches!(byte, b',' | b':' | b']' | b'}') {
                break;
            }
            self.advance()?;
            emit(keep, byte);
            any = true;
        }
        if any {
            Ok(())
        } else {
            Err(TokenError::Eof)
        }
    }

    /// Skip whitespace plus at most one separating `,` or `:`.
    fn skip_filler(&mut self) -> Result<(), TokenError> {
        self.skip_whitespace()?;
        if let Some(byte) = self.peek_byte()? {
            if byte == b',' || byte == b':' {
                self.advance()?;
                self.skip_whitespace()?;
            }
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) -> Result<(), TokenError> {
        while let Some(byte) = self.peek_byte()? {
            if !byte.is_ascii_whitespace() {
                break;
            }
            self.advance()?;
        }
        Ok(())
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, TokenError> {
        if self.peeked.is_none() {
            self.peeked = self.read_byte()?;
        }
        Ok(self.peeked)
    }

    fn advance(&mut self) -> Result<Option<u8>, TokenError> {
        if let Some(byte) = self.peeked.take() {
            return Ok(Some(byte));
        }
        self.read_byte()
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TokenError> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TokenError::Io(e)),
            }
        }
    }
}

fn emit(keep: &mut Option<&mut Vec<u8>>, byte: u8) {
    if let Some(out) = keep {
        out.push(byte);
    }
}
