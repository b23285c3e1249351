//! A LIFO of pending closing delimiters.
//!
//! The generator records every `[` and `{` it emits by pushing the
//! matching closer here. Normal closes pop and verify the match; on any
//! early exit the remaining closers are drained into the output so a
//! truncated document still parses as JSON.

use crate::error::CodecError;

/// Stack of closing delimiters pending emission.
#[derive(Debug, Default)]
pub struct BracketStack(Vec<char>);

impl BracketStack {
    pub fn new() -> Self {
        BracketStack(Vec::new())
    }

    /// Record an opening delimiter by pushing its matching closer.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NotABracket`] for anything other than `[`
    /// or `{`.
    pub fn push_open(&mut self, bracket: char) -> Result<(), CodecError> {
        let closer = match bracket {
            '[' => ']',
            '{' => '}',
            other => return Err(CodecError::NotABracket { found: other }),
        };
        self.0.push(closer);
        Ok(())
    }

    /// Pop the most recently recorded closer, or `None` when nothing is
    /// open.
    pub fn pop_close(&mut self) -> Option<char> {
        self.0.pop()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
