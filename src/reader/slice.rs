//! Zero-Copy Slice Reader (Strategy A)
//!
//! Reads XML from a complete in-memory document. Events borrow from the
//! input wherever no reference had to be resolved.

use super::decoder::EventDecoder;
use super::events::XmlEvent;
use super::EventSource;
use crate::core::tokenizer::{ParseError, TokenizeError, Tokenizer};
use crate::error::Result;
use std::collections::VecDeque;

/// Zero-copy XML reader from a string slice
pub struct SliceReader<'a> {
    input: &'a str,
    tokenizer: Tokenizer<'a>,
    decoder: EventDecoder,
    pending: VecDeque<XmlEvent<'a>>,
    finished: bool,
}

impl<'a> SliceReader<'a> {
    /// Create a new slice reader
    pub fn new(input: &'a str) -> Self {
        let mut tokenizer = Tokenizer::new(input);
        tokenizer.skip_bom();
        SliceReader {
            input,
            tokenizer,
            decoder: EventDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn advance(&mut self) -> std::result::Result<(), ParseError> {
        match self.tokenizer.next_token() {
            Ok(Some(token)) => self.decoder.decode(token, 0, &mut self.pending),
            Ok(None) => {
                self.finished = true;
                self.decoder.finish(self.input.len())
            }
            Err(TokenizeError::Malformed(e)) => Err(e),
            // Unreachable for complete input; reported rather than assumed
            Err(TokenizeError::NeedMoreInput) => {
                Err(ParseError::new("Unexpected end of input", self.input.len()))
            }
        }
    }
}

impl<'a> EventSource<'a> for SliceReader<'a> {
    fn next_event(&mut self) -> Result<Option<XmlEvent<'a>>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }
            if let Err(e) = self.advance() {
                self.finished = true;
                self.pending.clear();
                return Err(e.into());
            }
        }
    }
}
