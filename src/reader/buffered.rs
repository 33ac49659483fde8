//! Buffered XML Reader (Strategy B)
//!
//! Reads XML from any source implementing the Read trait, using an
//! internal buffer that holds only the construct currently being parsed.
//! Events are detached from the buffer before it is compacted.

use super::decoder::EventDecoder;
use super::events::XmlEvent;
use super::EventSource;
use crate::core::tokenizer::{ParseError, TokenizeError, Tokenizer};
use crate::error::Result;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

/// Buffer size for reading chunks
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Incremental XML reader for streaming input
pub struct StreamReader<R: Read> {
    reader: R,
    /// Unconsumed input
    buffer: Vec<u8>,
    /// Document offset of `buffer[0]`
    offset: usize,
    eof: bool,
    decoder: EventDecoder,
    pending: VecDeque<XmlEvent<'static>>,
    finished: bool,
}

impl<R: Read> StreamReader<R> {
    /// Create a new stream reader
    pub fn new(reader: R) -> Self {
        StreamReader {
            reader,
            buffer: Vec::with_capacity(DEFAULT_BUFFER_SIZE),
            offset: 0,
            eof: false,
            decoder: EventDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Fill the buffer from the reader.
    ///
    /// Reads at least as much as is already buffered so a long construct
    /// is rescanned a logarithmic number of times.
    fn fill_buffer(&mut self) -> std::io::Result<()> {
        let want = self.buffer.len().max(DEFAULT_BUFFER_SIZE);
        let start = self.buffer.len();
        self.buffer.resize(start + want, 0);

        let read = loop {
            match self.reader.read(&mut self.buffer[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e);
                }
            }
        };

        self.buffer.truncate(start + read);
        if read == 0 {
            self.eof = true;
        }
        Ok(())
    }

    /// Tokenize as much of the buffer as is complete
    fn decode_buffered(&mut self) -> std::result::Result<(), ParseError> {
        let valid = match std::str::from_utf8(&self.buffer) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_some() => {
                return Err(ParseError::new("Invalid UTF-8 sequence", self.offset + e.valid_up_to()))
            }
            Err(e) if self.eof => {
                return Err(ParseError::new("Truncated UTF-8 sequence", self.offset + e.valid_up_to()))
            }
            Err(e) => e.valid_up_to(),
        };
        let text = std::str::from_utf8(&self.buffer[..valid])
            .map_err(|e| ParseError::new("Invalid UTF-8 sequence", self.offset + e.valid_up_to()))?;

        let is_final = self.eof && valid == self.buffer.len();
        let mut tokenizer = Tokenizer::partial(text, self.offset, is_final);
        if self.offset == 0 {
            tokenizer.skip_bom();
        }

        let mut fresh = VecDeque::new();
        let mut consumed = 0;
        loop {
            match tokenizer.next_token() {
                Ok(Some(token)) => {
                    self.decoder.decode(token, self.offset, &mut fresh)?;
                    consumed = tokenizer.position();
                }
                Ok(None) => {
                    consumed = tokenizer.position();
                    if is_final {
                        self.decoder.finish(self.offset + consumed)?;
                        self.finished = true;
                    }
                    break;
                }
                Err(TokenizeError::NeedMoreInput) => break,
                Err(TokenizeError::Malformed(e)) => return Err(e),
            }
        }

        self.pending.extend(fresh.into_iter().map(XmlEvent::into_owned));
        self.buffer.drain(..consumed);
        self.offset += consumed;
        Ok(())
    }
}

impl<R: Read> EventSource<'static> for StreamReader<R> {
    fn next_event(&mut self) -> Result<Option<XmlEvent<'static>>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            if !self.buffer.is_empty() || self.eof {
                if let Err(e) = self.decode_buffered() {
                    self.finished = true;
                    self.pending.clear();
                    return Err(e.into());
                }
                if !self.pending.is_empty() || self.finished {
                    continue;
                }
            }

            if let Err(e) = self.fill_buffer() {
                self.finished = true;
                return Err(e.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SanitizeError;
    use std::io::Cursor;

    /// Reader that returns at most `step` bytes per call
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn collect<R: Read>(reader: R) -> Result<Vec<XmlEvent<'static>>> {
        let mut reader = StreamReader::new(reader);
        let mut events = Vec::new();
        while let Some(event) = reader.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    #[test]
    fn test_stream_matches_slice() {
        let doc = "<?xml version=\"1.0\"?><svg a=\"1\"><!-- c --><g>t&amp;u</g></svg>";
        let streamed = collect(Cursor::new(doc.as_bytes().to_vec())).unwrap();
        let trickled = collect(Trickle { data: doc.as_bytes().to_vec(), pos: 0, step: 3 }).unwrap();

        let mut slice = crate::reader::SliceReader::new(doc);
        let mut expected = Vec::new();
        while let Some(event) = slice.next_event().unwrap() {
            expected.push(event.into_owned());
        }

        assert_eq!(streamed, expected);
        // Text may arrive in more pieces when the input trickles in
        let text = |events: &[XmlEvent<'_>]| -> String {
            events
                .iter()
                .filter_map(|e| match e {
                    XmlEvent::Characters(t) => Some(t.to_string()),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(text(&trickled), text(&expected));
    }

    #[test]
    fn test_multibyte_split_across_reads() {
        let doc = "<a>héllo wörld</a>".as_bytes().to_vec();
        let events = collect(Trickle { data: doc, pos: 0, step: 1 }).unwrap();
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                XmlEvent::Characters(t) => Some(t.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "héllo wörld");
    }

    #[test]
    fn test_invalid_utf8() {
        let err = collect(Cursor::new(b"<a>\xff</a>".to_vec())).unwrap_err();
        match err {
            SanitizeError::Parse(e) => assert_eq!(e.position, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_truncated_stream() {
        assert!(collect(Cursor::new(b"<svg><g>".to_vec())).is_err());
    }

    #[test]
    fn test_large_text_run() {
        let doc = format!("<a>{}</a>", "x".repeat(100_000));
        let events = collect(Cursor::new(doc.into_bytes())).unwrap();
        let total: usize = events
            .iter()
            .map(|e| match e {
                XmlEvent::Characters(t) => t.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(total, 100_000);
    }

    #[test]
    fn test_io_error_propagates() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::ConnectionReset, "gone"))
            }
        }
        assert!(matches!(collect(Failing), Err(SanitizeError::Io(_))));
    }
}
