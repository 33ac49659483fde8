//! Streaming Adapter
//!
//! Runs the token filter on one background thread and hands its output to
//! the caller as a `Read` stream. The two sides are joined by a bounded
//! channel: the worker blocks when the consumer falls behind, and closing
//! the consumer makes the worker's next send fail so it stops.
//!
//! The input source is shared between the worker and the stream handle so
//! it can be released from either side, whichever gets there first.

use crate::css::SanitizationOptions;
use crate::error::{Result, SanitizeError};
use crate::filter::TokenFilter;
use crate::reader::StreamReader;
use crate::writer::XmlWriter;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Chunks buffered between worker and consumer
const CHANNEL_CAPACITY: usize = 16;

enum Message {
    Chunk(Vec<u8>),
    Failed(io::Error),
    Finished,
}

type SharedInput<R> = Arc<Mutex<Option<R>>>;

/// Drop the input source if nobody is reading from it right now
fn release<R>(input: &SharedInput<R>) {
    if let Ok(mut guard) = input.try_lock() {
        guard.take();
    }
}

/// Start sanitizing `input` on a worker thread
pub fn sanitize_stream<R>(input: R, options: SanitizationOptions) -> Result<SanitizedStream<R>>
where
    R: Read + Send + 'static,
{
    let (sender, receiver) = bounded(CHANNEL_CAPACITY);
    let input: SharedInput<R> = Arc::new(Mutex::new(Some(input)));
    let cancelled = Arc::new(AtomicBool::new(false));

    let worker_input = InputHandle {
        input: Arc::clone(&input),
        cancelled: Arc::clone(&cancelled),
    };
    let worker = thread::Builder::new()
        .name("svg-sanitize".to_string())
        .spawn(move || produce(worker_input, options, sender))?;

    Ok(SanitizedStream {
        receiver: Some(receiver),
        current: Vec::new(),
        pos: 0,
        done: false,
        input,
        cancelled,
        worker: Some(worker),
    })
}

/// Worker body: filter everything, then report how it ended
fn produce<R: Read>(input: InputHandle<R>, options: SanitizationOptions, sender: Sender<Message>) {
    let shared = Arc::clone(&input.input);
    let cancelled = Arc::clone(&input.cancelled);

    let result = filter_into_channel(input, &options, &sender);
    // Input is released on every exit path
    if let Ok(mut guard) = shared.lock() {
        guard.take();
    }

    let message = match result {
        Ok(()) => Message::Finished,
        Err(_) if cancelled.load(Ordering::Acquire) => {
            debug!("sanitizer worker stopped by consumer");
            return;
        }
        Err(e) => {
            warn!(error = %e, "streaming sanitization failed");
            Message::Failed(e.into_io_error())
        }
    };
    // The consumer may already be gone
    let _ = sender.send(message);
}

fn filter_into_channel<R: Read>(
    input: InputHandle<R>,
    options: &SanitizationOptions,
    sender: &Sender<Message>,
) -> Result<()> {
    let mut source = StreamReader::new(input);
    let mut writer = XmlWriter::new(ChannelWriter {
        sender: sender.clone(),
    });
    TokenFilter::new(options).run(&mut source, &mut writer)?;
    writer.finish().map_err(SanitizeError::Io)?;
    Ok(())
}

/// Worker-side view of the shared input
struct InputHandle<R> {
    input: SharedInput<R>,
    cancelled: Arc<AtomicBool>,
}

impl<R: Read> Read for InputHandle<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "sanitized stream closed"));
        }
        let mut guard = self
            .input
            .lock()
            .map_err(|_| io::Error::other("input lock poisoned"))?;
        match guard.as_mut() {
            Some(reader) => reader.read(buf),
            None => Err(io::Error::new(ErrorKind::BrokenPipe, "input already released")),
        }
    }
}

/// Byte sink that forwards each write as one channel message
struct ChannelWriter {
    sender: Sender<Message>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.sender
            .send(Message::Chunk(buf.to_vec()))
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "sanitized stream closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sanitized output of a worker, readable in production order.
///
/// Dropping the stream (or calling `close`) cancels the worker and
/// releases the input source.
pub struct SanitizedStream<R> {
    receiver: Option<Receiver<Message>>,
    current: Vec<u8>,
    pos: usize,
    done: bool,
    input: SharedInput<R>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<R> SanitizedStream<R> {
    /// Stop the worker and release the input. Further reads return EOF.
    ///
    /// If the worker is blocked inside a `read` on the input right now, the
    /// input is still in use and cannot be dropped here. The worker drops it
    /// as soon as that read returns, so a source whose `read` never returns
    /// is never released.
    pub fn close(&mut self) {
        if self.receiver.is_none() {
            return;
        }
        self.cancelled.store(true, Ordering::Release);
        // Unblocks a worker waiting on a full channel
        self.receiver = None;
        self.done = true;
        self.current.clear();
        self.pos = 0;
        release(&self.input);
    }

    /// Wait for the worker thread to exit
    pub fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("sanitizer worker panicked");
            }
        }
    }
}

impl<R> Read for SanitizedStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.pos < self.current.len() {
                let n = buf.len().min(self.current.len() - self.pos);
                buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.done {
                return Ok(0);
            }
            let Some(receiver) = &self.receiver else {
                return Ok(0);
            };

            match receiver.recv() {
                Ok(Message::Chunk(data)) => {
                    self.current = data;
                    self.pos = 0;
                }
                Ok(Message::Finished) => {
                    self.done = true;
                    self.receiver = None;
                }
                Ok(Message::Failed(e)) => {
                    self.done = true;
                    self.receiver = None;
                    return Err(e);
                }
                Err(_) => {
                    self.done = true;
                    self.receiver = None;
                    return Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "sanitizer worker exited without finishing",
                    ));
                }
            }
        }
    }
}

impl<R> Drop for SanitizedStream<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};
    use tracing_subscriber::EnvFilter;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Input that records when it is dropped
    struct Tracked {
        data: Cursor<Vec<u8>>,
        dropped: Arc<AtomicBool>,
    }

    impl Read for Tracked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    fn tracked(doc: String) -> (Tracked, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let input = Tracked {
            data: Cursor::new(doc.into_bytes()),
            dropped: Arc::clone(&dropped),
        };
        (input, dropped)
    }

    fn wait_for(flag: &AtomicBool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn large_document(shapes: usize) -> String {
        let mut doc = String::from("<svg>");
        for i in 0..shapes {
            doc.push_str(&format!("<rect x=\"{}\" onclick=\"x()\"/><script>alert({})</script>", i, i));
        }
        doc.push_str("</svg>");
        doc
    }

    #[test]
    fn test_stream_matches_in_memory() {
        init_tracing();
        let doc = "<svg><script>alert(1)</script><rect width=\"1\"/></svg>";
        let mut stream = sanitize_stream(Cursor::new(doc.as_bytes().to_vec()), SanitizationOptions::default()).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "<svg><rect width=\"1\"/></svg>");
    }

    #[test]
    fn test_backpressure_large_output_in_order() {
        init_tracing();
        let doc = large_document(20_000);
        let mut stream = sanitize_stream(Cursor::new(doc.into_bytes()), SanitizationOptions::default()).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert!(out.starts_with("<svg><rect x=\"0\"/><rect x=\"1\"/>"));
        assert!(out.ends_with("<rect x=\"19999\"/></svg>"));
        assert!(!out.contains("script"));
    }

    #[test]
    fn test_parse_error_surfaces_as_read_error() {
        init_tracing();
        let mut stream = sanitize_stream(Cursor::new(b"<svg><g></svg>".to_vec()), SanitizationOptions::default()).unwrap();
        let mut out = Vec::new();
        let err = stream.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_source_error_kind_preserved() {
        init_tracing();
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::ConnectionReset, "gone"))
            }
        }
        let mut stream = sanitize_stream(Failing, SanitizationOptions::default()).unwrap();
        let mut out = Vec::new();
        let err = stream.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_input_released_after_completion() {
        init_tracing();
        let (input, dropped) = tracked("<svg/>".to_string());
        let mut stream = sanitize_stream(input, SanitizationOptions::default()).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "<svg/>");
        assert!(wait_for(&dropped));
    }

    #[test]
    fn test_close_cancels_worker_and_releases_input() {
        init_tracing();
        let (input, dropped) = tracked(large_document(50_000));
        let mut stream = sanitize_stream(input, SanitizationOptions::default()).unwrap();

        let mut head = [0u8; 16];
        stream.read_exact(&mut head).unwrap();
        stream.close();

        assert!(wait_for(&dropped));
        stream.join();
        let mut rest = Vec::new();
        assert_eq!(stream.read_to_end(&mut rest).unwrap(), 0);
    }

    /// Input whose reads wait until `gate` is dropped, announcing each call
    struct Gated {
        inner: Tracked,
        entered: Sender<()>,
        gate: Receiver<()>,
    }

    impl Read for Gated {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.entered.try_send(());
            let _ = self.gate.recv();
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_close_during_read_releases_input_when_read_returns() {
        init_tracing();
        let (inner, dropped) = tracked(large_document(100));
        let (entered_tx, entered_rx) = bounded(1);
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let input = Gated {
            inner,
            entered: entered_tx,
            gate: gate_rx,
        };
        let mut stream = sanitize_stream(input, SanitizationOptions::default()).unwrap();

        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        stream.close();
        assert!(!dropped.load(Ordering::SeqCst));

        drop(gate_tx);
        assert!(wait_for(&dropped));
        stream.join();
    }

    #[test]
    fn test_drop_releases_input() {
        init_tracing();
        let (input, dropped) = tracked(large_document(50_000));
        let stream = sanitize_stream(input, SanitizationOptions::default()).unwrap();
        drop(stream);
        assert!(wait_for(&dropped));
    }
}
