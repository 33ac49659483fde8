//! XML Reader Module
//!
//! Provides different reading strategies over the same event model:
//! - SliceReader: Zero-copy reader over a complete document (Strategy A)
//! - StreamReader: Incremental reader over any `Read` source (Strategy B)
//! - Events: XML event types for pull parsing

pub mod buffered;
pub mod decoder;
pub mod events;
pub mod slice;

pub use buffered::StreamReader;
pub use events::{EndElement, Namespace, StartElement, XmlEvent};
pub use slice::SliceReader;

use crate::error::Result;

/// A pull source of well-formed XML events
pub trait EventSource<'a> {
    /// Get the next event, or None once the document is complete
    fn next_event(&mut self) -> Result<Option<XmlEvent<'a>>>;
}
