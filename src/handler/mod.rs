//! Response handling policy and body delivery.
//!
//! This module provides:
//! - The per-connection response policy and content pump ([`ResponseHandler`])
//! - The three places a body can go ([`ContentSink`]): memory, an output
//!   stream ([`StreamSink`]), or a file written by the transport
//!
//! Memory and stream sinks pull pending bytes from the transport through a
//! [`RESPONSE_BUFFER_SIZE`] scratch buffer. Download sinks never touch the
//! bytes; they only mirror the transport's read counter.

mod response;
mod sink;

#[cfg(test)]
mod response_tests;

pub use response::{RESPONSE_BUFFER_SIZE, ResponseHandler};
pub use sink::{BoxedWriter, ContentSink, StreamSink, WriterFactory};
