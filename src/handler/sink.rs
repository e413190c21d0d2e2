//! Content sinks a response body can be delivered to.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::message::SinkKind;

/// Output stream a [`ContentSink::Stream`] writes into.
pub type BoxedWriter = Box<dyn Write + Send>;

/// Creates the output stream lazily, on the first received chunk.
pub type WriterFactory = Box<dyn FnMut() -> io::Result<BoxedWriter> + Send>;

/// Caller supplied output stream, or a factory that opens one on demand.
pub struct StreamSink {
    writer: Option<BoxedWriter>,
    factory: Option<WriterFactory>,
}

impl StreamSink {
    /// Writes into `writer`.
    #[must_use]
    pub fn new(writer: BoxedWriter) -> Self {
        Self {
            writer: Some(writer),
            factory: None,
        }
    }

    /// Opens the writer with `factory` when the first chunk arrives.
    #[must_use]
    pub fn lazy(factory: WriterFactory) -> Self {
        Self {
            writer: None,
            factory: Some(factory),
        }
    }

    /// Returns true if there is somewhere to write to.
    pub(crate) const fn is_ready(&self) -> bool {
        self.writer.is_some() || self.factory.is_some()
    }

    pub(crate) fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.writer.is_none() {
            let factory = self
                .factory
                .as_mut()
                .ok_or_else(|| io::Error::other("no output stream"))?;
            self.writer = Some(factory()?);
        }

        match &mut self.writer {
            Some(writer) => writer.write_all(chunk),
            None => Ok(()),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.writer.as_mut().map_or(Ok(()), |w| w.flush())
    }

    pub(crate) fn take_writer(&mut self) -> Option<BoxedWriter> {
        self.writer.take()
    }
}

impl fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink")
            .field("writer", &self.writer.is_some())
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// Where a response body goes.
#[derive(Debug)]
pub enum ContentSink {
    /// Kept on the [`Response`](crate::message::Response). A rebuilt
    /// response starts over with an empty buffer.
    Memory,
    /// Written chunk by chunk into an output stream.
    Stream(StreamSink),
    /// Written to `destination` by the transport itself.
    Download {
        /// Destination file path.
        destination: PathBuf,
        /// Continue an existing partial file instead of truncating it.
        allow_resume: bool,
    },
}

impl ContentSink {
    /// Returns the kind reported on responses.
    #[must_use]
    pub const fn kind(&self) -> SinkKind {
        match self {
            Self::Memory => SinkKind::Memory,
            Self::Stream(_) => SinkKind::Stream,
            Self::Download { .. } => SinkKind::File,
        }
    }

    /// Returns the destination of a download sink.
    #[must_use]
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Download { destination, .. } => Some(destination),
            Self::Memory | Self::Stream(_) => None,
        }
    }

    /// Returns true if the sink can accept content.
    pub(crate) fn can_start(&self) -> bool {
        match self {
            Self::Memory => true,
            Self::Stream(stream) => stream.is_ready(),
            Self::Download { destination, .. } => !destination.as_os_str().is_empty(),
        }
    }
}
