//! Uniform pull-based readers over everything an upload can be fed from.

use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::Receiver;
use tokio_stream::wrappers::ReceiverStream;

/// The bytes of an upload.
///
/// Whatever the input, [`ByteSource::read_chunk`] hands out exactly the
/// requested number of bytes until the input runs dry, so chunk
/// boundaries never depend on how the producer fragments its output.
pub struct ByteSource {
    inner: Inner,
    size: Option<u64>,
}

enum Inner {
    /// Data already in memory
    Buffer(Bytes),
    /// Any async reader, e.g. an open file
    Reader(Pin<Box<dyn AsyncRead + Send>>),
    /// A producer of byte fragments of arbitrary size
    Stream {
        stream: BoxStream<'static, io::Result<Bytes>>,
        pending: BytesMut,
        exhausted: bool,
    },
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner {
            Inner::Buffer(_) => "Buffer",
            Inner::Reader(_) => "Reader",
            Inner::Stream { .. } => "Stream",
        };

        f.debug_struct("ByteSource")
            .field("kind", &kind)
            .field("size", &self.size)
            .finish()
    }
}

impl ByteSource {
    /// Wrap any async reader. The total size is unknown.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        ByteSource {
            inner: Inner::Reader(Box::pin(reader)),
            size: None,
        }
    }

    /// Open a local file
    pub async fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();

        Ok(ByteSource {
            inner: Inner::Reader(Box::pin(file)),
            size: Some(size),
        })
    }

    /// Wrap a stream of byte fragments. Fragments may have any size,
    /// including zero.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        ByteSource {
            inner: Inner::Stream {
                stream: stream.boxed(),
                pending: BytesMut::new(),
                exhausted: false,
            },
            size: None,
        }
    }

    /// Read fragments from a channel until every sender is dropped
    pub fn from_receiver(receiver: Receiver<Vec<u8>>) -> Self {
        Self::from_stream(ReceiverStream::new(receiver).map(|fragment| Ok(Bytes::from(fragment))))
    }

    /// Total length, when it is known up front
    pub fn size_hint(&self) -> Option<u64> {
        self.size
    }

    /// Read the next `size` bytes.
    ///
    /// Returns fewer bytes only at the end of the input, and an empty
    /// buffer once the input is exhausted.
    pub async fn read_chunk(&mut self, size: usize) -> io::Result<Bytes> {
        match &mut self.inner {
            Inner::Buffer(data) => {
                let take = size.min(data.len());
                Ok(data.split_to(take))
            }
            Inner::Reader(reader) => {
                let mut buffer = BytesMut::with_capacity(size);

                while buffer.len() < size {
                    let remaining = (size - buffer.len()) as u64;
                    let read = reader.as_mut().take(remaining).read_buf(&mut buffer).await?;
                    if read == 0 {
                        break;
                    }
                }

                Ok(buffer.freeze())
            }
            Inner::Stream {
                stream,
                pending,
                exhausted,
            } => {
                while pending.len() < size && !*exhausted {
                    match stream.next().await {
                        Some(fragment) => pending.extend_from_slice(&fragment?),
                        None => *exhausted = true,
                    }
                }

                let take = size.min(pending.len());
                Ok(pending.split_to(take).freeze())
            }
        }
    }
}

impl From<Bytes> for ByteSource {
    fn from(data: Bytes) -> Self {
        let size = data.len() as u64;
        ByteSource {
            inner: Inner::Buffer(data),
            size: Some(size),
        }
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(data: Vec<u8>) -> Self {
        Bytes::from(data).into()
    }
}

impl From<String> for ByteSource {
    fn from(data: String) -> Self {
        Bytes::from(data).into()
    }
}

impl From<&str> for ByteSource {
    fn from(data: &str) -> Self {
        Bytes::copy_from_slice(data.as_bytes()).into()
    }
}

impl From<&[u8]> for ByteSource {
    fn from(data: &[u8]) -> Self {
        Bytes::copy_from_slice(data).into()
    }
}
