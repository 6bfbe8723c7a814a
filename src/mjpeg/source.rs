use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{error::TransportError, traits::ChunkSource};

pub const DEFAULT_READ_BUFFER_BYTES: usize = 16 * 1024;

/// Chunks that are already in memory, delivered in order.
#[derive(Debug, Default)]
pub struct BufferSource {
    chunks: VecDeque<Bytes>,
}

impl BufferSource {
    /// The whole resource as a single chunk.
    pub fn whole(buffer: impl Into<Bytes>) -> Self {
        Self::from_chunks([buffer.into()])
    }

    pub fn from_chunks(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ChunkSource for BufferSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.chunks.pop_front())
    }
}

/// Reads chunks from any async reader (file, pipe, socket).
pub struct ReaderSource<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self::with_buffer_size(reader, DEFAULT_READ_BUFFER_BYTES)
    }

    pub fn with_buffer_size(reader: R, buffer_size: usize) -> Self {
        Self {
            reader,
            buffer: vec![0_u8; buffer_size.max(1)],
        }
    }
}

#[async_trait]
impl<R> ChunkSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.reader.read(&mut self.buffer).await? {
            0 => Ok(None),
            n => Ok(Some(Bytes::copy_from_slice(&self.buffer[..n]))),
        }
    }
}
