use async_trait::async_trait;
use bytes::Bytes;

use super::error::TransportError;

/// Ordered producer of raw stream chunks.
///
/// Chunks come out in arrival order, each exactly once. `Ok(None)` marks the
/// end of the stream.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Opens a fresh [`ChunkSource`] for each capture session.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    type Source: ChunkSource + 'static;

    async fn connect(&self) -> Result<Self::Source, TransportError>;

    fn describe(&self) -> String;

    fn is_configured(&self) -> bool {
        true
    }
}
