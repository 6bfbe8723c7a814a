use std::io;

use thiserror::Error;

/// The byte stream broke the JPEG marker grammar.
///
/// Offsets are absolute positions in the stream fed to the splitter, counted
/// from the first byte of the first chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("format error: expected {expected} at offset {offset}, found 0x{found:02X}")]
    UnexpectedByte {
        expected: &'static str,
        found: u8,
        offset: u64,
    },

    #[error("format error: invalid marker type 0x{marker:02X} at offset {offset}")]
    InvalidMarker { marker: u8, offset: u64 },

    #[error("format error: segment length {length} leaves no payload at offset {offset}")]
    EmptySegment { length: u16, offset: u64 },

    #[error("format error: splitter already rejected earlier input")]
    Poisoned,
}

/// Failure while obtaining chunks from the underlying transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {0}")]
    Status(reqwest::StatusCode),

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Why a capture stopped before the source reached end of stream.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Format(#[from] FormatError),
}
