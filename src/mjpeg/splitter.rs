use bytes::{Bytes, BytesMut};
use memchr::memchr;
use tracing::{debug, trace, warn};

use super::{error::FormatError, frame::JpegFrame};

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const TEM: u8 = 0x01;

/// Marker-scanning phase of the splitter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParserState {
    /// First byte of the next image, must be `0xFF`.
    #[default]
    AwaitSoiPrefix,
    /// Must be `0xD8`.
    AwaitSoi,
    /// `0xFF` introducing the next header marker.
    AwaitMarkerPrefix,
    AwaitMarkerType,
    AwaitLengthHigh,
    AwaitLengthLow,
    /// Skipping the payload of a length-bearing segment.
    SkipSegment,
    /// Inside entropy-coded data, looking for `0xFF`.
    ScanForPrefix,
    /// Saw `0xFF` in scan data; `0xD9` ends the image.
    AwaitEoi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Standalone,
    StartOfScan,
    EndOfImage,
    Segment,
}

fn classify(marker: u8) -> Option<MarkerKind> {
    match marker {
        TEM | 0xD0..=0xD7 => Some(MarkerKind::Standalone),
        SOS => Some(MarkerKind::StartOfScan),
        EOI => Some(MarkerKind::EndOfImage),
        0x02..=0xFE => Some(MarkerKind::Segment),
        _ => None,
    }
}

/// Streaming splitter that cuts a Motion-JPEG byte stream into whole JPEG
/// frames.
///
/// Chunks may be any size and split anywhere, including inside a marker, a
/// length field or a skipped segment. Only bytes of the frame currently being
/// assembled are retained between calls. The first malformed byte poisons
/// the instance: every later call fails with [`FormatError::Poisoned`].
///
/// One splitter serves exactly one stream. It is `Send` but takes `&mut self`,
/// so concurrent feeding is ruled out by the borrow checker.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    state: ParserState,
    segment_length: u16,
    skip_remaining: usize,
    pending: Vec<Bytes>,
    pending_len: usize,
    frames: Vec<JpegFrame>,
    consumed: u64,
    poisoned: bool,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next chunk and returns the frames it completed, in order.
    ///
    /// A chunk can complete zero, one or many frames. On error, frames that
    /// completed earlier in the same chunk remain available from
    /// [`frames`](Self::frames) but are not returned.
    pub fn add_chunk(&mut self, chunk: &[u8]) -> Result<Vec<JpegFrame>, FormatError> {
        if self.poisoned {
            return Err(FormatError::Poisoned);
        }

        let mut completed = Vec::new();
        match self.scan(chunk, &mut completed) {
            Ok(frame_start) => {
                if frame_start < chunk.len() {
                    let tail = Bytes::copy_from_slice(&chunk[frame_start..]);
                    self.pending_len += tail.len();
                    self.pending.push(tail);
                }
                self.consumed += chunk.len() as u64;
                if !completed.is_empty() {
                    debug!(
                        "chunk completed {} frames, {} bytes pending",
                        completed.len(),
                        self.pending_len
                    );
                }
                Ok(completed)
            }
            Err(err) => {
                warn!("rejecting mjpeg stream: {err}");
                self.poisoned = true;
                self.pending.clear();
                self.pending_len = 0;
                Err(err)
            }
        }
    }

    /// Every frame completed since construction.
    pub fn frames(&self) -> &[JpegFrame] {
        &self.frames
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Bytes of the in-progress frame held back for the next call.
    pub fn pending_len(&self) -> usize {
        self.pending_len
    }

    /// Copy of the in-progress frame's bytes seen so far.
    pub fn pending_bytes(&self) -> Bytes {
        concat(&self.pending, &[])
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Runs the state machine over `chunk`. Returns the offset where the
    /// still-incomplete frame starts.
    fn scan(
        &mut self,
        chunk: &[u8],
        completed: &mut Vec<JpegFrame>,
    ) -> Result<usize, FormatError> {
        let mut frame_start = 0;
        let mut i = 0;

        while i < chunk.len() {
            let byte = chunk[i];
            match self.state {
                ParserState::AwaitSoiPrefix => {
                    self.expect(byte, MARKER_PREFIX, "0xFF opening an image", i)?;
                    self.state = ParserState::AwaitSoi;
                    i += 1;
                }
                ParserState::AwaitSoi => {
                    self.expect(byte, SOI, "0xD8 start of image", i)?;
                    self.state = ParserState::AwaitMarkerPrefix;
                    i += 1;
                }
                ParserState::AwaitMarkerPrefix => {
                    self.expect(byte, MARKER_PREFIX, "0xFF marker prefix", i)?;
                    self.state = ParserState::AwaitMarkerType;
                    i += 1;
                }
                ParserState::AwaitMarkerType => {
                    let Some(kind) = classify(byte) else {
                        return Err(FormatError::InvalidMarker {
                            marker: byte,
                            offset: self.offset(i),
                        });
                    };
                    i += 1;
                    match kind {
                        MarkerKind::Standalone => self.state = ParserState::AwaitMarkerPrefix,
                        MarkerKind::StartOfScan => self.state = ParserState::ScanForPrefix,
                        MarkerKind::Segment => self.state = ParserState::AwaitLengthHigh,
                        MarkerKind::EndOfImage => {
                            completed.push(self.complete_frame(&chunk[frame_start..i]));
                            frame_start = i;
                        }
                    }
                }
                ParserState::AwaitLengthHigh => {
                    self.segment_length = u16::from(byte) << 8;
                    self.state = ParserState::AwaitLengthLow;
                    i += 1;
                }
                ParserState::AwaitLengthLow => {
                    let length = self.segment_length | u16::from(byte);
                    // The length field counts its own two bytes.
                    if length <= 2 {
                        return Err(FormatError::EmptySegment {
                            length,
                            offset: self.offset(i),
                        });
                    }
                    self.skip_remaining = usize::from(length - 2);
                    self.state = ParserState::SkipSegment;
                    i += 1;
                }
                ParserState::SkipSegment => {
                    let step = self.skip_remaining.min(chunk.len() - i);
                    i += step;
                    self.skip_remaining -= step;
                    if self.skip_remaining == 0 {
                        self.state = ParserState::AwaitMarkerPrefix;
                    }
                }
                ParserState::ScanForPrefix => match memchr(MARKER_PREFIX, &chunk[i..]) {
                    Some(pos) => {
                        i += pos + 1;
                        self.state = ParserState::AwaitEoi;
                    }
                    None => i = chunk.len(),
                },
                ParserState::AwaitEoi => {
                    i += 1;
                    if byte == EOI {
                        completed.push(self.complete_frame(&chunk[frame_start..i]));
                        frame_start = i;
                    } else {
                        // Stuffed 0xFF00 or a restart marker: still scan data.
                        self.state = ParserState::ScanForPrefix;
                    }
                }
            }
        }

        Ok(frame_start)
    }

    fn expect(
        &self,
        found: u8,
        wanted: u8,
        expected: &'static str,
        index: usize,
    ) -> Result<(), FormatError> {
        if found == wanted {
            Ok(())
        } else {
            Err(FormatError::UnexpectedByte {
                expected,
                found,
                offset: self.offset(index),
            })
        }
    }

    fn offset(&self, index: usize) -> u64 {
        self.consumed + index as u64
    }

    fn complete_frame(&mut self, tail: &[u8]) -> JpegFrame {
        let frame = JpegFrame::new(concat(&self.pending, tail));
        self.pending.clear();
        self.pending_len = 0;
        self.state = ParserState::AwaitSoiPrefix;
        trace!("frame {} complete: {} bytes", self.frames.len(), frame.len());
        self.frames.push(frame.clone());
        frame
    }
}

fn concat(parts: &[Bytes], tail: &[u8]) -> Bytes {
    let len = parts.iter().map(Bytes::len).sum::<usize>() + tail.len();
    let mut out = BytesMut::with_capacity(len);
    for part in parts {
        out.extend_from_slice(part);
    }
    out.extend_from_slice(tail);
    out.freeze()
}
