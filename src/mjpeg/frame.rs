use std::{fmt, ops::Deref};

use bytes::Bytes;

/// One complete JPEG image, `0xFFD8` through `0xFFD9` inclusive.
///
/// The bytes are owned by the frame and never alias a chunk buffer the
/// caller handed to the splitter, so the frame stays valid after the caller
/// reuses or drops its chunks. Cloning is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct JpegFrame(Bytes);

impl JpegFrame {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for JpegFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for JpegFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for JpegFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JpegFrame").field("len", &self.0.len()).finish()
    }
}
