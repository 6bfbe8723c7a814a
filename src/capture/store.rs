use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use super::pump::FrameInfo;
use crate::mjpeg::JpegFrame;

const LIVE_FEED_CAPACITY: usize = 16;

/// Frames of the current capture, plus a live feed for stream viewers.
pub struct FrameStore {
    frames: RwLock<Vec<JpegFrame>>,
    live_tx: broadcast::Sender<JpegFrame>,
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStore {
    pub fn new() -> Self {
        let (live_tx, _) = broadcast::channel(LIVE_FEED_CAPACITY);
        Self {
            frames: RwLock::new(Vec::new()),
            live_tx,
        }
    }

    /// Appends a frame and returns its index.
    pub fn push(&self, frame: JpegFrame) -> usize {
        let mut frames = self.frames.write().unwrap_or_else(PoisonError::into_inner);
        frames.push(frame.clone());
        // Sent under the write lock so `follow` sees each frame exactly once.
        // No subscribers is fine.
        let _ = self.live_tx.send(frame);
        frames.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<JpegFrame> {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        frames.get(index).cloned()
    }

    pub fn latest(&self) -> Option<JpegFrame> {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        frames.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.frames
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summaries(&self) -> Vec<FrameInfo> {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        frames
            .iter()
            .enumerate()
            .map(|(index, frame)| FrameInfo {
                index,
                bytes: frame.len(),
            })
            .collect()
    }

    pub fn clear(&self) {
        self.frames
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Latest stored frame plus a receiver for every frame pushed after it.
    pub fn follow(&self) -> (Option<JpegFrame>, broadcast::Receiver<JpegFrame>) {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        (frames.last().cloned(), self.live_tx.subscribe())
    }
}
