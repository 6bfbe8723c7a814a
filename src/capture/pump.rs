use std::path::Path;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tokio::{fs::File, sync::watch};
use tracing::{debug, info};

use crate::mjpeg::{
    CaptureError, FrameSplitter, JpegFrame,
    http_source::{HttpSource, StreamMode},
    source::ReaderSource,
    traits::ChunkSource,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureSummary {
    pub chunks: u64,
    pub bytes: u64,
    pub frames: usize,
    /// Bytes of an unfinished frame dropped when the stream ended.
    pub discarded_bytes: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameInfo {
    pub index: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub summary: CaptureSummary,
    pub frames: Vec<FrameInfo>,
}

/// Feeds every chunk from `source` into `splitter` and hands each completed
/// frame to `on_frame`, in stream order.
///
/// Runs until the source ends or `cancel_rx` flips to `true` (or its sender
/// goes away). A frame still incomplete at that point is never delivered.
pub async fn pump<S, F>(
    source: &mut S,
    splitter: &mut FrameSplitter,
    cancel_rx: &mut watch::Receiver<bool>,
    mut on_frame: F,
) -> Result<CaptureSummary, CaptureError>
where
    S: ChunkSource + ?Sized,
    F: FnMut(JpegFrame),
{
    let mut summary = CaptureSummary::default();
    let already_split = splitter.frames().len();
    loop {
        tokio::select! {
            biased;
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    info!("capture cancelled after {} frames", summary.frames);
                    summary.cancelled = true;
                    break;
                }
            }
            chunk = source.next_chunk() => {
                let Some(chunk) = chunk? else {
                    break;
                };
                summary.chunks += 1;
                summary.bytes += chunk.len() as u64;
                match splitter.add_chunk(&chunk) {
                    Ok(frames) => {
                        for frame in frames {
                            summary.frames += 1;
                            on_frame(frame);
                        }
                    }
                    Err(err) => {
                        // Frames completed ahead of the bad byte still go out.
                        for frame in splitter.frames()[already_split + summary.frames..].iter() {
                            summary.frames += 1;
                            on_frame(frame.clone());
                        }
                        debug!("format error after {} frames: {err}", summary.frames);
                        return Err(err.into());
                    }
                }
            }
        }
    }

    summary.discarded_bytes = splitter.pending_len();
    if summary.discarded_bytes > 0 {
        debug!(
            "discarding {} bytes of an unfinished frame",
            summary.discarded_bytes
        );
    }
    Ok(summary)
}

/// Fetches an MJPEG resource and returns every frame it contained, calling
/// `on_frame` as each one completes.
pub async fn fetch_motion_jpeg<F>(
    client: &Client,
    url: &str,
    mode: StreamMode,
    on_frame: F,
) -> Result<Vec<JpegFrame>, CaptureError>
where
    F: FnMut(JpegFrame),
{
    let mut source = HttpSource::open(client, url, mode).await?;
    let mut splitter = FrameSplitter::new();
    let (_cancel_tx, mut cancel_rx) = watch::channel(false);
    pump(&mut source, &mut splitter, &mut cancel_rx, on_frame).await?;
    Ok(splitter.frames().to_vec())
}

/// Splits a local MJPEG file.
pub async fn split_file(path: impl AsRef<Path>, read_buffer_bytes: usize) -> Result<SplitReport> {
    let path = path.as_ref();
    let file = File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut source = ReaderSource::with_buffer_size(file, read_buffer_bytes);
    let mut splitter = FrameSplitter::new();
    let (_cancel_tx, mut cancel_rx) = watch::channel(false);

    let mut frames = Vec::new();
    let summary = pump(&mut source, &mut splitter, &mut cancel_rx, |frame| {
        frames.push(FrameInfo {
            index: frames.len(),
            bytes: frame.len(),
        });
    })
    .await
    .with_context(|| format!("failed to split {}", path.display()))?;

    Ok(SplitReport { summary, frames })
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::Client;
    use tokio::sync::watch;

    use super::{fetch_motion_jpeg, pump, split_file};
    use crate::{
        mjpeg::{
            CaptureError, FormatError, FrameSplitter, TransportError,
            http_source::StreamMode, source::BufferSource, traits::ChunkSource,
        },
        test_support::{chunked, sample_jpeg, sample_stream, serve_chunks},
    };

    struct FailAfter {
        chunks: Vec<Bytes>,
    }

    #[async_trait]
    impl ChunkSource for FailAfter {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
            if self.chunks.is_empty() {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "peer reset",
                )));
            }
            Ok(Some(self.chunks.remove(0)))
        }
    }

    struct Stalled;

    #[async_trait]
    impl ChunkSource for Stalled {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
            std::future::pending().await
        }
    }

    async fn collect(mut source: BufferSource) -> Vec<Vec<u8>> {
        let mut splitter = FrameSplitter::new();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut frames = Vec::new();
        pump(&mut source, &mut splitter, &mut cancel_rx, |frame| {
            frames.push(frame.as_bytes().to_vec())
        })
        .await
        .expect("pump should succeed");
        frames
    }

    #[tokio::test]
    async fn whole_and_incremental_delivery_agree() {
        let stream = sample_stream(5);

        let whole = collect(BufferSource::whole(stream.clone())).await;
        let incremental = collect(BufferSource::from_chunks(chunked(&stream, 3))).await;

        assert_eq!(whole.len(), 5);
        assert_eq!(whole, incremental);
        assert_eq!(whole.concat(), stream);
    }

    #[tokio::test]
    async fn unfinished_frame_is_discarded_at_end_of_stream() {
        let mut stream = sample_stream(2);
        stream.extend_from_slice(&sample_jpeg(9)[..12]);
        let mut source = BufferSource::from_chunks(chunked(&stream, 7));
        let mut splitter = FrameSplitter::new();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);

        let mut delivered = 0;
        let summary = pump(&mut source, &mut splitter, &mut cancel_rx, |_| delivered += 1)
            .await
            .expect("pump should succeed");

        assert_eq!(delivered, 2);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.discarded_bytes, 12);
        assert_eq!(summary.bytes, stream.len() as u64);
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn cancellation_stops_a_stalled_source() {
        let mut splitter = FrameSplitter::new();
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            pump(&mut Stalled, &mut splitter, &mut cancel_rx, |_| {}).await
        });
        cancel_tx.send(true).expect("pump should be listening");

        let summary = task
            .await
            .expect("task should join")
            .expect("cancellation is not an error");
        assert!(summary.cancelled);
    }

    #[tokio::test]
    async fn transport_failure_is_surfaced_after_delivered_frames() {
        let mut source = FailAfter {
            chunks: vec![Bytes::from(sample_jpeg(1))],
        };
        let mut splitter = FrameSplitter::new();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);

        let mut delivered = 0;
        let err = pump(&mut source, &mut splitter, &mut cancel_rx, |_| delivered += 1)
            .await
            .expect_err("reset should fail the capture");

        assert_eq!(delivered, 1);
        assert!(matches!(err, CaptureError::Transport(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn malformed_stream_is_a_format_error() {
        let mut source = BufferSource::whole(Bytes::from_static(b"not a jpeg"));
        let mut splitter = FrameSplitter::new();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);

        let err = pump(&mut source, &mut splitter, &mut cancel_rx, |_| {})
            .await
            .expect_err("garbage should be rejected");
        assert!(matches!(
            err,
            CaptureError::Format(FormatError::UnexpectedByte { offset: 0, .. })
        ));
    }

    async fn deliver_until_error(source: &mut BufferSource) -> (usize, usize) {
        let mut splitter = FrameSplitter::new();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut delivered = 0;
        pump(source, &mut splitter, &mut cancel_rx, |_| delivered += 1)
            .await
            .expect_err("truncated marker should be rejected");
        (delivered, splitter.frames().len())
    }

    #[tokio::test]
    async fn frames_before_a_format_error_are_delivered_regardless_of_chunking() {
        let good = sample_jpeg(1);
        let mut stream = good.clone();
        stream.extend_from_slice(&[0xFF, 0xD8, 0x00]);

        let mut whole = BufferSource::whole(Bytes::from(stream.clone()));
        let mut split = BufferSource::from_chunks(vec![
            Bytes::copy_from_slice(&stream[..good.len()]),
            Bytes::copy_from_slice(&stream[good.len()..]),
        ]);

        assert_eq!(deliver_until_error(&mut whole).await, (1, 1));
        assert_eq!(deliver_until_error(&mut split).await, (1, 1));
    }

    #[tokio::test]
    async fn fetch_returns_the_same_frames_in_both_modes() {
        let stream = sample_stream(4);
        let addr = serve_chunks(chunked(&stream, 5)).await;
        let url = format!("http://{addr}/mjpeg");
        let client = Client::new();

        let mut seen = 0;
        let incremental = fetch_motion_jpeg(&client, &url, StreamMode::Incremental, |_| seen += 1)
            .await
            .expect("incremental fetch");
        let whole = fetch_motion_jpeg(&client, &url, StreamMode::Whole, |_| {})
            .await
            .expect("whole fetch");

        assert_eq!(seen, 4);
        assert_eq!(incremental, whole);
        assert_eq!(incremental[2].as_bytes(), &sample_jpeg(2)[..]);
    }

    #[tokio::test]
    async fn split_file_reports_each_frame() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("cycimg-split-{suffix}.mjpeg"));
        fs::write(&path, sample_stream(3)).expect("should write temporary mjpeg file");

        let report = split_file(&path, 8).await.expect("file should split");
        assert_eq!(report.frames.len(), 3);
        assert_eq!(report.frames[1].index, 1);
        assert_eq!(report.frames[1].bytes, sample_jpeg(1).len());
        assert_eq!(report.summary.discarded_bytes, 0);

        let _ = fs::remove_file(path);
    }
}
