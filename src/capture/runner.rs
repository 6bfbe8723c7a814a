use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::{app_state::AppState, mjpeg::FrameSplitter};

use super::{pump::pump, service::CaptureSession};

/// Opens a capture session and splits it on a background task, publishing
/// frames to the shared store as they complete.
pub async fn spawn_capture(state: Arc<AppState>) -> Result<()> {
    let CaptureSession {
        mut source,
        mut cancel_rx,
    } = {
        let mut capture = state.capture.lock().await;
        capture.open_session().await?
    };
    state.frames.clear();

    let task_state = state.clone();
    tokio::spawn(async move {
        let mut splitter = FrameSplitter::new();
        let store = &task_state.frames;
        let outcome = pump(&mut source, &mut splitter, &mut cancel_rx, |frame| {
            store.push(frame);
        })
        .await;

        match &outcome {
            Ok(summary) => info!(
                "capture finished: frames={} bytes={} discarded={} cancelled={}",
                summary.frames, summary.bytes, summary.discarded_bytes, summary.cancelled
            ),
            Err(err) => warn!("capture failed after {} frames: {err}", store.len()),
        }

        let mut capture = task_state.capture.lock().await;
        capture.finish_session(&outcome);
    });

    Ok(())
}
