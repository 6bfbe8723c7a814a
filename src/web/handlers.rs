use std::{convert::Infallible, sync::Arc};

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    time::{Duration, sleep},
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    app_state::AppState,
    capture::{FrameInfo, spawn_capture},
    core::{errors::AppError, state::CaptureStatus},
    mjpeg::{JpegFrame, http_source::StreamMode, traits::SourceConnector},
};

const BOUNDARY: &str = "cycimg";

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    app_name: String,
    capture: CaptureStatus,
    frame_count: usize,
}

#[derive(Deserialize)]
pub struct SourceSelectRequest {
    url: String,
    mode: Option<StreamMode>,
}

#[derive(Debug, Serialize)]
pub struct SourceSelectResponse {
    url: String,
    mode: StreamMode,
    message: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let capture = state.capture.lock().await.status();
    Json(StatusResponse {
        app_name: state.config.app_name.clone(),
        capture,
        frame_count: state.frames.len(),
    })
}

pub async fn source_select(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SourceSelectRequest>,
) -> Result<Json<SourceSelectResponse>, AppError> {
    let url = payload.url.trim().to_string();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::bad_request("url must start with http:// or https://"));
    }

    let mode = {
        let mut capture = state.capture.lock().await;
        let mode = payload.mode.unwrap_or_else(|| capture.connector().mode());
        capture
            .reconfigure_connector(|connector| {
                connector.set_url(url.clone());
                connector.set_mode(mode);
            })
            .map_err(|err| AppError::conflict(err.to_string()))?;
        mode
    };

    info!("capture source reconfigured: url={url} mode={mode}");
    Ok(Json(SourceSelectResponse {
        url,
        mode,
        message: "capture source updated",
    }))
}

pub async fn start(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CaptureStatus>), AppError> {
    {
        let capture = state.capture.lock().await;
        if !capture.connector().is_configured() {
            return Err(AppError::bad_request("no capture source configured"));
        }
    }

    spawn_capture(state.clone())
        .await
        .map_err(|err| AppError::conflict(format!("capture cannot start: {err:#}")))?;
    info!("capture start requested");

    let status = state.capture.lock().await.status();
    Ok((StatusCode::ACCEPTED, Json(status)))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Json<CaptureStatus> {
    state.capture.lock().await.stop();

    // Give the capture task a moment to observe the cancel and close its source.
    for _ in 0..20 {
        if !state.capture.lock().await.is_active() {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }

    info!("capture stop requested");
    Json(state.capture.lock().await.status())
}

pub async fn frames(State(state): State<Arc<AppState>>) -> Json<Vec<FrameInfo>> {
    Json(state.frames.summaries())
}

pub async fn frame(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Response, AppError> {
    let frame = state
        .frames
        .get(index)
        .ok_or_else(|| AppError::not_found(format!("no frame at index {index}")))?;
    Ok(jpeg_response(frame))
}

pub async fn latest_frame(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let frame = state
        .frames
        .latest()
        .ok_or_else(|| AppError::not_found("no frame captured yet"))?;
    Ok(jpeg_response(frame))
}

/// Re-serves captured frames to a viewer as a multipart MJPEG stream.
pub async fn stream(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let permit = state
        .stream_limit
        .clone()
        .try_acquire_owned()
        .map_err(|_| AppError::new(StatusCode::LOCKED, "stream viewer limit reached"))?;

    let (first, mut live_rx) = state.frames.follow();

    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(8);
    tokio::spawn(async move {
        let _permit = permit;
        if let Some(frame) = first {
            if tx.send(Ok(multipart_part(&frame))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                received = live_rx.recv() => match received {
                    Ok(frame) => {
                        if tx.send(Ok(multipart_part(&frame))).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("stream viewer lagging, skipped {skipped} frames");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        info!("stream viewer disconnected");
    });

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("multipart/x-mixed-replace; boundary=cycimg"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok((
        StatusCode::OK,
        headers,
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response())
}

fn jpeg_response(frame: JpegFrame) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    (StatusCode::OK, headers, frame.into_bytes()).into_response()
}

fn multipart_part(frame: &JpegFrame) -> Bytes {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        frame.len()
    );
    let mut part = BytesMut::with_capacity(header.len() + frame.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(frame);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}
