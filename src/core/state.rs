use serde::Serialize;

use crate::capture::pump::CaptureSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Connecting,
    Capturing,
    Stopping,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub active: bool,
    pub source: String,
    pub last_summary: Option<CaptureSummary>,
    pub last_error: Option<String>,
}
