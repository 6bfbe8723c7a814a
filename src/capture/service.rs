use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tracing::info;

use crate::{
    core::state::{CaptureState, CaptureStatus},
    mjpeg::{CaptureError, traits::SourceConnector},
};

use super::pump::CaptureSummary;

pub struct CaptureSession<S> {
    pub source: S,
    pub cancel_rx: watch::Receiver<bool>,
}

/// Lifecycle of the capture sessions for one configured source.
///
/// At most one session runs at a time; each session gets its own source and,
/// in the runner, its own splitter.
pub struct CaptureService<C: SourceConnector> {
    connector: C,
    state: CaptureState,
    session_active: bool,
    cancel_tx: Option<watch::Sender<bool>>,
    last_summary: Option<CaptureSummary>,
    last_error: Option<String>,
}

impl<C: SourceConnector> CaptureService<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            state: CaptureState::Idle,
            session_active: false,
            cancel_tx: None,
            last_summary: None,
            last_error: None,
        }
    }

    pub async fn open_session(&mut self) -> Result<CaptureSession<C::Source>> {
        if self.session_active {
            bail!("capture already active");
        }
        if !self.connector.is_configured() {
            bail!("source is not configured");
        }

        self.state = CaptureState::Connecting;
        let source = match self.connector.connect().await {
            Ok(source) => source,
            Err(err) => {
                self.state = CaptureState::Failed;
                self.last_error = Some(err.to_string());
                return Err(err).with_context(|| {
                    format!("failed to connect to {}", self.connector.describe())
                });
            }
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancel_tx = Some(cancel_tx);
        self.session_active = true;
        self.last_summary = None;
        self.last_error = None;
        self.state = CaptureState::Capturing;
        info!("capture session opened: {}", self.connector.describe());

        Ok(CaptureSession { source, cancel_rx })
    }

    /// Signals the running session to stop. Idempotent.
    pub fn stop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            self.state = CaptureState::Stopping;
            let _ = cancel_tx.send(true);
        }
    }

    pub fn finish_session(&mut self, outcome: &Result<CaptureSummary, CaptureError>) {
        self.session_active = false;
        self.cancel_tx = None;
        match outcome {
            Ok(summary) => {
                self.state = if summary.cancelled {
                    CaptureState::Idle
                } else {
                    CaptureState::Completed
                };
                self.last_summary = Some(*summary);
            }
            Err(err) => {
                self.state = CaptureState::Failed;
                self.last_error = Some(err.to_string());
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.session_active
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn reconfigure_connector(&mut self, update: impl FnOnce(&mut C)) -> Result<()> {
        if self.session_active {
            bail!("stop the capture before changing its source");
        }

        update(&mut self.connector);
        Ok(())
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus {
            state: self.state,
            active: self.session_active,
            source: self.connector.describe(),
            last_summary: self.last_summary,
            last_error: self.last_error.clone(),
        }
    }
}
