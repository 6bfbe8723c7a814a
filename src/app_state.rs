use std::sync::Arc;

use reqwest::Client;
use tokio::sync::{Mutex, Semaphore};

use crate::{
    capture::{service::CaptureService, store::FrameStore},
    config::AppConfig,
    mjpeg::http_source::HttpConnector,
};

pub struct AppState {
    pub config: AppConfig,
    pub capture: Mutex<CaptureService<HttpConnector>>,
    pub frames: FrameStore,
    pub stream_limit: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: AppConfig, capture: CaptureService<HttpConnector>) -> Self {
        let stream_limit = Arc::new(Semaphore::new(config.stream_clients));
        Self {
            config,
            capture: Mutex::new(capture),
            frames: FrameStore::new(),
            stream_limit,
        }
    }

    /// Builds the state with an HTTP connector for the configured source.
    pub fn from_config(config: AppConfig) -> Self {
        let connector = HttpConnector::new(
            Client::new(),
            config.source_url.clone().unwrap_or_default(),
            config.stream_mode,
        );
        Self::new(config, CaptureService::new(connector))
    }
}
