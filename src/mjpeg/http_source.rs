use std::{fmt, str::FromStr};

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    error::TransportError,
    traits::{ChunkSource, SourceConnector},
};

/// How the response body is handed to the splitter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Each body chunk as it arrives.
    #[default]
    Incremental,
    /// One chunk holding the whole body, for transports that cannot stream.
    Whole,
}

impl FromStr for StreamMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "incremental" | "stream" => Ok(Self::Incremental),
            "whole" | "buffer" => Ok(Self::Whole),
            other => bail!("unknown stream mode: {other}"),
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => f.write_str("incremental"),
            Self::Whole => f.write_str("whole"),
        }
    }
}

enum Body {
    Streaming(Response),
    Whole(Option<Response>),
}

/// Body of an HTTP GET, delivered as stream chunks.
pub struct HttpSource {
    body: Body,
}

impl HttpSource {
    pub async fn open(client: &Client, url: &str, mode: StreamMode) -> Result<Self, TransportError> {
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        info!("mjpeg source connected: url={url} status={status} mode={mode}");
        let body = match mode {
            StreamMode::Incremental => Body::Streaming(response),
            StreamMode::Whole => Body::Whole(Some(response)),
        };
        Ok(Self { body })
    }
}

#[async_trait]
impl ChunkSource for HttpSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        match &mut self.body {
            Body::Streaming(response) => Ok(response.chunk().await?),
            Body::Whole(response) => match response.take() {
                Some(response) => Ok(Some(response.bytes().await?)),
                None => Ok(None),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
    url: String,
    mode: StreamMode,
}

impl HttpConnector {
    pub fn new(client: Client, url: String, mode: StreamMode) -> Self {
        Self { client, url, mode }
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn set_url(&mut self, url: String) {
        self.url = url;
    }

    pub fn set_mode(&mut self, mode: StreamMode) {
        self.mode = mode;
    }
}

#[async_trait]
impl SourceConnector for HttpConnector {
    type Source = HttpSource;

    async fn connect(&self) -> Result<HttpSource, TransportError> {
        HttpSource::open(&self.client, &self.url, self.mode).await
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.url, self.mode)
    }

    fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}
