//! Fetching the sensor snapshot.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use vitalnote_config::SensorConfig;

use crate::model::SensorSnapshot;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sensor responded with HTTP {status}")]
    Status { status: u16 },
    #[error("sensor payload is malformed: {0}")]
    Payload(String),
    #[error("reading snapshot file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Snapshot(SensorSnapshot),
    /// HTTP 404: nothing new to sync.
    NoData,
}

#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn fetch(&self) -> Result<FetchOutcome, SensorError>;
}

/// Decode a state document.  Accepts the full `{"attributes": {...}}` state
/// object or a bare attributes object.
pub fn parse_state(body: &str) -> Result<SensorSnapshot, SensorError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| SensorError::Payload(err.to_string()))?;
    let attributes = match value {
        Value::Object(mut map) => map.remove("attributes").unwrap_or(Value::Object(map)),
        _ => return Err(SensorError::Payload("expected a JSON object".to_string())),
    };
    if attributes.is_null() {
        return Ok(SensorSnapshot::default());
    }
    serde_json::from_value(attributes).map_err(|err| SensorError::Payload(err.to_string()))
}

// ── Home Assistant REST ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HomeAssistantClient {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HomeAssistantClient {
    pub fn new(config: &SensorConfig) -> Result<Self, SensorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            url: state_url(&config.base_uri, &config.sensor_id),
            token: config.token.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn state_url(base_uri: &str, sensor_id: &str) -> String {
    format!("{}/api/states/{}", base_uri.trim_end_matches('/'), sensor_id)
}

#[async_trait]
impl SensorSource for HomeAssistantClient {
    async fn fetch(&self) -> Result<FetchOutcome, SensorError> {
        debug!(url = %self.url, "fetching sensor state");
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                let snapshot = parse_state(&body)?;
                info!(bytes = body.len(), "sensor snapshot received");
                Ok(FetchOutcome::Snapshot(snapshot))
            }
            StatusCode::NOT_FOUND => {
                info!(url = %self.url, "sensor reported no data");
                Ok(FetchOutcome::NoData)
            }
            status => Err(SensorError::Status {
                status: status.as_u16(),
            }),
        }
    }
}

// ── Offline snapshot ─────────────────────────────────────────────────────────

/// Reads a previously saved state document from disk.  A missing file is
/// treated like the 404 "no data" response.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SensorSource for FileSource {
    async fn fetch(&self) -> Result<FetchOutcome, SensorError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(FetchOutcome::NoData);
        }
        let body = tokio::fs::read_to_string(&self.path).await?;
        Ok(FetchOutcome::Snapshot(parse_state(&body)?))
    }
}
