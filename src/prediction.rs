//! Client for the external move-prediction service.
//!
//! One call, one answer: retries and fallbacks are the driver's business.

use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::board::{BoardState, DestroyedShip};
use crate::common::GridCell;

/// Body of `POST /prediction`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub board_state: BoardState,
    pub ship_types: Vec<DestroyedShip>,
}

/// A successful answer: where to shoot and the probability matrix behind it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prediction {
    pub x: u8,
    pub y: u8,
    pub prob: Vec<Vec<f64>>,
}

impl Prediction {
    pub fn target(&self) -> GridCell {
        GridCell::new(self.x, self.y)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("prediction request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("prediction service answered with status {0}")]
    Status(u16),
    #[error("prediction response rejected: {0}")]
    InvalidResponse(String),
}

/// Source of attack suggestions. Implementations must be safe to share
/// between every driver in the process.
#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictionError>;
}

/// [`PredictionClient`] backed by the HTTP scoring service.
///
/// The inner `reqwest::Client` keeps a keep-alive connection pool, so one
/// instance should be shared by all drivers.
#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpPredictionClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = Url::parse(base_url)?.join("/prediction")?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictionError> {
        trace!("POST {} with {} destroyed ships", self.endpoint, request.ship_types.len());
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PredictionError::Status(status.as_u16()));
        }
        let prediction: Prediction = response
            .json()
            .await
            .map_err(|e| PredictionError::InvalidResponse(e.to_string()))?;
        trace!("prediction service chose [{}, {}]", prediction.x, prediction.y);
        Ok(prediction)
    }
}
