//! Client for the external facial-similarity scorer.

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client};
use serde::{Deserialize, Serialize};
use service_core::observability::inject_trace_headers;
use std::time::Duration;

use super::ServiceError;
use crate::config::FaceMatchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FaceMatch {
    pub matched: bool,
    pub score: f64,
}

impl FaceMatch {
    /// Scores outside `[0, 1]` or non-finite scores are treated as scorer failures.
    pub fn ensure_valid(self) -> Result<Self, ServiceError> {
        if self.score.is_finite() && (0.0..=1.0).contains(&self.score) {
            Ok(self)
        } else {
            Err(ServiceError::Scorer(format!(
                "score out of range: {}",
                self.score
            )))
        }
    }
}

#[async_trait]
pub trait FaceMatcher: Send + Sync {
    async fn compare(
        &self,
        id_image_url: &str,
        selfie_image_url: &str,
        request_id: Option<&str>,
    ) -> Result<FaceMatch, ServiceError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest<'a> {
    id_image_url: &'a str,
    selfie_image_url: &'a str,
}

pub struct HttpFaceMatcher {
    client: Client,
    url: String,
}

impl HttpFaceMatcher {
    pub fn new(config: &FaceMatchConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl FaceMatcher for HttpFaceMatcher {
    async fn compare(
        &self,
        id_image_url: &str,
        selfie_image_url: &str,
        request_id: Option<&str>,
    ) -> Result<FaceMatch, ServiceError> {
        let mut headers = HeaderMap::new();
        inject_trace_headers(&mut headers, request_id);

        let response = self
            .client
            .post(&self.url)
            .headers(headers)
            .json(&CompareRequest {
                id_image_url,
                selfie_image_url,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Face match scorer unreachable");
                ServiceError::Scorer(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "Face match scorer returned an error");
            return Err(ServiceError::Scorer(format!("scorer responded with {}", status)));
        }

        let result: FaceMatch = response
            .json()
            .await
            .map_err(|e| ServiceError::Scorer(format!("invalid scorer response: {}", e)))?;

        result.ensure_valid()
    }
}

/// Scorer stub returning a preset answer, or failing when built with `unavailable()`.
#[derive(Debug, Clone)]
pub struct MockFaceMatcher {
    result: Option<FaceMatch>,
}

impl MockFaceMatcher {
    pub fn matching(score: f64) -> Self {
        Self {
            result: Some(FaceMatch {
                matched: true,
                score,
            }),
        }
    }

    pub fn mismatching(score: f64) -> Self {
        Self {
            result: Some(FaceMatch {
                matched: false,
                score,
            }),
        }
    }

    pub fn unavailable() -> Self {
        Self { result: None }
    }
}

#[async_trait]
impl FaceMatcher for MockFaceMatcher {
    async fn compare(
        &self,
        _id_image_url: &str,
        _selfie_image_url: &str,
        _request_id: Option<&str>,
    ) -> Result<FaceMatch, ServiceError> {
        self.result
            .ok_or_else(|| ServiceError::Scorer("scorer unavailable".to_string()))?
            .ensure_valid()
    }
}
