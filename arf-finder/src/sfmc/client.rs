//! HTTP transport for the SOAP and REST APIs
//!
//! Every call fetches a bearer token from the shared [`CredentialProvider`];
//! an HTTP 401 from either API surfaces as [`SourceError::Unauthorized`] so
//! the engine treats it as fatal.

use super::soap::{parse_retrieve_response, Record, RetrieveRequest};
use crate::auth::CredentialProvider;
use crate::source::{SourceError, SourceResult};
use arf_common::config::{AggregationConfig, SfmcConfig};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on `ContinueRequest` round-trips for one retrieve
const MAX_CONTINUATIONS: usize = 100;

/// Concurrency knobs applied inside a single adapter call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutLimits {
    pub page_size: u32,
    pub max_in_flight: usize,
    pub cooldown_every: usize,
    pub cooldown: Duration,
}

impl From<&AggregationConfig> for FanoutLimits {
    fn from(config: &AggregationConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_in_flight: config.fanout_limit,
            cooldown_every: config.cooldown_every,
            cooldown: config.cooldown(),
        }
    }
}

pub struct SfmcClient {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    soap_endpoint: String,
    rest_endpoint: String,
    limits: FanoutLimits,
}

impl SfmcClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<dyn CredentialProvider>,
        sfmc: &SfmcConfig,
        limits: FanoutLimits,
    ) -> Self {
        Self {
            http,
            credentials,
            soap_endpoint: sfmc.soap_endpoint.clone(),
            rest_endpoint: sfmc.rest_endpoint.trim_end_matches('/').to_string(),
            limits,
        }
    }

    pub fn limits(&self) -> FanoutLimits {
        self.limits
    }

    /// Run a SOAP retrieve, following `MoreDataAvailable` continuations
    pub async fn retrieve(&self, request: &RetrieveRequest) -> SourceResult<Vec<Record>> {
        let mut records = Vec::new();
        let mut next = request.clone();

        for _ in 0..MAX_CONTINUATIONS {
            let response = self.retrieve_once(&next).await?;
            let more = response.has_more();
            records.extend(response.results);
            if !more {
                return Ok(records);
            }
            debug!(
                object_type = request.object_type,
                request_id = %response.request_id,
                "Continuing retrieve"
            );
            next = request.continuation(&response.request_id);
        }

        warn!(
            object_type = request.object_type,
            "Retrieve continuation limit reached, returning partial result"
        );
        Ok(records)
    }

    async fn retrieve_once(
        &self,
        request: &RetrieveRequest,
    ) -> SourceResult<super::soap::RetrieveResponse> {
        let token = self.credentials.token().await?;
        let envelope = request.envelope(&self.soap_endpoint, &token);

        let response = self
            .http
            .post(&self.soap_endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .timeout(REQUEST_TIMEOUT)
            .body(envelope)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SourceError::Unauthorized(status.as_u16()));
        }
        let body = response.text().await.map_err(network_error)?;

        if status.is_success() {
            return Ok(parse_retrieve_response(&body)?);
        }
        // Faults arrive with a 500; let the parser surface their message
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            parse_retrieve_response(&body)?;
        }
        Err(SourceError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// GET a REST path (relative to the REST base URL) and decode JSON
    pub async fn rest_get(&self, path: &str) -> SourceResult<Value> {
        let token = self.credentials.token().await?;
        let response = self
            .http
            .get(self.rest_url(path))
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(network_error)?;
        decode_json(response).await
    }

    /// POST a JSON body to a REST path and decode JSON
    pub async fn rest_post(&self, path: &str, body: &Value) -> SourceResult<Value> {
        let token = self.credentials.token().await?;
        let response = self
            .http
            .post(self.rest_url(path))
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        decode_json(response).await
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}{}", self.rest_endpoint, path)
    }
}

async fn decode_json(response: reqwest::Response) -> SourceResult<Value> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(SourceError::Unauthorized(status.as_u16()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| SourceError::Parse(e.to_string()))
}

fn network_error(e: reqwest::Error) -> SourceError {
    SourceError::Network(e.to_string())
}
