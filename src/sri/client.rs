use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use super::soap;
use super::types::*;
use crate::config::{SriConfig, TEST_AUTHORIZATION_URL, TEST_RECEPTION_URL};
use crate::core::Environment;

const SOAP_CONTENT_TYPE: &str = "text/xml;charset=UTF-8";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// The two SRI operations plus a reachability probe.
///
/// `Err` always means "no usable answer": a parsed rejection is an `Ok`
/// response whose status is not RECIBIDA / AUTORIZADO.
#[async_trait]
pub trait SriClient: Send + Sync {
    /// Send a signed document to the reception service.
    async fn submit(&self, signed_document: &[u8]) -> Result<ReceptionResponse, SriError>;

    /// Query the authorization service for an access key.
    async fn authorize(&self, access_key: &str) -> Result<AuthorizationResponse, SriError>;

    /// Best-effort check that the reception service answers at all.
    async fn is_reachable(&self) -> bool;
}

/// Reception and authorization endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SriEndpoints {
    pub reception: String,
    pub authorization: String,
}

impl SriEndpoints {
    pub fn new(reception: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self {
            reception: reception.into(),
            authorization: authorization.into(),
        }
    }

    /// Endpoints from settings, falling back to the environment defaults.
    pub fn from_config(config: &SriConfig, environment: Environment) -> Self {
        Self::new(
            config.reception_url(environment),
            config.authorization_url(environment),
        )
    }
}

impl Default for SriEndpoints {
    fn default() -> Self {
        Self::new(TEST_RECEPTION_URL, TEST_AUTHORIZATION_URL)
    }
}

/// [`SriClient`] over HTTPS.
pub struct HttpSriClient {
    http: reqwest::Client,
    probe: reqwest::Client,
    endpoints: SriEndpoints,
}

impl HttpSriClient {
    /// Client with a 30 s request timeout and a 5 s probe timeout.
    pub fn new(endpoints: SriEndpoints) -> Result<Self, SriError> {
        Self::with_timeouts(endpoints, DEFAULT_TIMEOUT, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_timeouts(
        endpoints: SriEndpoints,
        timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, SriError> {
        let build = |timeout: Duration| {
            reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| SriError::Network(e.to_string()))
        };
        Ok(Self {
            http: build(timeout)?,
            probe: build(probe_timeout)?,
            endpoints,
        })
    }

    pub fn from_config(config: &SriConfig, environment: Environment) -> Result<Self, SriError> {
        Self::with_timeouts(
            SriEndpoints::from_config(config, environment),
            config.timeout(),
            config.probe_timeout(),
        )
    }

    pub fn endpoints(&self) -> &SriEndpoints {
        &self.endpoints
    }

    async fn post(&self, url: &str, envelope: String) -> Result<String, SriError> {
        debug!(url, request = %envelope, "SRI request");
        let resp = self
            .http
            .post(url)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(envelope)
            .send()
            .await
            .map_err(|e| SriError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SriError::Network(e.to_string()))?;
        debug!(url, %status, response = %body, "SRI response");

        if status.is_server_error() {
            return Err(SriError::Network(format!("HTTP {status}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl SriClient for HttpSriClient {
    async fn submit(&self, signed_document: &[u8]) -> Result<ReceptionResponse, SriError> {
        let body = self
            .post(&self.endpoints.reception, soap::reception_envelope(signed_document))
            .await?;
        soap::parse_reception_response(&body)
    }

    async fn authorize(&self, access_key: &str) -> Result<AuthorizationResponse, SriError> {
        let body = self
            .post(&self.endpoints.authorization, soap::authorization_envelope(access_key))
            .await?;
        soap::parse_authorization_response(&body)
    }

    async fn is_reachable(&self) -> bool {
        match self.probe.get(&self.endpoints.reception).send().await {
            Ok(_) => true,
            Err(e) => {
                warn!(url = %self.endpoints.reception, error = %e, "SRI unreachable");
                false
            }
        }
    }
}
