//! Outbound fetches to origin servers.

use crate::error::ProxyError;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use std::time::Duration;

/// Status and body of an origin response.
#[derive(Debug)]
pub enum OriginResponse {
    /// `200 OK` with the complete body.
    Ok(Bytes),
    /// Any other status. The body is discarded.
    Status(StatusCode),
}

#[async_trait]
pub trait Origin: Send + Sync {
    /// Issues a GET for `url`. Transport failures map to
    /// [`ProxyError::OriginUnreachable`], body read failures to
    /// [`ProxyError::OriginBodyRead`].
    async fn fetch(&self, url: &str) -> Result<OriginResponse, ProxyError>;
}

/// Origin fetcher backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        // Origins are addressed directly, never through a forward proxy from the environment.
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("origin-cache-proxy/", env!("CARGO_PKG_VERSION")))
            .no_proxy();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build reqwest client")?;
        Ok(HttpOrigin { client })
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, url: &str) -> Result<OriginResponse, ProxyError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ProxyError::OriginUnreachable(err.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Ok(OriginResponse::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| ProxyError::OriginBodyRead(err.to_string()))?;
        Ok(OriginResponse::Ok(body))
    }
}
