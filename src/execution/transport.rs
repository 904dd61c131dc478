//! Reqwest-based client for the remote execution service.

use std::error::Error as StdError;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT};
use serde::Deserialize;

use super::{ExecutionError, ExecutionRequest};
use crate::config::Config;

/// Status and undecoded body of a reply. Interpretation lives in `normalize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait ExecutionTransport: Send + Sync + 'static {
    /// Send one request. An `Err` means nothing usable came back.
    async fn execute(&self, request: &ExecutionRequest) -> Result<RawResponse, ExecutionError>;

    /// Human-readable target, used for status display and logs.
    fn endpoint(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    execute_url: String,
    health_url: String,
}

#[derive(Debug, Deserialize)]
struct HealthReply {
    status: Option<String>,
}

impl HttpTransport {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("natpy/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = cfg.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            http,
            execute_url: cfg.execute_url(),
            health_url: cfg.health_url(),
        })
    }

    /// Probe `GET /health`; returns the reported status string.
    pub async fn health(&self) -> Result<String> {
        let resp = self
            .http
            .get(&self.health_url)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.health_url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("health check failed: {} - {}", status, text);
        }

        let reply: HealthReply = resp
            .json()
            .await
            .context("health endpoint returned an unexpected body")?;
        Ok(reply.status.unwrap_or_else(|| "unknown".into()))
    }
}

#[async_trait]
impl ExecutionTransport for HttpTransport {
    async fn execute(&self, request: &ExecutionRequest) -> Result<RawResponse, ExecutionError> {
        // `.json()` sets Content-Type: application/json.
        let resp = self
            .http
            .post(&self.execute_url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .json(request)
            .send()
            .await
            .map_err(|e| ExecutionError::transport(describe_reqwest_error(&e)))?;

        let status = resp.status().as_u16();
        tracing::debug!(status, url = %self.execute_url, "execute response received");

        let body = resp
            .bytes()
            .await
            .map_err(|e| ExecutionError::transport(describe_reqwest_error(&e)))?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }

    fn endpoint(&self) -> &str {
        &self.execute_url
    }
}

/// reqwest's top-level message hides the cause ("error sending request"), so
/// append the innermost source.
fn describe_reqwest_error(err: &reqwest::Error) -> String {
    let mut root: &dyn StdError = err;
    while let Some(source) = root.source() {
        root = source;
    }
    let top = err.to_string();
    let cause = root.to_string();
    if cause == top {
        top
    } else {
        format!("{top}: {cause}")
    }
}
