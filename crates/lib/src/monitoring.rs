//! Monitoring platform client (VuSmartMaps-style REST API).
//!
//! The metric endpoint sits behind a self-signed certificate, so the HTTP
//! client is built once with certificate validation disabled and injected
//! here. The platform exposes no token lifetime, so `fetch_cpu` logs in on
//! every call instead of caching the access token.
//!
//! Failure policy: nothing in this module propagates past `fetch_cpu`. Auth
//! errors, transport errors, non-2xx responses, and missing fields are all
//! logged and surface to the caller as `None`.

use crate::config::MonitoringConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("monitoring request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("monitoring api error: {0}")]
    Api(String),
    #[error("monitoring not configured: missing {0}")]
    NotConfigured(&'static str),
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Metric query response: `metricData[0].data[0].avg_cpu` holds the gauge.
#[derive(Debug, Deserialize)]
pub struct MetricResponse {
    #[serde(default, rename = "metricData")]
    pub metric_data: Vec<MetricSeries>,
}

#[derive(Debug, Deserialize)]
pub struct MetricSeries {
    #[serde(default)]
    pub data: Vec<MetricPoint>,
}

#[derive(Debug, Deserialize)]
pub struct MetricPoint {
    #[serde(default)]
    pub avg_cpu: Option<f64>,
}

impl MetricResponse {
    /// First series, first point, if present.
    pub fn avg_cpu(&self) -> Option<f64> {
        self.metric_data.first()?.data.first()?.avg_cpu
    }
}

/// Source of the CPU gauge; the gateway dispatches through this seam.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// CPU utilization percentage for a relative time window (e.g. "1h"),
    /// or `None` when unavailable.
    async fn fetch_cpu(&self, window: &str) -> Option<f64>;
}

/// Client for the monitoring platform's login and metric endpoints.
pub struct MonitoringClient {
    settings: MonitoringConfig,
    client: reqwest::Client,
}

impl MonitoringClient {
    /// Build the client. Certificate validation is disabled to accommodate
    /// the platform's self-signed endpoint.
    pub fn new(settings: MonitoringConfig) -> Result<Self, MonitoringError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { settings, client })
    }

    /// POST credentials to the login endpoint; returns the access token.
    pub async fn login(&self) -> Result<String, MonitoringError> {
        let url = self
            .settings
            .login_url
            .as_deref()
            .ok_or(MonitoringError::NotConfigured("login url"))?;
        let username = self
            .settings
            .username
            .as_deref()
            .ok_or(MonitoringError::NotConfigured("username"))?;
        let password = self
            .settings
            .password
            .as_deref()
            .ok_or(MonitoringError::NotConfigured("password"))?;
        let body = json!({ "username": username, "password": password });
        let res = self.client.post(url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(MonitoringError::Api(format!("login failed: {} {}", status, body)));
        }
        let data: LoginResponse = res.json().await?;
        data.access_token
            .ok_or_else(|| MonitoringError::Api("login response missing access_token".to_string()))
    }

    async fn fetch_cpu_inner(&self, token: &str, window: &str) -> Result<Option<f64>, MonitoringError> {
        let base = self
            .settings
            .cpu_url
            .as_deref()
            .ok_or(MonitoringError::NotConfigured("cpu url"))?;
        let url = format!("{}?relative_time={}", base, window);
        let res = self.client.get(&url).bearer_auth(token).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(MonitoringError::Api(format!("metric fetch failed: {} {}", status, body)));
        }
        let data: MetricResponse = res.json().await?;
        Ok(data.avg_cpu())
    }
}

#[async_trait]
impl MetricSource for MonitoringClient {
    async fn fetch_cpu(&self, window: &str) -> Option<f64> {
        let token = match self.login().await {
            Ok(t) => t,
            Err(e) => {
                log::warn!("monitoring login failed: {}", e);
                return None;
            }
        };
        match self.fetch_cpu_inner(&token, window).await {
            Ok(Some(v)) => Some(v),
            Ok(None) => {
                log::warn!("metric response missing avg_cpu");
                None
            }
            Err(e) => {
                log::warn!("cpu fetch failed: {}", e);
                None
            }
        }
    }
}
