//! Prometheus metric provider
//!
//! Sends the PromQL query from the metric's config to the Prometheus HTTP
//! API and expects a single scalar back. The per-query deadline is bounded by
//! the client timeout; there are no retries.

use crate::crd::MetricSpec;
use crate::error::{OperatorError, Result};
use crate::metrics::MetricProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Metric config key holding the PromQL query text.
pub const CONFIG_QUERY: &str = "query";

pub struct PrometheusProvider {
    http: reqwest::Client,
    base_url: String,
}

impl PrometheusProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(QUERY_TIMEOUT)
                .build()
                .expect("HTTP client should build"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MetricProvider for PrometheusProvider {
    async fn get_value(&self, metric: &MetricSpec) -> Result<f64> {
        let query = metric.config.get(CONFIG_QUERY).ok_or_else(|| {
            OperatorError::Configuration(
                "prometheus metric requires a \"query\" config entry".to_string(),
            )
        })?;

        let url = format!("{}/api/v1/query", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("query", query.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OperatorError::MetricQueryFailed(format!(
                "query returned HTTP {status}"
            )));
        }

        let body = response.text().await?;
        parse_scalar_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

/// Parse a Prometheus `/api/v1/query` envelope into a scalar value.
fn parse_scalar_response(body: &str) -> Result<f64> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|err| OperatorError::MalformedMetricResult(err.to_string()))?;

    if response.status != "success" {
        return Err(OperatorError::MetricQueryFailed(format!(
            "query status {:?}",
            response.status
        )));
    }

    let data = response.data.ok_or_else(|| {
        OperatorError::MalformedMetricResult("response has no data section".to_string())
    })?;
    if data.result_type != "scalar" {
        return Err(OperatorError::MalformedMetricResult(format!(
            "expected a scalar result, got {:?}",
            data.result_type
        )));
    }

    // A scalar result is a [timestamp, "value"] pair.
    let value = data
        .result
        .as_array()
        .and_then(|pair| pair.get(1))
        .and_then(|raw| raw.as_str())
        .ok_or_else(|| {
            OperatorError::MalformedMetricResult(format!(
                "scalar result has unexpected shape: {}",
                data.result
            ))
        })?;

    value.parse::<f64>().map_err(|err| {
        OperatorError::MalformedMetricResult(format!(
            "failed parsing scalar value {value:?}: {err}"
        ))
    })
}
