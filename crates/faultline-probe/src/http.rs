//! HTTP request driver.
//!
//! Issues one request with the configured method, headers and body and
//! reports status code, latency and response size. Transport failures
//! (refused, DNS, timeout) synthesize a `StatusCode = 0` snapshot so the
//! threshold logic sees a failing endpoint instead of a missing sample.

use crate::{EndpointOption, EndpointProber, ProbeError};
use async_trait::async_trait;
use faultline_common::types::Labels;
use serde_json::json;
use std::time::{Duration, Instant};

pub struct HttpProber;

#[async_trait]
impl EndpointProber for HttpProber {
    async fn pilot(&self, option: &EndpointOption) -> Result<Labels, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(option.timeout.max(1) as u64))
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let method = option
            .http
            .method
            .parse::<reqwest::Method>()
            .unwrap_or(reqwest::Method::GET);

        let mut request = client.request(method, &option.endpoint);
        for (key, value) in &option.http.header {
            request = request.header(key, value);
        }
        if !option.http.body.is_empty() {
            request = request.body(option.http.body.clone());
        }

        let started = Instant::now();
        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.bytes().await.unwrap_or_default();
                let latency = started.elapsed().as_millis() as f64;
                Ok(snapshot(&option.endpoint, f64::from(status), latency, body.len() as f64))
            }
            Err(e) => {
                tracing::debug!(endpoint = %option.endpoint, error = %e, "HTTP probe transport failure");
                let latency = started.elapsed().as_millis() as f64;
                Ok(snapshot(&option.endpoint, 0.0, latency, 0.0))
            }
        }
    }
}

fn snapshot(endpoint: &str, status: f64, latency_ms: f64, size: f64) -> Labels {
    let mut labels = Labels::new();
    labels.insert("address".into(), json!(endpoint));
    labels.insert("StatusCode".into(), json!(status));
    labels.insert("Latency".into(), json!(latency_ms));
    labels.insert("ResponseSize".into(), json!(size));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_snapshot_has_zero_status() {
        let labels = snapshot("http://10.255.255.1", 0.0, 1000.0, 0.0);
        assert_eq!(labels["StatusCode"], json!(0.0));
        assert_eq!(labels["ResponseSize"], json!(0.0));
    }
}
