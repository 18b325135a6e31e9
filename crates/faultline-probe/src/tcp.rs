//! TCP connect driver: `IsSuccessful` plus connect latency.

use crate::{EndpointOption, EndpointProber, ProbeError};
use async_trait::async_trait;
use faultline_common::types::Labels;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

pub struct TcpProber;

#[async_trait]
impl EndpointProber for TcpProber {
    async fn pilot(&self, option: &EndpointOption) -> Result<Labels, ProbeError> {
        let timeout = Duration::from_secs(option.timeout.max(1) as u64);
        let started = Instant::now();
        let connected = matches!(
            tokio::time::timeout(timeout, TcpStream::connect(&option.endpoint)).await,
            Ok(Ok(_))
        );
        let latency = started.elapsed().as_millis() as f64;

        let mut labels = Labels::new();
        labels.insert("address".into(), json!(option.endpoint));
        labels.insert("IsSuccessful".into(), json!(connected));
        labels.insert("Latency".into(), json!(latency));
        Ok(labels)
    }
}
