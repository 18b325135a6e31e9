//! ICMP echo driver.
//!
//! Sends `count` echoes spaced by `interval`, each bounded by the rule
//! timeout, and derives packet loss plus min/avg/max RTT. Resolution or
//! socket failures do not error out: they come back as a 100%-loss snapshot
//! so the threshold logic treats them as a failing endpoint.

use crate::{EndpointOption, EndpointProber, ProbeError};
use async_trait::async_trait;
use faultline_common::types::Labels;
use rand::random;
use serde_json::json;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence};

pub struct IcmpProber;

#[async_trait]
impl EndpointProber for IcmpProber {
    async fn pilot(&self, option: &EndpointOption) -> Result<Labels, ProbeError> {
        let count = option.icmp.count.max(1);
        let interval = Duration::from_secs(option.icmp.interval.max(0) as u64);
        let timeout = Duration::from_secs(option.timeout.max(1) as u64);

        let Some(addr) = resolve(&option.endpoint).await else {
            // unresolvable endpoint reads as total loss, not as an error
            return Ok(loss_snapshot(&option.endpoint, count, 0, Vec::new()));
        };

        let client = match Client::new(&Config::default()) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(endpoint = %option.endpoint, error = %e, "ICMP socket unavailable");
                return Ok(loss_snapshot(&option.endpoint, count, 0, Vec::new()));
            }
        };

        let mut pinger = client.pinger(addr, PingIdentifier(random())).await;
        pinger.timeout(timeout);

        let payload = [0u8; 56];
        let mut received = 0;
        let mut rtts_ms: Vec<f64> = Vec::with_capacity(count as usize);
        for seq in 0..count {
            match pinger.ping(PingSequence(seq as u16), &payload).await {
                Ok((_, rtt)) => {
                    received += 1;
                    rtts_ms.push(rtt.as_secs_f64() * 1000.0);
                }
                Err(e) => {
                    tracing::debug!(endpoint = %option.endpoint, seq, error = %e, "echo lost");
                }
            }
            if seq + 1 < count && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }

        Ok(loss_snapshot(&option.endpoint, count, received, rtts_ms))
    }
}

async fn resolve(endpoint: &str) -> Option<IpAddr> {
    if let Ok(ip) = endpoint.parse::<IpAddr>() {
        return Some(ip);
    }
    tokio::net::lookup_host(format!("{endpoint}:0"))
        .await
        .ok()?
        .next()
        .map(|sa| sa.ip())
}

fn loss_snapshot(endpoint: &str, sent: i32, received: i32, rtts_ms: Vec<f64>) -> Labels {
    let loss = if sent > 0 {
        100.0 * f64::from(sent - received) / f64::from(sent)
    } else {
        100.0
    };
    let min = rtts_ms.iter().cloned().fold(f64::NAN, f64::min);
    let max = rtts_ms.iter().cloned().fold(f64::NAN, f64::max);
    let avg = if rtts_ms.is_empty() {
        0.0
    } else {
        rtts_ms.iter().sum::<f64>() / rtts_ms.len() as f64
    };

    let mut labels = Labels::new();
    labels.insert("address".into(), json!(endpoint));
    labels.insert("PacketsSent".into(), json!(sent));
    labels.insert("PacketsRecv".into(), json!(received));
    labels.insert("PacketLoss".into(), json!(loss));
    labels.insert("MinRtt".into(), json!(if min.is_nan() { 0.0 } else { min }));
    labels.insert("MaxRtt".into(), json!(if max.is_nan() { 0.0 } else { max }));
    labels.insert("AvgRtt".into(), json!(avg));
    labels
}
