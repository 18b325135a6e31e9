//! TLS handshake driver.
//!
//! Connects, completes a verified handshake, and reads the leaf
//! certificate's validity window: days until expiry, not-before/not-after
//! (machine and Chinese-friendly renderings) and handshake latency.

use crate::{EndpointOption, EndpointProber, ProbeError};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc, Weekday};
use faultline_common::types::Labels;
use rustls::ClientConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::FromDer;

pub struct TlsProber;

#[async_trait]
impl EndpointProber for TlsProber {
    async fn pilot(&self, option: &EndpointOption) -> Result<Labels, ProbeError> {
        let timeout = Duration::from_secs(option.timeout.max(1) as u64);
        let (host, port) = split_host_port(&option.endpoint);
        let addr = format!("{host}:{port}");

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));

        let server_name = rustls::pki_types::ServerName::try_from(host.clone())
            .map_err(|e| ProbeError::Resolve(e.to_string()))?;

        let started = Instant::now();
        let tcp = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ProbeError::Transport(format!("connect timed out after {timeout:?}")))?
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let tls_stream = tokio::time::timeout(timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| ProbeError::Handshake("handshake timed out".to_string()))?
            .map_err(|e| ProbeError::Handshake(e.to_string()))?;
        let response_time = started.elapsed().as_millis() as f64;

        let (_, session) = tls_stream.get_ref();
        let cert_der = session
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or(ProbeError::EmptyCertificate)?;

        let (_, cert) = x509_parser::certificate::X509Certificate::from_der(cert_der.as_ref())
            .map_err(|e| ProbeError::CertParse(e.to_string()))?;

        let not_before = timestamp_to_utc(cert.validity().not_before.timestamp());
        let not_after = timestamp_to_utc(cert.validity().not_after.timestamp());
        let time_remaining = (not_after - Utc::now()).num_days();

        let mut labels = Labels::new();
        labels.insert("address".into(), json!(option.endpoint));
        labels.insert("StartTime".into(), json!(not_before.format("%Y-%m-%d").to_string()));
        labels.insert("ExpireTime".into(), json!(not_after.format("%Y-%m-%d").to_string()));
        labels.insert("StartTimeFormatted".into(), json!(format_chinese_date(not_before)));
        labels.insert("ExpireTimeFormatted".into(), json!(format_chinese_date(not_after)));
        labels.insert("TimeRemaining".into(), json!(time_remaining as f64));
        labels.insert("TimeRemainingText".into(), json!(format!("{time_remaining}天")));
        labels.insert("ResponseTime".into(), json!(response_time));
        Ok(labels)
    }
}

fn split_host_port(endpoint: &str) -> (String, u16) {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (endpoint.to_string(), 443),
        },
        None => (endpoint.to_string(), 443),
    }
}

fn timestamp_to_utc(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

/// `2025年6月16日 星期一 17:41:05`
fn format_chinese_date(t: DateTime<Utc>) -> String {
    let weekday = match t.weekday() {
        Weekday::Mon => "星期一",
        Weekday::Tue => "星期二",
        Weekday::Wed => "星期三",
        Weekday::Thu => "星期四",
        Weekday::Fri => "星期五",
        Weekday::Sat => "星期六",
        Weekday::Sun => "星期日",
    };
    format!(
        "{}年{}月{}日 {} {}",
        t.year(),
        t.month(),
        t.day(),
        weekday,
        t.format("%H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_splitting() {
        assert_eq!(split_host_port("example.com:8443"), ("example.com".into(), 8443));
        assert_eq!(split_host_port("example.com"), ("example.com".into(), 443));
    }

    #[test]
    fn chinese_date_rendering() {
        let t = Utc.with_ymd_and_hms(2025, 6, 16, 17, 41, 5).unwrap();
        assert_eq!(format_chinese_date(t), "2025年6月16日 星期一 17:41:05");
    }
}
