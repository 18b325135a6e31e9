//! Synthetic endpoint probing.
//!
//! One cooperative task per enabled probing rule periodically drives an
//! [`EndpointProber`] (ICMP echo, HTTP request, TCP connect, TLS handshake),
//! applies the rule's threshold with failure/recovery debouncing, and feeds
//! alert events into the fault-center ingress (or a local per-rule cache for
//! rules outside a fault center).

pub mod http;
pub mod icmp;
pub mod supervisor;
pub mod tcp;
pub mod tls;
pub mod worker;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use faultline_common::types::{HttpProbeConfig, IcmpProbeConfig, Labels, ProbingRule, RuleType};

/// Everything a probe driver needs to hit one endpoint once.
#[derive(Debug, Clone, Default)]
pub struct EndpointOption {
    pub endpoint: String,
    /// Whole-probe budget in seconds.
    pub timeout: i64,
    pub icmp: IcmpProbeConfig,
    pub http: HttpProbeConfig,
}

impl EndpointOption {
    pub fn from_rule(rule: &ProbingRule) -> Self {
        let config = &rule.probing_endpoint_config;
        Self {
            endpoint: config.endpoint.clone(),
            timeout: config.strategy.timeout,
            icmp: config.icmp.clone(),
            http: config.http.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe endpoint unresolvable: {0}")]
    Resolve(String),
    #[error("probe transport error: {0}")]
    Transport(String),
    #[error("TLS handshake failed: {0}")]
    Handshake(String),
    #[error("证书为空, 跳过检测")]
    EmptyCertificate,
    #[error("certificate parse error: {0}")]
    CertParse(String),
}

/// A probe driver. Implementations return a flat measurement snapshot; the
/// worker layers thresholding and debouncing on top.
#[async_trait]
pub trait EndpointProber: Send + Sync {
    async fn pilot(&self, option: &EndpointOption) -> Result<Labels, ProbeError>;
}

/// Driver for a rule type.
pub fn prober_for(rule_type: RuleType) -> Box<dyn EndpointProber> {
    match rule_type {
        RuleType::Icmp => Box::new(icmp::IcmpProber),
        RuleType::Http => Box::new(http::HttpProber),
        RuleType::Tcp => Box::new(tcp::TcpProber),
        RuleType::Tls => Box::new(tls::TlsProber),
    }
}
