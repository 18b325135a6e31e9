//! Alert deduplication and life-cycle core.
//!
//! An incoming stream of evaluation results is merged into a
//! fingerprint-keyed cache ([`cache::AlertCache`]): the suppression engine
//! ([`mute`]) decides whether a silence rule or effective-time window holds
//! the event down, and the state machine ([`status`]) moves it between the
//! canonical life-cycle states. [`ingress::EventIngress`] is the single hot
//! path tying the pieces together.

pub mod cache;
pub mod history;
pub mod ingress;
pub mod mute;
pub mod silence;
pub mod status;

#[cfg(test)]
mod tests;

use faultline_common::types::AlertStatus;

/// Errors surfaced by the alert core.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// An event reached a cache write without an identity.
    #[error("empty fingerprint for rule {rule_id} (tenant {tenant_id})")]
    EmptyFingerprint { tenant_id: String, rule_id: String },

    /// An event without a tenant cannot be routed to any bucket.
    #[error("empty tenant id for rule {rule_id}")]
    EmptyTenant { rule_id: String },

    /// The state machine refused an edge; the previous state is retained.
    #[error("illegal alert status transition: {from} -> {to}")]
    IllegalTransition { from: AlertStatus, to: AlertStatus },
}
