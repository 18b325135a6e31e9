//! Fingerprint-keyed event caches.
//!
//! [`AlertCache`] holds the canonical alert events, bucketed by
//! `(tenant, fault_center)` with a reverse index from rule id to the
//! fingerprints it has produced (legacy-fingerprint recovery relies on it).
//! [`ProbingCache`] holds the per-rule state of probing rules that are not
//! attached to a fault center, plus the last raw measurement per rule.
//!
//! Buckets are individually locked so a write to one key never blocks reads
//! of a different key. Neither cache expires entries on its own; purging on
//! recovery delivery belongs to the downstream consumer.

use crate::AlertError;
use faultline_common::types::{AlertEvent, Labels, ProbingEvent};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

type BucketKey = (String, String);

#[derive(Default)]
struct Bucket {
    /// fingerprint -> event
    events: HashMap<String, AlertEvent>,
    /// rule_id -> fingerprints produced under that rule
    by_rule: HashMap<String, HashSet<String>>,
}

#[derive(Default)]
pub struct AlertCache {
    buckets: RwLock<HashMap<BucketKey, Arc<RwLock<Bucket>>>>,
}

impl AlertCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn bucket(&self, tenant_id: &str, fault_center_id: &str) -> Option<Arc<RwLock<Bucket>>> {
        self.buckets
            .read()
            .await
            .get(&(tenant_id.to_string(), fault_center_id.to_string()))
            .cloned()
    }

    async fn bucket_or_create(&self, tenant_id: &str, fault_center_id: &str) -> Arc<RwLock<Bucket>> {
        let key = (tenant_id.to_string(), fault_center_id.to_string());
        if let Some(bucket) = self.buckets.read().await.get(&key) {
            return bucket.clone();
        }
        self.buckets
            .write()
            .await
            .entry(key)
            .or_default()
            .clone()
    }

    /// Point lookup for `(tenant, fault_center, fingerprint)`.
    pub async fn get_event(
        &self,
        tenant_id: &str,
        fault_center_id: &str,
        fingerprint: &str,
    ) -> Option<AlertEvent> {
        let bucket = self.bucket(tenant_id, fault_center_id).await?;
        let guard = bucket.read().await;
        guard.events.get(fingerprint).cloned()
    }

    /// All events currently tracked under one fault center.
    pub async fn list_events(&self, tenant_id: &str, fault_center_id: &str) -> Vec<AlertEvent> {
        match self.bucket(tenant_id, fault_center_id).await {
            Some(bucket) => bucket.read().await.events.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Reverse lookup: fingerprints a rule has produced in this bucket.
    pub async fn fingerprints_by_rule(
        &self,
        tenant_id: &str,
        fault_center_id: &str,
        rule_id: &str,
    ) -> Vec<String> {
        match self.bucket(tenant_id, fault_center_id).await {
            Some(bucket) => {
                let guard = bucket.read().await;
                let mut fps: Vec<String> = guard
                    .by_rule
                    .get(rule_id)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default();
                fps.sort();
                fps
            }
            None => Vec::new(),
        }
    }

    /// Overwrite the event's slot atomically. Events without a fingerprint
    /// are refused so a bogus key can never shadow a real one.
    pub async fn push_event(&self, event: AlertEvent) -> Result<(), AlertError> {
        if event.fingerprint.is_empty() {
            return Err(AlertError::EmptyFingerprint {
                tenant_id: event.tenant_id.clone(),
                rule_id: event.rule_id.clone(),
            });
        }
        let bucket = self
            .bucket_or_create(&event.tenant_id, &event.fault_center_id)
            .await;
        let mut guard = bucket.write().await;
        guard
            .by_rule
            .entry(event.rule_id.clone())
            .or_default()
            .insert(event.fingerprint.clone());
        guard.events.insert(event.fingerprint.clone(), event);
        Ok(())
    }
}

/// Per-rule cache for probing rules outside a fault center, mirroring the
/// `probing-event:<tenant>:<ruleId>` / `probing-value:<tenant>:<ruleId>`
/// layout of the upstream store.
#[derive(Default)]
pub struct ProbingCache {
    events: RwLock<HashMap<(String, String), ProbingEvent>>,
    values: RwLock<HashMap<(String, String), Labels>>,
}

impl ProbingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_event(&self, tenant_id: &str, rule_id: &str) -> Option<ProbingEvent> {
        self.events
            .read()
            .await
            .get(&(tenant_id.to_string(), rule_id.to_string()))
            .cloned()
    }

    pub async fn set_event(&self, event: ProbingEvent) {
        self.events
            .write()
            .await
            .insert((event.tenant_id.clone(), event.rule_id.clone()), event);
    }

    /// Last raw measurement snapshot of a rule.
    pub async fn get_value(&self, tenant_id: &str, rule_id: &str) -> Option<Labels> {
        self.values
            .read()
            .await
            .get(&(tenant_id.to_string(), rule_id.to_string()))
            .cloned()
    }

    pub async fn set_value(&self, tenant_id: &str, rule_id: &str, value: Labels) {
        self.values
            .write()
            .await
            .insert((tenant_id.to_string(), rule_id.to_string()), value);
    }
}
