//! Silence rules: cache-side store and predicate matching.
//!
//! Writes are write-through: the in-process cache first (so a freshly
//! created silence suppresses the very next evaluation), the persistent
//! repo second. Match evaluation only ever reads the cache.

use anyhow::Result;
use chrono::Utc;
use faultline_common::types::{Labels, Silence, SilenceLabel};
use faultline_storage::SilenceRepo;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type BucketKey = (String, String);

pub struct SilenceStore {
    cache: RwLock<HashMap<BucketKey, HashMap<String, Silence>>>,
    repo: Arc<dyn SilenceRepo>,
}

impl SilenceStore {
    pub fn new(repo: Arc<dyn SilenceRepo>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            repo,
        }
    }

    /// Candidate silence ids for one `(tenant, fault_center)` bucket.
    pub async fn list_ids(&self, tenant_id: &str, fault_center_id: &str) -> Vec<String> {
        self.cache
            .read()
            .await
            .get(&(tenant_id.to_string(), fault_center_id.to_string()))
            .map(|by_id| by_id.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Hot path of match evaluation.
    pub async fn get_by_id(
        &self,
        tenant_id: &str,
        fault_center_id: &str,
        id: &str,
    ) -> Option<Silence> {
        self.cache
            .read()
            .await
            .get(&(tenant_id.to_string(), fault_center_id.to_string()))
            .and_then(|by_id| by_id.get(id))
            .cloned()
    }

    /// Write-through push: the cache is updated before the repo so the rule
    /// is observable before the caller reports success.
    pub async fn push(&self, silence: Silence) -> Result<()> {
        {
            let mut cache = self.cache.write().await;
            cache
                .entry((silence.tenant_id.clone(), silence.fault_center_id.clone()))
                .or_default()
                .insert(silence.id.clone(), silence.clone());
        }
        self.repo.create(silence).await
    }

    /// Find an unexpired quick-silence for `fingerprint`, used to refuse
    /// duplicate silences for the same alert.
    pub async fn find_active_by_fingerprint(
        &self,
        tenant_id: &str,
        fingerprint: &str,
    ) -> Result<Option<Silence>> {
        let now = Utc::now().timestamp();
        let silences = self.repo.list_enabled(tenant_id).await?;
        for silence in silences {
            if silence.ends_at <= now {
                continue;
            }
            let pinned = silence.labels.iter().any(|l| {
                l.key == "fingerprint" && l.operator == "=" && l.value == fingerprint
            });
            if pinned {
                return Ok(Some(silence));
            }
        }
        Ok(None)
    }
}

/// Whether a silence's predicate list matches an event.
///
/// Every predicate must hold. The pseudo-key `fingerprint` reads the event
/// fingerprint; other keys read labels and fail closed when absent. Label
/// values that are not text are skipped: they neither satisfy nor fail the
/// predicate. An empty predicate list matches every event.
pub fn matches_event(predicates: &[SilenceLabel], labels: &Labels, fingerprint: &str) -> bool {
    for predicate in predicates {
        let value: String;
        if predicate.key == "fingerprint" {
            if fingerprint.is_empty() {
                return false;
            }
            value = fingerprint.to_string();
        } else {
            match labels.get(&predicate.key) {
                None => return false,
                Some(serde_json::Value::String(s)) => value = s.clone(),
                Some(_) => continue,
            }
        }

        let matched = match predicate.operator.as_str() {
            "==" | "=" => regex_matches(&predicate.value, &value),
            "!=" => !regex_matches(&predicate.value, &value),
            _ => false,
        };
        if !matched {
            return false;
        }
    }
    true
}

fn regex_matches(pattern: &str, value: &str) -> bool {
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "invalid silence label regex");
            false
        }
    }
}
