//! Probing supervisor: worker lifecycle plus the shared debounce counters.
//!
//! One `RwLock` guards the cancellation-handle map and both frequency maps;
//! counter reads take the read lock, every write and delete takes the write
//! lock. Each worker owns a child token of the supervisor root: `stop` fires
//! exactly one rule's token, `stop_all` fires every registered token, and
//! cancellation is observed at the worker's next tick.

use crate::worker;
use anyhow::Result;
use chrono::Utc;
use faultline_alert::cache::ProbingCache;
use faultline_alert::ingress::EventIngress;
use faultline_common::template;
use faultline_common::types::{
    md5_hash, AlertEvent, EvalCondition, Labels, ProbingEvent, ProbingRule, RuleType,
};
use faultline_storage::{ProbingHistoryRepo, ProbingRuleRepo};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Consecutive successful probes required before a recovery is emitted.
pub const RECOVERY_THRESHOLD: i64 = 3;

#[derive(Clone, Copy)]
pub(crate) enum Counter {
    Fail,
    Ok,
}

#[derive(Default)]
struct SupervisorState {
    watch: HashMap<String, CancellationToken>,
    fail_frequency: HashMap<String, i64>,
    ok_frequency: HashMap<String, i64>,
}

pub struct ProbingSupervisor {
    ingress: Arc<EventIngress>,
    probing_cache: Arc<ProbingCache>,
    history: Arc<dyn ProbingHistoryRepo>,
    rules: Arc<dyn ProbingRuleRepo>,
    state: RwLock<SupervisorState>,
    root: CancellationToken,
}

impl ProbingSupervisor {
    pub fn new(
        ingress: Arc<EventIngress>,
        probing_cache: Arc<ProbingCache>,
        history: Arc<dyn ProbingHistoryRepo>,
        rules: Arc<dyn ProbingRuleRepo>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ingress,
            probing_cache,
            history,
            rules,
            state: RwLock::new(SupervisorState::default()),
            root: CancellationToken::new(),
        })
    }

    pub fn ingress(&self) -> &Arc<EventIngress> {
        &self.ingress
    }

    pub fn probing_cache(&self) -> &Arc<ProbingCache> {
        &self.probing_cache
    }

    pub(crate) fn history(&self) -> &Arc<dyn ProbingHistoryRepo> {
        &self.history
    }

    /// Register a cancellation handle for the rule and spawn its worker.
    pub fn add(self: &Arc<Self>, rule: ProbingRule) {
        let token = self.root.child_token();
        {
            let mut state = self.state.write().expect("supervisor lock poisoned");
            if let Some(previous) = state.watch.insert(rule.rule_id.clone(), token.clone()) {
                previous.cancel();
            }
        }
        tokio::spawn(worker::run(self.clone(), rule, token));
    }

    /// Cancel one rule's worker and drop its handle.
    pub fn stop(&self, rule_id: &str) {
        let mut state = self.state.write().expect("supervisor lock poisoned");
        if let Some(token) = state.watch.remove(rule_id) {
            token.cancel();
        }
    }

    /// Cancel every registered worker.
    pub fn stop_all(&self) {
        let mut state = self.state.write().expect("supervisor lock poisoned");
        let count = state.watch.len();
        if count == 0 {
            return;
        }
        tracing::info!(count, "停止所有拨测任务");
        for (_, token) in state.watch.drain() {
            token.cancel();
        }
    }

    /// Spawn a worker for every enabled rule.
    pub async fn reload_all(self: &Arc<Self>) {
        let rules = match self.rules.list_enabled(None).await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::error!(error = %e, "加载拨测规则失败");
                return;
            }
        };

        let mut join_set = JoinSet::new();
        for rule in rules {
            let supervisor = self.clone();
            join_set.spawn(async move {
                supervisor.add(rule);
            });
        }
        let mut spawned = 0usize;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(()) => spawned += 1,
                Err(e) => tracing::error!(error = %e, "拨测任务启动失败"),
            }
        }
        tracing::info!(count = spawned, "拨测任务已加载");
    }

    pub fn active_worker_count(&self) -> usize {
        self.state.read().expect("supervisor lock poisoned").watch.len()
    }

    // ── frequency counters ──

    pub(crate) fn set_frequency(&self, counter: Counter, rule_id: &str) {
        let mut state = self.state.write().expect("supervisor lock poisoned");
        let map = match counter {
            Counter::Fail => &mut state.fail_frequency,
            Counter::Ok => &mut state.ok_frequency,
        };
        *map.entry(rule_id.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn get_frequency(&self, counter: Counter, rule_id: &str) -> i64 {
        let state = self.state.read().expect("supervisor lock poisoned");
        let map = match counter {
            Counter::Fail => &state.fail_frequency,
            Counter::Ok => &state.ok_frequency,
        };
        map.get(rule_id).copied().unwrap_or(0)
    }

    pub(crate) fn clean_frequency(&self, counter: Counter, rule_id: &str) {
        let mut state = self.state.write().expect("supervisor lock poisoned");
        let map = match counter {
            Counter::Fail => &mut state.fail_frequency,
            Counter::Ok => &mut state.ok_frequency,
        };
        map.remove(rule_id);
    }

    // ── measurement processing (shared by every worker tick) ──

    /// Apply a rule's threshold to one measurement snapshot and route the
    /// outcome: debounced alerts into the fault-center ingress, or into the
    /// local probing cache for rules outside a fault center.
    pub async fn process_measurement(&self, rule: &ProbingRule, value: Labels) -> Result<()> {
        let strategy = &rule.probing_endpoint_config.strategy;

        let (condition, query_value) = if rule.rule_type == RuleType::Tcp {
            let is_value = if value.get("IsSuccessful") == Some(&json!(true)) {
                1.0
            } else {
                0.0
            };
            // 0 means the connect failed, so failure triggers the alert
            (
                EvalCondition {
                    operator: "==".to_string(),
                    query_value: is_value,
                    expected_value: 0.0,
                },
                is_value,
            )
        } else {
            let query = value
                .get(&strategy.field)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "strategy field {} missing from probe snapshot of rule {}",
                        strategy.field,
                        rule.rule_id
                    )
                })?;
            (
                EvalCondition {
                    operator: strategy.operator.clone(),
                    query_value: query,
                    expected_value: strategy.expected_value,
                },
                query,
            )
        };

        let mut labels = value.clone();
        labels.insert("value".to_string(), json!(query_value));
        let annotations = template::render(&rule.annotations, &labels);
        let fingerprint = md5_hash(rule.rule_id.as_bytes());

        self.probing_cache
            .set_value(&rule.tenant_id, &rule.rule_id, value)
            .await;

        if !rule.fault_center_id.is_empty() {
            self.evaluate_fault_center(rule, &condition, labels, annotations, fingerprint)
                .await
        } else {
            self.evaluate_local(rule, &condition, labels, annotations, fingerprint)
                .await
        }
    }

    async fn evaluate_fault_center(
        &self,
        rule: &ProbingRule,
        condition: &EvalCondition,
        labels: Labels,
        annotations: String,
        fingerprint: String,
    ) -> Result<()> {
        let now = Utc::now().timestamp();
        let rule_id = rule.rule_id.as_str();
        let mut alert = build_alert_event(rule, labels, annotations, fingerprint.clone(), now);

        if condition.is_triggered() {
            self.set_frequency(Counter::Fail, rule_id);
            if self.get_frequency(Counter::Fail, rule_id)
                >= rule.probing_endpoint_config.strategy.failure
            {
                alert.is_recovered = false;
                let result = self.ingress.push_event_to_fault_center(alert).await;
                self.clean_frequency(Counter::Fail, rule_id);
                self.clean_frequency(Counter::Ok, rule_id);
                result?;
            }
            return Ok(());
        }

        // probe passed: only a previously alerting episode can recover
        let mut cached = self
            .ingress
            .cache()
            .get_event(&rule.tenant_id, &rule.fault_center_id, &fingerprint)
            .await;
        let mut target_fingerprint = fingerprint;
        if cached.is_none() {
            let fingerprints = self
                .ingress
                .cache()
                .fingerprints_by_rule(&rule.tenant_id, &rule.fault_center_id, rule_id)
                .await;
            match fingerprints.first() {
                Some(old_fp) => {
                    cached = self
                        .ingress
                        .cache()
                        .get_event(&rule.tenant_id, &rule.fault_center_id, old_fp)
                        .await;
                    target_fingerprint = old_fp.clone();
                }
                None => {
                    // nothing ever fired (or it was purged); no recovery to push
                    self.clean_frequency(Counter::Fail, rule_id);
                    self.clean_frequency(Counter::Ok, rule_id);
                    return Ok(());
                }
            }
        }
        let Some(cached) = cached else {
            self.clean_frequency(Counter::Fail, rule_id);
            self.clean_frequency(Counter::Ok, rule_id);
            return Ok(());
        };
        if cached.is_recovered {
            self.clean_frequency(Counter::Fail, rule_id);
            return Ok(());
        }

        self.set_frequency(Counter::Ok, rule_id);
        if self.get_frequency(Counter::Ok, rule_id) >= RECOVERY_THRESHOLD {
            alert.fingerprint = target_fingerprint;
            alert.is_recovered = true;
            alert.recover_time = now;
            alert.last_send_time = 0;
            tracing::info!(
                rule_id,
                fingerprint = %alert.fingerprint,
                rule_name = %rule.rule_name,
                "拨测恢复，推送恢复事件"
            );
            let result = self.ingress.push_event_to_fault_center(alert).await;
            self.clean_frequency(Counter::Fail, rule_id);
            self.clean_frequency(Counter::Ok, rule_id);
            result?;
        }
        Ok(())
    }

    async fn evaluate_local(
        &self,
        rule: &ProbingRule,
        condition: &EvalCondition,
        labels: Labels,
        annotations: String,
        fingerprint: String,
    ) -> Result<()> {
        let now = Utc::now().timestamp();
        let rule_id = rule.rule_id.as_str();
        let cached = self
            .probing_cache
            .get_event(&rule.tenant_id, rule_id)
            .await;

        if condition.is_triggered() {
            self.set_frequency(Counter::Fail, rule_id);
            if self.get_frequency(Counter::Fail, rule_id)
                >= rule.probing_endpoint_config.strategy.failure
            {
                let event = ProbingEvent {
                    tenant_id: rule.tenant_id.clone(),
                    rule_id: rule.rule_id.clone(),
                    rule_name: rule.rule_name.clone(),
                    fingerprint,
                    severity: rule.severity.clone(),
                    labels,
                    annotations,
                    is_recovered: false,
                    first_trigger_time: cached
                        .as_ref()
                        .map(|c| c.first_trigger_time)
                        .filter(|t| *t > 0)
                        .unwrap_or(now),
                    last_eval_time: now,
                    last_send_time: cached.as_ref().map(|c| c.last_send_time).unwrap_or(0),
                    recover_time: 0,
                    repeat_notice_interval: rule.repeat_notice_interval,
                    duty_user: String::new(),
                };
                self.probing_cache.set_event(event).await;
                self.clean_frequency(Counter::Fail, rule_id);
                self.clean_frequency(Counter::Ok, rule_id);
            }
            return Ok(());
        }

        let Some(mut cached) = cached else {
            return Ok(());
        };
        if cached.is_recovered {
            return Ok(());
        }

        self.set_frequency(Counter::Ok, rule_id);
        if self.get_frequency(Counter::Ok, rule_id) >= RECOVERY_THRESHOLD {
            cached.labels = labels;
            cached.annotations = annotations;
            cached.is_recovered = true;
            cached.recover_time = now;
            cached.last_send_time = 0;
            cached.last_eval_time = now;
            self.probing_cache.set_event(cached).await;
            self.clean_frequency(Counter::Fail, rule_id);
            self.clean_frequency(Counter::Ok, rule_id);
        }
        Ok(())
    }
}

/// Shape a probing measurement as a fault-center alert event.
pub fn build_alert_event(
    rule: &ProbingRule,
    labels: Labels,
    annotations: String,
    fingerprint: String,
    now: i64,
) -> AlertEvent {
    AlertEvent {
        tenant_id: rule.tenant_id.clone(),
        rule_id: rule.rule_id.clone(),
        rule_name: rule.rule_name.clone(),
        datasource_type: rule.rule_type.to_string(),
        datasource_id: "probing".to_string(),
        fingerprint,
        severity: rule.severity.clone(),
        labels,
        annotations,
        fault_center_id: rule.fault_center_id.clone(),
        eval_interval: rule.probing_endpoint_config.strategy.eval_interval,
        for_duration: 0,
        repeat_notice_interval: rule.repeat_notice_interval,
        recover_notify: rule.recover_notify,
        last_eval_time: now,
        ..Default::default()
    }
}
