//! Event ingress: the single hot path merging evaluation results into the
//! fingerprint cache.
//!
//! The whole merge-and-write sequence runs under one process-wide mutex, so
//! within a tenant all transitions are totally ordered. Transitions are
//! cheap next to upstream probing latency; the coarse lock is deliberate.

use crate::cache::AlertCache;
use crate::mute::{self, MuteParams};
use crate::silence::SilenceStore;
use crate::status;
use crate::AlertError;
use chrono::Utc;
use faultline_common::types::{AlertEvent, AlertStatus, SilenceInfo};
use faultline_storage::FaultCenterRepo;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct EventIngress {
    cache: Arc<AlertCache>,
    silences: Arc<SilenceStore>,
    fault_centers: Arc<dyn FaultCenterRepo>,
    mux: Mutex<()>,
}

impl EventIngress {
    pub fn new(
        cache: Arc<AlertCache>,
        silences: Arc<SilenceStore>,
        fault_centers: Arc<dyn FaultCenterRepo>,
    ) -> Self {
        Self {
            cache,
            silences,
            fault_centers,
            mux: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<AlertCache> {
        &self.cache
    }

    /// Merge an incoming evaluation into the cache and advance its state.
    pub async fn push_event_to_fault_center(
        &self,
        mut event: AlertEvent,
    ) -> Result<(), AlertError> {
        let _guard = self.mux.lock().await;

        if event.tenant_id.is_empty() {
            return Err(AlertError::EmptyTenant {
                rule_id: event.rule_id.clone(),
            });
        }
        if event.fingerprint.is_empty() {
            return Err(AlertError::EmptyFingerprint {
                tenant_id: event.tenant_id.clone(),
                rule_id: event.rule_id.clone(),
            });
        }

        let now_dt = Utc::now();
        let now = now_dt.timestamp();

        let mut cached = self
            .cache
            .get_event(&event.tenant_id, &event.fault_center_id, &event.fingerprint)
            .await;

        // Recovery events must land on the cache slot of the episode they
        // close. When the fingerprint scheme changed under a live alert the
        // point lookup misses; bridge through the rule's prior fingerprints.
        if event.is_recovered && cached.is_none() {
            tracing::warn!(
                rule_id = %event.rule_id,
                fingerprint = %event.fingerprint,
                rule_name = %event.rule_name,
                "恢复事件找不到缓存事件，尝试通过 ruleId 查找旧指纹"
            );
            let fingerprints = self
                .cache
                .fingerprints_by_rule(&event.tenant_id, &event.fault_center_id, &event.rule_id)
                .await;
            if let Some(old_fp) = fingerprints.first() {
                cached = self
                    .cache
                    .get_event(&event.tenant_id, &event.fault_center_id, old_fp)
                    .await;
                tracing::info!(
                    rule_id = %event.rule_id,
                    old_fingerprint = %old_fp,
                    "恢复事件通过 ruleId 命中旧指纹"
                );
                event.fingerprint = old_fp.clone();
            }
        }

        // Carry forward the episode identity from the cached record.
        match &cached {
            Some(prev) => {
                event.first_trigger_time =
                    if prev.first_trigger_time == 0
                        || (prev.status == AlertStatus::Recovered && !event.is_recovered)
                    {
                        now
                    } else {
                        prev.first_trigger_time
                    };
                if event.last_eval_time == 0 {
                    event.last_eval_time = prev.last_eval_time;
                }
                event.last_send_time = prev.last_send_time;
                event.confirm_state = prev.confirm_state.clone();
                event.event_id = prev.event_id.clone();
            }
            None => {
                event.first_trigger_time = now;
                if event.last_eval_time == 0 {
                    event.last_eval_time = now;
                }
                event.event_id = faultline_common::id::next_id();
            }
        }

        event.fault_center = self
            .fault_centers
            .get(&event.tenant_id, &event.fault_center_id)
            .await
            .ok()
            .flatten();

        // The recovery consumer only delivers when last_send_time is zero.
        if event.is_recovered {
            event.last_send_time = 0;
        }

        event.status = cached
            .as_ref()
            .map(|prev| prev.status)
            .unwrap_or(AlertStatus::PreAlert);

        let params = MuteParams {
            tenant_id: &event.tenant_id,
            fault_center_id: &event.fault_center_id,
            fingerprint: &event.fingerprint,
            labels: &event.labels,
            effective_time: &event.effective_time,
            is_recovered: event.is_recovered,
            recover_notify: event.recover_notify,
        };
        let matched_silence = mute::get_matched_silence(&self.silences, &params, now).await;
        let is_silenced = matched_silence.is_some();

        event.silence_info = matched_silence.map(|silence| SilenceInfo {
            silence_id: silence.id.clone(),
            starts_at: silence.starts_at,
            ends_at: silence.ends_at,
            remaining_time: silence.ends_at - now,
            comment: silence.comment,
        });

        let in_effective_time = !mute::not_in_effective_time(&event.effective_time, now_dt);

        let result = match event.status {
            AlertStatus::PreAlert => {
                if is_silenced {
                    status::transition(&mut event, AlertStatus::Silenced, now)
                } else if event.is_recovered {
                    // A probing flap that clears before reaching its hold
                    // time closes with a fast PreAlert -> Recovered edge.
                    status::transition(&mut event, AlertStatus::Recovered, now)
                } else if event.is_arrive_for_duration(now) && in_effective_time {
                    status::transition(&mut event, AlertStatus::Alerting, now)
                } else {
                    Ok(())
                }
            }
            AlertStatus::Alerting => {
                if event.is_recovered {
                    status::transition(&mut event, AlertStatus::Recovered, now)
                } else if is_silenced {
                    status::transition(&mut event, AlertStatus::Silenced, now)
                } else {
                    Ok(())
                }
            }
            AlertStatus::PendingRecovery => {
                if event.is_recovered {
                    status::transition(&mut event, AlertStatus::Recovered, now)
                } else {
                    // the condition re-triggered before recovery confirmed
                    status::transition(&mut event, AlertStatus::Alerting, now)
                }
            }
            AlertStatus::Silenced => {
                if event.is_recovered {
                    status::transition(&mut event, AlertStatus::Recovered, now)
                } else if !is_silenced {
                    status::transition(&mut event, AlertStatus::PreAlert, now)
                } else {
                    Ok(())
                }
            }
            AlertStatus::Recovered => {
                if !event.is_recovered {
                    status::transition(&mut event, AlertStatus::PreAlert, now)
                } else {
                    Ok(())
                }
            }
        };

        if let Err(e) = result {
            tracing::error!(
                rule_id = %event.rule_id,
                fingerprint = %event.fingerprint,
                error = %e,
                "状态转换失败"
            );
        }

        self.cache.push_event(event).await
    }
}
