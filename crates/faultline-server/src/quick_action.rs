//! Quick-action service: claim / silence / resolve an alert from a signed
//! chat-card link.
//!
//! Every mutation goes through the same state-machine rules as the ingress;
//! the audit write and the chat confirmation are spawned into background
//! tasks whose failures are logged and never reach the caller.

use chrono::Utc;
use faultline_alert::cache::{AlertCache, ProbingCache};
use faultline_alert::silence::SilenceStore;
use faultline_alert::status;
use faultline_common::duration::{format_seconds_chinese, parse_go_duration};
use faultline_common::types::{
    AlertEvent, AlertStatus, AuditLog, ConfirmState, ProbingEvent, Silence, SilenceInfo,
    SILENCE_STATUS_ENABLED,
};
use faultline_notify::confirmation::ConfirmationNotifier;
use faultline_notify::QuickActionKind;
use faultline_storage::{AuditLogRepo, FaultCenterRepo, ProbingRuleRepo};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum QuickActionError {
    #[error("告警已被 {0} 认领")]
    AlreadyClaimed(String),
    #[error("告警已经恢复")]
    AlreadyRecovered,
    #[error("该告警已处于静默状态,剩余时长: {0}")]
    AlreadySilenced(String),
    #[error("无效的静默时长: {0}")]
    InvalidDuration(String),
    #[error("未找到指纹为 {0} 的告警 或者告警失效了")]
    NotFound(String),
    #[error("该告警未接入故障中心，暂不支持认领功能")]
    NotInFaultCenter,
    #[error("{0}")]
    Internal(String),
}

impl From<anyhow::Error> for QuickActionError {
    fn from(e: anyhow::Error) -> Self {
        QuickActionError::Internal(e.to_string())
    }
}

pub struct QuickActionService {
    cache: Arc<AlertCache>,
    probing_cache: Arc<ProbingCache>,
    silences: Arc<SilenceStore>,
    fault_centers: Arc<dyn FaultCenterRepo>,
    probing_rules: Arc<dyn ProbingRuleRepo>,
    audit: Arc<dyn AuditLogRepo>,
    notifier: Arc<ConfirmationNotifier>,
}

impl QuickActionService {
    pub fn new(
        cache: Arc<AlertCache>,
        probing_cache: Arc<ProbingCache>,
        silences: Arc<SilenceStore>,
        fault_centers: Arc<dyn FaultCenterRepo>,
        probing_rules: Arc<dyn ProbingRuleRepo>,
        audit: Arc<dyn AuditLogRepo>,
        notifier: Arc<ConfirmationNotifier>,
    ) -> Self {
        Self {
            cache,
            probing_cache,
            silences,
            fault_centers,
            probing_rules,
            audit,
            notifier,
        }
    }

    /// Search every fault-center bucket of the tenant, then fall back to the
    /// cached events of enabled probing rules.
    pub async fn get_alert_by_fingerprint(
        &self,
        tenant_id: &str,
        fingerprint: &str,
    ) -> Result<AlertEvent, QuickActionError> {
        let fault_centers = self
            .fault_centers
            .list(tenant_id)
            .await
            .map_err(|e| QuickActionError::Internal(format!("获取故障中心列表失败: {e}")))?;
        for fc in fault_centers {
            let events = self.cache.list_events(tenant_id, &fc.id).await;
            if let Some(event) = events.into_iter().find(|e| e.fingerprint == fingerprint) {
                return Ok(event);
            }
        }

        let rules = self
            .probing_rules
            .list_enabled(Some(tenant_id))
            .await
            .map_err(|e| QuickActionError::Internal(e.to_string()))?;
        for rule in rules {
            let Some(event) = self.probing_cache.get_event(tenant_id, &rule.rule_id).await else {
                continue;
            };
            if event.fingerprint == fingerprint {
                return Ok(probing_event_to_alert(&event));
            }
        }

        Err(QuickActionError::NotFound(fingerprint.to_string()))
    }

    /// 认领告警
    pub async fn claim_alert(
        &self,
        tenant_id: &str,
        fingerprint: &str,
        username: &str,
        client_ip: &str,
    ) -> Result<(), QuickActionError> {
        let mut alert = self.get_alert_by_fingerprint(tenant_id, fingerprint).await?;

        if alert.confirm_state.is_ok {
            return Err(QuickActionError::AlreadyClaimed(
                alert.confirm_state.confirm_username,
            ));
        }
        if alert.fault_center_id.is_empty() {
            // probing alerts outside a fault center have nowhere to keep
            // the claim state
            return Err(QuickActionError::NotInFaultCenter);
        }

        let now = Utc::now().timestamp();
        alert.confirm_state = ConfirmState {
            is_ok: true,
            confirm_username: username.to_string(),
            confirm_action_time: now,
        };
        self.cache
            .push_event(alert.clone())
            .await
            .map_err(|e| QuickActionError::Internal(e.to_string()))?;

        self.write_audit(
            tenant_id,
            username,
            client_ip,
            "快捷操作-认领告警",
            serde_json::json!({
                "fingerprint": fingerprint,
                "ruleName": alert.rule_name,
                "operator": username,
                "timestamp": now,
            }),
        );
        self.send_confirmation(alert, QuickActionKind::Claim, username, None);
        Ok(())
    }

    /// 静默告警；`reason` 为空时使用默认注释
    pub async fn silence_alert(
        &self,
        tenant_id: &str,
        fingerprint: &str,
        duration: &str,
        username: &str,
        reason: Option<&str>,
        client_ip: &str,
    ) -> Result<(), QuickActionError> {
        let mut alert = self.get_alert_by_fingerprint(tenant_id, fingerprint).await?;
        let now = Utc::now().timestamp();

        if let Ok(Some(existing)) = self
            .silences
            .find_active_by_fingerprint(tenant_id, fingerprint)
            .await
        {
            let remaining = existing.ends_at - now;
            if remaining > 0 {
                return Err(QuickActionError::AlreadySilenced(format_seconds_chinese(
                    remaining,
                )));
            }
        }

        let seconds = parse_go_duration(duration)
            .map_err(|_| QuickActionError::InvalidDuration(duration.to_string()))?;

        let mut comment = format!("[快捷操作] 由 {username} 静默 {duration}");
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            comment.push_str(&format!("\n原因: {reason}"));
        }

        let silence = Silence {
            tenant_id: tenant_id.to_string(),
            id: faultline_common::id::silence_id(),
            name: format!("快捷静默-{}", alert.rule_name),
            labels: vec![faultline_common::types::SilenceLabel {
                key: "fingerprint".to_string(),
                operator: "=".to_string(),
                value: fingerprint.to_string(),
            }],
            comment: comment.clone(),
            starts_at: now,
            ends_at: now + seconds,
            update_at: now,
            update_by: username.to_string(),
            fault_center_id: alert.fault_center_id.clone(),
            status: SILENCE_STATUS_ENABLED,
        };

        // cache first so the silence takes effect before the user sees the
        // success page, then the durable store
        self.silences
            .push(silence.clone())
            .await
            .map_err(|e| QuickActionError::Internal(format!("创建静默规则失败: {e}")))?;

        let mut audit_data = serde_json::json!({
            "fingerprint": fingerprint,
            "ruleName": alert.rule_name,
            "duration": duration,
            "operator": username,
            "silenceId": silence.id,
            "timestamp": now,
        });
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            audit_data["reason"] = serde_json::json!(reason);
        }
        self.write_audit(tenant_id, username, client_ip, "快捷操作-静默告警", audit_data);

        if !alert.fault_center_id.is_empty() {
            alert.silence_info = Some(SilenceInfo {
                silence_id: silence.id.clone(),
                starts_at: silence.starts_at,
                ends_at: silence.ends_at,
                remaining_time: silence.ends_at - now,
                comment,
            });
            if let Err(e) = status::transition(&mut alert, AlertStatus::Silenced, now) {
                tracing::warn!(fingerprint, error = %e, "静默后状态转换失败");
            }
            self.cache
                .push_event(alert.clone())
                .await
                .map_err(|e| QuickActionError::Internal(e.to_string()))?;
        }
        // probing alerts outside a fault center are silenced by their own
        // worker picking up the rule

        self.send_confirmation(alert, QuickActionKind::Silence, username, Some(duration.to_string()));
        Ok(())
    }

    /// 标记告警已处理
    pub async fn resolve_alert(
        &self,
        tenant_id: &str,
        fingerprint: &str,
        username: &str,
        client_ip: &str,
    ) -> Result<(), QuickActionError> {
        let mut alert = self.get_alert_by_fingerprint(tenant_id, fingerprint).await?;

        if alert.is_recovered {
            return Err(QuickActionError::AlreadyRecovered);
        }

        let now = Utc::now().timestamp();
        alert.is_recovered = true;
        alert.recover_time = now;
        alert.last_send_time = 0;

        if !alert.fault_center_id.is_empty() {
            if let Err(e) = status::transition(&mut alert, AlertStatus::Recovered, now) {
                tracing::warn!(fingerprint, error = %e, "标记已处理后状态转换失败");
            }
            self.cache
                .push_event(alert.clone())
                .await
                .map_err(|e| QuickActionError::Internal(e.to_string()))?;
        } else {
            self.update_probing_recovery(tenant_id, &alert.rule_id, fingerprint)
                .await
                .map_err(|e| {
                    QuickActionError::Internal(format!("更新拨测告警恢复状态失败: {e}"))
                })?;
        }

        self.write_audit(
            tenant_id,
            username,
            client_ip,
            "快捷操作-标记已处理",
            serde_json::json!({
                "fingerprint": fingerprint,
                "ruleName": alert.rule_name,
                "operator": username,
                "timestamp": now,
            }),
        );
        self.send_confirmation(alert, QuickActionKind::Resolve, username, None);
        Ok(())
    }

    /// Rewrite the probing cache entry of a rule-local alert as recovered.
    async fn update_probing_recovery(
        &self,
        tenant_id: &str,
        rule_id: &str,
        fingerprint: &str,
    ) -> anyhow::Result<()> {
        let mut event = self
            .probing_cache
            .get_event(tenant_id, rule_id)
            .await
            .ok_or_else(|| anyhow::anyhow!("拨测事件不存在"))?;
        if event.fingerprint != fingerprint {
            anyhow::bail!("指纹不匹配");
        }
        event.is_recovered = true;
        event.recover_time = Utc::now().timestamp();
        event.last_send_time = 0;
        self.probing_cache.set_event(event).await;
        Ok(())
    }

    fn write_audit(
        &self,
        tenant_id: &str,
        username: &str,
        client_ip: &str,
        audit_type: &str,
        data: serde_json::Value,
    ) {
        let log = AuditLog {
            id: faultline_common::id::trace_id(),
            tenant_id: tenant_id.to_string(),
            username: username.to_string(),
            ip_address: client_ip.to_string(),
            audit_type: audit_type.to_string(),
            method: "QUICK_ACTION".to_string(),
            path: "/api/v1/alert/quick-action".to_string(),
            created_at: Utc::now().timestamp(),
            status_code: 200,
            body: data.to_string(),
        };
        let audit = self.audit.clone();
        tokio::spawn(async move {
            if let Err(e) = audit.create(log).await {
                tracing::error!(error = %e, "审计日志写入失败");
            }
        });
    }

    fn send_confirmation(
        &self,
        alert: AlertEvent,
        action: QuickActionKind,
        username: &str,
        duration: Option<String>,
    ) {
        let notifier = self.notifier.clone();
        let username = username.to_string();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .send_confirmation(&alert, action, &username, duration.as_deref())
                .await
            {
                tracing::error!(
                    fingerprint = %alert.fingerprint,
                    action = action.as_str(),
                    error = %e,
                    "发送确认消息失败"
                );
            }
        });
    }
}

/// Shape a rule-local probing event as a standard alert event so the quick
/// actions can treat both kinds uniformly. No fault center, no claim state.
fn probing_event_to_alert(event: &ProbingEvent) -> AlertEvent {
    AlertEvent {
        tenant_id: event.tenant_id.clone(),
        rule_id: event.rule_id.clone(),
        rule_name: event.rule_name.clone(),
        fingerprint: event.fingerprint.clone(),
        severity: event.severity.clone(),
        labels: event.labels.clone(),
        annotations: event.annotations.clone(),
        is_recovered: event.is_recovered,
        first_trigger_time: event.first_trigger_time,
        last_eval_time: event.last_eval_time,
        last_send_time: event.last_send_time,
        recover_time: event.recover_time,
        repeat_notice_interval: event.repeat_notice_interval,
        duty_user: event.duty_user.clone(),
        ..Default::default()
    }
}
