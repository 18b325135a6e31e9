//! Webhook resolution: from an alert to a concrete chat webhook.

use crate::NotifyError;
use faultline_common::types::{AlertEvent, Notice};
use faultline_storage::{FaultCenterRepo, NoticeRepo, ProbingRuleRepo};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Feishu,
    Dingtalk,
}

#[derive(Debug, Clone)]
pub struct ResolvedWebhook {
    pub hook: String,
    pub sign: String,
    pub kind: ChannelKind,
}

pub struct WebhookResolver {
    fault_centers: Arc<dyn FaultCenterRepo>,
    notices: Arc<dyn NoticeRepo>,
    probing_rules: Arc<dyn ProbingRuleRepo>,
}

impl WebhookResolver {
    pub fn new(
        fault_centers: Arc<dyn FaultCenterRepo>,
        notices: Arc<dyn NoticeRepo>,
        probing_rules: Arc<dyn ProbingRuleRepo>,
    ) -> Self {
        Self {
            fault_centers,
            notices,
            probing_rules,
        }
    }

    /// Locate the alert's webhook.
    ///
    /// Fault-center alerts walk the center's notice list and take the first
    /// FeiShu/DingTalk notice with a usable hook; probing alerts outside a
    /// fault center read their rule's fallback notice id.
    pub async fn resolve(&self, alert: &AlertEvent) -> Result<ResolvedWebhook, NotifyError> {
        if alert.fault_center_id.is_empty() {
            return self.resolve_from_probing_rule(alert).await;
        }

        let fault_center = self
            .fault_centers
            .get(&alert.tenant_id, &alert.fault_center_id)
            .await
            .map_err(|e| NotifyError::Resolve(e.to_string()))?
            .ok_or_else(|| NotifyError::Resolve("故障中心不存在".to_string()))?;

        for notice_id in &fault_center.notice_ids {
            let Ok(Some(notice)) = self.notices.get(&alert.tenant_id, notice_id).await else {
                continue;
            };
            let kind = match notice.notice_type.as_str() {
                "FeiShu" => ChannelKind::Feishu,
                "DingDing" => ChannelKind::Dingtalk,
                _ => continue,
            };
            if let Some((hook, sign)) = extract_webhook(&notice, &alert.severity) {
                return Ok(ResolvedWebhook { hook, sign, kind });
            }
        }

        Err(NotifyError::NoChannel)
    }

    async fn resolve_from_probing_rule(
        &self,
        alert: &AlertEvent,
    ) -> Result<ResolvedWebhook, NotifyError> {
        let rule = self
            .probing_rules
            .get(&alert.tenant_id, &alert.rule_id)
            .await
            .map_err(|e| NotifyError::Resolve(e.to_string()))?
            .ok_or_else(|| NotifyError::Resolve("拨测规则不存在".to_string()))?;

        let notice = self
            .notices
            .get(&alert.tenant_id, &rule.notice_id)
            .await
            .map_err(|e| NotifyError::Resolve(e.to_string()))?
            .ok_or_else(|| NotifyError::Resolve("通知对象不存在".to_string()))?;

        let kind = match notice.notice_type.as_str() {
            "FeiShu" => ChannelKind::Feishu,
            "DingDing" => ChannelKind::Dingtalk,
            other => return Err(NotifyError::UnsupportedType(other.to_string())),
        };
        let (hook, sign) =
            extract_webhook(&notice, &alert.severity).ok_or(NotifyError::NoChannel)?;
        Ok(ResolvedWebhook { hook, sign, kind })
    }
}

/// Pick the hook of a notice: the default hook wins, then the route whose
/// severity matches the alert's, then the first route.
pub fn extract_webhook(notice: &Notice, severity: &str) -> Option<(String, String)> {
    if !notice.default_hook.is_empty() {
        return Some((notice.default_hook.clone(), notice.default_sign.clone()));
    }
    if let Some(route) = notice.routes.iter().find(|r| r.severity == severity) {
        return Some((route.hook.clone(), route.sign.clone()));
    }
    notice
        .routes
        .first()
        .map(|route| (route.hook.clone(), route.sign.clone()))
}
