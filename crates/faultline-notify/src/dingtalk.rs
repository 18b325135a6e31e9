//! DingTalk webhook channel: markdown/ActionCard payloads and the signed
//! sender.

use crate::{NotifyError, QuickActionKind, WebhookSender};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use faultline_common::token::generate_quick_token;
use faultline_common::types::{AlertEvent, QuickActionConfig};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub struct DingTalkSender {
    client: reqwest::Client,
}

impl DingTalkSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// DingTalk security signature: append `&timestamp=...&sign=...` where
    /// the sign is HMAC-SHA256 of `"{timestamp}\n{secret}"`.
    pub fn sign_url(&self, base_url: &str, secret: &str) -> String {
        if secret.is_empty() {
            return base_url.to_string();
        }
        let timestamp = Utc::now().timestamp_millis();
        let string_to_sign = format!("{timestamp}\n{secret}");
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        let sign = STANDARD.encode(mac.finalize().into_bytes());
        let sign_encoded = urlencoding::encode(&sign);
        format!("{base_url}&timestamp={timestamp}&sign={sign_encoded}")
    }
}

impl Default for DingTalkSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookSender for DingTalkSender {
    async fn send(&self, hook: &str, sign: &str, content: Value) -> Result<(), NotifyError> {
        let url = self.sign_url(hook, sign);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&content)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if status != 200 {
            return Err(NotifyError::Api { status, body });
        }
        // DingTalk reports errors inside a 200 body
        let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let errcode = parsed.get("errcode").and_then(Value::as_i64).unwrap_or(0);
        if errcode != 0 {
            return Err(NotifyError::Api { status, body });
        }
        Ok(())
    }
}

/// Markdown confirmation message sent after a quick action completes.
pub fn build_confirmation_message(
    alert: &AlertEvent,
    action: QuickActionKind,
    username: &str,
    action_desc: &str,
) -> Value {
    let operated_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let title = format!("{} 告警快捷操作通知", action.icon());
    let text = format!(
        "#### {} 告警快捷操作通知\n\n\
         **📋 告警名称**: {}\n\n\
         **🎯 操作类型**: {}\n\n\
         **👤 操作人**: {}\n\n\
         **⏰ 操作时间**: {}\n\n\
         ---\n\n\
         💡 此消息由 faultline 告警系统自动发送，原告警按钮已失效",
        action.icon(),
        alert.rule_name,
        action_desc,
        username,
        operated_at,
    );
    json!({
        "msgtype": "markdown",
        "markdown": { "title": title, "text": text }
    })
}

/// ActionCard alert message with quick-action buttons.
///
/// Falls back to a plain markdown message when the quick-action feature is
/// unavailable or the token cannot be generated. Buttons for an
/// already-recovered alert (or the claim button of a claimed alert) are left
/// out and the body carries the corresponding note instead; DingTalk has no
/// disabled-button rendering.
pub fn build_alert_action_card(
    alert: &AlertEvent,
    config: &QuickActionConfig,
    markdown_body: &str,
    now: i64,
) -> Value {
    let token = if config.buttons_available() {
        generate_quick_token(&alert.tenant_id, &alert.fingerprint, &config.secret_key, now).ok()
    } else {
        None
    };
    let Some(token) = token else {
        return json!({
            "msgtype": "markdown",
            "markdown": { "title": alert.rule_name, "text": markdown_body }
        });
    };

    let api_url = config.api_or_base_url();
    let fp = &alert.fingerprint;
    let mut btns = Vec::new();
    let mut body = markdown_body.to_string();

    if alert.is_recovered {
        body.push_str("\n\n> ✅ 告警已恢复，快捷操作按钮已失效");
    } else {
        if alert.confirm_state.is_ok {
            body.push_str(&format!(
                "\n\n> 🔔 告警已被 {} 认领",
                alert.confirm_state.confirm_username
            ));
        } else {
            btns.push(json!({
                "title": "🔔 认领告警",
                "actionURL": format!(
                    "{api_url}/api/v1/alert/quick-action?action=claim&fingerprint={fp}&token={token}"
                ),
            }));
        }
        for (label, duration) in [
            ("🕐 静默1小时", "1h"),
            ("🕕 静默6小时", "6h"),
            ("🕙 静默24小时", "24h"),
        ] {
            btns.push(json!({
                "title": label,
                "actionURL": format!(
                    "{api_url}/api/v1/alert/quick-action?action=silence&fingerprint={fp}&token={token}&duration={duration}"
                ),
            }));
        }
        btns.push(json!({
            "title": "⚙️ 自定义静默",
            "actionURL": format!(
                "{api_url}/api/v1/alert/quick-silence?fingerprint={fp}&token={token}"
            ),
        }));
    }

    if btns.is_empty() {
        return json!({
            "msgtype": "markdown",
            "markdown": { "title": alert.rule_name, "text": body }
        });
    }

    json!({
        "msgtype": "actionCard",
        "actionCard": {
            "title": alert.rule_name,
            "text": body,
            "btnOrientation": "0",
            "btns": btns,
        }
    })
}
