//! FeiShu (Lark) webhook channel: interactive cards and the signed sender.

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

pub struct FeiShuSender {
    client: reqwest::Client,
}

impl FeiShuSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// FeiShu custom-bot signature: HMAC-SHA256 keyed by
    /// `"{timestamp}\n{secret}"` over an empty message, base64-encoded.
    fn gen_sign(secret: &str, timestamp: i64) -> String {
        let key = format!("{timestamp}\n{secret}");
        let mut mac =
            HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
        mac.update(b"");
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

impl Default for FeiShuSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookSender for FeiShuSender {
    async fn send(&self, hook: &str, sign: &str, content: Value) -> Result<(), NotifyError> {
        let mut payload = content;
        if !sign.is_empty() {
            let timestamp = Utc::now().timestamp();
            if let Some(map) = payload.as_object_mut() {
                map.insert("timestamp".to_string(), json!(timestamp.to_string()));
                map.insert("sign".to_string(), json!(Self::gen_sign(sign, timestamp)));
            }
        }

        let response = self.client.post(hook).json(&payload).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if status != 200 {
            return Err(NotifyError::Api { status, body });
        }
        // FeiShu reports errors inside a 200 body
        let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let code = parsed.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            return Err(NotifyError::Api { status, body });
        }
        Ok(())
    }
}

/// Confirmation card sent after a quick action completes. Carries no
/// buttons so the channel cannot repeat the operation.
pub fn build_confirmation_card(
    alert: &AlertEvent,
    action: QuickActionKind,
    username: &str,
    action_desc: &str,
) -> Value {
    let operated_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    json!({
        "msg_type": "interactive",
        "card": {
            "header": {
                "template": action.header_color(),
                "title": {
                    "tag": "plain_text",
                    "content": format!("{} 告警快捷操作通知", action.icon()),
                }
            },
            "elements": [
                {
                    "tag": "div",
                    "fields": [
                        {
                            "is_short": true,
                            "text": {
                                "tag": "lark_md",
                                "content": format!("**告警名称**\n{}", alert.rule_name),
                            }
                        },
                        {
                            "is_short": true,
                            "text": {
                                "tag": "lark_md",
                                "content": format!("**操作类型**\n{action_desc}"),
                            }
                        }
                    ]
                },
                {
                    "tag": "div",
                    "fields": [
                        {
                            "is_short": true,
                            "text": {
                                "tag": "lark_md",
                                "content": format!("**操作人**\n{username}"),
                            }
                        },
                        {
                            "is_short": true,
                            "text": {
                                "tag": "lark_md",
                                "content": format!("**操作时间**\n{operated_at}"),
                            }
                        }
                    ]
                },
                { "tag": "hr" },
                {
                    "tag": "div",
                    "text": {
                        "tag": "lark_md",
                        "content": format!("💡 **提示**: {}", action.note_text()),
                    }
                },
                {
                    "tag": "note",
                    "elements": [
                        {
                            "tag": "plain_text",
                            "content": "此消息由 faultline 告警系统自动发送 | 原告警按钮已失效",
                        }
                    ]
                }
            ]
        }
    })
}

/// Quick-action button row for an alert card.
///
/// Returns `None` when the feature is off, required config is missing, or
/// token generation fails; the card simply renders without buttons.
/// Already-recovered alerts get every button disabled; an already-claimed
/// alert only disables the claim button.
pub fn build_action_buttons(
    alert: &AlertEvent,
    config: &QuickActionConfig,
    now: i64,
) -> Option<Value> {
    if !config.buttons_available() {
        return None;
    }
    let token =
        match generate_quick_token(&alert.tenant_id, &alert.fingerprint, &config.secret_key, now) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(fingerprint = %alert.fingerprint, error = %e, "快捷操作Token生成失败");
                return None;
            }
        };

    let api_url = config.api_or_base_url();
    let fp = &alert.fingerprint;
    let all_disabled = alert.is_recovered;
    let claim_disabled = all_disabled || alert.confirm_state.is_ok;

    let button = |style: &str, text: &str, url: String, disabled: bool| {
        json!({
            "tag": "button",
            "type": style,
            "disabled": disabled,
            "text": { "tag": "plain_text", "content": text },
            "url": url,
        })
    };

    let action_url = |action: &str, duration: Option<&str>| match duration {
        Some(d) => format!(
            "{api_url}/api/v1/alert/quick-action?action={action}&fingerprint={fp}&token={token}&duration={d}"
        ),
        None => format!(
            "{api_url}/api/v1/alert/quick-action?action={action}&fingerprint={fp}&token={token}"
        ),
    };

    let buttons = vec![
        button("primary", "🔔 认领告警", action_url("claim", None), claim_disabled),
        button("default", "🕐 静默1小时", action_url("silence", Some("1h")), all_disabled),
        button("default", "🕕 静默6小时", action_url("silence", Some("6h")), all_disabled),
        button("default", "🕙 静默24小时", action_url("silence", Some("24h")), all_disabled),
        button(
            "default",
            "⚙️ 自定义静默",
            format!("{api_url}/api/v1/alert/quick-silence?fingerprint={fp}&token={token}"),
            all_disabled,
        ),
        button("default", "📊 查看详情", detail_url(alert, &config.base_url), false),
    ];

    Some(json!({ "tag": "action", "actions": buttons }))
}

/// Fault-center alerts deep-link into the center's detail page; probing
/// alerts land on the probing rule list.
fn detail_url(alert: &AlertEvent, base_url: &str) -> String {
    if alert.fault_center_id.is_empty() {
        format!("{base_url}/probing")
    } else {
        format!("{base_url}/faultCenter/detail/{}", alert.fault_center_id)
    }
}
