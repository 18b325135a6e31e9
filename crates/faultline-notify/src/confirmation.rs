//! Confirmation fan-out: after a quick action completes, tell the channel.

use crate::resolver::{ChannelKind, WebhookResolver};
use crate::{dingtalk, feishu, NotifyError, QuickActionKind, WebhookSender};
use faultline_common::duration::format_duration_chinese;
use faultline_common::types::AlertEvent;

pub struct ConfirmationNotifier {
    resolver: WebhookResolver,
    feishu: feishu::FeiShuSender,
    dingtalk: dingtalk::DingTalkSender,
}

impl ConfirmationNotifier {
    pub fn new(resolver: WebhookResolver) -> Self {
        Self {
            resolver,
            feishu: feishu::FeiShuSender::new(),
            dingtalk: dingtalk::DingTalkSender::new(),
        }
    }

    /// Resolve the alert's webhook and post the vendor-specific
    /// confirmation message. The message never carries buttons.
    pub async fn send_confirmation(
        &self,
        alert: &AlertEvent,
        action: QuickActionKind,
        username: &str,
        duration: Option<&str>,
    ) -> Result<(), NotifyError> {
        let resolved = self.resolver.resolve(alert).await?;
        let desc = action_desc(action, duration);
        match resolved.kind {
            ChannelKind::Feishu => {
                let card = feishu::build_confirmation_card(alert, action, username, &desc);
                self.feishu.send(&resolved.hook, &resolved.sign, card).await
            }
            ChannelKind::Dingtalk => {
                let message = dingtalk::build_confirmation_message(alert, action, username, &desc);
                self.dingtalk
                    .send(&resolved.hook, &resolved.sign, message)
                    .await
            }
        }
    }
}

/// `静默 1小时` for silences with a duration, the plain label otherwise.
pub fn action_desc(action: QuickActionKind, duration: Option<&str>) -> String {
    match (action, duration) {
        (QuickActionKind::Silence, Some(d)) if !d.is_empty() => {
            format!("静默 {}", format_duration_chinese(d))
        }
        _ => action.label().to_string(),
    }
}
