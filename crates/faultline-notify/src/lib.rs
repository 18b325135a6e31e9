//! Chat-webhook notification delivery.
//!
//! Given an alert, [`resolver::WebhookResolver`] locates its notification
//! channel (fault-center notices first, probing-rule fallback second) and
//! the vendor modules post FeiShu interactive cards or DingTalk markdown to
//! the webhook. Delivery failures are logged, never retried.

pub mod confirmation;
pub mod dingtalk;
pub mod duty;
pub mod feishu;
pub mod resolver;


use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// No FeiShu/DingTalk webhook could be located for the alert.
    #[error("未找到飞书或钉钉通知配置")]
    NoChannel,
    #[error("不支持的通知类型: {0}")]
    UnsupportedType(String),
    #[error("获取通知配置失败: {0}")]
    Resolve(String),
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook API error: status={status}, body={body}")]
    Api { status: u16, body: String },
}

/// A vendor webhook sender: posts one JSON payload to one hook URL,
/// applying the vendor's signing scheme when `sign` is non-empty.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(
        &self,
        hook: &str,
        sign: &str,
        content: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Which quick action a confirmation message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickActionKind {
    Claim,
    Silence,
    Resolve,
}

impl QuickActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuickActionKind::Claim => "claim",
            QuickActionKind::Silence => "silence",
            QuickActionKind::Resolve => "resolve",
        }
    }

    /// 操作名称（中文）
    pub fn label(&self) -> &'static str {
        match self {
            QuickActionKind::Claim => "认领",
            QuickActionKind::Silence => "静默",
            QuickActionKind::Resolve => "标记已处理",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            QuickActionKind::Claim => "🔔",
            QuickActionKind::Silence => "🔕",
            QuickActionKind::Resolve => "✅",
        }
    }

    /// FeiShu card header color template.
    pub fn header_color(&self) -> &'static str {
        match self {
            QuickActionKind::Claim => "blue",
            QuickActionKind::Silence => "orange",
            QuickActionKind::Resolve => "green",
        }
    }

    pub fn note_text(&self) -> &'static str {
        match self {
            QuickActionKind::Claim => "该告警已被认领,后续操作将由认领人负责",
            QuickActionKind::Silence => "告警已静默,在静默期间不会再次发送通知",
            QuickActionKind::Resolve => "该告警已标记为已处理状态",
        }
    }
}
